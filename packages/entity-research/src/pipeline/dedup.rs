//! Source deduplication.
//!
//! Raw hits arrive as one batch per query. They are flattened in query order
//! and collapsed by [`DedupKey`]: the first occurrence wins.

use std::collections::HashSet;

use crate::types::source::{DedupKey, Source};

/// Flatten per-query batches and drop repeated sources.
pub fn deduplicate_batches<I, B>(batches: I) -> Vec<Source>
where
    I: IntoIterator<Item = B>,
    B: IntoIterator<Item = Source>,
{
    deduplicate(batches.into_iter().flatten())
}

/// Drop repeated sources, keeping first occurrences in order.
pub fn deduplicate(sources: impl IntoIterator<Item = Source>) -> Vec<Source> {
    let mut seen: HashSet<DedupKey> = HashSet::new();
    sources
        .into_iter()
        .filter(|source| seen.insert(source.dedup_key()))
        .collect()
}
