//! Search queries and where they came from.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a query is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOrigin {
    /// Generated from the schema at the start of a session
    Initial,

    /// Produced by reflection to fill missing fields
    FollowUp,
}

/// A single search query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub origin: QueryOrigin,
}

impl Query {
    /// An initial query.
    pub fn initial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: QueryOrigin::Initial,
        }
    }

    /// A follow-up query.
    pub fn follow_up(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: QueryOrigin::FollowUp,
        }
    }

    pub fn is_follow_up(&self) -> bool {
        self.origin == QueryOrigin::FollowUp
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
