//! Core trait abstractions for the research library.
//!
//! These traits define the interfaces that applications implement
//! to provide search, text completion, and call-rate budgeting.

pub mod ai;
pub mod rate_limit;
pub mod searcher;
