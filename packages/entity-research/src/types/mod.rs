//! Data types for research sessions.

pub mod config;
pub mod query;
pub mod record;
pub mod schema;
pub mod session;
pub mod source;
