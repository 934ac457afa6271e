//! Completion implementations for the research library.
//!
//! This module provides reference implementations of the `TextCompletion`
//! trait. Users can use these directly or implement their own.

#[cfg(feature = "openai")]
mod openai;

#[cfg(feature = "openai")]
pub use openai::OpenAiCompletion;
