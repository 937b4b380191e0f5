//! Prompt context assembly

mod builder;

pub use builder::{ContextBuilder, DEFAULT_HISTORY_TURNS};
