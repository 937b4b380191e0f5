//! Routing domain - Generation tier selection

mod router;

pub use router::{KeywordModelRouter, ModelRouter, ModelTier, DEFAULT_TRIGGER_TERMS};
