//! Infrastructure layer - Stores, external clients and the answer pipeline

pub mod cache;
pub mod embedding;
pub mod llm;
pub mod logging;
pub mod observability;
pub mod search;
pub mod services;
pub mod stats;
