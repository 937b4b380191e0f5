//! Retrieval statistics

mod tracker;

pub use tracker::RetrievalStatsTracker;
