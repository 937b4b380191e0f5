use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Stages a request moves through in the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Start,
    CacheCheck,
    Retrieve,
    BuildContext,
    RouteModel,
    Generate,
    CacheStore,
    Completed,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::CacheCheck => "cache_check",
            Self::Retrieve => "retrieve",
            Self::BuildContext => "build_context",
            Self::RouteModel => "route_model",
            Self::Generate => "generate",
            Self::CacheStore => "cache_store",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `next` may directly follow this stage
    pub fn can_advance_to(&self, next: PipelineStage) -> bool {
        use PipelineStage::*;

        if self.is_terminal() {
            return false;
        }
        if next == Failed {
            return true;
        }

        matches!(
            (self, next),
            (Start, CacheCheck)
                | (CacheCheck, Completed)
                | (CacheCheck, Retrieve)
                | (Retrieve, BuildContext)
                | (BuildContext, RouteModel)
                | (RouteModel, Generate)
                | (Generate, CacheStore)
                | (CacheStore, Completed)
        )
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one request through the stage machine
#[derive(Debug, Clone)]
pub struct RequestState {
    current: PipelineStage,
    history: Vec<PipelineStage>,
    started: Instant,
}

impl RequestState {
    pub fn new() -> Self {
        Self {
            current: PipelineStage::Start,
            history: vec![PipelineStage::Start],
            started: Instant::now(),
        }
    }

    pub fn current(&self) -> PipelineStage {
        self.current
    }

    /// Every stage visited so far, `Start` first
    pub fn history(&self) -> &[PipelineStage] {
        &self.history
    }

    pub fn advance(&mut self, next: PipelineStage) -> Result<(), DomainError> {
        if !self.current.can_advance_to(next) {
            return Err(DomainError::internal(format!(
                "illegal pipeline transition {} -> {}",
                self.current, next
            )));
        }

        self.current = next;
        self.history.push(next);
        Ok(())
    }

    /// Moves to `Failed` unless already terminal
    pub fn fail(&mut self) {
        if !self.current.is_terminal() {
            self.current = PipelineStage::Failed;
            self.history.push(PipelineStage::Failed);
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl Default for RequestState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PipelineStage::*;

    #[test]
    fn test_miss_path() {
        let mut state = RequestState::new();
        for stage in [CacheCheck, Retrieve, BuildContext, RouteModel, Generate, CacheStore, Completed] {
            state.advance(stage).unwrap();
        }

        assert_eq!(state.current(), Completed);
        assert_eq!(state.history().len(), 8);
    }

    #[test]
    fn test_hit_path() {
        let mut state = RequestState::new();
        state.advance(CacheCheck).unwrap();
        state.advance(Completed).unwrap();

        assert_eq!(state.history(), &[Start, CacheCheck, Completed]);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut state = RequestState::new();
        assert!(state.advance(Generate).is_err());

        state.advance(CacheCheck).unwrap();
        state.advance(Retrieve).unwrap();
        assert!(state.advance(CacheStore).is_err());
        assert_eq!(state.current(), Retrieve);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut state = RequestState::new();
        state.advance(CacheCheck).unwrap();
        state.advance(Retrieve).unwrap();
        state.fail();

        assert_eq!(state.current(), Failed);
        assert!(state.advance(BuildContext).is_err());
        assert!(state.advance(Failed).is_err());

        state.fail();
        assert_eq!(state.history().last(), Some(&Failed));
        assert_eq!(state.history().len(), 4);
    }

    #[test]
    fn test_stage_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&CacheCheck).unwrap(), r#""cache_check""#);
    }
}
