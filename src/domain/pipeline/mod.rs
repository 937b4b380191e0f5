//! Per-request pipeline state and results

mod event;
mod state;

pub use event::{AnswerResponse, StreamEvent};
pub use state::{PipelineStage, RequestState};
