pub mod generation;
pub mod meeting;
pub mod prompt;
pub mod retrieval;

pub use generation::{FallbackKind, ResponseGenerator};
pub use meeting::{evaluate_meeting_request, MeetingDecision};
pub use prompt::PromptAssembler;
pub use retrieval::{RetrievalEngine, RetrievalResult, RetrievedEntry};
