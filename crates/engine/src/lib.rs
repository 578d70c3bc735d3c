pub mod error;
pub mod events;
pub mod machine;
pub mod ordering;
pub mod ranking;
pub mod tally;

pub use error::{EngineError, ErrorKind, Result};
pub use events::{EventSink, PushEvent};
pub use machine::StateMachine;
pub use tally::{JudgeRole, Vote, VoteTally};
