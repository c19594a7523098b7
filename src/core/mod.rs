pub mod loader;
pub mod progress;
pub mod session;

pub use crate::domain::model::{CandidateId, Mark, MarkScale, Question, QuestionId, ReferenceData};
pub use crate::domain::ports::MarkStore;
pub use crate::domain::table::MarkTable;
pub use crate::utils::error::Result;
