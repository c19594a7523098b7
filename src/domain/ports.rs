use crate::domain::model::{CandidateId, QuestionId};
use crate::domain::table::MarkTable;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Whole-table access to wherever marks are persisted.
///
/// Nothing is cached behind this boundary: other graders write to the same
/// store, so callers must `read_all` again before trusting any cell.
#[async_trait]
pub trait MarkStore: Send + Sync {
    /// Human-readable location, used in logs and error messages.
    fn location(&self) -> String;

    async fn exists(&self) -> Result<bool>;

    async fn read_all(&self) -> Result<MarkTable>;

    /// Replaces the entire store. Last write wins.
    async fn write_all(&self, table: &MarkTable) -> Result<()>;

    /// Creates an all-`-` store if none exists. Returns whether it created one.
    /// Never overwrites an existing store.
    async fn initialize_if_absent(
        &self,
        candidates: &[CandidateId],
        questions: &[QuestionId],
    ) -> Result<bool> {
        if self.exists().await? {
            tracing::debug!("Mark store already present at {}", self.location());
            return Ok(false);
        }
        self.write_all(&MarkTable::blank(candidates, questions)).await?;
        Ok(true)
    }
}
