use crate::domain::model::{CandidateId, QuestionId};
use crate::domain::ports::MarkStore;
use crate::domain::table::MarkTable;
use crate::utils::error::{MarkingError, Result};
use async_trait::async_trait;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Mark store kept as a CSV file on local disk.
///
/// Every write goes to its own temporary file in the same directory and is
/// then renamed over the store, so concurrent graders never see a partial file.
#[derive(Debug, Clone)]
pub struct LocalCsvStore {
    path: PathBuf,
}

impl LocalCsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, message: impl ToString) -> MarkingError {
        MarkingError::store_unavailable(self.location(), message)
    }

    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn render(&self, table: &MarkTable) -> Result<String> {
        table.to_csv().map_err(|e| self.unavailable(e))
    }

    /// Writes `content` to a fresh temp file and moves it into place. With
    /// `replace == false` an existing store wins and `Ok(false)` is returned.
    async fn publish(&self, content: String, replace: bool) -> Result<bool> {
        tokio::fs::create_dir_all(self.directory())
            .await
            .map_err(|e| self.unavailable(e))?;

        let store = self.clone();
        tokio::task::spawn_blocking(move || store.publish_blocking(&content, replace))
            .await
            .map_err(|e| self.unavailable(e))?
    }

    fn publish_blocking(&self, content: &str, replace: bool) -> Result<bool> {
        let mut temp = tempfile::Builder::new()
            .prefix(".marks-")
            .suffix(".tmp")
            .tempfile_in(self.directory())
            .map_err(|e| self.unavailable(e))?;
        temp.write_all(content.as_bytes())
            .map_err(|e| self.unavailable(e))?;
        temp.as_file().sync_all().map_err(|e| self.unavailable(e))?;

        let persisted = if replace {
            temp.persist(&self.path)
        } else {
            temp.persist_noclobber(&self.path)
        };
        match persisted {
            Ok(_) => Ok(true),
            Err(e) if !replace && e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(self.unavailable(e.error)),
        }
    }
}

#[async_trait]
impl MarkStore for LocalCsvStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn exists(&self) -> Result<bool> {
        tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| self.unavailable(e))
    }

    async fn read_all(&self) -> Result<MarkTable> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(self.unavailable("mark file does not exist"))
            }
            Err(e) => return Err(self.unavailable(e)),
        };

        let table = MarkTable::from_csv(&content).map_err(|e| self.unavailable(e))?;
        tracing::debug!(
            "Read {} candidates x {} columns from {}",
            table.candidates().len(),
            table.columns().len(),
            self.location()
        );
        Ok(table)
    }

    async fn write_all(&self, table: &MarkTable) -> Result<()> {
        let content = self.render(table)?;
        let bytes = content.len();
        self.publish(content, true).await?;

        tracing::debug!("Wrote {} bytes to {}", bytes, self.location());
        Ok(())
    }

    async fn initialize_if_absent(
        &self,
        candidates: &[CandidateId],
        questions: &[QuestionId],
    ) -> Result<bool> {
        if self.exists().await? {
            tracing::debug!("Mark store already present at {}", self.location());
            return Ok(false);
        }

        let content = self.render(&MarkTable::blank(candidates, questions))?;
        if !self.publish(content, false).await? {
            tracing::debug!("Mark store created concurrently at {}", self.location());
            return Ok(false);
        }

        tracing::info!(
            "📝 Created mark store at {} ({} candidates, {} questions)",
            self.location(),
            candidates.len(),
            questions.len()
        );
        Ok(true)
    }
}
