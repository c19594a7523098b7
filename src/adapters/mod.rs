// Adapters layer: concrete mark store backends.

pub mod local_store;
pub mod remote_store;

use crate::config::toml_config::MarkingConfig;
use crate::domain::model::{CandidateId, QuestionId};
use crate::domain::ports::MarkStore;
use crate::domain::table::MarkTable;
use crate::utils::error::{MarkingError, Result};
use async_trait::async_trait;
use std::time::Duration;

pub use local_store::LocalCsvStore;
pub use remote_store::RemoteSheetStore;

/// The backend chosen by deployment configuration.
#[derive(Debug, Clone)]
pub enum MarkStoreBackend {
    Local(LocalCsvStore),
    Remote(RemoteSheetStore),
}

impl MarkStoreBackend {
    pub fn from_config(config: &MarkingConfig) -> Result<Self> {
        match config.store.r#type.as_str() {
            "local" => {
                let path = config
                    .store
                    .path
                    .as_ref()
                    .ok_or_else(|| MarkingError::MissingConfigError {
                        field: "store.path".to_string(),
                    })?;
                Ok(MarkStoreBackend::Local(LocalCsvStore::new(path)))
            }
            "remote" => {
                let url = config
                    .store
                    .url
                    .as_ref()
                    .ok_or_else(|| MarkingError::MissingConfigError {
                        field: "store.url".to_string(),
                    })?;
                Ok(MarkStoreBackend::Remote(RemoteSheetStore::new(
                    url,
                    config.store_token(),
                    Duration::from_secs(config.store_timeout_seconds()),
                )?))
            }
            other => Err(MarkingError::ConfigError {
                message: format!("unsupported store type '{}'", other),
            }),
        }
    }

    fn inner(&self) -> &dyn MarkStore {
        match self {
            MarkStoreBackend::Local(store) => store,
            MarkStoreBackend::Remote(store) => store,
        }
    }
}

#[async_trait]
impl MarkStore for MarkStoreBackend {
    fn location(&self) -> String {
        self.inner().location()
    }

    async fn exists(&self) -> Result<bool> {
        self.inner().exists().await
    }

    async fn read_all(&self) -> Result<MarkTable> {
        self.inner().read_all().await
    }

    async fn write_all(&self, table: &MarkTable) -> Result<()> {
        self.inner().write_all(table).await
    }

    async fn initialize_if_absent(
        &self,
        candidates: &[CandidateId],
        questions: &[QuestionId],
    ) -> Result<bool> {
        self.inner().initialize_if_absent(candidates, questions).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(store: &str) -> MarkingConfig {
        MarkingConfig::from_toml_str(&format!(
            r#"
[session]
grader = "VM"

[reference]
roster_path = "groups.csv"
responses_path = "responses.csv"

{}
"#,
            store
        ))
        .unwrap()
    }

    #[test]
    fn test_backend_selection() {
        let local = MarkStoreBackend::from_config(&config(
            "[store]\ntype = \"local\"\npath = \"results/scores_VM.csv\"",
        ))
        .unwrap();
        assert!(matches!(local, MarkStoreBackend::Local(_)));
        assert_eq!(local.location(), "results/scores_VM.csv");

        let remote = MarkStoreBackend::from_config(&config(
            "[store]\ntype = \"remote\"\nurl = \"https://sheets.example.com/marks\"",
        ))
        .unwrap();
        assert!(matches!(remote, MarkStoreBackend::Remote(_)));
        assert_eq!(remote.location(), "https://sheets.example.com/marks");

        assert!(MarkStoreBackend::from_config(&config("[store]\ntype = \"remote\"")).is_err());
    }
}
