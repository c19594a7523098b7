use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarkingError {
    #[error("Reference data error in {source_name}: {message}")]
    DataIntegrity { source_name: String, message: String },

    #[error("Mark store unavailable at {location}: {message}")]
    StoreUnavailable { location: String, message: String },

    #[error("Invalid mark '{value}' for {question}: {reason}")]
    InvalidMark {
        question: String,
        value: String,
        reason: String,
    },

    #[error("Question {question} is not assigned to grader {grader}")]
    QuestionNotInScope { question: String, grader: String },

    #[error("Unknown candidate: {candidate}")]
    UnknownCandidate { candidate: String },

    #[error("No question is selected")]
    NoQuestionSelected,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    ReferenceData,
    Storage,
    Input,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl MarkingError {
    pub fn data_integrity(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        MarkingError::DataIntegrity {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn store_unavailable(location: impl Into<String>, message: impl ToString) -> Self {
        MarkingError::StoreUnavailable {
            location: location.into(),
            message: message.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            MarkingError::DataIntegrity { .. } => ErrorCategory::ReferenceData,
            MarkingError::StoreUnavailable { .. } => ErrorCategory::Storage,
            MarkingError::InvalidMark { .. }
            | MarkingError::QuestionNotInScope { .. }
            | MarkingError::UnknownCandidate { .. }
            | MarkingError::NoQuestionSelected => ErrorCategory::Input,
            MarkingError::ConfigError { .. }
            | MarkingError::ConfigValidationError { .. }
            | MarkingError::InvalidConfigValueError { .. }
            | MarkingError::MissingConfigError { .. } => ErrorCategory::Configuration,
            MarkingError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::Low,
            ErrorCategory::Storage => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::ReferenceData => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// Whether the current session can keep running after this error.
    pub fn is_fatal(&self) -> bool {
        self.severity() >= ErrorSeverity::High
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            MarkingError::DataIntegrity { .. } => {
                "Check that the roster and response files exist and have the expected columns"
            }
            MarkingError::StoreUnavailable { .. } => {
                "Your marks are still in memory; check the store location and run 'save' again"
            }
            MarkingError::InvalidMark { .. } => "Run 'options' to list the marks allowed for this question",
            MarkingError::QuestionNotInScope { .. } => "Run 'questions' to list the questions assigned to you",
            MarkingError::UnknownCandidate { .. } => "Run 'show' to list the candidates",
            MarkingError::NoQuestionSelected => "Run 'select <question>' first",
            MarkingError::IoError(_) => "Check file permissions and available disk space",
            MarkingError::ConfigError { .. }
            | MarkingError::ConfigValidationError { .. }
            | MarkingError::InvalidConfigValueError { .. }
            | MarkingError::MissingConfigError { .. } => "Fix the configuration file and restart",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            MarkingError::DataIntegrity { source_name, message } => {
                format!("Cannot start marking: {} is invalid ({})", source_name, message)
            }
            MarkingError::StoreUnavailable { location, message } => {
                format!("Could not reach the mark store at {}: {}", location, message)
            }
            MarkingError::InvalidMark { question, value, .. } => {
                format!("'{}' is not a valid mark for {}", value, question)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MarkingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_severity() {
        let integrity = MarkingError::data_integrity("roster", "missing columns");
        assert_eq!(integrity.category(), ErrorCategory::ReferenceData);
        assert!(integrity.is_fatal());

        let store = MarkingError::store_unavailable("results/scores.csv", "not found");
        assert_eq!(store.severity(), ErrorSeverity::Medium);
        assert!(!store.is_fatal());

        let mark = MarkingError::InvalidMark {
            question: "Q12".to_string(),
            value: "0.3".to_string(),
            reason: "not a multiple of 0.5".to_string(),
        };
        assert_eq!(mark.category(), ErrorCategory::Input);
        assert!(mark.user_friendly_message().contains("Q12"));

        let io = MarkingError::from(std::io::Error::other("disk full"));
        assert_eq!(io.category(), ErrorCategory::System);
        assert_eq!(io.severity(), ErrorSeverity::Critical);
    }
}
