use thiserror::Error;

#[derive(Error, Debug)]
pub enum MrlError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Malformed reference document: {message}")]
    MalformedInput { message: String },

    #[error("Failed to write output '{path}': {source}")]
    WriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

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

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Data,
    Configuration,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl MrlError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::IoError(_) | Self::WriteError { .. } => ErrorCategory::Io,
            Self::SerializationError(_) | Self::CsvError(_) | Self::MalformedInput { .. } => {
                ErrorCategory::Data
            }
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::ValidationError { .. } | Self::ProcessingError { .. } => {
                ErrorCategory::Processing
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 輸出失敗：文件仍在記憶體中，可重試
            Self::WriteError { .. } => ErrorSeverity::Medium,
            Self::IoError(_) => ErrorSeverity::Critical,
            Self::ValidationError { .. } => ErrorSeverity::Low,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::IoError(_) => "Check that the input file exists and is readable".to_string(),
            Self::WriteError { path, .. } => format!(
                "Check that '{}' is writable and has free space, then re-run",
                path
            ),
            Self::SerializationError(_) | Self::MalformedInput { .. } => {
                "Make sure the reference file is valid JSON with species at the top level"
                    .to_string()
            }
            Self::CsvError(_) => "Retry with --output-formats json to skip the CSV table".to_string(),
            Self::ConfigError { .. } | Self::ConfigValidationError { .. } => {
                "Review the configuration file syntax and section names".to_string()
            }
            Self::InvalidConfigValueError { field, .. } => {
                format!("Correct the value of '{}'", field)
            }
            Self::MissingConfigError { field } => format!("Provide a value for '{}'", field),
            Self::ValidationError { .. } => "Check the supplied arguments".to_string(),
            Self::ProcessingError { .. } => {
                "Inspect the reference data for unexpected values".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Io => format!("File access failed: {}", self),
            ErrorCategory::Data => format!("Reference data could not be processed: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Processing => self.to_string(),
        }
    }

    /// Process exit code for the binaries; `None` means the run still counts as a success.
    pub fn exit_code(&self) -> Option<i32> {
        match self.severity() {
            ErrorSeverity::Low => None,
            ErrorSeverity::Medium => Some(2),
            ErrorSeverity::High => Some(1),
            ErrorSeverity::Critical => Some(3),
        }
    }
}

pub type Result<T> = std::result::Result<T, MrlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_error_is_retryable() {
        let err = MrlError::WriteError {
            path: "out/updated.json".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.category(), ErrorCategory::Io);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert_eq!(err.exit_code(), Some(2));
        assert!(err.recovery_suggestion().contains("out/updated.json"));
    }

    #[test]
    fn test_malformed_input_category() {
        let err = MrlError::malformed("top-level value is an array");
        assert_eq!(err.category(), ErrorCategory::Data);
        assert_eq!(err.exit_code(), Some(1));
        assert!(err.user_friendly_message().contains("top-level value is an array"));
    }
}
