use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source file '{}' not found", .path.display())]
    SourceNotFound { path: PathBuf },

    #[error("Database error: {message}")]
    Persistence { message: String },

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Invalid value '{value}' in column '{column}' at line {line}")]
    InvalidValue {
        line: u64,
        column: String,
        value: String,
    },

    #[error("No rows to select from: {0}")]
    EmptySelection(String),

    #[error("Chart rendering failed: {0}")]
    Chart(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn persistence(message: impl std::fmt::Display) -> Self {
        PipelineError::Persistence {
            message: message.to_string(),
        }
    }

    /// Process exit code for a fatal error.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::SourceNotFound { .. } => 2,
            PipelineError::Persistence { .. } => 3,
            _ => 1,
        }
    }

    /// Message shown to the user when the run halts on this error.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::SourceNotFound { path } => format!(
                "Error: file '{}' not found. Check the path.",
                path.display()
            ),
            PipelineError::Persistence { message } => format!(
                "Error connecting to or writing to the database: {message}\n\
                 Check your credentials, that the target database exists and that the server is running."
            ),
            other => format!("Error: {other}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
