//! QuestPlay
//!
//! Launcher for a QuestDB + JupyterLab playground. Downloads a pinned QuestDB
//! release, writes its configuration, and supervises the database and the
//! notebook server either in a throwaway directory or inside a container image.

use std::path::Path;

pub mod cli;
pub mod config;
pub mod http;
pub mod java;
pub mod jupyter;
pub mod probe;
pub mod process;
pub mod questdb;
pub mod state;

/// Application-wide error types with context preservation
#[derive(Debug, thiserror::Error)]
pub enum PlayError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Java error: {message}")]
    Java { message: String },

    #[error("Download error: {message}")]
    Download { message: String, url: String },

    #[error("Archive error: {message}")]
    Archive { message: String, path: Option<String> },

    #[error("Process error: {message}")]
    Process { message: String, program: Option<String> },

    #[error("{service} exited during startup (status: {status})")]
    ProcessExited { service: String, status: String },

    #[error("Timed out: {message}")]
    Timeout { message: String },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("HTTP error: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl PlayError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn java(message: impl Into<String>) -> Self {
        Self::Java {
            message: message.into(),
        }
    }

    /// Create a download error for the given URL
    pub fn download(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::Download {
            message: message.into(),
            url: url.into(),
        }
    }

    /// Create an archive error with optional archive path
    pub fn archive(message: impl Into<String>, path: Option<&Path>) -> Self {
        Self::Archive {
            message: message.into(),
            path: path.map(|p| p.display().to_string()),
        }
    }

    /// Create a process error with optional program name
    pub fn process(message: impl Into<String>, program: Option<String>) -> Self {
        Self::Process {
            message: message.into(),
            program,
        }
    }

    pub fn process_exited(service: impl Into<String>, status: impl Into<String>) -> Self {
        Self::ProcessExited {
            service: service.into(),
            status: status.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Process exit code used by the CLI when this error ends the program
    pub fn exit_code(&self) -> i32 {
        match self {
            PlayError::Configuration { .. } => 2,
            PlayError::Java { .. } => 3,
            PlayError::Download { .. } | PlayError::Http { .. } => 4,
            PlayError::Archive { .. } => 5,
            PlayError::Process { .. } | PlayError::ProcessExited { .. } => 6,
            PlayError::Timeout { .. } => 7,
            PlayError::Io { .. } | PlayError::Serialization { .. } => 1,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            PlayError::Configuration { message } => {
                format!("Configuration issue: {}", message)
            }
            PlayError::Java { message } => {
                format!("Java runtime problem: {}", message)
            }
            PlayError::Download { message, url } => {
                format!("Could not download {}: {}", url, message)
            }
            PlayError::Archive { message, path } => {
                if let Some(p) = path {
                    format!("Archive error ({}): {}", p, message)
                } else {
                    format!("Archive error: {}", message)
                }
            }
            PlayError::Process { message, program } => {
                if let Some(prog) = program {
                    format!("Process error ({}): {}", prog, message)
                } else {
                    format!("Process error: {}", message)
                }
            }
            PlayError::ProcessExited { service, status } => {
                format!("{} died during startup ({}), check its log file", service, status)
            }
            PlayError::Timeout { message } => {
                format!("Timed out: {}", message)
            }
            PlayError::Io { source } => {
                format!("File system error: {}", source)
            }
            PlayError::Http { source } => {
                format!("Network error: {}", source)
            }
            PlayError::Serialization { source } => {
                format!("Data format error: {}", source)
            }
        }
    }
}

/// Convenience type alias for Results
pub type PlayResult<T> = Result<T, PlayError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    fn with_path_context(self, path: &Path) -> PlayResult<T>;
    fn with_program_context(self, program: &str) -> PlayResult<T>;
}

impl<T> ResultExt<T> for std::io::Result<T> {
    fn with_path_context(self, path: &Path) -> PlayResult<T> {
        self.map_err(|e| {
            PlayError::Io {
                source: std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e)),
            }
        })
    }

    fn with_program_context(self, program: &str) -> PlayResult<T> {
        self.map_err(|e| {
            PlayError::process(format!("failed to run: {}", e), Some(program.to_string()))
        })
    }
}
