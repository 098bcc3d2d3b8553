//! Error types for wa-cli.
//!
//! Every fatal condition a command can hit is a variant here. `exit_code`
//! decides what the process returns.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WaError {
    #[error("This is not a wa-cli project (searched from {}). You'll need to run wa-cli init.", .0.display())]
    NotInitialized(PathBuf),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Precondition(String),

    #[error("No skill matching \"{name}\"")]
    NotFound { name: String },

    #[error("{count} skills matching \"{name}\"")]
    Ambiguous { name: String, count: usize },

    #[error("Service with apikey \"{credential}\" is write-protected ({})", .registry.display())]
    ReadOnly { credential: String, registry: PathBuf },

    #[error("{action} failed: {message}")]
    Remote { action: String, message: String },

    #[error("Skill \"{name}\" not available after {waited:?} (last status: {last_status})")]
    Timeout {
        name: String,
        waited: Duration,
        last_status: String,
    },

    #[error("Skill \"{name}\" reported status {status}")]
    NotReady { name: String, status: String },

    #[error("{program} exited with status {code}")]
    Subprocess { program: String, code: i32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl WaError {
    pub fn remote(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    ///
    /// A failed external script keeps its own code; everything else is 1.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Subprocess { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }

    /// Short machine-readable code used in JSON output.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotInitialized(_) | Self::MissingConfig(_) | Self::Config(_) | Self::Toml(_) => {
                "configuration"
            }
            Self::Precondition(_) => "precondition",
            Self::NotFound { .. } => "not_found",
            Self::Ambiguous { .. } => "ambiguous",
            Self::ReadOnly { .. } => "permission_denied",
            Self::Remote { .. } | Self::Http(_) => "remote",
            Self::Timeout { .. } => "timeout",
            Self::NotReady { .. } => "not_ready",
            Self::Subprocess { .. } => "subprocess",
            Self::Io(_) | Self::Json(_) | Self::Git(_) => "error",
        }
    }
}

pub type Result<T> = std::result::Result<T, WaError>;
