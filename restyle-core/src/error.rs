use std::{fmt, io, path::PathBuf, time::Duration};

use thiserror::Error;

/// Classification of a per-request failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    Backend,
    Io,
    Timeout,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Configuration => "configuration",
            Self::Validation => "validation",
            Self::Backend => "backend",
            Self::Io => "io",
            Self::Timeout => "timeout",
        })
    }
}

#[derive(Error, Debug)]
pub enum RedesignError {
    #[error("Model not found at {}. Please download Flux.1 Schnell to this location.", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Input image not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("{0}")]
    Validation(String),

    #[error("{0:#}")]
    Backend(anyhow::Error),

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Generation timed out after {}", describe_deadline(.0))]
    Timeout(Duration),
}

impl RedesignError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ModelNotFound(_) | Self::Configuration(_) => ErrorKind::Configuration,
            Self::InputNotFound(_) | Self::Validation(_) => ErrorKind::Validation,
            Self::Backend(_) => ErrorKind::Backend,
            Self::Io { .. } => ErrorKind::Io,
            Self::Timeout(_) => ErrorKind::Timeout,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Whole-second deadlines read as "N seconds", anything finer keeps its unit.
fn describe_deadline(deadline: &Duration) -> String {
    if deadline.subsec_nanos() == 0 && deadline.as_secs() > 0 {
        format!("{} seconds", deadline.as_secs())
    } else {
        format!("{deadline:?}")
    }
}

pub type Result<T, E = RedesignError> = std::result::Result<T, E>;
