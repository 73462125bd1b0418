use std::{io, path::PathBuf};
use thiserror::Error;

/// Category handed to [`crate::host::Host::notify_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Game install or profile could not be resolved. Cancelable.
    Precondition,
    /// `modconfig.json` exists but is not valid. User environment problem.
    MalformedConfig,
    Io,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Precondition => "precondition",
            ErrorKind::MalformedConfig => "malformed config",
            ErrorKind::Io => "io",
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Pillars of Eternity II wasn't discovered")]
    GameNotDiscovered,
    #[error("no active profile for {game_id}")]
    ProfileMissing { game_id: String },
    #[error("mod configuration at {} is invalid: {source}", path.display())]
    MalformedConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("file watch failed: {0}")]
    Watch(#[from] notify::Error),
    #[error("serialize mod configuration: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl SyncError {
    pub fn io(context: &'static str, source: io::Error) -> Self {
        SyncError::Io { context, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::GameNotDiscovered | SyncError::ProfileMissing { .. } => {
                ErrorKind::Precondition
            }
            SyncError::MalformedConfig { .. } => ErrorKind::MalformedConfig,
            SyncError::Io { .. } | SyncError::Watch(_) | SyncError::Serialize(_) => ErrorKind::Io,
        }
    }

    /// Precondition failures are expected in normal use and can be dismissed.
    pub fn is_cancelable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Precondition)
    }

    /// Whether the failure points at a defect worth an automatic report.
    pub fn allow_report(&self) -> bool {
        matches!(self.kind(), ErrorKind::Io)
    }
}
