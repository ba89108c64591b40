use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the zip codec.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("invalid zip entry path: {0:?}")]
    InvalidEntry(String),

    #[error("too large for a zip32 archive: {0}")]
    TooLarge(String),

    #[error("corrupt archive: {0}")]
    Corrupt(String),

    #[error("unsupported compression method {method} for {path}")]
    UnsupportedMethod { path: String, method: u16 },

    #[error("encrypted entry not supported: {0}")]
    Encrypted(String),
}

impl ArchiveError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    /// Error text without the `corrupt archive:` prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::Corrupt(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// Rejections from the path safety layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path")]
    Empty,

    #[error("path traversal in {0:?}")]
    Traversal(String),

    #[error("{0} resolves outside the destination")]
    Escapes(PathBuf),
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("missing manifest (theme.json)")]
    Missing,

    #[error("invalid manifest: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid manifest: theme.json must be a JSON object")]
    NotObject,
}

/// Why a single package was skipped. The display text becomes the catalog warning.
///
/// Every decode failure is reported as a corrupt archive, whatever the cause.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("corrupt archive: {}", .0.detail())]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

pub(crate) trait IoContext<T> {
    fn io_context<F: FnOnce() -> String>(self, f: F) -> Result<T, IngestError>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<F: FnOnce() -> String>(self, f: F) -> Result<T, IngestError> {
        self.map_err(|source| IngestError::Io {
            context: f(),
            source,
        })
    }
}
