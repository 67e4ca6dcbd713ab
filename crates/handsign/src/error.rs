//! The error type returned by dataset operations.
//!
//! Only problems that invalidate a whole run (or a whole read) are reported as an [`Error`].
//! Problems with individual images (undecodable files, photos without a visible hand) are
//! absorbed by the builder and counted in its [`ScanStats`][crate::dataset::ScanStats].

use std::{io, path::PathBuf};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input root is missing or is not a directory.
    #[error("input directory '{}' {reason}", .path.display())]
    Precondition { path: PathBuf, reason: &'static str },

    /// The input root exists, but contains no label directories.
    #[error(
        "no label directories found in '{}'; organize the images into folders named after the signs",
        .path.display()
    )]
    EmptyInput { path: PathBuf },

    /// A hand pose was constructed from the wrong number of landmarks.
    #[error("invalid hand pose: expected 21 landmarks or 63 coordinates, got {len}")]
    InvalidPose { len: usize },

    /// A persisted record does not contain exactly 63 landmark coordinates.
    #[error("dataset record #{index} has {len} landmark values, expected 63")]
    MalformedRecord { index: usize, len: usize },

    /// A sample to be persisted holds a NaN or infinite value, which JSON cannot represent.
    #[error("dataset record #{index} contains a non-finite landmark value")]
    NonFiniteRecord { index: usize },

    /// The scan was cancelled before it finished.
    #[error("dataset conversion was cancelled")]
    Cancelled,

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if this error was caused by an unusable input directory.
    ///
    /// These errors are reported before any image is processed, and no output is produced.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition { .. } | Self::EmptyInput { .. })
    }
}
