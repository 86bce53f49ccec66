//! Filesystem error types.

use std::io;
use thiserror::Error;

/// Error type shared by the adapter, its file handles and the bundled backends.
///
/// Backend failures travel through the adapter unchanged; only the optional
/// capabilities (`Unsupported`) and the handle lock (`NotLocked`) originate
/// in the adapter layer itself.
#[derive(Debug, Error)]
pub enum FsError {
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Directory not empty.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Path escapes a restricted base path.
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// Invalid path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Not a symbolic link.
    #[error("not a symbolic link: {0}")]
    NotASymlink(String),

    /// Symlink resolution exceeded the hop limit.
    #[error("too many levels of symbolic links: {0}")]
    TooManySymlinks(String),

    /// The backend does not implement an optional operation.
    #[error("{op} {old} {new}: operation not supported by backend")]
    Unsupported {
        op: &'static str,
        old: String,
        new: String,
    },

    /// `unlock` called on a handle whose lock is not held.
    #[error("unlock of unlocked file: {0}")]
    NotLocked(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl FsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a DirectoryNotEmpty error.
    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    /// Create a PathEscapesRoot error.
    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create an Unsupported error naming the operation and paths involved.
    pub fn unsupported(op: &'static str, old: impl Into<String>, new: impl Into<String>) -> Self {
        Self::Unsupported {
            op,
            old: old.into(),
            new: new.into(),
        }
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// The `io::ErrorKind` this error corresponds to.
    ///
    /// Lets callers inspect adapter errors with the same idioms they use for
    /// native I/O errors.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            FsError::NotFound(_) => io::ErrorKind::NotFound,
            FsError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            FsError::PermissionDenied(_) | FsError::PathEscapesRoot(_) => {
                io::ErrorKind::PermissionDenied
            }
            FsError::NotADirectory(_) => io::ErrorKind::NotADirectory,
            FsError::IsADirectory(_) => io::ErrorKind::IsADirectory,
            FsError::DirectoryNotEmpty(_) => io::ErrorKind::DirectoryNotEmpty,
            FsError::InvalidPath(_) | FsError::NotASymlink(_) => io::ErrorKind::InvalidInput,
            FsError::TooManySymlinks(_) => io::ErrorKind::FilesystemLoop,
            FsError::Unsupported { .. } => io::ErrorKind::Unsupported,
            FsError::NotLocked(_) => io::ErrorKind::Other,
            FsError::Io(e) => e.kind(),
            FsError::Other(_) => io::ErrorKind::Other,
        }
    }

    /// Returns true for every not-found flavour, including wrapped I/O errors.
    pub fn is_not_found(&self) -> bool {
        self.kind() == io::ErrorKind::NotFound
    }

    /// Returns true if the error reports an unsupported optional capability.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, FsError::Unsupported { .. })
    }
}

/// Convert FsError to std::io::Error for compatibility.
impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        match e {
            FsError::Io(e) => e,
            other => io::Error::new(other.kind(), other.to_string()),
        }
    }
}

/// Result type used throughout the crate.
pub type FsResult<T> = Result<T, FsError>;
