//! Error types for shadowfs.
//!
//! Every recoverable filesystem condition maps to one of the [`ErrorKind`]
//! values, bound to the offending absolute path. Symlink-chain overflow and
//! the copy-into-self rejection are surfaced as their own variants so callers
//! can distinguish them from ordinary path errors.

use thiserror::Error;

/// Result type alias using shadowfs's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// The closed set of path-bound error kinds.
///
/// Each kind carries a POSIX-style code and a standard human message; the
/// offending path travels on the enclosing [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No entry exists at the path.
    NotFound,
    /// An entry already exists at the path.
    AlreadyExists,
    /// The entry is a directory where one was not expected.
    IsDirectory,
    /// The entry is a file where one was not expected.
    IsFile,
    /// The entry is not a directory.
    NotDirectory,
    /// The entry is not a file.
    NotFile,
    /// The entry is not a symbolic link.
    NotSymlink,
    /// The directory is not empty.
    NotEmpty,
}

impl ErrorKind {
    /// POSIX-style code for this kind.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "ENOENT",
            ErrorKind::AlreadyExists => "EEXIST",
            ErrorKind::IsDirectory => "EISDIR",
            ErrorKind::IsFile => "EISFILE",
            ErrorKind::NotDirectory => "ENOTDIR",
            ErrorKind::NotFile => "ENOTFILE",
            ErrorKind::NotSymlink => "ENOTLNK",
            ErrorKind::NotEmpty => "ENOTEMPTY",
        }
    }

    /// Standard human message for this kind.
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "no such file or directory",
            ErrorKind::AlreadyExists => "file already exists",
            ErrorKind::IsDirectory => "is a directory",
            ErrorKind::IsFile => "is a file",
            ErrorKind::NotDirectory => "not a directory",
            ErrorKind::NotFile => "not a file",
            ErrorKind::NotSymlink => "not a symbolic link",
            ErrorKind::NotEmpty => "directory not empty",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// shadowfs error types.
#[derive(Error, Debug)]
pub enum Error {
    /// A filesystem condition bound to the offending path.
    #[error("{kind}: {path}")]
    Path {
        /// What went wrong.
        kind: ErrorKind,
        /// The absolute path the condition applies to.
        path: String,
    },

    /// Symlink resolution exceeded the hop limit (loop or excessive chain).
    #[error("too many levels of symbolic links: {path}")]
    SymlinkChain {
        /// The path whose resolution overflowed.
        path: String,
    },

    /// A copy whose target lies inside the source tree.
    #[error("cannot copy {from} into itself: {target}")]
    CopyIntoSelf {
        /// The copy source.
        from: String,
        /// The offending target.
        target: String,
    },

    /// I/O error from the storage backend.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Error for a missing entry.
    pub fn not_found(path: impl Into<String>) -> Self {
        Error::Path {
            kind: ErrorKind::NotFound,
            path: path.into(),
        }
    }

    /// Error for an entry that already exists.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Error::Path {
            kind: ErrorKind::AlreadyExists,
            path: path.into(),
        }
    }

    /// Error for an unexpected directory.
    pub fn is_directory(path: impl Into<String>) -> Self {
        Error::Path {
            kind: ErrorKind::IsDirectory,
            path: path.into(),
        }
    }

    /// Error for an unexpected file.
    pub fn is_file(path: impl Into<String>) -> Self {
        Error::Path {
            kind: ErrorKind::IsFile,
            path: path.into(),
        }
    }

    /// Error for an entry that is not a directory.
    pub fn not_directory(path: impl Into<String>) -> Self {
        Error::Path {
            kind: ErrorKind::NotDirectory,
            path: path.into(),
        }
    }

    /// Error for an entry that is not a file.
    pub fn not_file(path: impl Into<String>) -> Self {
        Error::Path {
            kind: ErrorKind::NotFile,
            path: path.into(),
        }
    }

    /// Error for an entry that is not a symbolic link.
    pub fn not_symlink(path: impl Into<String>) -> Self {
        Error::Path {
            kind: ErrorKind::NotSymlink,
            path: path.into(),
        }
    }

    /// Error for a non-empty directory.
    pub fn not_empty(path: impl Into<String>) -> Self {
        Error::Path {
            kind: ErrorKind::NotEmpty,
            path: path.into(),
        }
    }

    /// The path-bound kind, if this is a [`Error::Path`] error.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Path { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// The offending path, when the error carries one.
    pub fn path(&self) -> Option<&str> {
        match self {
            Error::Path { path, .. } | Error::SymlinkChain { path } => Some(path),
            Error::CopyIntoSelf { target, .. } => Some(target),
            Error::Io(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_error_message_carries_code_and_path() {
        let err = Error::not_found("/a/b");
        let msg = format!("{err}");
        assert!(msg.contains("ENOENT"), "got: {msg}");
        assert!(msg.contains("/a/b"), "got: {msg}");
    }

    #[test]
    fn kind_accessor() {
        assert_eq!(Error::is_directory("/d").kind(), Some(ErrorKind::IsDirectory));
        assert_eq!(
            Error::SymlinkChain { path: "/l".into() }.kind(),
            None
        );
    }

    #[test]
    fn every_kind_has_distinct_code() {
        let kinds = [
            ErrorKind::NotFound,
            ErrorKind::AlreadyExists,
            ErrorKind::IsDirectory,
            ErrorKind::IsFile,
            ErrorKind::NotDirectory,
            ErrorKind::NotFile,
            ErrorKind::NotSymlink,
            ErrorKind::NotEmpty,
        ];
        let codes: std::collections::HashSet<_> = kinds.iter().map(|k| k.code()).collect();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn symlink_chain_message() {
        let err = Error::SymlinkChain { path: "/loop".into() };
        assert!(format!("{err}").contains("too many levels"));
        assert_eq!(err.path(), Some("/loop"));
    }

    #[test]
    fn io_error_wraps() {
        let err: Error = std::io::Error::other("backend gone").into();
        assert!(format!("{err}").contains("backend gone"));
        assert_eq!(err.path(), None);
    }
}
