//! Design-level error taxonomy for the adapter, and its translation to
//! both FTP reply codes (classification) and `fuser::Errno` (POSIX).

use std::fmt;
use std::io;

use fuser::Errno;

/// A categorised adapter error. Never wraps raw `suppaftp` types directly
/// so that `Pool`/`Handle` code stays usable against a mock transport.
#[derive(Debug, Clone)]
pub struct AdapterError {
    pub kind: ErrorKind,
    pub message: String,
    /// FTP reply code that triggered the error, if any.
    pub code: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    IsDirectory,
    NotDirectory,
    DirNotEmpty,
    PermissionDenied,
    BrokenConnection,
    Timeout,
    Unavailable,
    Cancelled,
    Io,
}

pub type AdapterResult<T> = Result<T, AdapterError>;

impl AdapterError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, msg)
    }

    pub fn is_directory(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::IsDirectory, msg)
    }

    pub fn not_directory(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotDirectory, msg)
    }

    pub fn dir_not_empty(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::DirNotEmpty, msg)
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, msg)
    }

    pub fn broken_connection(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BrokenConnection, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, msg)
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, msg)
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, msg)
    }

    /// True if the originating connection must be marked broken on release.
    pub fn marks_connection_broken(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::BrokenConnection | ErrorKind::Timeout | ErrorKind::Unavailable
        )
    }

    /// Classify a raw FTP reply code/text pair per §4.2's mapping table.
    pub fn from_reply(code: u16, text: &str) -> Self {
        let lower = text.to_lowercase();
        let kind = match code {
            421 | 425 | 426 => ErrorKind::BrokenConnection,
            530 => ErrorKind::PermissionDenied,
            550 => {
                if lower.contains("not a directory") {
                    ErrorKind::NotDirectory
                } else if lower.contains("is a directory") {
                    ErrorKind::IsDirectory
                } else if lower.contains("not empty") {
                    ErrorKind::DirNotEmpty
                } else if lower.contains("no such file") || lower.contains("not found") {
                    ErrorKind::NotFound
                } else {
                    ErrorKind::Io
                }
            }
            553 => ErrorKind::AlreadyExists,
            _ if lower.contains("file exists") => ErrorKind::AlreadyExists,
            _ if code >= 500 => ErrorKind::Io,
            _ => ErrorKind::Io,
        };
        Self {
            kind,
            message: text.to_string(),
            code: Some(code),
        }
    }

    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut => Self::timeout(err.to_string()),
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => Self::broken_connection(err.to_string()),
            io::ErrorKind::ConnectionRefused | io::ErrorKind::AddrNotAvailable => {
                Self::unavailable(err.to_string())
            }
            _ => Self::io(err.to_string()),
        }
    }

    /// Translate to the POSIX error the kernel bridge expects.
    pub fn into_errno(self) -> Errno {
        match self.kind {
            ErrorKind::NotFound => Errno::ENOENT,
            ErrorKind::AlreadyExists => Errno::EEXIST,
            ErrorKind::IsDirectory => Errno::EISDIR,
            ErrorKind::NotDirectory => Errno::ENOTDIR,
            ErrorKind::DirNotEmpty => Errno::ENOTEMPTY,
            ErrorKind::PermissionDenied => Errno::EACCES,
            ErrorKind::BrokenConnection | ErrorKind::Unavailable => Errno::EIO,
            ErrorKind::Timeout => Errno::ETIMEDOUT,
            ErrorKind::Cancelled => Errno::EINTR,
            ErrorKind::Io => Errno::EIO,
        }
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{:?} {}] {}", self.kind, code, self.message),
            None => write!(f, "[{:?}] {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for AdapterError {}

impl From<io::Error> for AdapterError {
    fn from(err: io::Error) -> Self {
        Self::from_io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_not_found() {
        let e = AdapterError::from_reply(550, "No such file or directory.");
        assert_eq!(e.kind, ErrorKind::NotFound);
        assert_eq!(e.into_errno(), Errno::ENOENT);
    }

    #[test]
    fn maps_is_directory() {
        let e = AdapterError::from_reply(550, "test1.txt: Is a directory");
        assert_eq!(e.kind, ErrorKind::IsDirectory);
    }

    #[test]
    fn maps_dir_not_empty() {
        let e = AdapterError::from_reply(550, "Directory not empty.");
        assert_eq!(e.kind, ErrorKind::DirNotEmpty);
    }

    #[test]
    fn maps_broken_connection() {
        let e = AdapterError::from_reply(426, "Connection closed; transfer aborted.");
        assert_eq!(e.kind, ErrorKind::BrokenConnection);
        assert!(e.marks_connection_broken());
    }

    #[test]
    fn maps_auth_failure() {
        let e = AdapterError::from_reply(530, "Login incorrect.");
        assert_eq!(e.kind, ErrorKind::PermissionDenied);
        assert_eq!(e.into_errno(), Errno::EACCES);
    }

    #[test]
    fn io_error_classification() {
        let e = AdapterError::from_io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert_eq!(e.kind, ErrorKind::Unavailable);
    }
}
