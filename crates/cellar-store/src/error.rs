//! Error types for the storage engine.

use std::fmt;

/// Errors reported by the storage engine.
#[derive(Debug)]
pub enum StoreError {
    /// I/O error from the filesystem.
    Io(std::io::Error),
    /// The file does not start with the container signature.
    SignatureMismatch,
    /// The container image version is not supported.
    UnsupportedVersion(u16),
    /// The image payload digest does not match the stored digest.
    DigestMismatch,
    /// The image payload could not be decoded.
    CorruptImage(String),
    /// The store has already been closed.
    Closed,
    /// The store was opened read-only and a mutation was attempted.
    ReadOnly,
    /// A handle that is not registered (stale or already closed).
    StaleHandle(u64),
    /// The path does not name an existing object.
    NoSuchPath(String),
    /// An object already exists where a new one would be created.
    AlreadyExists(String),
    /// The object at the path is not a group.
    NotAGroup(String),
    /// The object at the path is not a dataset.
    NotADataset(String),
    /// The parent group of the path does not exist.
    NoParent(String),
    /// Element types cannot be converted into each other.
    Conversion {
        /// Class name of the source descriptor.
        from: &'static str,
        /// Class name of the requested descriptor.
        to: &'static str,
    },
    /// A transfer buffer does not match the dataset's element count.
    BufferSize {
        /// Number of bytes the transfer requires.
        expected: usize,
        /// Number of bytes the caller supplied.
        actual: usize,
    },
    /// The dataset holds fixed-width data but a text transfer was requested,
    /// or vice versa.
    PayloadKind(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "I/O error: {e}"),
            StoreError::SignatureMismatch => {
                write!(f, "container signature not found")
            }
            StoreError::UnsupportedVersion(v) => {
                write!(f, "unsupported container image version: {v}")
            }
            StoreError::DigestMismatch => {
                write!(f, "container image digest mismatch")
            }
            StoreError::CorruptImage(msg) => {
                write!(f, "corrupt container image: {msg}")
            }
            StoreError::Closed => write!(f, "store is closed"),
            StoreError::ReadOnly => write!(f, "store is read-only"),
            StoreError::StaleHandle(h) => write!(f, "stale object handle: {h}"),
            StoreError::NoSuchPath(p) => write!(f, "no object at path: {p}"),
            StoreError::AlreadyExists(p) => {
                write!(f, "object already exists at path: {p}")
            }
            StoreError::NotAGroup(p) => write!(f, "not a group: {p}"),
            StoreError::NotADataset(p) => write!(f, "not a dataset: {p}"),
            StoreError::NoParent(p) => {
                write!(f, "parent group does not exist for path: {p}")
            }
            StoreError::Conversion { from, to } => {
                write!(f, "cannot convert {from} data to {to}")
            }
            StoreError::BufferSize { expected, actual } => {
                write!(f, "transfer buffer size mismatch: need {expected} bytes, got {actual}")
            }
            StoreError::PayloadKind(p) => {
                write!(f, "payload kind mismatch for dataset: {p}")
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}
