//! Error types for the typed access layer.
//!
//! One variant per failure kind; every operation maps storage failures to
//! the kind the operation dictates, with the absolute node path in the
//! message. There is no local recovery anywhere in this crate — failures
//! surface immediately to the caller.

use std::fmt;

/// Errors reported by archives, nodes and dataset transfers.
#[derive(Debug)]
pub enum Error {
    /// File open/close failure, wrong file format, or unknown mode string.
    Access(String),
    /// Subscript of a non-existent path through a read-only chain.
    WrongPath(String),
    /// Subscript attempted on a node that cannot have children.
    NotSupported(String),
    /// Read attempted on a node that is not a dataset.
    NotADataset(String),
    /// Scalar transfer against multi-element on-disk data.
    NotAScalar(String),
    /// Shape mismatch without resize capability, or raw read failure.
    Read(String),
    /// Write into read-only chain, shape mismatch, or raw write failure.
    Write(String),
    /// Group creation failure (name collision, storage failure).
    CreateGroup(String),
    /// Dataset creation failure (name collision, storage failure).
    CreateDataset(String),
    /// On-disk and in-memory element types cannot be converted.
    DataConversion(String),
    /// A value whose stored descriptor no supported kind can express.
    UnsupportedType(String),
    /// Object handle release failure.
    Close(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Access(msg) => write!(f, "access error: {msg}"),
            Error::WrongPath(msg) => write!(f, "wrong path: {msg}"),
            Error::NotSupported(msg) => write!(f, "not supported: {msg}"),
            Error::NotADataset(msg) => write!(f, "not a dataset: {msg}"),
            Error::NotAScalar(msg) => write!(f, "not a scalar: {msg}"),
            Error::Read(msg) => write!(f, "read error: {msg}"),
            Error::Write(msg) => write!(f, "write error: {msg}"),
            Error::CreateGroup(msg) => write!(f, "cannot create group: {msg}"),
            Error::CreateDataset(msg) => write!(f, "cannot create dataset: {msg}"),
            Error::DataConversion(msg) => write!(f, "data conversion error: {msg}"),
            Error::UnsupportedType(msg) => write!(f, "unsupported type: {msg}"),
            Error::Close(msg) => write!(f, "close error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_path() {
        let err = Error::NotADataset("/GROUP".into());
        assert_eq!(err.to_string(), "not a dataset: /GROUP");
        let err = Error::Access("unknown access type 'x'".into());
        assert!(err.to_string().contains("unknown access type"));
    }
}
