//! Typed access layer over hierarchical, self-describing binary containers.
//!
//! This crate provides an ergonomic interface on top of `cellar-store`:
//! an [`Archive`] is the root of a tree of groups and datasets, resolved
//! lazily through [`Node`] proxies and read/written through a generic
//! type-and-shape reconciliation engine. Scalars (including complex pairs),
//! strings, vectors, fixed-size arrays and user-defined multi-axis
//! containers all go through the same two entry points, [`Node::read`] and
//! [`Node::write`].
//!
//! # Writing
//!
//! ```no_run
//! use cellar::{AccessMode, Archive};
//!
//! let mut ar = Archive::open("data.clr", AccessMode::Write).unwrap();
//! let mut group = ar.at("sensors").unwrap();
//! group.child("temperature").unwrap().write(&vec![22.5f64, 23.1, 21.8]).unwrap();
//! ar.close().unwrap();
//! ```
//!
//! # Reading
//!
//! ```no_run
//! use cellar::{AccessMode, Archive};
//!
//! let mut ar = Archive::open("data.clr", AccessMode::Read).unwrap();
//! let mut values: Vec<f64> = Vec::new();
//! ar.at("sensors/temperature").unwrap().read(&mut values).unwrap();
//! ```
//!
//! Paths that do not exist yet stay `Undefined` until first written —
//! subscripting never performs speculative I/O, and writing materializes
//! every missing parent group on the way.

pub mod archive;
pub mod dataset;
pub mod error;
pub mod node;
pub mod path;
pub mod shape;
pub mod value;

pub use archive::{AccessMode, Archive};
pub use dataset::{ReadTarget, WriteSource};
pub use error::Error;
pub use node::{Node, NodeKind};
pub use shape::DataShape;
pub use value::{Container, Element, NdContainer};

// Re-export the vocabulary types that appear in this crate's public
// signatures.
pub use cellar_store::{AttrValue, TypeDescriptor};
pub use num_complex::Complex;
