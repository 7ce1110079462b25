//! Dataset I/O engine: shape reconciliation, type gating and raw transfer.
//!
//! Reads reconcile the on-disk shape against the target (growing resizable
//! containers, reshaping reshapable ones, rejecting everything else), gate
//! the element types through the storage conversion oracle, then transfer.
//! Writes against an existing dataset reconcile the other way: scalars need
//! single-element data, linear sources need a flat element-count match,
//! multi-axis sources need exact extents. Creation takes rank, extents and
//! element type straight from the source value.

use std::cell::RefCell;
use std::rc::Rc;

use cellar_store::{can_convert, Handle, Store, StoreError, TypeDescriptor};
use num_complex::Complex;

use crate::error::Error;
use crate::node::Node;
use crate::path;
use crate::shape::DataShape;
use crate::value::{Container, Element, NdContainer};

/// A value a dataset can be read into. Implemented for supported scalars,
/// `String`, linear and multi-axis containers, and plain element slices
/// (which skip shape reconciliation — the caller vouches for the buffer).
pub trait ReadTarget {
    /// Read the dataset behind `node` into `self`.
    fn read_from(&mut self, node: &Node) -> Result<(), Error>;
}

/// A value a dataset can be written from.
pub trait WriteSource {
    /// Create the dataset at `node`'s path, sized and typed after `self`,
    /// write the full value and return the open handle.
    fn create_into(&self, node: &Node) -> Result<Handle, Error>;

    /// Overwrite the existing dataset behind `node`.
    fn update(&self, node: &Node) -> Result<(), Error>;
}

// ---------------------------------------------------------------------------
// Engine helpers
// ---------------------------------------------------------------------------

fn disk_shape(store: &Store, handle: Handle, path: &str) -> Result<DataShape, Error> {
    store
        .dataset_extents(handle)
        .map(|e| DataShape::from_extents(&e))
        .map_err(|e| Error::Read(format!("cannot query shape of {path}: {e}")))
}

fn disk_type(store: &Store, handle: Handle, path: &str) -> Result<TypeDescriptor, Error> {
    store
        .dataset_type(handle)
        .map_err(|e| Error::Read(format!("cannot query type of {path}: {e}")))
}

fn conversion_gate(
    src: &TypeDescriptor,
    dst: &TypeDescriptor,
    path: &str,
) -> Result<(), Error> {
    if !can_convert(src, dst) {
        return Err(Error::DataConversion(format!(
            "cannot convert {} data of {path} to {}",
            src.class_name(),
            dst.class_name()
        )));
    }
    Ok(())
}

fn map_read_err(e: StoreError, path: &str) -> Error {
    match e {
        StoreError::Conversion { .. } | StoreError::PayloadKind(_) => {
            Error::DataConversion(format!("cannot convert data of {path}: {e}"))
        }
        other => Error::Read(format!("cannot read dataset {path}: {other}")),
    }
}

fn map_write_err(e: StoreError, path: &str) -> Error {
    match e {
        StoreError::Conversion { .. } | StoreError::PayloadKind(_) => {
            Error::DataConversion(format!("cannot convert data of {path}: {e}"))
        }
        other => Error::Write(format!("cannot write dataset {path}: {other}")),
    }
}

fn shape_mismatch_read(path: &str) -> Error {
    Error::Read(format!(
        "target container's shape and dataset {path}'s shape are different \
         and the container cannot be resized"
    ))
}

fn shape_mismatch_write(path: &str) -> Error {
    Error::Write(format!(
        "source container's shape and dataset {path}'s shape are different"
    ))
}

fn not_a_scalar(path: &str) -> Error {
    Error::NotAScalar(format!("dataset {path} contains non scalar data"))
}

// ---------------------------------------------------------------------------
// Read paths
// ---------------------------------------------------------------------------

fn read_scalar<E: Element>(node: &Node, out: &mut E) -> Result<(), Error> {
    let (store_rc, handle) = node.transfer_parts()?;
    let store = store_rc.borrow();
    let shape = disk_shape(&store, handle, node.path())?;
    if !shape.is_single_element() {
        return Err(not_a_scalar(node.path()));
    }
    let requested = E::descriptor();
    conversion_gate(&disk_type(&store, handle, node.path())?, &requested, node.path())?;
    let mut buf = vec![0u8; requested.size()];
    store
        .read_raw(handle, &requested, &mut buf)
        .map_err(|e| map_read_err(e, node.path()))?;
    let mut decoded = [E::default(); 1];
    E::decode_slice(&buf, &mut decoded);
    *out = decoded[0];
    Ok(())
}

fn read_linear<C: Container>(node: &Node, out: &mut C) -> Result<(), Error> {
    let (store_rc, handle) = node.transfer_parts()?;
    let store = store_rc.borrow();
    let shape = disk_shape(&store, handle, node.path())?;
    let count = shape.num_elements() as usize;
    if out.len() != count && !out.grow(count) {
        return Err(shape_mismatch_read(node.path()));
    }
    transfer_in::<C::Elem>(&store, handle, node.path(), count, out.as_mut_slice())
}

fn read_nd<C: NdContainer>(node: &Node, out: &mut C) -> Result<(), Error> {
    let (store_rc, handle) = node.transfer_parts()?;
    let store = store_rc.borrow();
    let shape = disk_shape(&store, handle, node.path())?;
    if out.extents().as_slice() != shape.extents() && !out.reshape(shape.extents()) {
        return Err(shape_mismatch_read(node.path()));
    }
    let count = shape.num_elements() as usize;
    transfer_in::<C::Elem>(&store, handle, node.path(), count, out.as_mut_slice())
}

/// Pointer-target read: no shape reconciliation, the caller has sized the
/// buffer. Only the conversion gate still applies.
fn read_buffer<E: Element>(node: &Node, out: &mut [E]) -> Result<(), Error> {
    let (store_rc, handle) = node.transfer_parts()?;
    let store = store_rc.borrow();
    let shape = disk_shape(&store, handle, node.path())?;
    let count = shape.num_elements() as usize;
    if out.len() < count {
        return Err(Error::Read(format!(
            "target buffer for dataset {} holds {} elements, need {count}",
            node.path(),
            out.len()
        )));
    }
    transfer_in::<E>(&store, handle, node.path(), count, &mut out[..count])
}

fn transfer_in<E: Element>(
    store: &Store,
    handle: Handle,
    path: &str,
    count: usize,
    out: &mut [E],
) -> Result<(), Error> {
    let requested = E::descriptor();
    conversion_gate(&disk_type(store, handle, path)?, &requested, path)?;
    let mut buf = vec![0u8; count * requested.size()];
    store
        .read_raw(handle, &requested, &mut buf)
        .map_err(|e| map_read_err(e, path))?;
    E::decode_slice(&buf, out);
    Ok(())
}

fn read_text(node: &Node, out: &mut String) -> Result<(), Error> {
    let (store_rc, handle) = node.transfer_parts()?;
    let store = store_rc.borrow();
    let shape = disk_shape(&store, handle, node.path())?;
    if !shape.is_single_element() {
        return Err(not_a_scalar(node.path()));
    }
    require_text(&store, handle, node.path())?;
    // The store hands back freshly owned strings; dropping the vector
    // releases the per-element buffers.
    let mut values = store
        .read_text(handle)
        .map_err(|e| map_read_err(e, node.path()))?;
    *out = values.pop().unwrap_or_default();
    Ok(())
}

fn read_text_vec(node: &Node, out: &mut Vec<String>) -> Result<(), Error> {
    let (store_rc, handle) = node.transfer_parts()?;
    let store = store_rc.borrow();
    require_text(&store, handle, node.path())?;
    *out = store
        .read_text(handle)
        .map_err(|e| map_read_err(e, node.path()))?;
    Ok(())
}

fn require_text(store: &Store, handle: Handle, path: &str) -> Result<(), Error> {
    let dt = disk_type(store, handle, path)?;
    if !dt.is_text() {
        return Err(Error::Read(format!(
            "only variable-length text is supported for {path}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write paths (existing dataset)
// ---------------------------------------------------------------------------

fn write_scalar<E: Element>(node: &Node, value: E) -> Result<(), Error> {
    let (store_rc, handle) = node.transfer_parts()?;
    let mut store = store_rc.borrow_mut();
    let shape = disk_shape(&store, handle, node.path())?;
    if !shape.is_single_element() {
        return Err(not_a_scalar(node.path()));
    }
    let bytes = E::encode_slice(std::slice::from_ref(&value));
    store
        .write_raw(handle, &E::descriptor(), &bytes)
        .map_err(|e| map_write_err(e, node.path()))
}

fn write_linear<C: Container>(node: &Node, value: &C) -> Result<(), Error> {
    let (store_rc, handle) = node.transfer_parts()?;
    let mut store = store_rc.borrow_mut();
    let shape = disk_shape(&store, handle, node.path())?;
    // Flat containers carry no shape to preserve: a bare element-count
    // match is enough, unlike the multi-axis path below.
    if shape.num_elements() as usize != value.len() {
        return Err(shape_mismatch_write(node.path()));
    }
    let bytes = C::Elem::encode_slice(value.as_slice());
    store
        .write_raw(handle, &C::Elem::descriptor(), &bytes)
        .map_err(|e| map_write_err(e, node.path()))
}

fn write_nd<C: NdContainer>(node: &Node, value: &C) -> Result<(), Error> {
    let (store_rc, handle) = node.transfer_parts()?;
    let mut store = store_rc.borrow_mut();
    let shape = disk_shape(&store, handle, node.path())?;
    if shape.extents() != value.extents().as_slice() {
        return Err(shape_mismatch_write(node.path()));
    }
    let bytes = C::Elem::encode_slice(value.as_slice());
    store
        .write_raw(handle, &C::Elem::descriptor(), &bytes)
        .map_err(|e| map_write_err(e, node.path()))
}

fn write_text(node: &Node, value: &str) -> Result<(), Error> {
    let (store_rc, handle) = node.transfer_parts()?;
    let mut store = store_rc.borrow_mut();
    let shape = disk_shape(&store, handle, node.path())?;
    if !shape.is_single_element() {
        return Err(not_a_scalar(node.path()));
    }
    store
        .write_text(handle, &[value.to_string()])
        .map_err(|e| map_write_err(e, node.path()))
}

fn write_text_slice(node: &Node, values: &[String]) -> Result<(), Error> {
    let (store_rc, handle) = node.transfer_parts()?;
    let mut store = store_rc.borrow_mut();
    let shape = disk_shape(&store, handle, node.path())?;
    if shape.num_elements() as usize != values.len() {
        return Err(shape_mismatch_write(node.path()));
    }
    store
        .write_text(handle, values)
        .map_err(|e| map_write_err(e, node.path()))
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

fn create_dataset_at(
    store_rc: &Rc<RefCell<Store>>,
    path_str: &str,
    dtype: &TypeDescriptor,
    extents: &[u64],
) -> Result<Handle, Error> {
    let segments = path::split(path_str);
    let parents = &segments[..segments.len().saturating_sub(1)];
    path::ensure_parents(store_rc, parents)?;
    store_rc
        .borrow_mut()
        .create_dataset(Handle::FILE, path_str, dtype, extents)
        .map_err(|e| Error::CreateDataset(format!("cannot create dataset {path_str}: {e}")))
}

fn create_fixed<E: Element>(
    node: &Node,
    shape: &DataShape,
    values: &[E],
) -> Result<Handle, Error> {
    let store_rc = node.store_for_create()?.clone();
    let handle = create_dataset_at(&store_rc, node.path(), &E::descriptor(), shape.extents())?;
    let mut store = store_rc.borrow_mut();
    if let Err(e) = store.write_raw(handle, &E::descriptor(), &E::encode_slice(values)) {
        let _ = store.close_object(handle);
        return Err(map_write_err(e, node.path()));
    }
    Ok(handle)
}

fn create_text(node: &Node, extents: &[u64], values: &[String]) -> Result<Handle, Error> {
    let store_rc = node.store_for_create()?.clone();
    let handle =
        create_dataset_at(&store_rc, node.path(), &TypeDescriptor::VarLenText, extents)?;
    let mut store = store_rc.borrow_mut();
    if let Err(e) = store.write_text(handle, values) {
        let _ = store.close_object(handle);
        return Err(map_write_err(e, node.path()));
    }
    Ok(handle)
}

// ---------------------------------------------------------------------------
// Target/source impls
// ---------------------------------------------------------------------------

macro_rules! scalar_io {
    ($($ty:ty),* $(,)?) => {$(
        impl ReadTarget for $ty {
            fn read_from(&mut self, node: &Node) -> Result<(), Error> {
                read_scalar(node, self)
            }
        }

        impl WriteSource for $ty {
            fn create_into(&self, node: &Node) -> Result<Handle, Error> {
                create_fixed(node, &DataShape::scalar(), std::slice::from_ref(self))
            }

            fn update(&self, node: &Node) -> Result<(), Error> {
                write_scalar(node, *self)
            }
        }
    )*};
}

scalar_io!(
    i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, bool,
    Complex<f32>, Complex<f64>,
);

macro_rules! linear_io {
    ($($elem:ty),* $(,)?) => {$(
        impl ReadTarget for Vec<$elem> {
            fn read_from(&mut self, node: &Node) -> Result<(), Error> {
                read_linear(node, self)
            }
        }

        impl WriteSource for Vec<$elem> {
            fn create_into(&self, node: &Node) -> Result<Handle, Error> {
                create_fixed(node, &DataShape::linear(self), self.as_slice())
            }

            fn update(&self, node: &Node) -> Result<(), Error> {
                write_linear(node, self)
            }
        }

        impl<const N: usize> ReadTarget for [$elem; N] {
            fn read_from(&mut self, node: &Node) -> Result<(), Error> {
                read_linear(node, self)
            }
        }

        impl<const N: usize> WriteSource for [$elem; N] {
            fn create_into(&self, node: &Node) -> Result<Handle, Error> {
                create_fixed(node, &DataShape::linear(self), self.as_slice())
            }

            fn update(&self, node: &Node) -> Result<(), Error> {
                write_linear(node, self)
            }
        }

        // Bare slices are the pointer-target path: trusted length, no
        // shape reconciliation.
        impl ReadTarget for [$elem] {
            fn read_from(&mut self, node: &Node) -> Result<(), Error> {
                read_buffer(node, self)
            }
        }
    )*};
}

linear_io!(
    i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, bool,
    Complex<f32>, Complex<f64>,
);

impl ReadTarget for String {
    fn read_from(&mut self, node: &Node) -> Result<(), Error> {
        read_text(node, self)
    }
}

impl WriteSource for String {
    fn create_into(&self, node: &Node) -> Result<Handle, Error> {
        create_text(node, &[], std::slice::from_ref(self))
    }

    fn update(&self, node: &Node) -> Result<(), Error> {
        write_text(node, self)
    }
}

impl WriteSource for str {
    fn create_into(&self, node: &Node) -> Result<Handle, Error> {
        create_text(node, &[], &[self.to_string()])
    }

    fn update(&self, node: &Node) -> Result<(), Error> {
        write_text(node, self)
    }
}

impl ReadTarget for Vec<String> {
    fn read_from(&mut self, node: &Node) -> Result<(), Error> {
        read_text_vec(node, self)
    }
}

impl WriteSource for Vec<String> {
    fn create_into(&self, node: &Node) -> Result<Handle, Error> {
        create_text(node, &[self.len() as u64], self)
    }

    fn update(&self, node: &Node) -> Result<(), Error> {
        write_text_slice(node, self)
    }
}

// Multi-axis containers dispatch through the N-dimensional reconciliation
// path; this takes priority over the linear classification by construction.
impl<C: NdContainer> ReadTarget for C {
    fn read_from(&mut self, node: &Node) -> Result<(), Error> {
        read_nd(node, self)
    }
}

impl<C: NdContainer> WriteSource for C {
    fn create_into(&self, node: &Node) -> Result<Handle, Error> {
        create_fixed(node, &DataShape::of_nd(self), self.as_slice())
    }

    fn update(&self, node: &Node) -> Result<(), Error> {
        write_nd(node, self)
    }
}
