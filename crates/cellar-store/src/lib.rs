//! Storage engine for hierarchical, self-describing binary containers.
//!
//! A container is a tree of named groups and datasets addressed by
//! slash-delimited paths. Datasets carry an element [`TypeDescriptor`] and
//! per-axis extents; rank-0 data has no extents. The engine exposes a
//! handle-based surface: opening an object registers a handle, every data
//! operation takes a handle, and handles are closed independently of each
//! other and of the file itself.
//!
//! The whole tree lives in memory while the store is open; [`Store::close`]
//! persists it as a signed, digest-checked image (see [`image`]). Access is
//! single-threaded and blocking; any cross-process coordination is the
//! caller's concern.
//!
//! ```no_run
//! use cellar_store::{AccessMode, Handle, Store, TypeDescriptor};
//!
//! let mut store = Store::open("data.clr", AccessMode::Truncate).unwrap();
//! let desc = TypeDescriptor::Float { size: 8 };
//! let h = store.create_dataset(Handle::FILE, "run/values", &desc, &[3]).unwrap();
//! store.write_raw(h, &desc, &42.0f64.to_le_bytes().repeat(3)).unwrap();
//! store.close_object(h).unwrap();
//! store.close().unwrap();
//! ```

pub mod convert;
pub mod descriptor;
pub mod error;
pub mod image;
pub mod tree;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

pub use descriptor::{can_convert, CompoundMember, TypeDescriptor};
pub use error::StoreError;
pub use tree::{AttrValue, ObjectKind};

use tree::{split_segments, DatasetNode, GroupNode, ObjectNode, Payload};

/// How a container file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Open an existing container for reading only.
    ReadOnly,
    /// Open an existing container for reading and writing.
    ReadWrite,
    /// Create a new container, truncating any existing file.
    Truncate,
}

/// An opaque handle to an open object.
///
/// [`Handle::FILE`] addresses the container root and is owned by the store
/// itself; it is never registered and never closed through
/// [`Store::close_object`]. Every other handle is registered by an
/// open/create call and must be closed exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    /// The container root.
    pub const FILE: Handle = Handle(0);

    /// Raw handle id, for diagnostics.
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
struct OpenObject {
    path: String,
    kind: ObjectKind,
}

/// An open container file.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    readonly: bool,
    open: bool,
    root: GroupNode,
    handles: HashMap<u64, OpenObject>,
    next_handle: u64,
}

impl Store {
    /// Open a container file.
    ///
    /// `ReadOnly` and `ReadWrite` require an existing, well-formed image;
    /// `Truncate` starts from an empty tree and only touches the filesystem
    /// on [`close`](Store::close).
    pub fn open<P: AsRef<Path>>(path: P, mode: AccessMode) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let root = match mode {
            AccessMode::Truncate => GroupNode::default(),
            AccessMode::ReadOnly | AccessMode::ReadWrite => {
                let bytes = std::fs::read(&path)?;
                image::decode(&bytes)?
            }
        };
        debug!(path = %path.display(), ?mode, "store opened");
        Ok(Self {
            path,
            readonly: mode == AccessMode::ReadOnly,
            open: true,
            root,
            handles: HashMap::new(),
            next_handle: 1,
        })
    }

    /// Probe whether `path` holds a well-formed container image.
    pub fn is_store_file<P: AsRef<Path>>(path: P) -> Result<bool, StoreError> {
        let bytes = std::fs::read(path)?;
        Ok(bytes.len() >= image::SIGNATURE.len()
            && bytes[..image::SIGNATURE.len()] == image::SIGNATURE)
    }

    /// Flush (when writable) and close the container. Closing an already
    /// closed store is an error; open object handles are dropped.
    pub fn close(&mut self) -> Result<(), StoreError> {
        if !self.open {
            return Err(StoreError::Closed);
        }
        if !self.readonly {
            let bytes = image::encode(&self.root)?;
            std::fs::write(&self.path, bytes)?;
        }
        self.open = false;
        self.handles.clear();
        debug!(path = %self.path.display(), "store closed");
        Ok(())
    }

    /// `true` while the container is open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// `true` when the container was opened read-only.
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Filesystem path of the container.
    pub fn file_path(&self) -> &Path {
        &self.path
    }

    // -----------------------------------------------------------------------
    // Path resolution
    // -----------------------------------------------------------------------

    fn handle_path(&self, h: Handle) -> Result<&str, StoreError> {
        if h == Handle::FILE {
            return Ok("");
        }
        self.handles
            .get(&h.0)
            .map(|o| o.path.as_str())
            .ok_or(StoreError::StaleHandle(h.0))
    }

    /// Absolute, normalized path for `rel` under the object at `parent`.
    /// A leading slash makes `rel` absolute from the root.
    fn resolve(&self, parent: Handle, rel: &str) -> Result<String, StoreError> {
        let base = if rel.starts_with('/') {
            String::new()
        } else {
            self.handle_path(parent)?.to_string()
        };
        let mut segments: Vec<&str> = split_segments(&base);
        segments.extend(split_segments(rel));
        Ok(segments.join("/"))
    }

    fn dataset_ref(&self, h: Handle) -> Result<&DatasetNode, StoreError> {
        let path = self.handle_path(h)?;
        match self.root.lookup(path) {
            Some(ObjectNode::Dataset(d)) => Ok(d),
            _ => Err(StoreError::NotADataset(path.to_string())),
        }
    }

    fn dataset_mut(&mut self, h: Handle) -> Result<&mut DatasetNode, StoreError> {
        let path = self.handle_path(h)?.to_string();
        match self.root.lookup_mut(&path) {
            Some(ObjectNode::Dataset(d)) => Ok(d),
            _ => Err(StoreError::NotADataset(path)),
        }
    }

    fn register(&mut self, path: String, kind: ObjectKind) -> Handle {
        let id = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(id, OpenObject { path, kind });
        Handle(id)
    }

    fn require_writable(&self) -> Result<(), StoreError> {
        if !self.open {
            return Err(StoreError::Closed);
        }
        if self.readonly {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Existence and identity probes
    // -----------------------------------------------------------------------

    /// Whether `rel` names an existing object under `parent`.
    pub fn path_exists(&self, parent: Handle, rel: &str) -> Result<bool, StoreError> {
        let abs = self.resolve(parent, rel)?;
        if abs.is_empty() {
            return Ok(true);
        }
        Ok(self.root.lookup(&abs).is_some())
    }

    /// Kind of the object at `rel` under `parent`, `None` when absent.
    pub fn object_kind(
        &self,
        parent: Handle,
        rel: &str,
    ) -> Result<Option<ObjectKind>, StoreError> {
        let abs = self.resolve(parent, rel)?;
        if abs.is_empty() {
            return Ok(Some(ObjectKind::Group));
        }
        Ok(self.root.lookup(&abs).map(|n| n.kind()))
    }

    /// Names of the direct children of the group at `rel` under `parent`.
    pub fn child_names(
        &self,
        parent: Handle,
        rel: &str,
    ) -> Result<Vec<String>, StoreError> {
        let abs = self.resolve(parent, rel)?;
        self.root.child_names(&abs)
    }

    // -----------------------------------------------------------------------
    // Object lifecycle
    // -----------------------------------------------------------------------

    /// Open the existing object at `rel` under `parent`, registering a new
    /// handle. Two opens of the same path yield independent handles.
    pub fn open_object(
        &mut self,
        parent: Handle,
        rel: &str,
    ) -> Result<(Handle, ObjectKind), StoreError> {
        if !self.open {
            return Err(StoreError::Closed);
        }
        let abs = self.resolve(parent, rel)?;
        let kind = if abs.is_empty() {
            ObjectKind::Group
        } else {
            self.root
                .lookup(&abs)
                .map(|n| n.kind())
                .ok_or(StoreError::NoSuchPath(abs.clone()))?
        };
        Ok((self.register(abs, kind), kind))
    }

    /// Create one group at `rel` under `parent` and open it. The parent
    /// chain must already exist; any name collision is an error.
    pub fn create_group(&mut self, parent: Handle, rel: &str) -> Result<Handle, StoreError> {
        self.require_writable()?;
        let abs = self.resolve(parent, rel)?;
        self.root.insert_group(&abs)?;
        trace!(path = %abs, "group created");
        Ok(self.register(abs, ObjectKind::Group))
    }

    /// Create a dataset at `rel` under `parent` with the given element type
    /// and extents (empty extents for rank-0 data), zero-initialized, and
    /// open it. The parent chain must already exist.
    pub fn create_dataset(
        &mut self,
        parent: Handle,
        rel: &str,
        dtype: &TypeDescriptor,
        extents: &[u64],
    ) -> Result<Handle, StoreError> {
        self.require_writable()?;
        let abs = self.resolve(parent, rel)?;
        let count = extents.iter().product::<u64>() as usize;
        let payload = match dtype {
            TypeDescriptor::VarLenText => Payload::Text(vec![String::new(); count]),
            _ => Payload::Fixed(vec![0u8; count * dtype.size()]),
        };
        let node = DatasetNode {
            dtype: dtype.clone(),
            extents: extents.to_vec(),
            payload,
            attrs: Default::default(),
        };
        self.root.insert_dataset(&abs, node)?;
        trace!(path = %abs, class = dtype.class_name(), "dataset created");
        Ok(self.register(abs, ObjectKind::Dataset))
    }

    /// Release an object handle. Closing a handle on an already closed
    /// store is a no-op; closing the file handle or an unknown handle is an
    /// error.
    pub fn close_object(&mut self, h: Handle) -> Result<(), StoreError> {
        if !self.open {
            return Ok(());
        }
        if h == Handle::FILE {
            return Err(StoreError::StaleHandle(h.0));
        }
        self.handles
            .remove(&h.0)
            .map(|_| ())
            .ok_or(StoreError::StaleHandle(h.0))
    }

    /// Move the object at `src` to `dst` (both resolved under `parent`).
    pub fn move_object(
        &mut self,
        parent: Handle,
        src: &str,
        dst: &str,
    ) -> Result<(), StoreError> {
        self.require_writable()?;
        let src_abs = self.resolve(parent, src)?;
        let dst_abs = self.resolve(parent, dst)?;
        self.root.move_node(&src_abs, &dst_abs)
    }

    // -----------------------------------------------------------------------
    // Dataset geometry and typed transfer
    // -----------------------------------------------------------------------

    /// Per-axis extents of the dataset at `h`; empty for rank-0 data.
    pub fn dataset_extents(&self, h: Handle) -> Result<Vec<u64>, StoreError> {
        Ok(self.dataset_ref(h)?.extents.clone())
    }

    /// Stored element type of the dataset at `h`.
    pub fn dataset_type(&self, h: Handle) -> Result<TypeDescriptor, StoreError> {
        Ok(self.dataset_ref(h)?.dtype.clone())
    }

    /// Read the full dataset into `out`, converting stored elements to
    /// `as_type`. `out` must hold exactly `count * as_type.size()` bytes.
    pub fn read_raw(
        &self,
        h: Handle,
        as_type: &TypeDescriptor,
        out: &mut [u8],
    ) -> Result<(), StoreError> {
        let ds = self.dataset_ref(h)?;
        let bytes = match &ds.payload {
            Payload::Fixed(b) => b,
            Payload::Text(_) => {
                let path = self.handle_path(h)?;
                return Err(StoreError::PayloadKind(path.to_string()));
            }
        };
        let expected = ds.num_elements() as usize * as_type.size();
        if out.len() != expected {
            return Err(StoreError::BufferSize {
                expected,
                actual: out.len(),
            });
        }
        let converted = convert::convert_buffer(&ds.dtype, bytes, as_type)?;
        out.copy_from_slice(&converted);
        Ok(())
    }

    /// Overwrite the full dataset from `data` encoded as `as_type`,
    /// converting into the stored element type. `data` must hold exactly
    /// `count * as_type.size()` bytes.
    pub fn write_raw(
        &mut self,
        h: Handle,
        as_type: &TypeDescriptor,
        data: &[u8],
    ) -> Result<(), StoreError> {
        self.require_writable()?;
        let stored = {
            let ds = self.dataset_ref(h)?;
            if matches!(ds.payload, Payload::Text(_)) {
                let path = self.handle_path(h)?;
                return Err(StoreError::PayloadKind(path.to_string()));
            }
            let expected = ds.num_elements() as usize * as_type.size();
            if data.len() != expected {
                return Err(StoreError::BufferSize {
                    expected,
                    actual: data.len(),
                });
            }
            ds.dtype.clone()
        };
        let converted = convert::convert_buffer(as_type, data, &stored)?;
        self.dataset_mut(h)?.payload = Payload::Fixed(converted);
        Ok(())
    }

    /// Read all elements of a variable-length text dataset. The returned
    /// strings are fresh allocations owned by the caller.
    pub fn read_text(&self, h: Handle) -> Result<Vec<String>, StoreError> {
        let ds = self.dataset_ref(h)?;
        match &ds.payload {
            Payload::Text(t) => Ok(t.clone()),
            Payload::Fixed(_) => {
                let path = self.handle_path(h)?;
                Err(StoreError::PayloadKind(path.to_string()))
            }
        }
    }

    /// Overwrite a variable-length text dataset, one string per element.
    pub fn write_text(&mut self, h: Handle, values: &[String]) -> Result<(), StoreError> {
        self.require_writable()?;
        let count = self.dataset_ref(h)?.num_elements() as usize;
        if values.len() != count {
            return Err(StoreError::BufferSize {
                expected: count,
                actual: values.len(),
            });
        }
        match &mut self.dataset_mut(h)?.payload {
            Payload::Text(t) => {
                *t = values.to_vec();
                Ok(())
            }
            Payload::Fixed(_) => {
                let path = self.handle_path(h)?;
                Err(StoreError::PayloadKind(path.to_string()))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Attributes
    // -----------------------------------------------------------------------

    fn attrs_ref(&self, h: Handle) -> Result<&std::collections::BTreeMap<String, AttrValue>, StoreError> {
        let path = self.handle_path(h)?;
        if path.is_empty() {
            return Ok(&self.root.attrs);
        }
        match self.root.lookup(path) {
            Some(ObjectNode::Group(g)) => Ok(&g.attrs),
            Some(ObjectNode::Dataset(d)) => Ok(&d.attrs),
            None => Err(StoreError::NoSuchPath(path.to_string())),
        }
    }

    fn attrs_mut(&mut self, h: Handle) -> Result<&mut std::collections::BTreeMap<String, AttrValue>, StoreError> {
        let path = self.handle_path(h)?.to_string();
        if path.is_empty() {
            return Ok(&mut self.root.attrs);
        }
        match self.root.lookup_mut(&path) {
            Some(ObjectNode::Group(g)) => Ok(&mut g.attrs),
            Some(ObjectNode::Dataset(d)) => Ok(&mut d.attrs),
            None => Err(StoreError::NoSuchPath(path)),
        }
    }

    /// Set (or replace) a scalar/string attribute on the object at `h`.
    pub fn write_attr(
        &mut self,
        h: Handle,
        name: &str,
        value: AttrValue,
    ) -> Result<(), StoreError> {
        self.require_writable()?;
        self.attrs_mut(h)?.insert(name.to_string(), value);
        Ok(())
    }

    /// Read an attribute of the object at `h`, `None` when absent.
    pub fn read_attr(&self, h: Handle, name: &str) -> Result<Option<AttrValue>, StoreError> {
        Ok(self.attrs_ref(h)?.get(name).cloned())
    }

    /// Attribute names on the object at `h`, in name order.
    pub fn attr_names(&self, h: Handle) -> Result<Vec<String>, StoreError> {
        Ok(self.attrs_ref(h)?.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const F64: TypeDescriptor = TypeDescriptor::Float { size: 8 };

    fn scratch() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.clr");
        (dir, path)
    }

    fn le_f64(values: &[f64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn create_and_read_back() {
        let (_dir, path) = scratch();
        let mut store = Store::open(&path, AccessMode::Truncate).unwrap();
        let h = store
            .create_dataset(Handle::FILE, "values", &F64, &[2])
            .unwrap();
        store.write_raw(h, &F64, &le_f64(&[1.5, -2.5])).unwrap();
        let mut out = vec![0u8; 16];
        store.read_raw(h, &F64, &mut out).unwrap();
        assert_eq!(out, le_f64(&[1.5, -2.5]));
    }

    #[test]
    fn independent_handles_same_path() {
        let (_dir, path) = scratch();
        let mut store = Store::open(&path, AccessMode::Truncate).unwrap();
        let g = store.create_group(Handle::FILE, "G").unwrap();
        let (g2, kind) = store.open_object(Handle::FILE, "G").unwrap();
        assert_eq!(kind, ObjectKind::Group);
        assert_ne!(g, g2);
        store.close_object(g).unwrap();
        // The second handle still resolves.
        assert!(store.path_exists(g2, "").unwrap());
        store.close_object(g2).unwrap();
    }

    #[test]
    fn stale_handle_rejected() {
        let (_dir, path) = scratch();
        let mut store = Store::open(&path, AccessMode::Truncate).unwrap();
        let g = store.create_group(Handle::FILE, "G").unwrap();
        store.close_object(g).unwrap();
        assert!(matches!(
            store.close_object(g),
            Err(StoreError::StaleHandle(_))
        ));
    }

    #[test]
    fn readonly_rejects_mutation() {
        let (_dir, path) = scratch();
        let mut store = Store::open(&path, AccessMode::Truncate).unwrap();
        store.create_group(Handle::FILE, "G").unwrap();
        store.close().unwrap();

        let mut store = Store::open(&path, AccessMode::ReadOnly).unwrap();
        assert!(matches!(
            store.create_group(Handle::FILE, "H"),
            Err(StoreError::ReadOnly)
        ));
    }

    #[test]
    fn reopen_preserves_tree() {
        let (_dir, path) = scratch();
        let mut store = Store::open(&path, AccessMode::Truncate).unwrap();
        store.create_group(Handle::FILE, "A").unwrap();
        let h = store
            .create_dataset(Handle::FILE, "A/d", &F64, &[])
            .unwrap();
        store.write_raw(h, &F64, &le_f64(&[3.25])).unwrap();
        store.close().unwrap();

        let store = Store::open(&path, AccessMode::ReadOnly).unwrap();
        assert_eq!(
            store.object_kind(Handle::FILE, "A/d").unwrap(),
            Some(ObjectKind::Dataset)
        );
    }

    #[test]
    fn double_close_is_error() {
        let (_dir, path) = scratch();
        let mut store = Store::open(&path, AccessMode::Truncate).unwrap();
        store.close().unwrap();
        assert!(matches!(store.close(), Err(StoreError::Closed)));
    }

    #[test]
    fn text_dataset_roundtrip() {
        let (_dir, path) = scratch();
        let mut store = Store::open(&path, AccessMode::Truncate).unwrap();
        let h = store
            .create_dataset(Handle::FILE, "s", &TypeDescriptor::VarLenText, &[])
            .unwrap();
        store.write_text(h, &["hello".to_string()]).unwrap();
        assert_eq!(store.read_text(h).unwrap(), vec!["hello".to_string()]);
        let mut out = vec![0u8; 0];
        assert!(matches!(
            store.read_raw(h, &TypeDescriptor::VarLenText, &mut out),
            Err(StoreError::PayloadKind(_))
        ));
    }

    #[test]
    fn attrs_on_root_group_dataset() {
        let (_dir, path) = scratch();
        let mut store = Store::open(&path, AccessMode::Truncate).unwrap();
        let g = store.create_group(Handle::FILE, "G").unwrap();
        let d = store
            .create_dataset(Handle::FILE, "G/d", &F64, &[])
            .unwrap();
        store
            .write_attr(Handle::FILE, "version", AttrValue::Int(2))
            .unwrap();
        store.write_attr(g, "name", AttrValue::from("lab")).unwrap();
        store.write_attr(d, "unit", AttrValue::from("K")).unwrap();
        assert_eq!(
            store.read_attr(Handle::FILE, "version").unwrap(),
            Some(AttrValue::Int(2))
        );
        assert_eq!(store.attr_names(g).unwrap(), vec!["name".to_string()]);
        assert_eq!(
            store.read_attr(d, "unit").unwrap(),
            Some(AttrValue::Text("K".into()))
        );
    }

    #[test]
    fn move_object_renames() {
        let (_dir, path) = scratch();
        let mut store = Store::open(&path, AccessMode::Truncate).unwrap();
        store.create_group(Handle::FILE, "A").unwrap();
        store.move_object(Handle::FILE, "A", "B").unwrap();
        assert!(!store.path_exists(Handle::FILE, "A").unwrap());
        assert_eq!(
            store.object_kind(Handle::FILE, "B").unwrap(),
            Some(ObjectKind::Group)
        );
    }
}
