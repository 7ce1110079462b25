//! Node proxies: lazy, typed handles into the container hierarchy.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use cellar_store::{AttrValue, Handle, ObjectKind, Store};

use crate::dataset::{ReadTarget, WriteSource};
use crate::error::Error;
use crate::path;

/// Identity of a node proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The container root, owned by the archive.
    File,
    /// An existing group.
    Group,
    /// An existing dataset.
    Dataset,
    /// A path that does not exist yet but could become a group or dataset.
    Undefined,
    /// An unusable node (default-constructed, or observed as neither group
    /// nor dataset).
    Invalid,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::File => "file",
            NodeKind::Group => "group",
            NodeKind::Dataset => "dataset",
            NodeKind::Undefined => "undefined",
            NodeKind::Invalid => "invalid",
        };
        f.write_str(name)
    }
}

/// One addressable point in the hierarchy.
///
/// Nodes are produced by subscripting a parent ([`Node::child`]) or by
/// opening an [`Archive`](crate::Archive). Every node shares the archive's
/// storage handle; a `Group`/`Dataset` node additionally owns its object
/// handle exclusively and releases it on drop. There is no implicit copy —
/// [`Node::try_clone`] re-opens an independent handle at the same path so
/// two live proxies never share one.
pub struct Node {
    store: Option<Rc<RefCell<Store>>>,
    handle: Option<Handle>,
    path: String,
    kind: NodeKind,
    readonly: bool,
}

impl Node {
    /// An unusable placeholder node, useful as a move target before a real
    /// proxy is available.
    pub fn invalid() -> Self {
        Self {
            store: None,
            handle: None,
            path: String::new(),
            kind: NodeKind::Invalid,
            readonly: false,
        }
    }

    pub(crate) fn root(store: Rc<RefCell<Store>>, readonly: bool) -> Self {
        Self {
            store: Some(store),
            handle: Some(Handle::FILE),
            path: "/".to_string(),
            kind: NodeKind::File,
            readonly,
        }
    }

    /// Absolute path of this node.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Current identity of this node.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Whether this node belongs to a read-only archive.
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// `true` while the node is attached to an archive.
    pub fn is_valid(&self) -> bool {
        self.store.is_some()
    }

    pub(crate) fn store(&self) -> Option<&Rc<RefCell<Store>>> {
        self.store.as_ref()
    }

    fn store_rc(&self) -> Result<&Rc<RefCell<Store>>, Error> {
        self.store
            .as_ref()
            .ok_or_else(|| Error::NotSupported("node is not attached to an archive".into()))
    }

    pub(crate) fn transfer_parts(&self) -> Result<(&Rc<RefCell<Store>>, Handle), Error> {
        let store = self.store.as_ref().ok_or_else(|| {
            Error::NotADataset(format!("{} is not a dataset", self.path))
        })?;
        let handle = self
            .handle
            .ok_or_else(|| Error::NotADataset(format!("{} is not a dataset", self.path)))?;
        Ok((store, handle))
    }

    pub(crate) fn store_for_create(&self) -> Result<&Rc<RefCell<Store>>, Error> {
        self.store.as_ref().ok_or_else(|| {
            Error::CreateDataset(format!("{} is not attached to an archive", self.path))
        })
    }

    /// Resolve `name` (one segment or a slash-delimited run of segments)
    /// under this node.
    ///
    /// Allowed on `Group`/`File` nodes and, when the archive is writable, on
    /// `Undefined` nodes — which are first materialized into real groups as
    /// a side effect. An existing child comes back as `Group` or `Dataset`;
    /// a missing one as `Undefined` when writable, and as
    /// [`Error::WrongPath`] on a read-only archive.
    pub fn child(&mut self, name: &str) -> Result<Node, Error> {
        match self.kind {
            NodeKind::Group | NodeKind::File => {}
            NodeKind::Undefined if !self.readonly => {
                let store = self.store_rc()?.clone();
                let handle = path::build_group_tree(&store, &self.path)?;
                self.handle = Some(handle);
                self.kind = NodeKind::Group;
            }
            _ => {
                return Err(Error::NotSupported(format!(
                    "cannot subscript {} node {}",
                    self.kind, self.path
                )))
            }
        }

        let store_rc = self.store_rc()?.clone();
        let parent = self.handle.ok_or_else(|| {
            Error::NotSupported(format!("cannot subscript {} node {}", self.kind, self.path))
        })?;
        let child_path = path::join(&self.path, name);

        let mut store = store_rc.borrow_mut();
        let observed = store
            .object_kind(parent, name)
            .map_err(|e| Error::Access(format!("cannot probe {child_path}: {e}")))?;
        match observed {
            Some(observed_kind) => {
                let (handle, _) = store
                    .open_object(parent, name)
                    .map_err(|e| Error::Access(format!("cannot open {child_path}: {e}")))?;
                drop(store);
                let kind = match observed_kind {
                    ObjectKind::Group => NodeKind::Group,
                    ObjectKind::Dataset => NodeKind::Dataset,
                };
                Ok(Node {
                    store: Some(store_rc),
                    handle: Some(handle),
                    path: child_path,
                    kind,
                    readonly: self.readonly,
                })
            }
            None if self.readonly => Err(Error::WrongPath(format!(
                "no valid object for path {child_path}"
            ))),
            None => {
                drop(store);
                Ok(Node {
                    store: Some(store_rc),
                    handle: None,
                    path: child_path,
                    kind: NodeKind::Undefined,
                    readonly: self.readonly,
                })
            }
        }
    }

    /// Read the dataset behind this node into `target`, reconciling shapes
    /// and validating type conversion on the way. Returns `&self` so reads
    /// can be chained.
    pub fn read<T: ReadTarget + ?Sized>(&self, target: &mut T) -> Result<&Self, Error> {
        if self.kind != NodeKind::Dataset {
            return Err(Error::NotADataset(format!(
                "{} is not a dataset",
                self.path
            )));
        }
        target.read_from(self)?;
        Ok(self)
    }

    /// Write `value` into this node.
    ///
    /// An `Undefined` node materializes its parent groups, creates the
    /// dataset sized and typed after `value`, and becomes `Dataset`. An
    /// existing dataset is updated in place under the write-reconciliation
    /// rules. Returns `&mut self` so writes can be chained.
    pub fn write<T: WriteSource + ?Sized>(&mut self, value: &T) -> Result<&mut Self, Error> {
        if self.readonly {
            return Err(Error::Write(format!(
                "cannot write into read-only object {}",
                self.path
            )));
        }
        match self.kind {
            NodeKind::Dataset => value.update(self)?,
            NodeKind::Undefined => {
                let handle = value.create_into(self)?;
                self.handle = Some(handle);
                self.kind = NodeKind::Dataset;
            }
            _ => {
                return Err(Error::Write(format!("{} is not a dataset", self.path)));
            }
        }
        Ok(self)
    }

    /// Re-open an independent proxy at the same path. The clone owns its
    /// own object handle, so either node can be dropped without affecting
    /// the other.
    pub fn try_clone(&self) -> Result<Node, Error> {
        match self.kind {
            NodeKind::Invalid => Ok(Node::invalid()),
            NodeKind::File | NodeKind::Undefined => Ok(Node {
                store: self.store.clone(),
                handle: self.handle,
                path: self.path.clone(),
                kind: self.kind,
                readonly: self.readonly,
            }),
            NodeKind::Group | NodeKind::Dataset => {
                let store_rc = self.store_rc()?.clone();
                let (handle, _) = store_rc
                    .borrow_mut()
                    .open_object(Handle::FILE, &self.path)
                    .map_err(|e| {
                        Error::Access(format!("cannot reopen {}: {e}", self.path))
                    })?;
                Ok(Node {
                    store: Some(store_rc),
                    handle: Some(handle),
                    path: self.path.clone(),
                    kind: self.kind,
                    readonly: self.readonly,
                })
            }
        }
    }

    /// Names of the direct children of this group/file node, in name order.
    pub fn child_names(&self) -> Result<Vec<String>, Error> {
        if !matches!(self.kind, NodeKind::File | NodeKind::Group) {
            return Err(Error::NotSupported(format!(
                "cannot list children of {} node {}",
                self.kind, self.path
            )));
        }
        let store = self.store_rc()?;
        let handle = self.handle.ok_or_else(|| {
            Error::NotSupported(format!(
                "cannot list children of {} node {}",
                self.kind, self.path
            ))
        })?;
        store
            .borrow()
            .child_names(handle, "")
            .map_err(|e| Error::Read(format!("cannot list children of {}: {e}", self.path)))
    }

    /// Whether `name` resolves to an existing group under this node.
    pub fn has_group(&self, name: &str) -> bool {
        let (Some(store), Some(handle)) = (&self.store, self.handle) else {
            return false;
        };
        matches!(
            store.borrow().object_kind(handle, name),
            Ok(Some(ObjectKind::Group))
        )
    }

    /// Whether `name` resolves to an existing dataset under this node.
    pub fn is_data(&self, name: &str) -> bool {
        let (Some(store), Some(handle)) = (&self.store, self.handle) else {
            return false;
        };
        matches!(
            store.borrow().object_kind(handle, name),
            Ok(Some(ObjectKind::Dataset))
        )
    }

    /// Set a scalar/string attribute on this node.
    pub fn set_attr<V: Into<AttrValue>>(&mut self, name: &str, value: V) -> Result<(), Error> {
        if self.readonly {
            return Err(Error::Write(format!(
                "cannot write into read-only object {}",
                self.path
            )));
        }
        let (store, handle) = self.attr_parts()?;
        store
            .borrow_mut()
            .write_attr(handle, name, value.into())
            .map_err(|e| Error::Write(format!("cannot set attribute {name} on {}: {e}", self.path)))
    }

    /// Read a scalar/string attribute of this node, `None` when absent.
    pub fn attr(&self, name: &str) -> Result<Option<AttrValue>, Error> {
        let (store, handle) = self.attr_parts()?;
        store
            .borrow()
            .read_attr(handle, name)
            .map_err(|e| Error::Read(format!("cannot read attribute {name} of {}: {e}", self.path)))
    }

    /// Names of the attributes on this node, in name order.
    pub fn attr_names(&self) -> Result<Vec<String>, Error> {
        let (store, handle) = self.attr_parts()?;
        store
            .borrow()
            .attr_names(handle)
            .map_err(|e| Error::Read(format!("cannot list attributes of {}: {e}", self.path)))
    }

    fn attr_parts(&self) -> Result<(&Rc<RefCell<Store>>, Handle), Error> {
        if !matches!(
            self.kind,
            NodeKind::File | NodeKind::Group | NodeKind::Dataset
        ) {
            return Err(Error::NotSupported(format!(
                "{} node {} has no attributes",
                self.kind, self.path
            )));
        }
        let store = self.store_rc()?;
        let handle = self.handle.ok_or_else(|| {
            Error::NotSupported(format!("{} node {} has no attributes", self.kind, self.path))
        })?;
        Ok((store, handle))
    }
}

impl Default for Node {
    fn default() -> Self {
        Node::invalid()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("readonly", &self.readonly)
            .finish()
    }
}

impl Drop for Node {
    /// Releases the owned object handle. `File` handles belong to the
    /// archive and `Invalid`/`Undefined` nodes own nothing, so only
    /// `Group`/`Dataset` handles close here. A failed close is a resource
    /// leak and fails loud; the panic is suppressed while already
    /// unwinding.
    fn drop(&mut self) {
        if !matches!(self.kind, NodeKind::Group | NodeKind::Dataset) {
            return;
        }
        let (Some(store), Some(handle)) = (&self.store, self.handle) else {
            return;
        };
        if let Err(e) = store.borrow_mut().close_object(handle) {
            if !std::thread::panicking() {
                panic!("cannot close {} {}: {e}", self.kind, self.path);
            }
        }
    }
}
