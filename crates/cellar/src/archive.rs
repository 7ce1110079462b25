//! Archive: the file-level root of a container hierarchy.

use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::str::FromStr;

use cellar_store::{AccessMode as StoreMode, AttrValue, Store};
use tracing::debug;

use crate::error::Error;
use crate::node::Node;

/// How an archive is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// `"r"` — read-only; the file must exist and be a valid container.
    Read,
    /// `"w"` — create a new container, truncating any existing file.
    Write,
    /// `"a"` — open an existing container read-write, or create one.
    Append,
}

impl FromStr for AccessMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "r" => Ok(AccessMode::Read),
            "w" => Ok(AccessMode::Write),
            "a" => Ok(AccessMode::Append),
            other => Err(Error::Access(format!(
                "unknown access type '{other}'. Should be 'r', 'w' or 'a'"
            ))),
        }
    }
}

/// An open container file and the root of its node hierarchy.
///
/// The archive owns the storage handle; every node derived from it shares
/// that handle for as long as the node lives. Dropping the archive closes
/// the file best-effort — use [`Archive::close`] to observe flush failures.
///
/// ```no_run
/// use cellar::{AccessMode, Archive};
///
/// let mut ar = Archive::open("results.clr", AccessMode::Write).unwrap();
/// ar.at("run/alpha").unwrap().write(&1.5f64).unwrap();
/// let mut value = 0.0f64;
/// ar.at("run/alpha").unwrap().read(&mut value).unwrap();
/// ar.close().unwrap();
/// ```
pub struct Archive {
    root: Node,
    filename: PathBuf,
}

impl Archive {
    /// Open the container at `filename`.
    pub fn open<P: AsRef<Path>>(filename: P, mode: AccessMode) -> Result<Self, Error> {
        let filename = filename.as_ref().to_path_buf();
        let disp = filename.display();
        let store_mode = match mode {
            AccessMode::Read => {
                if !filename.exists() {
                    return Err(Error::Access(format!("file {disp} does not exist")));
                }
                Self::require_container(&filename)?;
                StoreMode::ReadOnly
            }
            AccessMode::Write => StoreMode::Truncate,
            AccessMode::Append => {
                if filename.exists() {
                    Self::require_container(&filename)?;
                    StoreMode::ReadWrite
                } else {
                    StoreMode::Truncate
                }
            }
        };
        let store = Store::open(&filename, store_mode)
            .map_err(|e| Error::Access(format!("cannot open file {disp}: {e}")))?;
        debug!(file = %disp, ?mode, "archive opened");
        let readonly = mode == AccessMode::Read;
        Ok(Self {
            root: Node::root(Rc::new(RefCell::new(store)), readonly),
            filename,
        })
    }

    fn require_container(filename: &Path) -> Result<(), Error> {
        let display = filename.display();
        match Store::is_store_file(filename) {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::Access(format!("{display} is not a container file"))),
            Err(e) => Err(Error::Access(format!("error accessing file {display}: {e}"))),
        }
    }

    /// Resolve `path` under the root. Missing paths come back as
    /// `Undefined` nodes on writable archives and fail with
    /// [`Error::WrongPath`] on read-only ones.
    pub fn at(&mut self, path: &str) -> Result<Node, Error> {
        self.root.child(path)
    }

    /// Flush (when writable) and close the container. Closing twice is an
    /// access error; nodes still alive keep their paths but any further
    /// transfer through them fails.
    pub fn close(&mut self) -> Result<(), Error> {
        let disp = self.filename.display();
        if !self.is_valid() {
            return Err(Error::Access(format!("file {disp} is not open")));
        }
        self.store_rc()?
            .borrow_mut()
            .close()
            .map_err(|e| Error::Access(format!("cannot close file {disp}: {e}")))?;
        debug!(file = %disp, "archive closed");
        Ok(())
    }

    /// `true` while the underlying container is open.
    pub fn is_valid(&self) -> bool {
        self.store_rc()
            .map(|s| s.borrow().is_open())
            .unwrap_or(false)
    }

    /// Filesystem path of the container.
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// The root node.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// The root node, mutably.
    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    /// Whether `path` names an existing group.
    pub fn has_group(&self, path: &str) -> bool {
        self.root.has_group(path)
    }

    /// Whether `path` names an existing dataset.
    pub fn is_data(&self, path: &str) -> bool {
        self.root.is_data(path)
    }

    /// Set a scalar/string attribute on the container root.
    pub fn set_attr<V: Into<AttrValue>>(&mut self, name: &str, value: V) -> Result<(), Error> {
        self.root.set_attr(name, value)
    }

    /// Read a scalar/string attribute of the container root.
    pub fn attr(&self, name: &str) -> Result<Option<AttrValue>, Error> {
        self.root.attr(name)
    }

    fn store_rc(&self) -> Result<&Rc<RefCell<Store>>, Error> {
        self.root.store().ok_or_else(|| {
            Error::Access(format!("file {} is not open", self.filename.display()))
        })
    }
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("file", &self.filename)
            .field("open", &self.is_valid())
            .finish()
    }
}

impl Drop for Archive {
    /// Best-effort close, mirroring the storage library convention of an
    /// unchecked file close in teardown. Use [`Archive::close`] to observe
    /// failures.
    fn drop(&mut self) {
        if let Ok(store) = self.store_rc() {
            if store.borrow().is_open() {
                let _ = store.borrow_mut().close();
            }
        }
    }
}
