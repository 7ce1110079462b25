//! The in-memory object tree: groups, datasets and their attributes.
//!
//! Paths are slash-delimited; empty segments are ignored so `"/A//B"` and
//! `"A/B"` name the same node. The root group is the anonymous node at `"/"`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::descriptor::TypeDescriptor;
use crate::error::StoreError;

/// Kind of an addressable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// A container of named children.
    Group,
    /// A leaf holding typed, shaped data.
    Dataset,
}

/// A scalar or string attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    Uint(u64),
    /// Floating point.
    Float(f64),
    /// UTF-8 text.
    Text(String),
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        AttrValue::Uint(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Text(v)
    }
}

/// Dataset payload. Fixed-width elements live in one raw byte run encoded
/// per the dataset's descriptor; variable-length text is element-per-string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    /// Raw little-endian element bytes.
    Fixed(Vec<u8>),
    /// One string per element.
    Text(Vec<String>),
}

/// A leaf node holding typed, shaped data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetNode {
    /// Stored element type.
    pub dtype: TypeDescriptor,
    /// Per-axis extents; empty for rank-0 (scalar) data.
    pub extents: Vec<u64>,
    /// Element data.
    pub payload: Payload,
    /// Scalar/string attributes.
    pub attrs: BTreeMap<String, AttrValue>,
}

impl DatasetNode {
    /// Total element count: the product of the extents. The empty product
    /// makes rank-0 data a single element.
    pub fn num_elements(&self) -> u64 {
        self.extents.iter().product()
    }
}

/// A container of named children.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupNode {
    /// Children in name order.
    pub children: BTreeMap<String, ObjectNode>,
    /// Scalar/string attributes.
    pub attrs: BTreeMap<String, AttrValue>,
}

/// Any addressable node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ObjectNode {
    /// Group node.
    Group(GroupNode),
    /// Dataset node.
    Dataset(DatasetNode),
}

impl ObjectNode {
    /// Kind of this node.
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectNode::Group(_) => ObjectKind::Group,
            ObjectNode::Dataset(_) => ObjectKind::Dataset,
        }
    }
}

/// Split a slash-delimited path into non-empty segments.
pub fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

impl GroupNode {
    /// Look up a node by path relative to this group.
    pub fn lookup(&self, path: &str) -> Option<&ObjectNode> {
        let segments = split_segments(path);
        let mut current = self;
        let (last, parents) = segments.split_last()?;
        for seg in parents {
            match current.children.get(*seg) {
                Some(ObjectNode::Group(g)) => current = g,
                _ => return None,
            }
        }
        current.children.get(*last)
    }

    /// Mutable lookup by relative path.
    pub fn lookup_mut(&mut self, path: &str) -> Option<&mut ObjectNode> {
        let segments = split_segments(path);
        let mut current = self;
        let (last, parents) = segments.split_last()?;
        for seg in parents {
            match current.children.get_mut(*seg) {
                Some(ObjectNode::Group(g)) => current = g,
                _ => return None,
            }
        }
        current.children.get_mut(*last)
    }

    /// The group that would hold the last segment of `path`, if it exists.
    fn parent_group_mut(&mut self, path: &str) -> Option<(&mut GroupNode, String)> {
        let segments = split_segments(path);
        let (last, parents) = segments.split_last()?;
        let mut current = self;
        for seg in parents {
            match current.children.get_mut(*seg) {
                Some(ObjectNode::Group(g)) => current = g,
                _ => return None,
            }
        }
        Some((current, (*last).to_string()))
    }

    /// Insert a new child group at `path`. The parent chain must already
    /// exist; a name collision of any kind is an error.
    pub fn insert_group(&mut self, path: &str) -> Result<(), StoreError> {
        let (parent, name) = self
            .parent_group_mut(path)
            .ok_or_else(|| StoreError::NoParent(path.to_string()))?;
        if parent.children.contains_key(&name) {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        parent
            .children
            .insert(name, ObjectNode::Group(GroupNode::default()));
        Ok(())
    }

    /// Insert a new dataset at `path`. The parent chain must already exist.
    pub fn insert_dataset(
        &mut self,
        path: &str,
        node: DatasetNode,
    ) -> Result<(), StoreError> {
        let (parent, name) = self
            .parent_group_mut(path)
            .ok_or_else(|| StoreError::NoParent(path.to_string()))?;
        if parent.children.contains_key(&name) {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        parent.children.insert(name, ObjectNode::Dataset(node));
        Ok(())
    }

    /// The group that would hold the last segment of `path`, immutably.
    fn parent_group(&self, path: &str) -> Option<&GroupNode> {
        let segments = split_segments(path);
        let (_, parents) = segments.split_last()?;
        let mut current = self;
        for seg in parents {
            match current.children.get(*seg) {
                Some(ObjectNode::Group(g)) => current = g,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Detach the node at `src` and re-attach it at `dst`. The destination
    /// must be free, its parent group must exist, and it must not lie inside
    /// the subtree being moved.
    pub fn move_node(&mut self, src: &str, dst: &str) -> Result<(), StoreError> {
        if self.lookup(src).is_none() {
            return Err(StoreError::NoSuchPath(src.to_string()));
        }
        if self.lookup(dst).is_some() {
            return Err(StoreError::AlreadyExists(dst.to_string()));
        }
        let src_segs = split_segments(src);
        let dst_segs = split_segments(dst);
        if dst_segs.starts_with(&src_segs) || self.parent_group(dst).is_none() {
            // Once src detaches, a destination under it has no parent.
            return Err(StoreError::NoParent(dst.to_string()));
        }
        let node = {
            let (parent, name) = self
                .parent_group_mut(src)
                .ok_or_else(|| StoreError::NoSuchPath(src.to_string()))?;
            parent
                .children
                .remove(&name)
                .ok_or_else(|| StoreError::NoSuchPath(src.to_string()))?
        };
        let (parent, name) = self
            .parent_group_mut(dst)
            .ok_or_else(|| StoreError::NoParent(dst.to_string()))?;
        parent.children.insert(name, node);
        Ok(())
    }

    /// Names of the direct children of the group at `path` (`""` for this
    /// group itself).
    pub fn child_names(&self, path: &str) -> Result<Vec<String>, StoreError> {
        let group = if split_segments(path).is_empty() {
            self
        } else {
            match self.lookup(path) {
                Some(ObjectNode::Group(g)) => g,
                Some(_) => return Err(StoreError::NotAGroup(path.to_string())),
                None => return Err(StoreError::NoSuchPath(path.to_string())),
            }
        };
        Ok(group.children.keys().cloned().collect())
    }
}
