//! Path handling and the group tree builder.

use std::cell::RefCell;
use std::rc::Rc;

use cellar_store::{Handle, Store};

use crate::error::Error;

/// Split a slash-delimited path into non-empty segments.
pub fn split(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Join a parent path and a relative name into an absolute path with a
/// leading slash.
pub fn join(parent: &str, name: &str) -> String {
    let mut segments = split(parent);
    segments.extend(split(name));
    let mut out = String::new();
    for seg in &segments {
        out.push('/');
        out.push_str(seg);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Materialize every missing group along `segments`, left to right, under
/// the container root. Prefixes that already exist as groups are left
/// untouched, so calling this twice is a no-op the second time; a prefix
/// occupied by a dataset surfaces the storage collision as
/// [`Error::CreateGroup`].
pub fn ensure_parents(
    store: &Rc<RefCell<Store>>,
    segments: &[&str],
) -> Result<(), Error> {
    let mut store = store.borrow_mut();
    let mut prefix = String::new();
    for seg in segments {
        prefix.push('/');
        prefix.push_str(seg);
        let exists = store
            .path_exists(Handle::FILE, &prefix)
            .map_err(|e| Error::CreateGroup(format!("cannot probe {prefix}: {e}")))?;
        if !exists {
            let h = store
                .create_group(Handle::FILE, &prefix)
                .map_err(|e| Error::CreateGroup(format!("cannot create group {prefix}: {e}")))?;
            store
                .close_object(h)
                .map_err(|e| Error::Close(format!("cannot close group {prefix}: {e}")))?;
        }
    }
    Ok(())
}

/// Build (or reuse) the whole group chain for `path` and return an open
/// handle to the deepest group.
pub fn build_group_tree(
    store: &Rc<RefCell<Store>>,
    path: &str,
) -> Result<Handle, Error> {
    let segments = split(path);
    ensure_parents(store, &segments)?;
    let mut store = store.borrow_mut();
    let (h, kind) = store
        .open_object(Handle::FILE, path)
        .map_err(|e| Error::CreateGroup(format!("cannot open group {path}: {e}")))?;
    if kind != cellar_store::ObjectKind::Group {
        let _ = store.close_object(h);
        return Err(Error::CreateGroup(format!(
            "cannot create group {path}: path is occupied by a dataset"
        )));
    }
    Ok(h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_skips_empty_segments() {
        assert_eq!(split("aaa/bbb//ccc/ddd"), vec!["aaa", "bbb", "ccc", "ddd"]);
        assert_eq!(split("aaa"), vec!["aaa"]);
        assert_eq!(split("/"), Vec::<&str>::new());
    }

    #[test]
    fn join_normalizes() {
        assert_eq!(join("/", "A"), "/A");
        assert_eq!(join("/A", "B/C"), "/A/B/C");
        assert_eq!(join("/A/", "/B"), "/A/B");
        assert_eq!(join("", ""), "/");
    }
}
