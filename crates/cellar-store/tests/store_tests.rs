//! End-to-end storage engine tests: full create/write/close/reopen/read
//! pipelines, element conversion through the transfer surface, collisions,
//! and image corruption handling.

use cellar_store::{AccessMode, AttrValue, Handle, ObjectKind, Store, StoreError, TypeDescriptor};

const F64: TypeDescriptor = TypeDescriptor::Float { size: 8 };
const I32: TypeDescriptor = TypeDescriptor::Int { size: 4, signed: true };

fn scratch() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.clr");
    (dir, path)
}

fn le_f64(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn le_i32(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[test]
fn full_write_reopen_read_pipeline() {
    let (_dir, path) = scratch();

    let mut store = Store::open(&path, AccessMode::Truncate).unwrap();
    let g = store.create_group(Handle::FILE, "run").unwrap();
    let d = store
        .create_dataset(g, "values", &F64, &[3])
        .unwrap();
    store.write_raw(d, &F64, &le_f64(&[1.0, 2.0, 3.0])).unwrap();
    store.write_attr(d, "unit", AttrValue::from("V")).unwrap();
    store.close_object(d).unwrap();
    store.close_object(g).unwrap();
    store.close().unwrap();

    let mut store = Store::open(&path, AccessMode::ReadOnly).unwrap();
    assert_eq!(
        store.object_kind(Handle::FILE, "run/values").unwrap(),
        Some(ObjectKind::Dataset)
    );
    let (d, kind) = store.open_object(Handle::FILE, "run/values").unwrap();
    assert_eq!(kind, ObjectKind::Dataset);
    assert_eq!(store.dataset_extents(d).unwrap(), vec![3]);
    assert_eq!(store.dataset_type(d).unwrap(), F64);
    let mut out = vec![0u8; 24];
    store.read_raw(d, &F64, &mut out).unwrap();
    assert_eq!(out, le_f64(&[1.0, 2.0, 3.0]));
    assert_eq!(
        store.read_attr(d, "unit").unwrap(),
        Some(AttrValue::Text("V".into()))
    );
    store.close_object(d).unwrap();
}

#[test]
fn transfer_converts_between_numeric_widths() {
    let (_dir, path) = scratch();
    let mut store = Store::open(&path, AccessMode::Truncate).unwrap();
    let d = store
        .create_dataset(Handle::FILE, "x", &F64, &[2])
        .unwrap();

    // Write through an i32 source; the store converts into f64 storage.
    store.write_raw(d, &I32, &le_i32(&[7, -3])).unwrap();
    let mut out = vec![0u8; 16];
    store.read_raw(d, &F64, &mut out).unwrap();
    assert_eq!(out, le_f64(&[7.0, -3.0]));

    // And read back out through i32 again.
    let mut out = vec![0u8; 8];
    store.read_raw(d, &I32, &mut out).unwrap();
    assert_eq!(out, le_i32(&[7, -3]));
}

#[test]
fn buffer_size_is_checked() {
    let (_dir, path) = scratch();
    let mut store = Store::open(&path, AccessMode::Truncate).unwrap();
    let d = store
        .create_dataset(Handle::FILE, "x", &F64, &[2])
        .unwrap();
    let mut short = vec![0u8; 8];
    assert!(matches!(
        store.read_raw(d, &F64, &mut short),
        Err(StoreError::BufferSize { .. })
    ));
}

#[test]
fn create_collisions() {
    let (_dir, path) = scratch();
    let mut store = Store::open(&path, AccessMode::Truncate).unwrap();
    store.create_group(Handle::FILE, "G").unwrap();
    store
        .create_dataset(Handle::FILE, "d", &F64, &[])
        .unwrap();

    // Group over dataset, dataset over group, twice-created group.
    assert!(matches!(
        store.create_group(Handle::FILE, "d"),
        Err(StoreError::AlreadyExists(_))
    ));
    assert!(matches!(
        store.create_dataset(Handle::FILE, "G", &F64, &[]),
        Err(StoreError::AlreadyExists(_))
    ));
    assert!(matches!(
        store.create_group(Handle::FILE, "G"),
        Err(StoreError::AlreadyExists(_))
    ));
}

#[test]
fn missing_parent_rejected() {
    let (_dir, path) = scratch();
    let mut store = Store::open(&path, AccessMode::Truncate).unwrap();
    assert!(matches!(
        store.create_dataset(Handle::FILE, "no/such/parent", &F64, &[]),
        Err(StoreError::NoParent(_))
    ));
}

#[test]
fn corrupt_image_rejected_on_open() {
    let (_dir, path) = scratch();
    let mut store = Store::open(&path, AccessMode::Truncate).unwrap();
    store.create_group(Handle::FILE, "G").unwrap();
    store.close().unwrap();

    // Flip one payload byte; the digest check must catch it.
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x40;
    std::fs::write(&path, bytes).unwrap();

    assert!(matches!(
        Store::open(&path, AccessMode::ReadOnly),
        Err(StoreError::DigestMismatch)
    ));
}

#[test]
fn is_store_file_probe() {
    let (_dir, path) = scratch();
    let mut store = Store::open(&path, AccessMode::Truncate).unwrap();
    store.close().unwrap();
    assert!(Store::is_store_file(&path).unwrap());

    std::fs::write(&path, b"something else").unwrap();
    assert!(!Store::is_store_file(&path).unwrap());
}

#[test]
fn text_and_fixed_payloads_do_not_mix() {
    let (_dir, path) = scratch();
    let mut store = Store::open(&path, AccessMode::Truncate).unwrap();
    let t = store
        .create_dataset(Handle::FILE, "t", &TypeDescriptor::VarLenText, &[2])
        .unwrap();
    let d = store
        .create_dataset(Handle::FILE, "d", &F64, &[])
        .unwrap();

    store
        .write_text(t, &["a".to_string(), "b".to_string()])
        .unwrap();
    assert!(matches!(
        store.write_raw(t, &F64, &le_f64(&[1.0, 2.0])),
        Err(StoreError::PayloadKind(_))
    ));
    assert!(matches!(
        store.write_text(d, &["a".to_string()]),
        Err(StoreError::PayloadKind(_))
    ));
}

#[test]
fn handles_survive_unrelated_closes() {
    let (_dir, path) = scratch();
    let mut store = Store::open(&path, AccessMode::Truncate).unwrap();
    let g = store.create_group(Handle::FILE, "G").unwrap();
    let d = store
        .create_dataset(g, "d", &F64, &[])
        .unwrap();
    store.close_object(g).unwrap();
    // The dataset handle resolves independently of its parent's handle.
    store.write_raw(d, &F64, &le_f64(&[4.5])).unwrap();
    let mut out = vec![0u8; 8];
    store.read_raw(d, &F64, &mut out).unwrap();
    assert_eq!(out, le_f64(&[4.5]));
}
