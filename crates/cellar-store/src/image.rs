//! On-disk container image encoding.
//!
//! Layout: an 8-byte signature, a little-endian `u16` image version, a
//! 32-byte SHA-256 digest of the payload, then the postcard-serialized
//! object tree. The digest is verified on load so a truncated or bit-flipped
//! image is rejected instead of decoding into a wrong tree.

use byteorder::{ByteOrder, LittleEndian};
use sha2::{Digest, Sha256};

use crate::error::StoreError;
use crate::tree::GroupNode;

/// Image signature. Same defensive shape as the HDF5 magic: a high byte to
/// catch 7-bit transports, CR/LF and ^Z to catch line-ending mangling.
pub const SIGNATURE: [u8; 8] = *b"\x89CLR\r\n\x1a\n";

/// Current image version.
pub const VERSION: u16 = 1;

const HEADER_LEN: usize = SIGNATURE.len() + 2 + 32;

/// Serialize the object tree into a container image.
pub fn encode(root: &GroupNode) -> Result<Vec<u8>, StoreError> {
    let payload = postcard::to_allocvec(root)
        .map_err(|e| StoreError::CorruptImage(e.to_string()))?;
    let digest: [u8; 32] = Sha256::digest(&payload).into();

    let mut image = Vec::with_capacity(HEADER_LEN + payload.len());
    image.extend_from_slice(&SIGNATURE);
    let mut version = [0u8; 2];
    LittleEndian::write_u16(&mut version, VERSION);
    image.extend_from_slice(&version);
    image.extend_from_slice(&digest);
    image.extend_from_slice(&payload);
    Ok(image)
}

/// Decode a container image back into an object tree.
pub fn decode(image: &[u8]) -> Result<GroupNode, StoreError> {
    if image.len() < HEADER_LEN || image[..SIGNATURE.len()] != SIGNATURE {
        return Err(StoreError::SignatureMismatch);
    }
    let version = LittleEndian::read_u16(&image[SIGNATURE.len()..SIGNATURE.len() + 2]);
    if version != VERSION {
        return Err(StoreError::UnsupportedVersion(version));
    }
    let digest_start = SIGNATURE.len() + 2;
    let payload = &image[HEADER_LEN..];
    let digest: [u8; 32] = Sha256::digest(payload).into();
    if digest[..] != image[digest_start..HEADER_LEN] {
        return Err(StoreError::DigestMismatch);
    }
    postcard::from_bytes(payload).map_err(|e| StoreError::CorruptImage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ObjectNode;

    #[test]
    fn roundtrip_empty_tree() {
        let root = GroupNode::default();
        let image = encode(&root).unwrap();
        assert_eq!(&image[..8], &SIGNATURE);
        let back = decode(&image).unwrap();
        assert!(back.children.is_empty());
    }

    #[test]
    fn roundtrip_nested_tree() {
        let mut root = GroupNode::default();
        root.insert_group("A").unwrap();
        root.insert_group("A/B").unwrap();
        let image = encode(&root).unwrap();
        let back = decode(&image).unwrap();
        assert!(matches!(back.lookup("A/B"), Some(ObjectNode::Group(_))));
    }

    #[test]
    fn bad_signature_rejected() {
        let root = GroupNode::default();
        let mut image = encode(&root).unwrap();
        image[0] = b'#';
        assert!(matches!(decode(&image), Err(StoreError::SignatureMismatch)));
    }

    #[test]
    fn flipped_payload_bit_rejected() {
        let mut root = GroupNode::default();
        root.insert_group("A").unwrap();
        let mut image = encode(&root).unwrap();
        let last = image.len() - 1;
        image[last] ^= 0x01;
        assert!(matches!(decode(&image), Err(StoreError::DigestMismatch)));
    }

    #[test]
    fn truncated_image_rejected() {
        let err = decode(&SIGNATURE[..]).unwrap_err();
        assert!(matches!(err, StoreError::SignatureMismatch));
    }
}
