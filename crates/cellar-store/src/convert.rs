//! Element-wise conversion between fixed-width descriptors.
//!
//! Transfers where the stored and requested descriptors differ go through a
//! per-element decode/encode loop: decode one element into an intermediate
//! scalar, re-encode it in the requested width. Same-descriptor transfers
//! are a straight copy and never reach this module's loops.

use byteorder::{ByteOrder, LittleEndian};

use crate::descriptor::{can_convert, TypeDescriptor};
use crate::error::StoreError;

/// Intermediate value wide enough to hold any fixed-width element.
#[derive(Debug, Clone, Copy)]
enum ScalarValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

fn decode_int(bytes: &[u8], size: usize, signed: bool) -> ScalarValue {
    if signed {
        let v = match size {
            1 => bytes[0] as i8 as i64,
            2 => LittleEndian::read_i16(bytes) as i64,
            4 => LittleEndian::read_i32(bytes) as i64,
            _ => LittleEndian::read_i64(bytes),
        };
        ScalarValue::Signed(v)
    } else {
        let v = match size {
            1 => bytes[0] as u64,
            2 => LittleEndian::read_u16(bytes) as u64,
            4 => LittleEndian::read_u32(bytes) as u64,
            _ => LittleEndian::read_u64(bytes),
        };
        ScalarValue::Unsigned(v)
    }
}

fn decode_scalar(bytes: &[u8], desc: &TypeDescriptor) -> ScalarValue {
    match desc {
        TypeDescriptor::Int { size, signed } => decode_int(bytes, *size, *signed),
        TypeDescriptor::Float { size: 4 } => {
            ScalarValue::Float(LittleEndian::read_f32(bytes) as f64)
        }
        TypeDescriptor::Float { .. } => ScalarValue::Float(LittleEndian::read_f64(bytes)),
        // Callers only pass numeric descriptors here.
        TypeDescriptor::Compound { .. } | TypeDescriptor::VarLenText => {
            ScalarValue::Unsigned(0)
        }
    }
}

fn encode_scalar(v: ScalarValue, desc: &TypeDescriptor, out: &mut [u8]) {
    match desc {
        TypeDescriptor::Int { size, signed: true } => {
            let x = match v {
                ScalarValue::Signed(x) => x,
                ScalarValue::Unsigned(x) => x as i64,
                ScalarValue::Float(x) => x as i64,
            };
            match size {
                1 => out[0] = x as i8 as u8,
                2 => LittleEndian::write_i16(out, x as i16),
                4 => LittleEndian::write_i32(out, x as i32),
                _ => LittleEndian::write_i64(out, x),
            }
        }
        TypeDescriptor::Int { size, signed: false } => {
            let x = match v {
                ScalarValue::Signed(x) => x as u64,
                ScalarValue::Unsigned(x) => x,
                ScalarValue::Float(x) => x as u64,
            };
            match size {
                1 => out[0] = x as u8,
                2 => LittleEndian::write_u16(out, x as u16),
                4 => LittleEndian::write_u32(out, x as u32),
                _ => LittleEndian::write_u64(out, x),
            }
        }
        TypeDescriptor::Float { size: 4 } => {
            let x = match v {
                ScalarValue::Signed(x) => x as f32,
                ScalarValue::Unsigned(x) => x as f32,
                ScalarValue::Float(x) => x as f32,
            };
            LittleEndian::write_f32(out, x);
        }
        TypeDescriptor::Float { .. } => {
            let x = match v {
                ScalarValue::Signed(x) => x as f64,
                ScalarValue::Unsigned(x) => x as f64,
                ScalarValue::Float(x) => x,
            };
            LittleEndian::write_f64(out, x);
        }
        TypeDescriptor::Compound { .. } | TypeDescriptor::VarLenText => {}
    }
}

/// Convert a raw element buffer from `src_desc` to `dst_desc`.
///
/// `src.len()` must be a whole number of `src_desc` elements; the returned
/// buffer holds the same element count in `dst_desc` encoding. Fails with
/// [`StoreError::Conversion`] when the oracle rejects the pair.
pub fn convert_buffer(
    src_desc: &TypeDescriptor,
    src: &[u8],
    dst_desc: &TypeDescriptor,
) -> Result<Vec<u8>, StoreError> {
    if src_desc == dst_desc {
        return Ok(src.to_vec());
    }
    if !can_convert(src_desc, dst_desc) {
        return Err(StoreError::Conversion {
            from: src_desc.class_name(),
            to: dst_desc.class_name(),
        });
    }

    let src_size = src_desc.size();
    let dst_size = dst_desc.size();
    debug_assert!(src_size > 0 && src.len() % src_size == 0);
    let count = src.len() / src_size;
    let mut out = vec![0u8; count * dst_size];

    match (src_desc, dst_desc) {
        (
            TypeDescriptor::Compound { members: sm, .. },
            TypeDescriptor::Compound { members: dm, .. },
        ) => {
            for i in 0..count {
                let se = &src[i * src_size..(i + 1) * src_size];
                let de = &mut out[i * dst_size..(i + 1) * dst_size];
                for (a, b) in sm.iter().zip(dm.iter()) {
                    let field = &se[a.offset..a.offset + a.dtype.size()];
                    let v = decode_scalar(field, &a.dtype);
                    let dst_field = &mut de[b.offset..b.offset + b.dtype.size()];
                    encode_scalar(v, &b.dtype, dst_field);
                }
            }
        }
        _ => {
            for i in 0..count {
                let se = &src[i * src_size..(i + 1) * src_size];
                let v = decode_scalar(se, src_desc);
                let de = &mut out[i * dst_size..(i + 1) * dst_size];
                encode_scalar(v, dst_desc, de);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::CompoundMember;

    const F64: TypeDescriptor = TypeDescriptor::Float { size: 8 };
    const F32: TypeDescriptor = TypeDescriptor::Float { size: 4 };
    const I32: TypeDescriptor = TypeDescriptor::Int { size: 4, signed: true };

    #[test]
    fn f64_to_i32_truncates() {
        let mut src = vec![0u8; 16];
        LittleEndian::write_f64(&mut src[0..8], 3.9);
        LittleEndian::write_f64(&mut src[8..16], -2.2);
        let out = convert_buffer(&F64, &src, &I32).unwrap();
        assert_eq!(LittleEndian::read_i32(&out[0..4]), 3);
        assert_eq!(LittleEndian::read_i32(&out[4..8]), -2);
    }

    #[test]
    fn i32_to_f64_exact() {
        let mut src = vec![0u8; 4];
        LittleEndian::write_i32(&mut src, -7);
        let out = convert_buffer(&I32, &src, &F64).unwrap();
        assert_eq!(LittleEndian::read_f64(&out), -7.0);
    }

    #[test]
    fn same_descriptor_is_copy() {
        let mut src = vec![0u8; 8];
        LittleEndian::write_f64(&mut src, 1.5);
        let out = convert_buffer(&F64, &src, &F64).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn compound_width_crossing() {
        let c64 = TypeDescriptor::Compound {
            size: 16,
            members: vec![
                CompoundMember { name: "r".into(), offset: 0, dtype: F64 },
                CompoundMember { name: "i".into(), offset: 8, dtype: F64 },
            ],
        };
        let c32 = TypeDescriptor::Compound {
            size: 8,
            members: vec![
                CompoundMember { name: "r".into(), offset: 0, dtype: F32 },
                CompoundMember { name: "i".into(), offset: 4, dtype: F32 },
            ],
        };
        let mut src = vec![0u8; 16];
        LittleEndian::write_f64(&mut src[0..8], 1.5);
        LittleEndian::write_f64(&mut src[8..16], -0.5);
        let out = convert_buffer(&c64, &src, &c32).unwrap();
        assert_eq!(LittleEndian::read_f32(&out[0..4]), 1.5);
        assert_eq!(LittleEndian::read_f32(&out[4..8]), -0.5);
    }

    #[test]
    fn compound_to_scalar_rejected() {
        let c64 = TypeDescriptor::Compound {
            size: 16,
            members: vec![
                CompoundMember { name: "r".into(), offset: 0, dtype: F64 },
                CompoundMember { name: "i".into(), offset: 8, dtype: F64 },
            ],
        };
        let src = vec![0u8; 16];
        let err = convert_buffer(&c64, &src, &F64).unwrap_err();
        assert!(matches!(err, StoreError::Conversion { .. }));
    }
}
