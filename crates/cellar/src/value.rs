//! Element types and container capability traits.
//!
//! The supported value universe is closed: arithmetic scalars and complex
//! pairs implement the sealed [`Element`] trait; linear containers implement
//! [`Container`]; multi-axis containers implement [`NdContainer`]. Text is
//! `String`/`Vec<String>` and never a container of bytes. Resize and reshape
//! are capability methods that default to "not supported" — a container
//! reports the capability by overriding them.

use cellar_store::{CompoundMember, TypeDescriptor};
use num_complex::Complex;

mod sealed {
    pub trait Sealed {}
}

/// A fixed-width scalar element: arithmetic types, `bool`, and complex
/// float pairs. Sealed — the storage encoding of every element is decided
/// here, not by implementors.
pub trait Element: Copy + Default + sealed::Sealed + 'static {
    /// The storage-native descriptor for this element type.
    ///
    /// Complex pairs synthesize a fresh two-member compound (`"r"` at
    /// offset 0, `"i"` at the component width); the returned descriptor is
    /// owned by the caller.
    fn descriptor() -> TypeDescriptor;

    /// Encode a slice into storage byte order (little-endian).
    fn encode_slice(values: &[Self]) -> Vec<u8>;

    /// Decode storage bytes into `out`. `bytes` must hold exactly
    /// `out.len()` encoded elements.
    fn decode_slice(bytes: &[u8], out: &mut [Self]);
}

fn complex_descriptor(width: usize) -> TypeDescriptor {
    TypeDescriptor::Compound {
        size: 2 * width,
        members: vec![
            CompoundMember {
                name: "r".into(),
                offset: 0,
                dtype: TypeDescriptor::Float { size: width },
            },
            CompoundMember {
                name: "i".into(),
                offset: width,
                dtype: TypeDescriptor::Float { size: width },
            },
        ],
    }
}

macro_rules! numeric_element {
    ($ty:ty, $desc:expr) => {
        impl sealed::Sealed for $ty {}

        impl Element for $ty {
            fn descriptor() -> TypeDescriptor {
                $desc
            }

            fn encode_slice(values: &[Self]) -> Vec<u8> {
                #[cfg(target_endian = "little")]
                {
                    bytemuck::cast_slice(values).to_vec()
                }
                #[cfg(not(target_endian = "little"))]
                {
                    values.iter().flat_map(|v| v.to_le_bytes()).collect()
                }
            }

            fn decode_slice(bytes: &[u8], out: &mut [Self]) {
                const SIZE: usize = std::mem::size_of::<$ty>();
                for (i, v) in out.iter_mut().enumerate() {
                    let mut buf = [0u8; SIZE];
                    buf.copy_from_slice(&bytes[i * SIZE..(i + 1) * SIZE]);
                    *v = <$ty>::from_le_bytes(buf);
                }
            }
        }
    };
}

numeric_element!(i8, TypeDescriptor::Int { size: 1, signed: true });
numeric_element!(i16, TypeDescriptor::Int { size: 2, signed: true });
numeric_element!(i32, TypeDescriptor::Int { size: 4, signed: true });
numeric_element!(i64, TypeDescriptor::Int { size: 8, signed: true });
numeric_element!(u8, TypeDescriptor::Int { size: 1, signed: false });
numeric_element!(u16, TypeDescriptor::Int { size: 2, signed: false });
numeric_element!(u32, TypeDescriptor::Int { size: 4, signed: false });
numeric_element!(u64, TypeDescriptor::Int { size: 8, signed: false });
numeric_element!(f32, TypeDescriptor::Float { size: 4 });
numeric_element!(f64, TypeDescriptor::Float { size: 8 });

macro_rules! complex_element {
    ($comp:ty, $width:expr) => {
        impl sealed::Sealed for Complex<$comp> {}

        impl Element for Complex<$comp> {
            fn descriptor() -> TypeDescriptor {
                complex_descriptor($width)
            }

            fn encode_slice(values: &[Self]) -> Vec<u8> {
                #[cfg(target_endian = "little")]
                {
                    bytemuck::cast_slice(values).to_vec()
                }
                #[cfg(not(target_endian = "little"))]
                {
                    values
                        .iter()
                        .flat_map(|v| {
                            v.re.to_le_bytes().into_iter().chain(v.im.to_le_bytes())
                        })
                        .collect()
                }
            }

            fn decode_slice(bytes: &[u8], out: &mut [Self]) {
                const W: usize = $width;
                for (i, v) in out.iter_mut().enumerate() {
                    let mut re = [0u8; W];
                    let mut im = [0u8; W];
                    re.copy_from_slice(&bytes[i * 2 * W..i * 2 * W + W]);
                    im.copy_from_slice(&bytes[i * 2 * W + W..(i + 1) * 2 * W]);
                    *v = Complex::new(<$comp>::from_le_bytes(re), <$comp>::from_le_bytes(im));
                }
            }
        }
    };
}

complex_element!(f32, 4);
complex_element!(f64, 8);

impl sealed::Sealed for bool {}

// Stored as an unsigned byte; any nonzero value reads back as `true`.
impl Element for bool {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Int { size: 1, signed: false }
    }

    fn encode_slice(values: &[Self]) -> Vec<u8> {
        values.iter().map(|&b| b as u8).collect()
    }

    fn decode_slice(bytes: &[u8], out: &mut [Self]) {
        for (i, v) in out.iter_mut().enumerate() {
            *v = bytes[i] != 0;
        }
    }
}

/// A linear container: element access and a length, no multi-axis shape.
pub trait Container {
    /// Element type of the container.
    type Elem: Element;

    /// Number of elements.
    fn len(&self) -> usize;

    /// `true` when the container holds no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the elements.
    fn as_slice(&self) -> &[Self::Elem];

    /// Borrow the elements mutably.
    fn as_mut_slice(&mut self) -> &mut [Self::Elem];

    /// Length-only resize capability. Returns `false` when the container
    /// cannot change its length; the default is not resizable.
    fn grow(&mut self, new_len: usize) -> bool {
        let _ = new_len;
        false
    }
}

impl<E: Element> Container for Vec<E> {
    type Elem = E;

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn as_slice(&self) -> &[E] {
        self
    }

    fn as_mut_slice(&mut self) -> &mut [E] {
        self
    }

    fn grow(&mut self, new_len: usize) -> bool {
        self.resize(new_len, E::default());
        true
    }
}

impl<E: Element, const N: usize> Container for [E; N] {
    type Elem = E;

    fn len(&self) -> usize {
        N
    }

    fn as_slice(&self) -> &[E] {
        self
    }

    fn as_mut_slice(&mut self) -> &mut [E] {
        self
    }
}

/// A container with a multi-axis shape. Takes priority over the linear
/// classification: a type implementing this trait always transfers through
/// the N-dimensional reconciliation path.
pub trait NdContainer: Container {
    /// Per-axis extents. The product must equal [`Container::len`].
    fn extents(&self) -> Vec<u64>;

    /// Full-shape resize capability. Implementations that can take on an
    /// arbitrary shape reallocate and return `true`; the default is not
    /// reshapable.
    fn reshape(&mut self, extents: &[u64]) -> bool {
        let _ = extents;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_descriptors() {
        assert_eq!(f64::descriptor(), TypeDescriptor::Float { size: 8 });
        assert_eq!(
            i32::descriptor(),
            TypeDescriptor::Int { size: 4, signed: true }
        );
        assert_eq!(
            bool::descriptor(),
            TypeDescriptor::Int { size: 1, signed: false }
        );
    }

    #[test]
    fn complex_descriptor_layout() {
        match Complex::<f64>::descriptor() {
            TypeDescriptor::Compound { size, members } => {
                assert_eq!(size, 16);
                assert_eq!(members.len(), 2);
                assert_eq!(members[0].name, "r");
                assert_eq!(members[0].offset, 0);
                assert_eq!(members[1].name, "i");
                assert_eq!(members[1].offset, 8);
            }
            other => panic!("expected compound, got {other:?}"),
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let values = [1.5f64, -2.25, 0.0];
        let bytes = f64::encode_slice(&values);
        assert_eq!(bytes.len(), 24);
        let mut out = [0.0f64; 3];
        f64::decode_slice(&bytes, &mut out);
        assert_eq!(out, values);
    }

    #[test]
    fn complex_roundtrip() {
        let values = [Complex::new(1.0f32, -2.0), Complex::new(0.5, 0.25)];
        let bytes = Complex::<f32>::encode_slice(&values);
        assert_eq!(bytes.len(), 16);
        let mut out = [Complex::<f32>::default(); 2];
        Complex::<f32>::decode_slice(&bytes, &mut out);
        assert_eq!(out, values);
    }

    #[test]
    fn bool_encoding() {
        let bytes = bool::encode_slice(&[true, false, true]);
        assert_eq!(bytes, vec![1, 0, 1]);
        let mut out = [false; 3];
        bool::decode_slice(&[0, 2, 1], &mut out);
        assert_eq!(out, [false, true, true]);
    }

    #[test]
    fn vec_grows_array_does_not() {
        let mut v: Vec<f64> = Vec::new();
        assert!(v.grow(4));
        assert_eq!(Container::len(&v), 4);
        let mut a = [0.0f64; 4];
        assert!(!a.grow(8));
    }
}
