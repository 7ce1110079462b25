//! Native element type descriptors and the conversion oracle.
//!
//! Every dataset carries a [`TypeDescriptor`] describing its stored element
//! type. Descriptors are plain owned values; a caller that synthesizes one
//! (e.g. a compound for a complex pair) simply drops it when done.

use serde::{Deserialize, Serialize};

/// One named member of a compound descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundMember {
    /// Member name within the compound.
    pub name: String,
    /// Byte offset of the member inside one element.
    pub offset: usize,
    /// Element type of the member.
    pub dtype: TypeDescriptor,
}

/// A storage-native element type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeDescriptor {
    /// Fixed-width integer, little-endian.
    Int {
        /// Element width in bytes (1, 2, 4 or 8).
        size: usize,
        /// Two's-complement signed when `true`.
        signed: bool,
    },
    /// IEEE-754 float, little-endian.
    Float {
        /// Element width in bytes (4 or 8).
        size: usize,
    },
    /// Compound of named members at fixed offsets.
    Compound {
        /// Total element width in bytes.
        size: usize,
        /// Ordered members.
        members: Vec<CompoundMember>,
    },
    /// Variable-length UTF-8 text.
    VarLenText,
}

impl TypeDescriptor {
    /// Element width in bytes. Variable-length text has no fixed width and
    /// reports 0; text transfers never go through byte buffers.
    pub fn size(&self) -> usize {
        match self {
            TypeDescriptor::Int { size, .. } => *size,
            TypeDescriptor::Float { size } => *size,
            TypeDescriptor::Compound { size, .. } => *size,
            TypeDescriptor::VarLenText => 0,
        }
    }

    /// Short class name for diagnostics.
    pub fn class_name(&self) -> &'static str {
        match self {
            TypeDescriptor::Int { .. } => "Int",
            TypeDescriptor::Float { .. } => "Float",
            TypeDescriptor::Compound { .. } => "Compound",
            TypeDescriptor::VarLenText => "VarLenText",
        }
    }

    /// `true` for fixed-width numeric classes.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypeDescriptor::Int { .. } | TypeDescriptor::Float { .. }
        )
    }

    /// `true` for the variable-length text class.
    pub fn is_text(&self) -> bool {
        matches!(self, TypeDescriptor::VarLenText)
    }
}

/// Decide whether stored elements of `src` can be converted into `dst`.
///
/// Numeric classes convert freely (widening, narrowing and float/integer
/// crossings are all allowed; narrowing truncates). Compounds convert when
/// their members line up by name and each member pair converts. Text only
/// converts to text. Everything else is rejected — in particular a compound
/// (complex pair) never converts to a plain numeric scalar.
pub fn can_convert(src: &TypeDescriptor, dst: &TypeDescriptor) -> bool {
    match (src, dst) {
        (s, d) if s.is_numeric() && d.is_numeric() => true,
        (
            TypeDescriptor::Compound { members: sm, .. },
            TypeDescriptor::Compound { members: dm, .. },
        ) => {
            sm.len() == dm.len()
                && sm.iter().zip(dm.iter()).all(|(a, b)| {
                    a.name == b.name && can_convert(&a.dtype, &b.dtype)
                })
        }
        (TypeDescriptor::VarLenText, TypeDescriptor::VarLenText) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complex(width: usize) -> TypeDescriptor {
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

    #[test]
    fn numeric_conversions_allowed() {
        let f64d = TypeDescriptor::Float { size: 8 };
        let i32d = TypeDescriptor::Int { size: 4, signed: true };
        let u8d = TypeDescriptor::Int { size: 1, signed: false };
        assert!(can_convert(&f64d, &i32d));
        assert!(can_convert(&i32d, &f64d));
        assert!(can_convert(&u8d, &f64d));
    }

    #[test]
    fn compound_to_scalar_rejected() {
        let f64d = TypeDescriptor::Float { size: 8 };
        assert!(!can_convert(&complex(8), &f64d));
        assert!(!can_convert(&f64d, &complex(8)));
    }

    #[test]
    fn compound_width_crossing_allowed() {
        assert!(can_convert(&complex(8), &complex(4)));
        assert!(can_convert(&complex(4), &complex(8)));
    }

    #[test]
    fn text_only_converts_to_text() {
        let f64d = TypeDescriptor::Float { size: 8 };
        assert!(can_convert(&TypeDescriptor::VarLenText, &TypeDescriptor::VarLenText));
        assert!(!can_convert(&TypeDescriptor::VarLenText, &f64d));
        assert!(!can_convert(&f64d, &TypeDescriptor::VarLenText));
    }
}
