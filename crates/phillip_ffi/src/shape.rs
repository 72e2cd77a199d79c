use libffi::middle::Type;
use phillip_types::{NumericKind, Signage, TypeInfo};

use crate::error::FfiError;

/// A scalar the FFI layer can move across a call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Pointer,
}

impl ScalarKind {
    pub fn from_info(info: &TypeInfo) -> Result<Self, FfiError> {
        let size = info.size_bytes.unwrap_or(0);
        let kind = match (info.numeric_kind, info.signage, size) {
            (NumericKind::Integer, Signage::Unsigned, 1) => Self::U8,
            (NumericKind::Integer, Signage::Unsigned, 2) => Self::U16,
            (NumericKind::Integer, Signage::Unsigned, 4) => Self::U32,
            (NumericKind::Integer, Signage::Unsigned, 8) => Self::U64,
            (NumericKind::Integer, _, 1) => Self::I8,
            (NumericKind::Integer, _, 2) => Self::I16,
            (NumericKind::Integer, _, 4) => Self::I32,
            (NumericKind::Integer, _, 8) => Self::I64,
            (NumericKind::Float, _, 4) => Self::F32,
            (NumericKind::Float, _, 8) => Self::F64,
            (NumericKind::Other, Signage::None, size) if size == size_of::<usize>() => {
                Self::Pointer
            }
            _ => {
                return Err(FfiError::UnsupportedMarshal {
                    what: info.to_string(),
                });
            }
        };
        Ok(kind)
    }

    pub fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
            Self::Pointer => size_of::<usize>(),
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, Self::F32 | Self::F64 | Self::Pointer)
    }

    pub fn ffi_type(self) -> Type {
        match self {
            Self::I8 => Type::i8(),
            Self::U8 => Type::u8(),
            Self::I16 => Type::i16(),
            Self::U16 => Type::u16(),
            Self::I32 => Type::i32(),
            Self::U32 => Type::u32(),
            Self::I64 => Type::i64(),
            Self::U64 => Type::u64(),
            Self::F32 => Type::f32(),
            Self::F64 => Type::f64(),
            Self::Pointer => Type::pointer(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarKind),
    Struct(StructShape),
}

impl FieldKind {
    pub fn size(&self) -> usize {
        match self {
            Self::Scalar(kind) => kind.size(),
            Self::Struct(shape) => shape.size,
        }
    }

    fn ffi_type(&self) -> Type {
        match self {
            Self::Scalar(kind) => kind.ffi_type(),
            Self::Struct(shape) => shape.ffi_type(),
        }
    }
}

/// A struct field at a fixed offset; `count > 1` is an inline array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldShape {
    pub name: String,
    pub kind: FieldKind,
    pub count: usize,
    pub offset: usize,
}

/// Byte layout of a struct passed or returned by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructShape {
    pub name: String,
    pub fields: Vec<FieldShape>,
    pub size: usize,
    pub align: usize,
}

impl StructShape {
    /// Arrays are expanded into repeated elements; libffi has no array type.
    pub fn ffi_type(&self) -> Type {
        let elements = self
            .fields
            .iter()
            .flat_map(|field| (0..field.count.max(1)).map(|_| field.kind.ffi_type()))
            .collect::<Vec<_>>();
        Type::structure(elements)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FfiShape {
    Void,
    Scalar(ScalarKind),
    Struct(StructShape),
}

impl FfiShape {
    pub fn size(&self) -> usize {
        match self {
            Self::Void => 0,
            Self::Scalar(kind) => kind.size(),
            Self::Struct(shape) => shape.size,
        }
    }

    pub fn ffi_type(&self) -> Type {
        match self {
            Self::Void => Type::void(),
            Self::Scalar(kind) => kind.ffi_type(),
            Self::Struct(shape) => shape.ffi_type(),
        }
    }
}

/// Parameter and result shapes of one callable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<FfiShape>,
    pub result: FfiShape,
}

impl Signature {
    pub fn new(params: Vec<FfiShape>, result: FfiShape) -> Self {
        Self { params, result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_kind_from_info() {
        assert_eq!(ScalarKind::from_info(&TypeInfo::signed(4)).unwrap(), ScalarKind::I32);
        assert_eq!(ScalarKind::from_info(&TypeInfo::unsigned(1)).unwrap(), ScalarKind::U8);
        assert_eq!(ScalarKind::from_info(&TypeInfo::float(8)).unwrap(), ScalarKind::F64);
        assert_eq!(ScalarKind::from_info(&TypeInfo::pointer()).unwrap(), ScalarKind::Pointer);
    }

    #[test]
    fn test_wide_float_is_unsupported() {
        let err = ScalarKind::from_info(&TypeInfo::float(16)).unwrap_err();
        assert!(matches!(err, FfiError::UnsupportedMarshal { .. }));
    }

    #[test]
    fn test_shape_sizes() {
        let pair = StructShape {
            name: "pair".to_string(),
            fields: vec![
                FieldShape {
                    name: "x".to_string(),
                    kind: FieldKind::Scalar(ScalarKind::F32),
                    count: 1,
                    offset: 0,
                },
                FieldShape {
                    name: "y".to_string(),
                    kind: FieldKind::Scalar(ScalarKind::F32),
                    count: 1,
                    offset: 4,
                },
            ],
            size: 8,
            align: 4,
        };
        assert_eq!(FfiShape::Struct(pair).size(), 8);
        assert_eq!(FfiShape::Void.size(), 0);
    }
}
