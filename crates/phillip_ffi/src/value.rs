use crate::error::FfiError;
use crate::shape::{FfiShape, FieldKind, ScalarKind, StructShape};

/// A value crossing a dynamic call.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Pointer(usize),
    /// Fields by name, in declaration order.
    Struct(Vec<(String, Value)>),
    Array(Vec<Value>),
}

impl Value {
    pub fn field(&self, name: &str) -> Option<&Self> {
        match self {
            Self::Struct(fields) => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Self::Bool(v) => Some(i128::from(v)),
            Self::I8(v) => Some(i128::from(v)),
            Self::U8(v) => Some(i128::from(v)),
            Self::I16(v) => Some(i128::from(v)),
            Self::U16(v) => Some(i128::from(v)),
            Self::I32(v) => Some(i128::from(v)),
            Self::U32(v) => Some(i128::from(v)),
            Self::I64(v) => Some(i128::from(v)),
            Self::U64(v) => Some(i128::from(v)),
            Self::Pointer(v) => i128::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::F32(v) => Some(f64::from(v)),
            Self::F64(v) => Some(v),
            _ => None,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool(_) => "bool",
            Self::I8(_) => "i8",
            Self::U8(_) => "u8",
            Self::I16(_) => "i16",
            Self::U16(_) => "u16",
            Self::I32(_) => "i32",
            Self::U32(_) => "u32",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Pointer(_) => "pointer",
            Self::Struct(_) => "struct",
            Self::Array(_) => "array",
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Self::$variant(value)
            }
        })*
    };
}

impl_from!(
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);

fn mismatch(expected: impl Into<String>, value: &Value) -> FfiError {
    FfiError::ArgumentMismatch {
        expected: expected.into(),
        found: value.kind_name().to_string(),
    }
}

/// Write `value` into `out` (at least `shape.size()` bytes) in native layout.
pub fn encode(shape: &FfiShape, value: &Value, out: &mut [u8]) -> Result<(), FfiError> {
    match shape {
        FfiShape::Void => match value {
            Value::Unit => Ok(()),
            other => Err(mismatch("unit", other)),
        },
        FfiShape::Scalar(kind) => encode_scalar(*kind, value, out),
        FfiShape::Struct(shape) => encode_struct(shape, value, out),
    }
}

fn encode_struct(shape: &StructShape, value: &Value, out: &mut [u8]) -> Result<(), FfiError> {
    let Value::Struct(_) = value else {
        return Err(mismatch(format!("struct {}", shape.name), value));
    };

    for field in &shape.fields {
        let field_value = value.field(&field.name).ok_or_else(|| FfiError::ArgumentMismatch {
            expected: format!("field `{}` of {}", field.name, shape.name),
            found: "nothing".to_string(),
        })?;
        let stride = field.kind.size();

        if field.count > 1 {
            let Value::Array(items) = field_value else {
                return Err(mismatch(format!("array of {}", field.count), field_value));
            };
            if items.len() != field.count {
                return Err(FfiError::ArgumentMismatch {
                    expected: format!("{} elements for `{}`", field.count, field.name),
                    found: format!("{} elements", items.len()),
                });
            }
            for (idx, item) in items.iter().enumerate() {
                let start = field.offset + idx * stride;
                encode_field(&field.kind, item, &mut out[start..start + stride])?;
            }
        } else {
            let start = field.offset;
            encode_field(&field.kind, field_value, &mut out[start..start + stride])?;
        }
    }
    Ok(())
}

fn encode_field(kind: &FieldKind, value: &Value, out: &mut [u8]) -> Result<(), FfiError> {
    match kind {
        FieldKind::Scalar(kind) => encode_scalar(*kind, value, out),
        FieldKind::Struct(shape) => encode_struct(shape, value, out),
    }
}

fn encode_scalar(kind: ScalarKind, value: &Value, out: &mut [u8]) -> Result<(), FfiError> {
    match kind {
        ScalarKind::F32 => {
            #[allow(clippy::cast_possible_truncation)]
            let v = float(kind, value)? as f32;
            write(out, &v.to_ne_bytes());
        }
        ScalarKind::F64 => write(out, &float(kind, value)?.to_ne_bytes()),
        ScalarKind::I8 => write(out, &integer::<i8>(kind, value)?.to_ne_bytes()),
        ScalarKind::U8 => write(out, &integer::<u8>(kind, value)?.to_ne_bytes()),
        ScalarKind::I16 => write(out, &integer::<i16>(kind, value)?.to_ne_bytes()),
        ScalarKind::U16 => write(out, &integer::<u16>(kind, value)?.to_ne_bytes()),
        ScalarKind::I32 => write(out, &integer::<i32>(kind, value)?.to_ne_bytes()),
        ScalarKind::U32 => write(out, &integer::<u32>(kind, value)?.to_ne_bytes()),
        ScalarKind::I64 => write(out, &integer::<i64>(kind, value)?.to_ne_bytes()),
        ScalarKind::U64 => write(out, &integer::<u64>(kind, value)?.to_ne_bytes()),
        ScalarKind::Pointer => write(out, &integer::<usize>(kind, value)?.to_ne_bytes()),
    }
    Ok(())
}

fn label(kind: ScalarKind) -> String {
    format!("{kind:?}").to_lowercase()
}

fn float(kind: ScalarKind, value: &Value) -> Result<f64, FfiError> {
    value.as_f64().ok_or_else(|| mismatch(label(kind), value))
}

fn integer<T: TryFrom<i128>>(kind: ScalarKind, value: &Value) -> Result<T, FfiError> {
    let v = value.as_i128().ok_or_else(|| mismatch(label(kind), value))?;
    T::try_from(v).map_err(|_| FfiError::ArgumentMismatch {
        expected: label(kind),
        found: format!("{v} (out of range)"),
    })
}

fn write(out: &mut [u8], bytes: &[u8]) {
    out[..bytes.len()].copy_from_slice(bytes);
}

/// Read a value of `shape` back out of native-layout bytes.
pub fn decode(shape: &FfiShape, bytes: &[u8]) -> Value {
    match shape {
        FfiShape::Void => Value::Unit,
        FfiShape::Scalar(kind) => decode_scalar(*kind, bytes),
        FfiShape::Struct(shape) => decode_struct(shape, bytes),
    }
}

fn decode_struct(shape: &StructShape, bytes: &[u8]) -> Value {
    let fields = shape
        .fields
        .iter()
        .map(|field| {
            let stride = field.kind.size();
            let read = |idx: usize| {
                let start = field.offset + idx * stride;
                let slice = &bytes[start..start + stride];
                match &field.kind {
                    FieldKind::Scalar(kind) => decode_scalar(*kind, slice),
                    FieldKind::Struct(inner) => decode_struct(inner, slice),
                }
            };
            let value = if field.count > 1 {
                Value::Array((0..field.count).map(read).collect())
            } else {
                read(0)
            };
            (field.name.clone(), value)
        })
        .collect();
    Value::Struct(fields)
}

fn decode_scalar(kind: ScalarKind, bytes: &[u8]) -> Value {
    fn take<const N: usize>(bytes: &[u8]) -> [u8; N] {
        let mut buf = [0u8; N];
        buf.copy_from_slice(&bytes[..N]);
        buf
    }

    match kind {
        ScalarKind::I8 => Value::I8(i8::from_ne_bytes(take(bytes))),
        ScalarKind::U8 => Value::U8(u8::from_ne_bytes(take(bytes))),
        ScalarKind::I16 => Value::I16(i16::from_ne_bytes(take(bytes))),
        ScalarKind::U16 => Value::U16(u16::from_ne_bytes(take(bytes))),
        ScalarKind::I32 => Value::I32(i32::from_ne_bytes(take(bytes))),
        ScalarKind::U32 => Value::U32(u32::from_ne_bytes(take(bytes))),
        ScalarKind::I64 => Value::I64(i64::from_ne_bytes(take(bytes))),
        ScalarKind::U64 => Value::U64(u64::from_ne_bytes(take(bytes))),
        ScalarKind::F32 => Value::F32(f32::from_ne_bytes(take(bytes))),
        ScalarKind::F64 => Value::F64(f64::from_ne_bytes(take(bytes))),
        ScalarKind::Pointer => Value::Pointer(usize::from_ne_bytes(take(bytes))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::FieldShape;

    fn vec3() -> StructShape {
        StructShape {
            name: "vec3".to_string(),
            fields: vec![
                FieldShape {
                    name: "tag".to_string(),
                    kind: FieldKind::Scalar(ScalarKind::U8),
                    count: 1,
                    offset: 0,
                },
                FieldShape {
                    name: "xyz".to_string(),
                    kind: FieldKind::Scalar(ScalarKind::F32),
                    count: 3,
                    offset: 4,
                },
            ],
            size: 16,
            align: 4,
        }
    }

    #[test]
    fn test_struct_fields_land_at_offsets() {
        let shape = FfiShape::Struct(vec3());
        let value = Value::Struct(vec![
            ("tag".to_string(), Value::U8(7)),
            (
                "xyz".to_string(),
                Value::Array(vec![Value::F32(1.0), Value::F32(2.5), Value::F32(-3.0)]),
            ),
        ]);

        let mut bytes = vec![0u8; shape.size()];
        encode(&shape, &value, &mut bytes).unwrap();
        assert_eq!(bytes[0], 7);
        assert_eq!(&bytes[8..12], &2.5f32.to_ne_bytes());
        assert_eq!(decode(&shape, &bytes), value);
    }

    #[test]
    fn test_integers_are_range_checked() {
        let mut bytes = [0u8; 8];
        assert!(encode(&FfiShape::Scalar(ScalarKind::U8), &Value::I32(255), &mut bytes).is_ok());
        assert_eq!(bytes[0], 255);

        let err = encode(&FfiShape::Scalar(ScalarKind::U8), &Value::I32(256), &mut bytes).unwrap_err();
        assert!(matches!(err, FfiError::ArgumentMismatch { .. }));
        assert!(encode(&FfiShape::Scalar(ScalarKind::I32), &Value::F64(1.0), &mut bytes).is_err());
    }

    #[test]
    fn test_missing_field_is_mismatch() {
        let shape = FfiShape::Struct(vec3());
        let value = Value::Struct(vec![("tag".to_string(), Value::U8(1))]);
        let mut bytes = vec![0u8; shape.size()];

        let err = encode(&shape, &value, &mut bytes).unwrap_err();
        assert!(err.to_string().contains("xyz"));
    }

    #[test]
    fn test_wrong_array_length_is_mismatch() {
        let shape = FfiShape::Struct(vec3());
        let value = Value::Struct(vec![
            ("tag".to_string(), Value::U8(1)),
            ("xyz".to_string(), Value::Array(vec![Value::F32(1.0)])),
        ]);
        let mut bytes = vec![0u8; shape.size()];
        assert!(encode(&shape, &value, &mut bytes).is_err());
    }
}
