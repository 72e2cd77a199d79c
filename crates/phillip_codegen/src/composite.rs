use std::sync::Arc;

use phillip_types::TypeDescriptor;

use crate::error::CodegenError;

/// Alignment policy of a composite, applied identically to the native,
/// ArrayLib and FFI definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Packing {
    /// The native compiler's natural alignment.
    #[default]
    Natural,
    /// Every member alignment capped at `n` bytes (`#pragma pack(n)`).
    /// `n` must be one of [`Packing::VALID`].
    Packed(u32),
}

impl Packing {
    /// Pack values the native compiler honours.
    pub const VALID: [u32; 5] = [1, 2, 4, 8, 16];

    pub fn validate(self) -> Result<Self, CodegenError> {
        match self {
            Self::Packed(n) if !Self::VALID.contains(&n) => Err(CodegenError::InvalidPacking { value: n }),
            _ => Ok(self),
        }
    }

    pub fn pragma(self) -> Option<u32> {
        match self {
            Self::Natural => None,
            Self::Packed(n) => Some(n),
        }
    }

    pub(crate) fn tag(self) -> String {
        match self {
            Self::Natural => "natural".to_string(),
            Self::Packed(n) => format!("packed:{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberType {
    Scalar(TypeDescriptor),
    Composite(Arc<CompositeType>),
    /// Pointer to a composite; the pointee is still defined before its user.
    CompositePointer(Arc<CompositeType>),
}

impl From<TypeDescriptor> for MemberType {
    fn from(descriptor: TypeDescriptor) -> Self {
        Self::Scalar(descriptor)
    }
}

impl From<CompositeType> for MemberType {
    fn from(composite: CompositeType) -> Self {
        Self::Composite(Arc::new(composite))
    }
}

impl From<Arc<CompositeType>> for MemberType {
    fn from(composite: Arc<CompositeType>) -> Self {
        Self::Composite(composite)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: MemberType,
    /// `1` for a plain member, `n > 1` for a fixed-size array.
    pub count: usize,
}

/// An ordered, structurally compared record type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CompositeType {
    fields: Vec<Field>,
    packing: Packing,
}

impl CompositeType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(self, name: &str, ty: impl Into<MemberType>) -> Self {
        self.array(name, ty, 1)
    }

    pub fn array(mut self, name: &str, ty: impl Into<MemberType>, count: usize) -> Self {
        self.fields.push(Field {
            name: name.to_string(),
            ty: ty.into(),
            count: count.max(1),
        });
        self
    }

    pub fn pointer(self, name: &str, pointee: Arc<Self>) -> Self {
        self.field(name, MemberType::CompositePointer(pointee))
    }

    pub fn packed(mut self, packing: Packing) -> Self {
        self.packing = packing;
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn packing(&self) -> Packing {
        self.packing
    }

    /// libffi only lays out naturally aligned structs.
    pub fn is_ffi_by_value(&self) -> bool {
        self.packing == Packing::Natural
            && self.fields.iter().all(|field| match &field.ty {
                MemberType::Composite(child) => child.is_ffi_by_value(),
                MemberType::Scalar(_) | MemberType::CompositePointer(_) => true,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_structural() {
        let a = CompositeType::new()
            .field("x", TypeDescriptor::native("float"))
            .field("y", TypeDescriptor::native("float"));
        let b = CompositeType::new()
            .field("x", TypeDescriptor::native("float"))
            .field("y", TypeDescriptor::native("float"));
        assert_eq!(a, b);
        assert_ne!(a, b.clone().packed(Packing::Packed(1)));
    }

    #[test]
    fn test_only_power_of_two_packing_is_valid() {
        for n in Packing::VALID {
            assert_eq!(Packing::Packed(n).validate().unwrap(), Packing::Packed(n));
        }
        assert_eq!(Packing::Natural.validate().unwrap(), Packing::Natural);
        for n in [0, 3, 6, 12, 32] {
            assert!(matches!(
                Packing::Packed(n).validate(),
                Err(CodegenError::InvalidPacking { value }) if value == n
            ));
        }
    }

    #[test]
    fn test_packed_child_blocks_by_value() {
        let child = CompositeType::new()
            .field("tag", TypeDescriptor::native("char"))
            .packed(Packing::Packed(1));
        let parent = CompositeType::new().field("child", child.clone());
        assert!(!parent.is_ffi_by_value());

        let via_pointer = CompositeType::new().pointer("child", Arc::new(child));
        assert!(via_pointer.is_ffi_by_value());
    }
}
