use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The three type systems a descriptor can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeSystem {
    Native,
    ArrayLib,
    Ffi,
}

impl TypeSystem {
    pub const ALL: [Self; 3] = [Self::Native, Self::ArrayLib, Self::Ffi];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::ArrayLib => "arraylib",
            Self::Ffi => "ffi",
        }
    }
}

impl fmt::Display for TypeSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "arraylib" | "array" | "numpy" => Ok(Self::ArrayLib),
            "ffi" | "ctypes" => Ok(Self::Ffi),
            other => Err(format!("unknown type system `{other}`")),
        }
    }
}

/// A type name inside one type system.
///
/// Descriptors from different systems are never equal; equivalence is only
/// established through registered [`TypeInfo`](crate::TypeInfo) families.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub system: TypeSystem,
    pub name: String,
    pub is_pointer: bool,
}

const FFI_POINTER: &str = "c_void_p";

impl TypeDescriptor {
    /// Native names are normalised: runs of whitespace collapse and trailing
    /// `*` become `T *` / `T **`, which also sets `is_pointer`.
    pub fn native(name: &str) -> Self {
        let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
        let base = collapsed.trim_end_matches(|c: char| c == '*' || c.is_whitespace());
        let depth = collapsed[base.len()..].matches('*').count();

        let name = if depth == 0 {
            base.to_string()
        } else {
            format!("{base} {}", "*".repeat(depth))
        };

        Self {
            system: TypeSystem::Native,
            name,
            is_pointer: depth > 0,
        }
    }

    pub fn arraylib(name: &str) -> Self {
        Self {
            system: TypeSystem::ArrayLib,
            name: name.trim().to_string(),
            is_pointer: false,
        }
    }

    pub fn ffi(name: &str) -> Self {
        let name = name.trim();
        Self {
            system: TypeSystem::Ffi,
            name: name.to_string(),
            is_pointer: name == FFI_POINTER,
        }
    }

    pub fn ffi_pointer() -> Self {
        Self::ffi(FFI_POINTER)
    }

    pub fn new(system: TypeSystem, name: &str) -> Self {
        match system {
            TypeSystem::Native => Self::native(name),
            TypeSystem::ArrayLib => Self::arraylib(name),
            TypeSystem::Ffi => Self::ffi(name),
        }
    }

    /// Strip one level of indirection from a native pointer descriptor.
    pub fn pointee(&self) -> Option<Self> {
        if !self.is_pointer || self.system != TypeSystem::Native {
            return None;
        }
        let stripped = self.name.strip_suffix('*')?;
        Some(Self::native(stripped))
    }

    pub fn pointer_to(&self) -> Self {
        match self.system {
            TypeSystem::Native => Self::native(&format!("{} *", self.name)),
            TypeSystem::ArrayLib | TypeSystem::Ffi => Self::ffi_pointer(),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.system, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signage {
    Signed,
    Unsigned,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericKind {
    Integer,
    Float,
    Other,
}

/// Ground-truth metadata for one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeInfo {
    pub signage: Signage,
    pub numeric_kind: NumericKind,
    pub size_bytes: Option<usize>,
}

impl TypeInfo {
    pub const fn new(signage: Signage, numeric_kind: NumericKind, size_bytes: usize) -> Self {
        Self {
            signage,
            numeric_kind,
            size_bytes: Some(size_bytes),
        }
    }

    pub const fn signed(size_bytes: usize) -> Self {
        Self::new(Signage::Signed, NumericKind::Integer, size_bytes)
    }

    pub const fn unsigned(size_bytes: usize) -> Self {
        Self::new(Signage::Unsigned, NumericKind::Integer, size_bytes)
    }

    pub const fn float(size_bytes: usize) -> Self {
        Self::new(Signage::Signed, NumericKind::Float, size_bytes)
    }

    pub const fn pointer() -> Self {
        Self::new(Signage::None, NumericKind::Other, size_of::<usize>())
    }

    pub fn family(&self) -> Option<Family> {
        self.size_bytes.map(|size_bytes| Family {
            signage: self.signage,
            numeric_kind: self.numeric_kind,
            size_bytes,
        })
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.family() {
            Some(family) => family.fmt(f),
            None => write!(f, "{:?} {:?} (unsized)", self.signage, self.numeric_kind),
        }
    }
}

/// The equivalence class used to pair descriptors across systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Family {
    pub signage: Signage,
    pub numeric_kind: NumericKind,
    pub size_bytes: usize,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signage = match self.signage {
            Signage::Signed => "signed ",
            Signage::Unsigned => "unsigned ",
            Signage::None => "",
        };
        let kind = match self.numeric_kind {
            NumericKind::Integer => "integer",
            NumericKind::Float => "float",
            NumericKind::Other => "other",
        };
        write!(f, "{signage}{kind} ({} bytes)", self.size_bytes)
    }
}
