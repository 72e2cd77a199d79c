//! Type identities across the native toolchain, the array library and the
//! FFI runtime, plus the probe that discovers native sizes.

pub mod catalog;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod probe;
pub mod registry;
pub mod typemap;

pub use context::{ResolvedScalar, TypeContext};
pub use descriptor::{Family, NumericKind, Signage, TypeDescriptor, TypeInfo, TypeSystem};
pub use error::TypeError;
pub use probe::NativeProbe;
pub use registry::TypeRegistry;
pub use typemap::{TypeMap, TypeMapBuilder, build_type_map};
