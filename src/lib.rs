//! phillip bridges three views of the same data: native C++ types as the
//! host toolchain compiles them, array-library dtypes and FFI call types.
//!
//! A session starts with a [`TypeContext`]. Types are probed from the
//! toolchain on demand, composites are turned into matching definitions for
//! all three systems, and a [`ModuleGenerator`] renders a translation unit
//! that [`compile_module`] builds, loads and binds for dynamic calls.

pub mod byte_array;
pub mod error;
pub mod pipeline;

#[cfg(test)]
mod testing;

pub use byte_array::{ByteArrayLibrary, ByteBuffer, byte_array_module, byte_array_type};
pub use error::{Error, Result};
pub use pipeline::{BuiltModule, build_module, compile_module};

pub use phillip_build::{
    ArtifactKind, BuildError, BuildOrchestrator, CompiledArtifact, ExtensionArgs, LoadedLibrary,
    SourceSet, UnloadOutcome, generate_extension_args,
};
pub use phillip_codegen::{
    ArrayLibDtype, BoundModule, CodegenError, CompositeType, Function, Interface, MemberType,
    ModuleGenerator, Packing, Parameter, StructId, StructureGenerator, Variable,
};
pub use phillip_config::{BuildConfig, OptLevel, TargetTriple};
pub use phillip_ffi::{DynamicFunction, FfiError, FfiShape, ScalarKind, Signature, Value};
pub use phillip_types::{
    NumericKind, ResolvedScalar, Signage, TypeContext, TypeDescriptor, TypeError, TypeInfo,
    TypeMap, TypeSystem,
};
pub use phillip_utils::init_logging;
