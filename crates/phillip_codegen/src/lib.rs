//! Source generation for composite types, functions and `extern "C"`
//! interfaces, and binding of the compiled result.

pub mod composite;
pub mod error;
pub mod function;
pub mod layout;
pub mod module;
pub mod structure;
pub mod text;

#[cfg(test)]
mod fixtures;

pub use composite::{CompositeType, Field, MemberType, Packing};
pub use error::CodegenError;
pub use function::{Function, Interface, Parameter, Variable};
pub use layout::{Layout, MemberLayout, compute_layout};
pub use module::{BoundModule, ModuleGenerator};
pub use structure::{ArrayLibDtype, ArrayLibField, ArrayLibFormat, StructId, StructureGenerator};
