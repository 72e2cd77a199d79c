//! Dynamic calls into loaded libraries: value marshaling and libffi call
//! interfaces built from runtime signatures.

pub mod call;
pub mod error;
pub mod shape;
pub mod value;

pub use call::DynamicFunction;
pub use error::FfiError;
pub use shape::{FfiShape, FieldKind, FieldShape, ScalarKind, Signature, StructShape};
pub use value::Value;
