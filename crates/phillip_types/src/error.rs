use phillip_build::BuildError;
use phillip_templates::TemplateError;

use crate::descriptor::{Family, TypeDescriptor, TypeInfo, TypeSystem};

#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    #[error("{descriptor} is already registered as {existing}, refusing {attempted}")]
    DuplicateRegistration {
        descriptor: TypeDescriptor,
        existing: TypeInfo,
        attempted: TypeInfo,
    },

    #[error("several {target} types claim the {family} family: {}", join(.candidates))]
    AmbiguousMapping {
        target: TypeSystem,
        family: Family,
        candidates: Vec<TypeDescriptor>,
    },

    #[error("no {target} counterpart for: {}", join(.descriptors))]
    UnresolvedType {
        target: TypeSystem,
        descriptors: Vec<TypeDescriptor>,
    },

    #[error("{descriptor} is not registered")]
    Unregistered { descriptor: TypeDescriptor },

    #[error("{descriptor} has no known size")]
    Unsized { descriptor: TypeDescriptor },

    /// The toolchain rejected the probe program, typically an unknown type name.
    #[error("probe program failed to compile:\n{diagnostics}\n--- probe program ---\n{program}")]
    ProbeCompilation { diagnostics: String, program: String },

    #[error("probe program could not be run or its output was unusable: {message}\n--- probe program ---\n{program}")]
    ProbeExecution { message: String, program: String },

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

fn join(descriptors: &[TypeDescriptor]) -> String {
    descriptors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
