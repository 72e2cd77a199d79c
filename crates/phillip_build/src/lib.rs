//! Native build orchestration: compile generated translation units with the
//! host toolchain and load the resulting artifacts.
//!
//! A build moves through `SourceSet` → `CompiledArtifact` → `LoadedLibrary`;
//! each stage is its own type so an artifact cannot be loaded before it has
//! been compiled, and a library cannot be used after it was unloaded.

pub mod compile;
pub mod error;
pub mod library;
pub mod source;
pub mod toolchain;

pub use compile::{ArtifactKind, BuildOrchestrator, CompiledArtifact, ExtensionArgs, generate_extension_args};
pub use error::BuildError;
pub use library::{LoadedLibrary, UnloadOutcome};
pub use source::{SourceListing, SourceSet};
pub use toolchain::{ToolchainOutput, Toolchain};
