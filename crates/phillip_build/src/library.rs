use std::ffi::c_void;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use tracing::{debug, warn};

use crate::error::BuildError;

/// A loaded shared library. Clones share one handle; the library stays
/// mapped while any clone (or any function bound from it) is alive.
#[derive(Clone)]
pub struct LoadedLibrary {
    inner: Arc<Library>,
    path: PathBuf,
    exports: Vec<String>,
}

/// What happened to the native handle on `unload`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadOutcome {
    Released,
    /// Other handles are alive, or the platform refused to unmap it.
    Retained,
}

impl LoadedLibrary {
    pub(crate) fn open(path: &Path, exports: Vec<String>) -> Result<Self, BuildError> {
        if !path.exists() {
            return Err(BuildError::Load {
                path: path.to_path_buf(),
                message: "no such file".to_string(),
            });
        }

        // SAFETY: generated libraries have no initialisers beyond static data.
        let library = unsafe { Library::new(path) }.map_err(|err| BuildError::Load {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        debug!(path = %path.display(), "loaded library");

        Ok(Self {
            inner: Arc::new(library),
            path: path.to_path_buf(),
            exports,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Symbols the build asked to export.
    pub fn exports(&self) -> &[String] {
        &self.exports
    }

    /// Address of an exported symbol, or `None` when it is absent.
    pub fn symbol_address(&self, name: &str) -> Option<*const c_void> {
        // SAFETY: the address is only read here; callers that call through it
        // must supply the matching signature.
        let symbol = unsafe { self.inner.get::<unsafe extern "C" fn()>(name.as_bytes()) }.ok()?;
        let address = *symbol as *const c_void;
        (!address.is_null()).then_some(address)
    }

    pub fn has_symbol(&self, name: &str) -> bool {
        self.symbol_address(name).is_some()
    }

    pub fn unload(self) -> UnloadOutcome {
        let Self { inner, path, .. } = self;
        match Arc::try_unwrap(inner) {
            Ok(library) => match library.close() {
                Ok(()) => {
                    debug!(path = %path.display(), "released library");
                    UnloadOutcome::Released
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "library could not be closed");
                    UnloadOutcome::Retained
                }
            },
            Err(_shared) => {
                debug!(path = %path.display(), "library still referenced, retained");
                UnloadOutcome::Retained
            }
        }
    }
}

impl fmt::Debug for LoadedLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedLibrary")
            .field("path", &self.path)
            .field("exports", &self.exports)
            .finish_non_exhaustive()
    }
}
