use std::ffi::c_void;
use std::fmt;

use libffi::middle::{Cif, CodePtr};
use phillip_build::LoadedLibrary;
use tracing::debug;

use crate::error::FfiError;
use crate::shape::{FfiShape, ScalarKind, Signature};
use crate::value::{Value, decode, encode};

const WORD: usize = size_of::<u64>();

/// A native function bound to a runtime signature.
///
/// Holds a handle to its library, so the code stays mapped for as long as
/// the function exists.
pub struct DynamicFunction {
    name: String,
    signature: Signature,
    cif: Cif,
    code: CodePtr,
    _library: Option<LoadedLibrary>,
}

impl DynamicFunction {
    /// Bind the exported symbol `name` of `library`.
    ///
    /// # Safety
    /// `signature` must describe the symbol's real C signature.
    pub unsafe fn bind(
        library: &LoadedLibrary,
        name: &str,
        signature: Signature,
    ) -> Result<Self, FfiError> {
        let address = library
            .symbol_address(name)
            .ok_or_else(|| FfiError::SymbolNotFound {
                symbol: name.to_string(),
                library: library.path().display().to_string(),
            })?;
        debug!(symbol = name, library = %library.path().display(), "bound symbol");
        // SAFETY: forwarded to the caller.
        unsafe { Self::from_address(name, address, signature, Some(library.clone())) }
    }

    /// # Safety
    /// `address` must be a function with the C signature `signature`, valid
    /// for as long as the returned value (or `keepalive`) lives.
    pub unsafe fn from_address(
        name: &str,
        address: *const c_void,
        signature: Signature,
        keepalive: Option<LoadedLibrary>,
    ) -> Result<Self, FfiError> {
        if signature.params.iter().any(|param| *param == FfiShape::Void) {
            return Err(FfiError::UnsupportedMarshal {
                what: format!("void parameter of `{name}`"),
            });
        }

        let cif = Cif::new(
            signature.params.iter().map(FfiShape::ffi_type).collect::<Vec<_>>(),
            signature.result.ffi_type(),
        );

        Ok(Self {
            name: name.to_string(),
            signature,
            cif,
            code: CodePtr::from_ptr(address),
            _library: keepalive,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Marshal `args`, call through libffi and unmarshal the result.
    pub fn call(&self, args: &[Value]) -> Result<Value, FfiError> {
        if args.len() != self.signature.params.len() {
            return Err(FfiError::ArgumentMismatch {
                expected: format!("{} arguments for `{}`", self.signature.params.len(), self.name),
                found: format!("{} arguments", args.len()),
            });
        }

        let mut storage = self
            .signature
            .params
            .iter()
            .zip(args)
            .map(|(shape, value)| {
                let mut bytes = vec![0u8; shape.size()];
                encode(shape, value, &mut bytes)?;
                Ok(to_words(&bytes))
            })
            .collect::<Result<Vec<_>, FfiError>>()?;

        let mut arg_ptrs = storage
            .iter_mut()
            .map(|words| words.as_mut_ptr().cast::<c_void>())
            .collect::<Vec<_>>();

        // libffi writes at least one full register for small returns
        let result_words = self.signature.result.size().max(WORD).div_ceil(WORD) + 1;
        let mut result = vec![0u64; result_words];

        // SAFETY: `cif` was prepared from `signature`, every argument buffer
        // holds at least the size libffi reads for its type, and the result
        // buffer is word aligned and larger than the return type.
        unsafe {
            libffi::raw::ffi_call(
                self.cif.as_raw_ptr(),
                Some(*self.code.as_fun()),
                result.as_mut_ptr().cast::<c_void>(),
                arg_ptrs.as_mut_ptr(),
            );
        }

        let bytes = result.iter().flat_map(|word| word.to_ne_bytes()).collect::<Vec<_>>();
        Ok(read_return(&self.signature.result, &bytes))
    }
}

impl fmt::Debug for DynamicFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicFunction")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

fn to_words(bytes: &[u8]) -> Vec<u64> {
    let mut words = vec![0u64; bytes.len().div_ceil(WORD).max(1)];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks(WORD)) {
        let mut buf = [0u8; WORD];
        buf[..chunk.len()].copy_from_slice(chunk);
        *word = u64::from_ne_bytes(buf);
    }
    words
}

/// Integer returns narrower than a register come back widened to `ffi_arg`.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn read_return(shape: &FfiShape, bytes: &[u8]) -> Value {
    let FfiShape::Scalar(kind) = shape else {
        return decode(shape, bytes);
    };
    if !kind.is_integer() || kind.size() >= size_of::<usize>() {
        return decode(shape, bytes);
    }

    let mut buf = [0u8; size_of::<usize>()];
    buf.copy_from_slice(&bytes[..size_of::<usize>()]);
    let word = usize::from_ne_bytes(buf);

    match kind {
        ScalarKind::I8 => Value::I8(word as i8),
        ScalarKind::U8 => Value::U8(word as u8),
        ScalarKind::I16 => Value::I16(word as i16),
        ScalarKind::U16 => Value::U16(word as u16),
        ScalarKind::I32 => Value::I32(word as i32),
        ScalarKind::U32 => Value::U32(word as u32),
        _ => decode(shape, bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{FieldKind, FieldShape, StructShape};

    #[repr(C)]
    #[derive(Clone, Copy)]
    struct Pair {
        x: f32,
        y: f32,
    }

    extern "C" fn add(a: i32, b: i32) -> i32 {
        a.wrapping_add(b)
    }

    extern "C" fn narrow(a: i8) -> i8 {
        a.wrapping_neg()
    }

    extern "C" fn invert(pair: Pair) -> Pair {
        Pair {
            x: -pair.x,
            y: -pair.y,
        }
    }

    fn pair_shape() -> FfiShape {
        let field = |name: &str, offset| FieldShape {
            name: name.to_string(),
            kind: FieldKind::Scalar(ScalarKind::F32),
            count: 1,
            offset,
        };
        FfiShape::Struct(StructShape {
            name: "Pair".to_string(),
            fields: vec![field("x", 0), field("y", 4)],
            size: 8,
            align: 4,
        })
    }

    #[test]
    fn test_scalar_call() {
        let signature = Signature::new(
            vec![FfiShape::Scalar(ScalarKind::I32), FfiShape::Scalar(ScalarKind::I32)],
            FfiShape::Scalar(ScalarKind::I32),
        );
        let function = unsafe {
            DynamicFunction::from_address("add", add as *const c_void, signature, None).unwrap()
        };

        assert_eq!(function.call(&[Value::I32(40), Value::I32(2)]).unwrap(), Value::I32(42));
        assert_eq!(
            function.call(&[Value::I32(i32::MAX), Value::I32(1)]).unwrap(),
            Value::I32(i32::MIN)
        );
    }

    #[test]
    fn test_narrow_return_is_truncated() {
        let signature = Signature::new(
            vec![FfiShape::Scalar(ScalarKind::I8)],
            FfiShape::Scalar(ScalarKind::I8),
        );
        let function = unsafe {
            DynamicFunction::from_address("narrow", narrow as *const c_void, signature, None)
                .unwrap()
        };
        assert_eq!(function.call(&[Value::I8(5)]).unwrap(), Value::I8(-5));
    }

    #[test]
    fn test_struct_by_value() {
        let signature = Signature::new(vec![pair_shape()], pair_shape());
        let function = unsafe {
            DynamicFunction::from_address("invert", invert as *const c_void, signature, None)
                .unwrap()
        };

        let result = function
            .call(&[Value::Struct(vec![
                ("x".to_string(), Value::F32(1.0)),
                ("y".to_string(), Value::F32(-2.0)),
            ])])
            .unwrap();
        assert_eq!(result.field("x"), Some(&Value::F32(-1.0)));
        assert_eq!(result.field("y"), Some(&Value::F32(2.0)));
    }

    #[test]
    fn test_wrong_arity_is_mismatch() {
        let signature = Signature::new(
            vec![FfiShape::Scalar(ScalarKind::I32), FfiShape::Scalar(ScalarKind::I32)],
            FfiShape::Scalar(ScalarKind::I32),
        );
        let function = unsafe {
            DynamicFunction::from_address("add", add as *const c_void, signature, None).unwrap()
        };
        let err = function.call(&[Value::I32(1)]).unwrap_err();
        assert!(matches!(err, FfiError::ArgumentMismatch { .. }));
    }

    #[test]
    fn test_call_into_compiled_library() {
        use phillip_build::{BuildOrchestrator, SourceSet, Toolchain, generate_extension_args};
        use phillip_config::BuildConfig;

        let config = BuildConfig::from_env();
        if !Toolchain::from_config(&config).is_available() {
            eprintln!("skipping: `{}` is not available", config.compiler());
            return;
        }
        let orchestrator = BuildOrchestrator::new(config);
        let dir = tempfile::tempdir().unwrap();

        let mut sources = SourceSet::new("__test__.answer", dir.path());
        sources
            .write_source("answer.cpp", "extern \"C\" int answer() { return 51; }\n")
            .unwrap();
        let artifact = orchestrator
            .compile(&sources, &generate_extension_args(["answer"]))
            .unwrap();
        let library = orchestrator.load(&artifact).unwrap();

        let function = unsafe {
            DynamicFunction::bind(
                &library,
                "answer",
                Signature::new(Vec::new(), FfiShape::Scalar(ScalarKind::I32)),
            )
            .unwrap()
        };
        assert_eq!(function.call(&[]).unwrap(), Value::I32(51));
        assert!(matches!(
            unsafe { DynamicFunction::bind(&library, "question", Signature::new(Vec::new(), FfiShape::Void)) },
            Err(FfiError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn test_void_parameter_is_rejected() {
        let signature = Signature::new(vec![FfiShape::Void], FfiShape::Void);
        let err = unsafe {
            DynamicFunction::from_address("add", add as *const c_void, signature, None)
                .unwrap_err()
        };
        assert!(matches!(err, FfiError::UnsupportedMarshal { .. }));
    }
}
