//! Shared byte buffers allocated on the native side.
//!
//! `ByteArray { data, size }` is the one composite every buffer-sharing
//! caller agrees on; the module built here exports `byte_array_alloc` and
//! `byte_array_free` with fixed signatures.

use phillip_build::ExtensionArgs;
use phillip_codegen::{BoundModule, CompositeType, Function, ModuleGenerator};
use phillip_ffi::Value;
use phillip_types::{TypeContext, TypeDescriptor};

use crate::error::{Error, Result};
use crate::pipeline::{BuiltModule, build_module};

pub const STRUCT_NAME: &str = "ByteArray";
pub const ALLOC: &str = "byte_array_alloc";
pub const FREE: &str = "byte_array_free";

pub fn byte_array_type() -> CompositeType {
    CompositeType::new()
        .field("data", TypeDescriptor::native("unsigned char *"))
        .field("size", TypeDescriptor::native("long long"))
}

pub fn byte_array_module(ctx: &mut TypeContext) -> Result<ModuleGenerator> {
    let mut module = ModuleGenerator::new("byte_array")?;
    module.add_header("<cstdlib>", true);

    let id = module.add_structure(ctx, &byte_array_type())?;
    module.structures_mut().rename_id(id, STRUCT_NAME)?;

    let alloc = Function::new("byte_array_alloc_")
        .returns(byte_array_type())
        .param("size", TypeDescriptor::native("long long"))
        .body(
            "
            ByteArray array;
            array.data = static_cast<unsigned char *>(std::calloc(static_cast<std::size_t>(size > 0 ? size : 1), 1));
            array.size = array.data ? size : 0;
            return array;
            ",
        );
    let free = Function::new("byte_array_free_")
        .param("array", byte_array_type())
        .body("std::free(array.data);");

    module.add_exported_function(ctx, &alloc, Some(ALLOC))?;
    module.add_exported_function(ctx, &free, Some(FREE))?;
    Ok(module)
}

/// A buffer owned by the native allocator of a [`ByteArrayLibrary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteBuffer {
    pub data: usize,
    pub size: i64,
}

impl ByteBuffer {
    fn from_value(value: &Value) -> Result<Self> {
        let data = match value.field("data") {
            Some(Value::Pointer(data)) => *data,
            _ => return Err(mismatch("pointer field `data`", value)),
        };
        let size = match value.field("size") {
            Some(Value::I64(size)) => *size,
            _ => return Err(mismatch("integer field `size`", value)),
        };
        Ok(Self { data, size })
    }

    fn to_value(self) -> Value {
        Value::Struct(vec![
            ("data".to_string(), Value::Pointer(self.data)),
            ("size".to_string(), Value::I64(self.size)),
        ])
    }

    pub fn is_null(&self) -> bool {
        self.data == 0
    }

    pub fn len(&self) -> usize {
        usize::try_from(self.size).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// # Safety
    /// The buffer must still be allocated and not aliased elsewhere.
    pub unsafe fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.is_null() {
            return &mut [];
        }
        // SAFETY: forwarded to the caller; `data` points at `size` bytes.
        unsafe { std::slice::from_raw_parts_mut(self.data as *mut u8, self.len()) }
    }
}

fn mismatch(expected: &str, value: &Value) -> Error {
    Error::Ffi(phillip_ffi::FfiError::ArgumentMismatch {
        expected: format!("{STRUCT_NAME} with {expected}"),
        found: format!("{value:?}"),
    })
}

/// The byte-array module, compiled, loaded and bound.
pub struct ByteArrayLibrary {
    bound: BoundModule,
    built: BuiltModule,
}

impl ByteArrayLibrary {
    pub fn build(ctx: &mut TypeContext) -> Result<Self> {
        let module = byte_array_module(ctx)?;
        let (built, bound) = build_module(ctx.config(), &module, &ExtensionArgs::default())?;
        Ok(Self { bound, built })
    }

    pub fn alloc(&self, size: i64) -> Result<ByteBuffer> {
        let value = self.bound.call(ALLOC, &[Value::I64(size)])?;
        ByteBuffer::from_value(&value)
    }

    pub fn free(&self, buffer: ByteBuffer) -> Result<()> {
        self.bound.call(FREE, &[buffer.to_value()])?;
        Ok(())
    }

    pub fn built(&self) -> &BuiltModule {
        &self.built
    }
}
