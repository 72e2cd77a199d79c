use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use phillip_config::BuildConfig;
use phillip_templates::Templates;
use tracing::info;

use crate::catalog::NATIVE_TYPES;
use crate::descriptor::{TypeDescriptor, TypeInfo, TypeSystem};
use crate::error::TypeError;
use crate::probe::NativeProbe;
use crate::registry::TypeRegistry;
use crate::typemap::{TypeMap, TypeMapBuilder};

/// A scalar seen from all three systems at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScalar {
    pub native: TypeDescriptor,
    pub arraylib: TypeDescriptor,
    pub ffi: TypeDescriptor,
    pub info: TypeInfo,
}

impl ResolvedScalar {
    pub fn size(&self) -> usize {
        self.info.size_bytes.unwrap_or(0)
    }
}

/// Per-session type state. Create one per build session and pass it to
/// every generator; nothing here is process-global.
pub struct TypeContext {
    config: BuildConfig,
    templates: Templates,
    registry: TypeRegistry,
    probe_headers: Vec<String>,
    probed: AHashSet<String>,
    maps: AHashMap<TypeSystem, Arc<TypeMap>>,
}

impl TypeContext {
    pub fn new(config: BuildConfig) -> Result<Self, TypeError> {
        Ok(Self {
            config,
            templates: Templates::new()?,
            registry: TypeRegistry::with_static_types(),
            probe_headers: Vec::new(),
            probed: AHashSet::new(),
            maps: AHashMap::new(),
        })
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Header included by later probe programs, for probing user types.
    pub fn add_probe_header(&mut self, header: impl Into<String>) {
        self.probe_headers.push(header.into());
    }

    pub fn register(&mut self, descriptor: TypeDescriptor, info: TypeInfo) -> Result<bool, TypeError> {
        let inserted = self.registry.register(descriptor, info)?;
        if inserted {
            self.maps.clear();
        }
        Ok(inserted)
    }

    /// Record native metadata obtained elsewhere; the name is never probed.
    pub fn register_native(&mut self, name: &str, info: TypeInfo) -> Result<bool, TypeError> {
        let descriptor = TypeDescriptor::native(name);
        self.probed.insert(descriptor.name.clone());
        self.register(descriptor, info)
    }

    pub fn prefer(&mut self, descriptor: &TypeDescriptor) -> Result<(), TypeError> {
        self.registry.prefer(descriptor)?;
        self.maps.clear();
        Ok(())
    }

    /// Probe every native name not yet known, together with any catalog
    /// names still missing, in a single program.
    pub fn ensure_native<I, S>(&mut self, names: I) -> Result<(), TypeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut pending: Vec<String> = Vec::new();
        let requested = NATIVE_TYPES
            .iter()
            .map(|name| TypeDescriptor::native(name))
            .chain(
                names
                    .into_iter()
                    .map(|name| TypeDescriptor::native(name.as_ref())),
            );

        for descriptor in requested {
            if descriptor.is_pointer
                || self.probed.contains(&descriptor.name)
                || self.registry.contains(&descriptor)
                || pending.contains(&descriptor.name)
            {
                continue;
            }
            pending.push(descriptor.name);
        }

        if pending.is_empty() {
            return Ok(());
        }

        let results =
            NativeProbe::new(&self.config, &self.templates, &self.probe_headers).probe(&pending)?;
        info!(count = results.len(), "probed native types");

        for (descriptor, type_info) in results {
            self.probed.insert(descriptor.name.clone());
            self.register(descriptor, type_info)?;
        }
        Ok(())
    }

    pub fn native_info(&mut self, name: &str) -> Result<TypeInfo, TypeError> {
        let descriptor = TypeDescriptor::native(name);
        self.ensure_native([name])?;
        self.registry
            .info(&descriptor)
            .copied()
            .ok_or(TypeError::Unregistered { descriptor })
    }

    /// Map to `target`, built on first use and cached until the registry changes.
    pub fn type_map(&mut self, target: TypeSystem) -> Result<Arc<TypeMap>, TypeError> {
        self.ensure_native(std::iter::empty::<&str>())?;
        if let Some(map) = self.maps.get(&target) {
            return Ok(Arc::clone(map));
        }
        let map = Arc::new(TypeMapBuilder::new(&self.registry).build(target)?);
        self.maps.insert(target, Arc::clone(&map));
        Ok(map)
    }

    /// Resolve a scalar member or parameter type into all three systems.
    pub fn resolve(&mut self, descriptor: &TypeDescriptor) -> Result<ResolvedScalar, TypeError> {
        if descriptor.system == TypeSystem::Native && !descriptor.is_pointer {
            self.ensure_native([descriptor.name.as_str()])?;
        }

        let info = if descriptor.is_pointer {
            TypeInfo::pointer()
        } else {
            self.registry
                .info(descriptor)
                .copied()
                .ok_or_else(|| TypeError::Unregistered {
                    descriptor: descriptor.clone(),
                })?
        };

        let native = self.type_map(TypeSystem::Native)?.resolve(descriptor)?;
        let arraylib = self.type_map(TypeSystem::ArrayLib)?.resolve(descriptor)?;
        let ffi = self.type_map(TypeSystem::Ffi)?.resolve(descriptor)?;

        Ok(ResolvedScalar {
            native,
            arraylib,
            ffi,
            info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::long_double_size;
    use std::ffi::{c_long, c_ulong};

    /// Context whose native table is filled in by hand instead of a probe.
    fn offline_context() -> TypeContext {
        let mut ctx = TypeContext::new(BuildConfig::default()).unwrap();
        for (name, info) in [
            ("char", TypeInfo::signed(1)),
            ("float", TypeInfo::float(4)),
            ("double", TypeInfo::float(8)),
            ("int", TypeInfo::signed(4)),
            ("long double", TypeInfo::float(long_double_size())),
            ("short", TypeInfo::signed(2)),
            ("long long", TypeInfo::signed(8)),
            ("long", TypeInfo::signed(size_of::<c_long>())),
            ("unsigned char", TypeInfo::unsigned(1)),
            ("unsigned int", TypeInfo::unsigned(4)),
            ("unsigned long long", TypeInfo::unsigned(8)),
            ("unsigned long", TypeInfo::unsigned(size_of::<c_ulong>())),
            ("unsigned short", TypeInfo::unsigned(2)),
            ("signed char", TypeInfo::signed(1)),
            ("bool", TypeInfo::unsigned(1)),
        ] {
            ctx.register_native(name, info).unwrap();
        }
        ctx
    }

    #[test]
    fn test_registration_invalidates_cached_maps() {
        let mut ctx = offline_context();

        let first = ctx.type_map(TypeSystem::Ffi).unwrap();
        let again = ctx.type_map(TypeSystem::Ffi).unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        ctx.register(TypeDescriptor::native("int32_t"), TypeInfo::signed(4))
            .unwrap();
        let rebuilt = ctx.type_map(TypeSystem::Ffi).unwrap();
        assert!(!Arc::ptr_eq(&first, &rebuilt));
        assert_eq!(
            rebuilt.get(&TypeDescriptor::native("int32_t")),
            Some(&TypeDescriptor::ffi("c_int32"))
        );
    }

    #[test]
    fn test_known_names_are_not_probed_again() {
        let mut ctx = offline_context();
        // would need a toolchain if anything were pending
        ctx.ensure_native(["int", "unsigned   int", "int *"]).unwrap();
        assert_eq!(ctx.native_info("int").unwrap(), TypeInfo::signed(4));
    }

    #[test]
    fn test_resolve_pointer_without_registration() {
        let mut ctx = offline_context();

        let resolved = ctx.resolve(&TypeDescriptor::native("Vertex *")).unwrap();
        assert_eq!(resolved.native, TypeDescriptor::native("Vertex *"));
        assert_eq!(resolved.ffi, TypeDescriptor::ffi_pointer());
        assert_eq!(resolved.size(), size_of::<usize>());
    }

    #[test]
    fn test_resolve_ffi_scalar() {
        let mut ctx = offline_context();

        let resolved = ctx.resolve(&TypeDescriptor::ffi("c_uint16")).unwrap();
        assert_eq!(resolved.native, TypeDescriptor::native("unsigned short"));
        assert_eq!(resolved.arraylib, TypeDescriptor::arraylib("uint16"));
        assert_eq!(resolved.ffi, TypeDescriptor::ffi("c_uint16"));
    }

    #[test]
    fn test_native_int_selects_int32() {
        let mut ctx = offline_context();
        let map = ctx.type_map(TypeSystem::ArrayLib).unwrap();
        assert_eq!(
            map.resolve(&TypeDescriptor::native("int")).unwrap(),
            TypeDescriptor::arraylib("int32")
        );
    }

    fn live_context() -> Option<TypeContext> {
        let config = BuildConfig::from_env();
        if !phillip_build::Toolchain::from_config(&config).is_available() {
            eprintln!("skipping: `{}` is not available", config.compiler());
            return None;
        }
        Some(TypeContext::new(config).unwrap())
    }

    #[test]
    fn test_int_probes_as_four_byte_signed_integer() {
        use crate::descriptor::{NumericKind, Signage};

        let Some(mut ctx) = live_context() else {
            return;
        };

        let info = ctx.native_info("int").unwrap();
        assert_eq!(info.size_bytes, Some(4));
        assert_eq!(info.signage, Signage::Signed);
        assert_eq!(info.numeric_kind, NumericKind::Integer);

        let map = ctx.type_map(TypeSystem::ArrayLib).unwrap();
        assert_eq!(
            map.resolve(&TypeDescriptor::native("int")).unwrap(),
            TypeDescriptor::arraylib("int32")
        );
    }

    #[test]
    fn test_probing_twice_is_stable() {
        let Some(mut ctx) = live_context() else {
            return;
        };

        let first = ctx.native_info("unsigned long long").unwrap();
        ctx.ensure_native(["unsigned long long", "double"]).unwrap();
        let second = ctx.native_info("unsigned long long").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, TypeInfo::unsigned(8));
        assert_eq!(ctx.native_info("double").unwrap(), TypeInfo::float(8));
    }

    #[test]
    fn test_every_native_type_has_an_ffi_counterpart() {
        let Some(mut ctx) = live_context() else {
            return;
        };

        let map = ctx.type_map(TypeSystem::Ffi).unwrap();
        for name in NATIVE_TYPES {
            let target = map.resolve(&TypeDescriptor::native(name)).unwrap();
            assert_eq!(target.system, TypeSystem::Ffi, "{name}");
        }
    }

    #[test]
    fn test_user_types_are_probed_in_one_program() {
        let Some(mut ctx) = live_context() else {
            return;
        };
        ctx.add_probe_header("<cstdint>");

        ctx.ensure_native(["int16_t", "uint64_t", "std::size_t"]).unwrap();
        assert_eq!(ctx.native_info("int16_t").unwrap(), TypeInfo::signed(2));
        assert_eq!(ctx.native_info("uint64_t").unwrap(), TypeInfo::unsigned(8));

        let resolved = ctx.resolve(&TypeDescriptor::native("int16_t")).unwrap();
        assert_eq!(resolved.ffi, TypeDescriptor::ffi("c_int16"));
        assert_eq!(resolved.native, TypeDescriptor::native("int16_t"));
    }

    #[test]
    fn test_unknown_type_is_a_probe_compilation_error() {
        let Some(mut ctx) = live_context() else {
            return;
        };

        let err = ctx.native_info("definitely_not_a_type").unwrap_err();
        let TypeError::ProbeCompilation { diagnostics, program } = err else {
            panic!("expected a probe compilation error, got {err}");
        };
        assert!(diagnostics.contains("definitely_not_a_type"));
        assert!(program.contains("definitely_not_a_type"));
    }
}
