use ahash::AHashMap;
use serde::Serialize;

use crate::descriptor::{Family, NumericKind, Signage, TypeDescriptor, TypeSystem};
use crate::error::TypeError;
use crate::registry::TypeRegistry;

/// Lookup from any registered descriptor to its counterpart in `target`.
///
/// Descriptors already in the target system map to themselves.
#[derive(Debug, Clone, Serialize)]
pub struct TypeMap {
    target: TypeSystem,
    entries: Vec<(TypeDescriptor, TypeDescriptor)>,
    #[serde(skip)]
    index: AHashMap<TypeDescriptor, usize>,
    /// Representation of pointers in the target system.
    pointer: Option<TypeDescriptor>,
}

impl TypeMap {
    pub fn target(&self) -> TypeSystem {
        self.target
    }

    pub fn get(&self, descriptor: &TypeDescriptor) -> Option<&TypeDescriptor> {
        self.index.get(descriptor).map(|&idx| &self.entries[idx].1)
    }

    /// Map a descriptor, applying the pointer rules:
    /// native targets keep the pointee (mapped when registered), FFI targets
    /// use `c_void_p`, ArrayLib targets use the pointer-width unsigned integer.
    pub fn resolve(&self, descriptor: &TypeDescriptor) -> Result<TypeDescriptor, TypeError> {
        if descriptor.is_pointer {
            return self.resolve_pointer(descriptor);
        }
        self.get(descriptor)
            .cloned()
            .ok_or_else(|| self.unresolved(descriptor))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeDescriptor, &TypeDescriptor)> {
        self.entries.iter().map(|(from, to)| (from, to))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn resolve_pointer(&self, descriptor: &TypeDescriptor) -> Result<TypeDescriptor, TypeError> {
        match self.target {
            TypeSystem::Native => {
                let Some(pointee) = descriptor.pointee() else {
                    return Ok(TypeDescriptor::native("void *"));
                };
                let mapped = if pointee.is_pointer {
                    self.resolve_pointer(&pointee)?
                } else {
                    self.get(&pointee).cloned().unwrap_or(pointee)
                };
                Ok(mapped.pointer_to())
            }
            TypeSystem::Ffi => Ok(TypeDescriptor::ffi_pointer()),
            TypeSystem::ArrayLib => self
                .pointer
                .clone()
                .ok_or_else(|| self.unresolved(descriptor)),
        }
    }

    fn unresolved(&self, descriptor: &TypeDescriptor) -> TypeError {
        TypeError::UnresolvedType {
            target: self.target,
            descriptors: vec![descriptor.clone()],
        }
    }
}

/// Builds [`TypeMap`]s from a registry snapshot. Pure: reads only.
pub struct TypeMapBuilder<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> TypeMapBuilder<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    pub fn build(&self, target: TypeSystem) -> Result<TypeMap, TypeError> {
        let canonical = self.canonical_targets(target)?;

        let mut entries = Vec::new();
        let mut index = AHashMap::new();
        let mut unresolved = Vec::new();

        for (descriptor, info) in self.registry.iter() {
            let mapped = if descriptor.system == target {
                Some(descriptor.clone())
            } else {
                info.family()
                    .and_then(|family| canonical.get(&family))
                    .map(|&desc| desc.clone())
            };

            match mapped {
                Some(mapped) => {
                    index.insert(descriptor.clone(), entries.len());
                    entries.push((descriptor.clone(), mapped));
                }
                None => unresolved.push(descriptor.clone()),
            }
        }

        if !unresolved.is_empty() {
            return Err(TypeError::UnresolvedType {
                target,
                descriptors: unresolved,
            });
        }

        let pointer = match target {
            TypeSystem::Native => None,
            TypeSystem::Ffi => Some(TypeDescriptor::ffi_pointer()),
            TypeSystem::ArrayLib => canonical
                .get(&Family {
                    signage: Signage::Unsigned,
                    numeric_kind: NumericKind::Integer,
                    size_bytes: size_of::<usize>(),
                })
                .map(|&desc| desc.clone()),
        };

        Ok(TypeMap {
            target,
            entries,
            index,
            pointer,
        })
    }

    /// One descriptor per family: the preferred one, else the first registered.
    fn canonical_targets(
        &self,
        target: TypeSystem,
    ) -> Result<AHashMap<Family, &'r TypeDescriptor>, TypeError> {
        let mut first: AHashMap<Family, &'r TypeDescriptor> = AHashMap::new();
        let mut preferred: AHashMap<Family, Vec<&'r TypeDescriptor>> = AHashMap::new();
        let mut order = Vec::new();

        for (descriptor, info) in self.registry.iter_system(target) {
            let Some(family) = info.family() else {
                continue;
            };
            if !first.contains_key(&family) {
                order.push(family);
                first.insert(family, descriptor);
            }
            if self.registry.is_preferred(descriptor) {
                preferred.entry(family).or_default().push(descriptor);
            }
        }

        for family in order {
            let Some(candidates) = preferred.get(&family) else {
                continue;
            };
            match candidates.as_slice() {
                [only] => {
                    first.insert(family, *only);
                }
                _ => {
                    return Err(TypeError::AmbiguousMapping {
                        target,
                        family,
                        candidates: candidates.iter().map(|&desc| desc.clone()).collect(),
                    });
                }
            }
        }

        Ok(first)
    }
}

pub fn build_type_map(registry: &TypeRegistry, target: TypeSystem) -> Result<TypeMap, TypeError> {
    TypeMapBuilder::new(registry).build(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::TypeInfo;

    /// Registry with a plausible LP64 native table, no probe required.
    fn lp64_registry() -> TypeRegistry {
        let mut registry = TypeRegistry::with_static_types();
        for (name, info) in [
            ("char", TypeInfo::signed(1)),
            ("float", TypeInfo::float(4)),
            ("double", TypeInfo::float(8)),
            ("int", TypeInfo::signed(4)),
            ("short", TypeInfo::signed(2)),
            ("long long", TypeInfo::signed(8)),
            ("long", TypeInfo::signed(8)),
            ("unsigned char", TypeInfo::unsigned(1)),
            ("unsigned int", TypeInfo::unsigned(4)),
            ("unsigned long long", TypeInfo::unsigned(8)),
            ("unsigned short", TypeInfo::unsigned(2)),
        ] {
            registry.register(TypeDescriptor::native(name), info).unwrap();
        }
        registry
    }

    #[test]
    fn test_native_int_maps_to_int32() {
        let registry = lp64_without_long_double();

        let map = build_type_map(&registry, TypeSystem::ArrayLib).unwrap();
        assert_eq!(
            map.resolve(&TypeDescriptor::native("int")).unwrap(),
            TypeDescriptor::arraylib("int32")
        );
        assert_eq!(
            map.resolve(&TypeDescriptor::ffi("c_double")).unwrap(),
            TypeDescriptor::arraylib("float64")
        );
    }

    #[test]
    fn test_catalog_order_breaks_ties() {
        let registry = lp64_without_long_double();
        let native = build_type_map(&registry, TypeSystem::Native).unwrap();
        // long long precedes long in the native table
        assert_eq!(
            native.resolve(&TypeDescriptor::arraylib("int64")).unwrap(),
            TypeDescriptor::native("long long")
        );

        let ffi = build_type_map(&registry, TypeSystem::Ffi).unwrap();
        assert_eq!(
            ffi.resolve(&TypeDescriptor::native("int")).unwrap(),
            TypeDescriptor::ffi("c_int32")
        );
    }

    #[test]
    fn test_same_system_maps_to_itself() {
        let registry = lp64_without_long_double();
        let native = build_type_map(&registry, TypeSystem::Native).unwrap();
        assert_eq!(
            native.resolve(&TypeDescriptor::native("long")).unwrap(),
            TypeDescriptor::native("long")
        );
    }

    #[test]
    fn test_preference_overrides_order() {
        let mut registry = lp64_without_long_double();
        registry.prefer(&TypeDescriptor::ffi("c_int")).unwrap();

        let ffi = build_type_map(&registry, TypeSystem::Ffi).unwrap();
        assert_eq!(
            ffi.resolve(&TypeDescriptor::native("int")).unwrap(),
            TypeDescriptor::ffi("c_int")
        );
    }

    #[test]
    fn test_two_preferred_in_one_family_is_ambiguous() {
        let mut registry = lp64_without_long_double();
        registry.prefer(&TypeDescriptor::ffi("c_int")).unwrap();
        registry.prefer(&TypeDescriptor::ffi("c_int32")).unwrap();

        let err = build_type_map(&registry, TypeSystem::Ffi).unwrap_err();
        match err {
            TypeError::AmbiguousMapping { candidates, family, .. } => {
                assert_eq!(family, TypeInfo::signed(4).family().unwrap());
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        // other targets are unaffected
        assert!(build_type_map(&registry, TypeSystem::ArrayLib).is_ok());
    }

    #[test]
    fn test_missing_counterpart_is_unresolved() {
        let mut registry = lp64_without_long_double();
        registry
            .register(TypeDescriptor::native("__int128"), TypeInfo::signed(16))
            .unwrap();

        let err = build_type_map(&registry, TypeSystem::ArrayLib).unwrap_err();
        match err {
            TypeError::UnresolvedType { target, descriptors } => {
                assert_eq!(target, TypeSystem::ArrayLib);
                assert_eq!(descriptors, vec![TypeDescriptor::native("__int128")]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_pointer_rules() {
        let registry = lp64_without_long_double();
        let vertex = TypeDescriptor::native("Vertex *");
        let int_ptr = TypeDescriptor::native("int **");

        let native = build_type_map(&registry, TypeSystem::Native).unwrap();
        assert_eq!(native.resolve(&vertex).unwrap(), vertex);
        assert_eq!(native.resolve(&int_ptr).unwrap(), int_ptr);
        assert_eq!(
            native.resolve(&TypeDescriptor::ffi_pointer()).unwrap(),
            TypeDescriptor::native("void *")
        );

        let ffi = build_type_map(&registry, TypeSystem::Ffi).unwrap();
        assert_eq!(ffi.resolve(&vertex).unwrap(), TypeDescriptor::ffi_pointer());

        let arraylib = build_type_map(&registry, TypeSystem::ArrayLib).unwrap();
        let expected = format!("uint{}", size_of::<usize>() * 8);
        assert_eq!(arraylib.resolve(&vertex).unwrap().name, expected);
    }

    fn lp64_without_long_double() -> TypeRegistry {
        let mut trimmed = TypeRegistry::new();
        for (desc, info) in lp64_registry().iter() {
            if !matches!(desc.name.as_str(), "float128" | "longfloat" | "c_longdouble") {
                trimmed.register(desc.clone(), *info).unwrap();
            }
        }
        trimmed
    }
}
