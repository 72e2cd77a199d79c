use ahash::AHashMap;
use tracing::debug;

use crate::catalog;
use crate::descriptor::{TypeDescriptor, TypeInfo, TypeSystem};
use crate::error::TypeError;

#[derive(Debug, Clone)]
struct Entry {
    descriptor: TypeDescriptor,
    info: TypeInfo,
    preferred: bool,
}

/// Append-only table of descriptor metadata. Insertion order is kept and
/// doubles as the default preference order inside a family.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    entries: Vec<Entry>,
    index: AHashMap<TypeDescriptor, usize>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the ArrayLib and FFI tables.
    pub fn with_static_types() -> Self {
        let mut registry = Self::new();
        for (descriptor, info) in catalog::static_types() {
            registry.insert(descriptor, info);
        }
        registry
    }

    /// Returns `true` when the descriptor was new; re-registering identical
    /// metadata is a no-op.
    pub fn register(
        &mut self,
        descriptor: TypeDescriptor,
        info: TypeInfo,
    ) -> Result<bool, TypeError> {
        if info.size_bytes.is_none() {
            return Err(TypeError::Unsized { descriptor });
        }

        if let Some(&idx) = self.index.get(&descriptor) {
            let existing = self.entries[idx].info;
            if existing == info {
                return Ok(false);
            }
            return Err(TypeError::DuplicateRegistration {
                descriptor,
                existing,
                attempted: info,
            });
        }

        debug!(%descriptor, %info, "registered type");
        self.insert(descriptor, info);
        Ok(true)
    }

    /// Make `descriptor` the canonical pick for its family within its own system.
    pub fn prefer(&mut self, descriptor: &TypeDescriptor) -> Result<(), TypeError> {
        let idx = self
            .index
            .get(descriptor)
            .copied()
            .ok_or_else(|| TypeError::Unregistered {
                descriptor: descriptor.clone(),
            })?;
        self.entries[idx].preferred = true;
        Ok(())
    }

    pub fn info(&self, descriptor: &TypeDescriptor) -> Option<&TypeInfo> {
        self.index.get(descriptor).map(|&idx| &self.entries[idx].info)
    }

    pub fn contains(&self, descriptor: &TypeDescriptor) -> bool {
        self.index.contains_key(descriptor)
    }

    pub fn is_preferred(&self, descriptor: &TypeDescriptor) -> bool {
        self.index
            .get(descriptor)
            .is_some_and(|&idx| self.entries[idx].preferred)
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&TypeDescriptor, &TypeInfo)> {
        self.entries.iter().map(|entry| (&entry.descriptor, &entry.info))
    }

    pub fn iter_system(
        &self,
        system: TypeSystem,
    ) -> impl Iterator<Item = (&TypeDescriptor, &TypeInfo)> {
        self.iter().filter(move |(desc, _)| desc.system == system)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, descriptor: TypeDescriptor, info: TypeInfo) {
        self.index.insert(descriptor.clone(), self.entries.len());
        self.entries.push(Entry {
            descriptor,
            info,
            preferred: false,
        });
    }
}
