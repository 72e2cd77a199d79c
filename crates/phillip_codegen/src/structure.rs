use std::cell::Cell;

use ahash::{AHashMap, AHashSet};
use phillip_ffi::{FfiError, FfiShape, FieldKind, FieldShape, ScalarKind, StructShape};
use phillip_templates::{StructureContext, StructureField, Templates};
use phillip_types::{ResolvedScalar, TypeContext, TypeInfo, catalog};
use serde::Serialize;
use serde_json::json;
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::composite::{CompositeType, MemberType, Packing};
use crate::error::{CodegenError, check_identifier};
use crate::layout::{Layout, MemberLayout, compute_layout, scalar_align};

/// Handle to one cached structure inside a [`StructureGenerator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructId(usize);

#[derive(Debug, Clone)]
enum ResolvedType {
    Scalar {
        scalar: ResolvedScalar,
        typestr: String,
    },
    Composite(StructId),
    CompositePointer(StructId),
}

#[derive(Debug, Clone)]
struct ResolvedField {
    name: String,
    ty: ResolvedType,
    count: usize,
}

#[derive(Debug)]
struct Entry {
    key: String,
    name: String,
    packing: Packing,
    fields: Vec<ResolvedField>,
    layout: Layout,
    emitted: Cell<bool>,
}

/// Record dtype of a structure in the array library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArrayLibDtype {
    pub name: String,
    pub fields: Vec<ArrayLibField>,
    pub itemsize: usize,
    pub align: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArrayLibField {
    pub name: String,
    pub offset: usize,
    pub count: usize,
    /// Size of one element; the field spans `element_size * count` bytes.
    pub element_size: usize,
    pub format: ArrayLibFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayLibFormat {
    Scalar { dtype: String, typestr: String },
    Record(Box<ArrayLibDtype>),
}

impl ArrayLibDtype {
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }

    pub fn offsets(&self) -> Vec<usize> {
        self.fields.iter().map(|field| field.offset).collect()
    }

    /// Array-interface `descr`, with `('', '|V<n>')` entries for padding.
    pub fn descr(&self) -> serde_json::Value {
        let mut entries = Vec::new();
        let mut cursor = 0;

        for field in &self.fields {
            if field.offset > cursor {
                entries.push(json!(["", format!("|V{}", field.offset - cursor)]));
            }
            let format = match &field.format {
                ArrayLibFormat::Scalar { typestr, .. } => json!(typestr),
                ArrayLibFormat::Record(inner) => inner.descr(),
            };
            if field.count > 1 {
                entries.push(json!([field.name, format, [field.count]]));
            } else {
                entries.push(json!([field.name, format]));
            }
            cursor = field.offset + field.element_size * field.count;
        }

        if self.itemsize > cursor {
            entries.push(json!(["", format!("|V{}", self.itemsize - cursor)]));
        }
        serde_json::Value::Array(entries)
    }

    pub fn descr_json(&self) -> String {
        self.descr().to_string()
    }
}

/// Deduplicating cache of composite types and their three definitions.
///
/// Identity is the structural key: field names, field types resolved to
/// native names (children by their own key), counts and packing. Equal keys
/// share one entry; the default name is `struct_` + SHA-1 of the key.
pub struct StructureGenerator {
    templates: Templates,
    entries: Vec<Entry>,
    by_type: AHashMap<CompositeType, StructId>,
    by_key: AHashMap<String, StructId>,
    by_name: AHashMap<String, StructId>,
}

impl StructureGenerator {
    pub fn new() -> Result<Self, CodegenError> {
        Ok(Self {
            templates: Templates::new()?,
            entries: Vec::new(),
            by_type: AHashMap::new(),
            by_key: AHashMap::new(),
            by_name: AHashMap::new(),
        })
    }

    pub fn get_or_create(
        &mut self,
        ctx: &mut TypeContext,
        composite: &CompositeType,
    ) -> Result<StructId, CodegenError> {
        if let Some(&id) = self.by_type.get(composite) {
            return Ok(id);
        }
        if composite.fields().is_empty() {
            return Err(CodegenError::EmptyComposite);
        }
        composite.packing().validate()?;

        let mut fields = Vec::with_capacity(composite.fields().len());
        let mut members = Vec::with_capacity(composite.fields().len());
        let mut key = String::new();

        for field in composite.fields() {
            check_identifier(&field.name)?;

            let (ty, size, align, key_part) = match &field.ty {
                MemberType::Scalar(descriptor) => {
                    let scalar = ctx.resolve(descriptor)?;
                    let size = scalar.size();
                    let typestr = ctx
                        .registry()
                        .info(&scalar.arraylib)
                        .and_then(catalog::typestr)
                        .unwrap_or_else(|| format!("|V{size}"));
                    let key_part = scalar.native.name.clone();
                    (
                        ResolvedType::Scalar { scalar, typestr },
                        size,
                        scalar_align(size),
                        key_part,
                    )
                }
                MemberType::Composite(child) => {
                    let id = self.get_or_create(ctx, child)?;
                    let entry = &self.entries[id.0];
                    (
                        ResolvedType::Composite(id),
                        entry.layout.size,
                        entry.layout.align,
                        format!("{{{}}}", entry.key),
                    )
                }
                MemberType::CompositePointer(child) => {
                    let id = self.get_or_create(ctx, child)?;
                    let size = size_of::<usize>();
                    (
                        ResolvedType::CompositePointer(id),
                        size,
                        scalar_align(size),
                        format!("*{{{}}}", self.entries[id.0].key),
                    )
                }
            };

            key.push_str(&field.name);
            key.push('\0');
            key.push_str(&key_part);
            key.push('\0');
            key.push_str(&field.count.to_string());
            key.push('\0');

            members.push(MemberLayout {
                size,
                align,
                count: field.count,
            });
            fields.push(ResolvedField {
                name: field.name.clone(),
                ty,
                count: field.count,
            });
        }
        key.push_str(&composite.packing().tag());

        if let Some(&id) = self.by_key.get(&key) {
            self.by_type.insert(composite.clone(), id);
            return Ok(id);
        }

        let name = canonical_name(&key);
        if self.by_name.contains_key(&name) {
            return Err(CodegenError::NameConflict { name });
        }

        let layout = compute_layout(&members, composite.packing());
        let id = StructId(self.entries.len());
        debug!(%name, size = layout.size, align = layout.align, "registered structure");

        self.by_type.insert(composite.clone(), id);
        self.by_key.insert(key.clone(), id);
        self.by_name.insert(name.clone(), id);
        self.entries.push(Entry {
            key,
            name,
            packing: composite.packing(),
            fields,
            layout,
            emitted: Cell::new(false),
        });
        Ok(id)
    }

    pub(crate) fn templates(&self) -> &Templates {
        &self.templates
    }

    /// Id of an already cached composite.
    pub fn lookup(&self, composite: &CompositeType) -> Option<StructId> {
        self.by_type.get(composite).copied()
    }

    /// Give a composite an explicit name. Only allowed before first emission.
    pub fn rename(
        &mut self,
        ctx: &mut TypeContext,
        composite: &CompositeType,
        name: &str,
    ) -> Result<StructId, CodegenError> {
        let id = self.get_or_create(ctx, composite)?;
        self.rename_id(id, name)?;
        Ok(id)
    }

    pub fn rename_id(&mut self, id: StructId, name: &str) -> Result<(), CodegenError> {
        check_identifier(name)?;
        let entry = &self.entries[id.0];
        if entry.name == name {
            return Ok(());
        }
        if entry.emitted.get() {
            return Err(CodegenError::AlreadyRendered {
                name: entry.name.clone(),
            });
        }
        if self.by_name.get(name).is_some_and(|&other| other != id) {
            return Err(CodegenError::NameConflict {
                name: name.to_string(),
            });
        }

        let old = std::mem::replace(&mut self.entries[id.0].name, name.to_string());
        self.by_name.remove(&old);
        self.by_name.insert(name.to_string(), id);
        debug!(from = %old, to = name, "renamed structure");
        Ok(())
    }

    pub fn name(&self, id: StructId) -> &str {
        &self.entries[id.0].name
    }

    /// Structural identity key; two composites share an entry iff keys match.
    pub fn key(&self, id: StructId) -> &str {
        &self.entries[id.0].key
    }

    pub fn layout(&self, id: StructId) -> &Layout {
        &self.entries[id.0].layout
    }

    pub fn packing(&self, id: StructId) -> Packing {
        self.entries[id.0].packing
    }

    pub fn is_emitted(&self, id: StructId) -> bool {
        self.entries[id.0].emitted.get()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Native `struct` text under the current names.
    pub fn native_definition(&self, id: StructId) -> Result<String, CodegenError> {
        let entry = &self.entries[id.0];
        let fields = entry
            .fields
            .iter()
            .map(|field| StructureField {
                name: &field.name,
                type_name: match &field.ty {
                    ResolvedType::Scalar { scalar, .. } => scalar.native.name.clone(),
                    ResolvedType::Composite(child) => self.name(*child).to_string(),
                    ResolvedType::CompositePointer(child) => format!("{} *", self.name(*child)),
                },
                count: field.count,
            })
            .collect();

        Ok(self.templates.render_structure(&StructureContext {
            name: &entry.name,
            fields,
            packing: entry.packing.pragma(),
        })?)
    }

    pub fn arraylib_definition(&self, id: StructId) -> ArrayLibDtype {
        let entry = &self.entries[id.0];
        let fields = entry
            .fields
            .iter()
            .zip(&entry.layout.offsets)
            .map(|(field, &offset)| {
                let (format, element_size) = match &field.ty {
                    ResolvedType::Scalar { scalar, typestr } => (
                        ArrayLibFormat::Scalar {
                            dtype: scalar.arraylib.name.clone(),
                            typestr: typestr.clone(),
                        },
                        scalar.size(),
                    ),
                    ResolvedType::Composite(child) => (
                        ArrayLibFormat::Record(Box::new(self.arraylib_definition(*child))),
                        self.layout(*child).size,
                    ),
                    ResolvedType::CompositePointer(_) => (
                        ArrayLibFormat::Scalar {
                            dtype: format!("uint{}", size_of::<usize>() * 8),
                            typestr: pointer_typestr(),
                        },
                        size_of::<usize>(),
                    ),
                };
                ArrayLibField {
                    name: field.name.clone(),
                    offset,
                    count: field.count,
                    element_size,
                    format,
                }
            })
            .collect();

        ArrayLibDtype {
            name: entry.name.clone(),
            fields,
            itemsize: entry.layout.size,
            align: entry.layout.align,
        }
    }

    /// libffi layout for passing the structure by value.
    pub fn ffi_definition(&self, id: StructId) -> Result<StructShape, CodegenError> {
        let entry = &self.entries[id.0];
        if entry.packing != Packing::Natural {
            return Err(CodegenError::UnsupportedMarshal {
                what: format!("packed structure `{}` by value", entry.name),
            });
        }

        let fields = entry
            .fields
            .iter()
            .zip(&entry.layout.offsets)
            .map(|(field, &offset)| {
                let kind = match &field.ty {
                    ResolvedType::Scalar { scalar, .. } => {
                        FieldKind::Scalar(scalar_kind(&scalar.info, &entry.name, &field.name)?)
                    }
                    ResolvedType::Composite(child) => FieldKind::Struct(self.ffi_definition(*child)?),
                    ResolvedType::CompositePointer(_) => FieldKind::Scalar(ScalarKind::Pointer),
                };
                Ok(FieldShape {
                    name: field.name.clone(),
                    kind,
                    count: field.count,
                    offset,
                })
            })
            .collect::<Result<Vec<_>, CodegenError>>()?;

        Ok(StructShape {
            name: entry.name.clone(),
            fields,
            size: entry.layout.size,
            align: entry.layout.align,
        })
    }

    pub fn ffi_shape(&self, id: StructId) -> Result<FfiShape, CodegenError> {
        self.ffi_definition(id).map(FfiShape::Struct)
    }

    /// `id` and everything it depends on, deepest first, each once.
    pub fn dependency_order(&self, id: StructId) -> Vec<StructId> {
        let mut order = Vec::new();
        let mut seen = AHashSet::new();
        self.visit(id, &mut seen, &mut order);
        order
    }

    /// Native definitions for `id` and its dependencies, deepest first.
    ///
    /// Restartable: each call walks the cache afresh. Yielded entries count
    /// as emitted and can no longer be renamed.
    pub fn render_structures(
        &self,
        id: StructId,
    ) -> impl Iterator<Item = Result<String, CodegenError>> + '_ {
        self.dependency_order(id).into_iter().map(move |dep| {
            let text = self.native_definition(dep)?;
            self.mark_emitted(dep);
            Ok(text)
        })
    }

    pub(crate) fn mark_emitted(&self, id: StructId) {
        self.entries[id.0].emitted.set(true);
    }

    fn visit(&self, id: StructId, seen: &mut AHashSet<StructId>, order: &mut Vec<StructId>) {
        if !seen.insert(id) {
            return;
        }
        for field in &self.entries[id.0].fields {
            match field.ty {
                ResolvedType::Composite(child) | ResolvedType::CompositePointer(child) => {
                    self.visit(child, seen, order);
                }
                ResolvedType::Scalar { .. } => {}
            }
        }
        order.push(id);
    }
}

fn canonical_name(key: &str) -> String {
    format!("struct_{:x}", Sha1::digest(key.as_bytes()))
}

fn pointer_typestr() -> String {
    let size = size_of::<usize>();
    let order = if cfg!(target_endian = "little") { '<' } else { '>' };
    format!("{order}u{size}")
}

pub(crate) fn scalar_kind(info: &TypeInfo, owner: &str, member: &str) -> Result<ScalarKind, CodegenError> {
    ScalarKind::from_info(info).map_err(|err| match err {
        FfiError::UnsupportedMarshal { what } => CodegenError::UnsupportedMarshal {
            what: format!("`{owner}.{member}` ({what})"),
        },
        other => other.into(),
    })
}
