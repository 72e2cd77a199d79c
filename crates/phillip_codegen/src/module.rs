//! One generated translation unit and its header.
//!
//! Everything added to a [`ModuleGenerator`] is resolved against the session
//! [`TypeContext`] at insertion time; rendering only reads that state, so
//! rendering twice yields identical text.

use ahash::{AHashMap, AHashSet};
use phillip_build::LoadedLibrary;
use phillip_ffi::{DynamicFunction, FfiShape, ScalarKind, Signature, Value};
use phillip_templates::{HeaderContext, ModuleContext, include_target};
use phillip_types::TypeContext;
use tracing::{debug, info};

use crate::composite::{CompositeType, MemberType};
use crate::error::{CodegenError, check_identifier};
use crate::function::{Function, Interface, Parameter, Variable};
use crate::structure::{StructId, StructureGenerator, scalar_kind};
use crate::text::{dedent, indent};

#[derive(Debug, Clone)]
enum TypeRef {
    Void,
    Native(String),
    Struct(StructId),
    StructPointer(StructId),
}

#[derive(Debug, Clone)]
struct Callable {
    name: String,
    result: TypeRef,
    params: Vec<(String, TypeRef)>,
    body: String,
}

#[derive(Debug, Clone)]
struct VariableEntry {
    name: String,
    ty: TypeRef,
    initializer: Option<String>,
    is_constant: bool,
}

#[derive(Debug, Clone)]
struct InterfaceEntry {
    callable: Callable,
    signature: Signature,
}

#[derive(Debug, Clone)]
struct Header {
    name: String,
    module_only: bool,
}

pub struct ModuleGenerator {
    name: String,
    header_name: Option<String>,
    headers: Vec<Header>,
    structures: StructureGenerator,
    structure_order: Vec<StructId>,
    variables: Vec<VariableEntry>,
    functions: Vec<Callable>,
    interfaces: Vec<InterfaceEntry>,
    defined: AHashSet<String>,
}

impl ModuleGenerator {
    pub fn new(name: &str) -> Result<Self, CodegenError> {
        Ok(Self {
            name: name.to_string(),
            header_name: None,
            headers: Vec::new(),
            structures: StructureGenerator::new()?,
            structure_order: Vec::new(),
            variables: Vec::new(),
            functions: Vec::new(),
            interfaces: Vec::new(),
            defined: AHashSet::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header_name(&self) -> Option<&str> {
        self.header_name.as_deref()
    }

    /// Once set, the module includes this header instead of repeating the
    /// structure definitions.
    pub fn set_header_name(&mut self, header_name: &str) {
        self.header_name = Some(header_name.to_string());
    }

    /// `module_only` headers are left out of the generated header.
    pub fn add_header(&mut self, name: &str, module_only: bool) {
        if self.headers.iter().any(|header| header.name == name) {
            return;
        }
        self.headers.push(Header {
            name: name.to_string(),
            module_only,
        });
    }

    pub fn structures(&self) -> &StructureGenerator {
        &self.structures
    }

    pub fn structures_mut(&mut self) -> &mut StructureGenerator {
        &mut self.structures
    }

    /// Append `composite` and everything it contains, deepest first.
    pub fn add_structure(
        &mut self,
        ctx: &mut TypeContext,
        composite: &CompositeType,
    ) -> Result<StructId, CodegenError> {
        let id = self.structures.get_or_create(ctx, composite)?;
        for dep in self.structures.dependency_order(id) {
            if !self.structure_order.contains(&dep) {
                self.structure_order.push(dep);
            }
        }
        Ok(id)
    }

    pub fn add_variable(&mut self, ctx: &mut TypeContext, variable: &Variable) -> Result<(), CodegenError> {
        check_identifier(&variable.name)?;
        self.ensure_free(&variable.name)?;
        let ty = self.type_ref(ctx, Some(&variable.ty))?;
        self.claim(&variable.name)?;
        self.variables.push(VariableEntry {
            name: variable.name.clone(),
            ty,
            initializer: variable.initializer.clone(),
            is_constant: variable.is_constant,
        });
        Ok(())
    }

    pub fn add_function(&mut self, ctx: &mut TypeContext, function: &Function) -> Result<(), CodegenError> {
        check_identifier(&function.name)?;
        self.ensure_free(&function.name)?;
        let callable = self.callable(
            ctx,
            &function.name,
            function.return_type.as_ref(),
            &function.parameters,
            &function.body,
        )?;
        self.claim(&function.name)?;
        self.functions.push(callable);
        Ok(())
    }

    pub fn add_interface(&mut self, ctx: &mut TypeContext, interface: &Interface) -> Result<(), CodegenError> {
        check_identifier(&interface.name)?;
        self.ensure_free(&interface.name)?;

        // shapes first: a rejected interface must leave no structures behind
        let params = interface
            .parameters
            .iter()
            .map(|param| self.ffi_shape(ctx, &interface.name, &param.name, Some(&param.ty)))
            .collect::<Result<Vec<_>, _>>()?;
        let result = self.ffi_shape(ctx, &interface.name, "return value", interface.return_type.as_ref())?;

        let callable = self.callable(
            ctx,
            &interface.name,
            interface.return_type.as_ref(),
            &interface.parameters,
            &interface.body,
        )?;
        self.claim(&interface.name)?;
        self.interfaces.push(InterfaceEntry {
            callable,
            signature: Signature::new(params, result),
        });
        Ok(())
    }

    /// Add `function` plus its default interface; returns the interface name.
    pub fn add_exported_function(
        &mut self,
        ctx: &mut TypeContext,
        function: &Function,
        exported_name: Option<&str>,
    ) -> Result<String, CodegenError> {
        let interface = function.generate_default_interface(exported_name)?;
        self.ensure_free(&interface.name)?;
        self.add_function(ctx, function)?;
        self.add_interface(ctx, &interface)?;
        Ok(interface.name)
    }

    /// Exported symbol names, in insertion order.
    pub fn interface_names(&self) -> Vec<String> {
        self.interfaces
            .iter()
            .map(|entry| entry.callable.name.clone())
            .collect()
    }

    pub fn signature(&self, interface: &str) -> Option<&Signature> {
        self.interfaces
            .iter()
            .find(|entry| entry.callable.name == interface)
            .map(|entry| &entry.signature)
    }

    pub fn render_module(&self) -> Result<String, CodegenError> {
        let mut headers = self
            .headers
            .iter()
            .map(|header| include_target(&header.name))
            .collect::<Vec<_>>();
        let structures = match &self.header_name {
            Some(header_name) => {
                headers.push(include_target(header_name));
                Vec::new()
            }
            None => self.render_structure_list()?,
        };

        let context = ModuleContext {
            headers,
            structures,
            variables: self.variables.iter().map(|var| self.render_variable(var)).collect(),
            functions: self.functions.iter().map(|f| self.render_definition(f)).collect(),
            interfaces: self
                .interfaces
                .iter()
                .map(|entry| self.render_definition(&entry.callable))
                .collect(),
        };
        Ok(self.structures.templates().render_module(&context)?)
    }

    /// Structures and interface declarations only.
    pub fn render_header(&self) -> Result<String, CodegenError> {
        let context = HeaderContext {
            headers: self
                .headers
                .iter()
                .filter(|header| !header.module_only)
                .map(|header| include_target(&header.name))
                .collect(),
            structures: self.render_structure_list()?,
            interfaces: self
                .interfaces
                .iter()
                .map(|entry| self.render_signature(&entry.callable))
                .collect(),
        };
        Ok(self.structures.templates().render_header(&context)?)
    }

    /// Bind every interface (and every symbol the build was asked to export)
    /// in `library`.
    pub fn generate(&self, library: &LoadedLibrary) -> Result<BoundModule, CodegenError> {
        let missing = |symbol: &str| CodegenError::SymbolNotFound {
            symbol: symbol.to_string(),
            library: library.path().display().to_string(),
            exports: self.interface_names(),
        };

        if let Some(symbol) = library.exports().iter().find(|symbol| !library.has_symbol(symbol)) {
            return Err(missing(symbol));
        }

        let mut functions = AHashMap::with_capacity(self.interfaces.len());
        for entry in &self.interfaces {
            let name = &entry.callable.name;
            if !library.has_symbol(name) {
                return Err(missing(name));
            }
            // SAFETY: the signature was derived from the same declaration
            // that produced the exported definition.
            let function = unsafe { DynamicFunction::bind(library, name, entry.signature.clone())? };
            functions.insert(name.clone(), function);
        }

        info!(module = %self.name, interfaces = functions.len(), "bound module");
        Ok(BoundModule {
            library: library.path().display().to_string(),
            functions,
        })
    }

    fn ensure_free(&self, name: &str) -> Result<(), CodegenError> {
        if self.defined.contains(name) {
            return Err(CodegenError::DuplicateDefinition {
                name: name.to_string(),
                module: self.name.clone(),
            });
        }
        Ok(())
    }

    fn claim(&mut self, name: &str) -> Result<(), CodegenError> {
        if !self.defined.insert(name.to_string()) {
            return Err(CodegenError::DuplicateDefinition {
                name: name.to_string(),
                module: self.name.clone(),
            });
        }
        Ok(())
    }

    fn callable(
        &mut self,
        ctx: &mut TypeContext,
        name: &str,
        return_type: Option<&MemberType>,
        parameters: &[Parameter],
        body: &str,
    ) -> Result<Callable, CodegenError> {
        for param in parameters {
            check_identifier(&param.name)?;
        }
        let result = self.type_ref(ctx, return_type)?;
        let mut params = Vec::with_capacity(parameters.len());
        for param in parameters {
            params.push((param.name.clone(), self.type_ref(ctx, Some(&param.ty))?));
        }
        Ok(Callable {
            name: name.to_string(),
            result,
            params,
            body: dedent(body),
        })
    }

    fn type_ref(&mut self, ctx: &mut TypeContext, ty: Option<&MemberType>) -> Result<TypeRef, CodegenError> {
        Ok(match ty {
            None => TypeRef::Void,
            Some(MemberType::Scalar(descriptor)) => TypeRef::Native(ctx.resolve(descriptor)?.native.name),
            Some(MemberType::Composite(composite)) => TypeRef::Struct(self.add_structure(ctx, composite)?),
            Some(MemberType::CompositePointer(composite)) => {
                TypeRef::StructPointer(self.add_structure(ctx, composite)?)
            }
        })
    }

    fn ffi_shape(
        &mut self,
        ctx: &mut TypeContext,
        owner: &str,
        member: &str,
        ty: Option<&MemberType>,
    ) -> Result<FfiShape, CodegenError> {
        match ty {
            None => Ok(FfiShape::Void),
            Some(MemberType::Scalar(descriptor)) => {
                let resolved = ctx.resolve(descriptor)?;
                debug!(interface = owner, member, ffi = %resolved.ffi, "marshal");
                Ok(FfiShape::Scalar(scalar_kind(&resolved.info, owner, member)?))
            }
            Some(MemberType::Composite(composite)) => {
                let id = self.structures.get_or_create(ctx, composite)?;
                self.structures.ffi_shape(id)
            }
            Some(MemberType::CompositePointer(_)) => Ok(FfiShape::Scalar(ScalarKind::Pointer)),
        }
    }

    fn render_structure_list(&self) -> Result<Vec<String>, CodegenError> {
        self.structure_order
            .iter()
            .map(|&id| {
                let text = self.structures.native_definition(id)?;
                self.structures.mark_emitted(id);
                Ok(text)
            })
            .collect()
    }

    fn type_text(&self, ty: &TypeRef) -> String {
        match ty {
            TypeRef::Void => "void".to_string(),
            TypeRef::Native(name) => name.clone(),
            TypeRef::Struct(id) => self.structures.name(*id).to_string(),
            TypeRef::StructPointer(id) => format!("{} *", self.structures.name(*id)),
        }
    }

    fn render_signature(&self, callable: &Callable) -> String {
        let params = callable
            .params
            .iter()
            .map(|(name, ty)| format!("{} {name}", self.type_text(ty)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} {}({params})", self.type_text(&callable.result), callable.name)
    }

    fn render_definition(&self, callable: &Callable) -> String {
        let signature = self.render_signature(callable);
        if callable.body.is_empty() {
            return format!("{signature} {{\n}}");
        }
        format!("{signature} {{\n{}\n}}", indent(&callable.body, 4))
    }

    fn render_variable(&self, variable: &VariableEntry) -> String {
        let constant = if variable.is_constant { "const " } else { "" };
        let ty = self.type_text(&variable.ty);
        match &variable.initializer {
            Some(init) => format!("{constant}{ty} {} = {init};", variable.name),
            None => format!("{constant}{ty} {};", variable.name),
        }
    }
}

/// Callables bound from one loaded library, keyed by exported name.
#[derive(Debug)]
pub struct BoundModule {
    library: String,
    functions: AHashMap<String, DynamicFunction>,
}

impl BoundModule {
    pub fn get(&self, name: &str) -> Option<&DynamicFunction> {
        self.functions.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, CodegenError> {
        let function = self.get(name).ok_or_else(|| {
            let mut exports = self.names().map(str::to_string).collect::<Vec<_>>();
            exports.sort();
            CodegenError::SymbolNotFound {
                symbol: name.to_string(),
                library: self.library.clone(),
                exports,
            }
        })?;
        Ok(function.call(args)?)
    }
}
