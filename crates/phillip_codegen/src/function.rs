use crate::composite::MemberType;
use crate::error::{CodegenError, check_identifier};

/// A named, typed parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: MemberType,
}

impl Parameter {
    pub fn new(name: &str, ty: impl Into<MemberType>) -> Self {
        Self {
            name: name.to_string(),
            ty: ty.into(),
        }
    }
}

/// Module-level variable, emitted after the structures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub ty: MemberType,
    pub initializer: Option<String>,
    pub is_constant: bool,
}

impl Variable {
    pub fn new(name: &str, ty: impl Into<MemberType>) -> Self {
        Self {
            name: name.to_string(),
            ty: ty.into(),
            initializer: None,
            is_constant: false,
        }
    }

    pub fn initialized(mut self, initializer: &str) -> Self {
        self.initializer = Some(initializer.to_string());
        self
    }

    pub fn constant(mut self) -> Self {
        self.is_constant = true;
        self
    }
}

/// A free-standing native function with C++ linkage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    /// `None` is `void`.
    pub return_type: Option<MemberType>,
    pub parameters: Vec<Parameter>,
    pub body: String,
}

impl Function {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            return_type: None,
            parameters: Vec::new(),
            body: String::new(),
        }
    }

    pub fn returns(mut self, ty: impl Into<MemberType>) -> Self {
        self.return_type = Some(ty.into());
        self
    }

    pub fn param(mut self, name: &str, ty: impl Into<MemberType>) -> Self {
        self.parameters.push(Parameter::new(name, ty));
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    /// An `extern "C"` wrapper forwarding every argument to this function.
    ///
    /// Named `c_<name>` unless `exported_name` is given. Composites passed by
    /// value must have a layout libffi can express; there is no fallback to
    /// passing them through a pointer.
    pub fn generate_default_interface(
        &self,
        exported_name: Option<&str>,
    ) -> Result<Interface, CodegenError> {
        let name = exported_name.map_or_else(|| format!("c_{}", self.name), str::to_string);
        check_identifier(&name)?;

        let by_value = self
            .parameters
            .iter()
            .map(|param| (param.name.as_str(), &param.ty))
            .chain(self.return_type.as_ref().map(|ty| ("return value", ty)));
        for (what, ty) in by_value {
            if let MemberType::Composite(composite) = ty
                && !composite.is_ffi_by_value()
            {
                return Err(CodegenError::UnsupportedMarshal {
                    what: format!("packed composite `{what}` of `{}` by value", self.name),
                });
            }
        }

        let args = self
            .parameters
            .iter()
            .map(|param| param.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let call = format!("{}({args});", self.name);
        let body = if self.return_type.is_some() {
            format!("return {call}")
        } else {
            call
        };

        Ok(Interface {
            name,
            return_type: self.return_type.clone(),
            parameters: self.parameters.clone(),
            body,
        })
    }
}

/// An `extern "C"` function, exported and bound for dynamic calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub return_type: Option<MemberType>,
    pub parameters: Vec<Parameter>,
    pub body: String,
}

impl Interface {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            return_type: None,
            parameters: Vec::new(),
            body: String::new(),
        }
    }

    pub fn returns(mut self, ty: impl Into<MemberType>) -> Self {
        self.return_type = Some(ty.into());
        self
    }

    pub fn param(mut self, name: &str, ty: impl Into<MemberType>) -> Self {
        self.parameters.push(Parameter::new(name, ty));
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }
}
