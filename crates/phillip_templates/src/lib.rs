//! Text templates for every piece of generated native source.
//!
//! Rendering is substitution only: callers decide ordering, naming and
//! deduplication and hand over a finished context.

use serde::Serialize;
use tera::{Context, Tera};

const PROBE_TEMPLATE: &str = include_str!("../templates/probe.cpp.tera");
const STRUCTURE_TEMPLATE: &str = include_str!("../templates/structure.cpp.tera");
const MODULE_TEMPLATE: &str = include_str!("../templates/module.cpp.tera");
const HEADER_TEMPLATE: &str = include_str!("../templates/header.hpp.tera");

const PROBE: &str = "probe.cpp";
const STRUCTURE: &str = "structure.cpp";
const MODULE: &str = "module.cpp";
const HEADER: &str = "header.hpp";

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to load template `{name}`: {source}")]
    Load {
        name: &'static str,
        #[source]
        source: tera::Error,
    },

    #[error("failed to render template `{name}`: {source}")]
    Render {
        name: &'static str,
        #[source]
        source: tera::Error,
    },
}

/// Program printing `[system, name, signage, kind, sizeof]` for every type.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeContext<'a> {
    pub headers: &'a [String],
    pub types: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
pub struct StructureField<'a> {
    pub name: &'a str,
    pub type_name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StructureContext<'a> {
    pub name: &'a str,
    pub fields: Vec<StructureField<'a>>,
    /// `#pragma pack` value; `None` keeps natural alignment
    pub packing: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ModuleContext {
    pub headers: Vec<String>,
    pub structures: Vec<String>,
    pub variables: Vec<String>,
    pub functions: Vec<String>,
    pub interfaces: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HeaderContext {
    pub headers: Vec<String>,
    pub structures: Vec<String>,
    /// Interface signatures without the trailing semicolon
    pub interfaces: Vec<String>,
}

pub struct Templates {
    tera: Tera,
}

impl Templates {
    pub fn new() -> Result<Self, TemplateError> {
        let mut tera = Tera::default();

        for (name, body) in [
            (PROBE, PROBE_TEMPLATE),
            (STRUCTURE, STRUCTURE_TEMPLATE),
            (MODULE, MODULE_TEMPLATE),
            (HEADER, HEADER_TEMPLATE),
        ] {
            tera.add_raw_template(name, body)
                .map_err(|source| TemplateError::Load { name, source })?;
        }

        Ok(Self { tera })
    }

    pub fn render_probe(&self, context: &ProbeContext<'_>) -> Result<String, TemplateError> {
        self.render(PROBE, context)
    }

    pub fn render_structure(
        &self,
        context: &StructureContext<'_>,
    ) -> Result<String, TemplateError> {
        self.render(STRUCTURE, context)
            .map(|text| text.trim_end().to_string())
    }

    pub fn render_module(&self, context: &ModuleContext) -> Result<String, TemplateError> {
        self.render(MODULE, context)
    }

    pub fn render_header(&self, context: &HeaderContext) -> Result<String, TemplateError> {
        self.render(HEADER, context)
    }

    fn render<T: Serialize>(&self, name: &'static str, value: &T) -> Result<String, TemplateError> {
        let context =
            Context::from_serialize(value).map_err(|source| TemplateError::Render { name, source })?;
        self.tera
            .render(name, &context)
            .map_err(|source| TemplateError::Render { name, source })
    }
}

/// Normalise a header for `#include`: bare names are quoted.
pub fn include_target(header: &str) -> String {
    let header = header.trim();
    if header.starts_with('<') || header.starts_with('"') {
        header.to_string()
    } else {
        format!("\"{header}\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_lists_every_type() {
        let templates = Templates::new().unwrap();
        let types = vec!["int".to_string(), "unsigned long long".to_string()];
        let source = templates
            .render_probe(&ProbeContext {
                headers: &[],
                types: &types,
            })
            .unwrap();

        assert!(source.contains("report<int>(\"int\", false);"));
        assert!(source.contains("report<unsigned long long>(\"unsigned long long\", true);"));
        assert!(source.contains("int main()"));
    }

    #[test]
    fn test_structure_with_array_member() {
        let templates = Templates::new().unwrap();
        let text = templates
            .render_structure(&StructureContext {
                name: "Position",
                fields: vec![
                    StructureField {
                        name: "xyzw",
                        type_name: "float".to_string(),
                        count: 4,
                    },
                    StructureField {
                        name: "next",
                        type_name: "Position *".to_string(),
                        count: 1,
                    },
                ],
                packing: None,
            })
            .unwrap();

        assert_eq!(
            text,
            "struct Position {\n    float xyzw[4];\n    Position * next;\n};"
        );
    }

    #[test]
    fn test_packed_structure() {
        let templates = Templates::new().unwrap();
        let text = templates
            .render_structure(&StructureContext {
                name: "Packed",
                fields: vec![StructureField {
                    name: "tag",
                    type_name: "char".to_string(),
                    count: 1,
                }],
                packing: Some(1),
            })
            .unwrap();

        assert!(text.starts_with("#pragma pack(push, 1)\nstruct Packed {"));
        assert!(text.ends_with("};\n#pragma pack(pop)"));
    }

    #[test]
    fn test_include_target() {
        assert_eq!(include_target("<vector>"), "<vector>");
        assert_eq!(include_target("byte_array.hpp"), "\"byte_array.hpp\"");
    }
}
