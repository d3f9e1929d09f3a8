//! Code emission.
//!
//! A [`CodeGenerator`] turns compiled lexicons into target source files:
//! up to three artifacts per document (struct, schema, xrpc), written under
//! the document's NSID-derived directory, plus a fixed set of common support
//! files at the output root, written once per output root before anything
//! else.

use crate::compiler::{FieldSpec, Lexicon};
use crate::error::Result;
use crate::syntax;
use crate::types::NativeType;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

mod common;
pub mod elixir;
mod output;
pub mod schema;
mod structs;
pub mod templates;
pub mod xrpc;

pub use elixir::ElixirRenderer;
pub use output::RunReport;
pub use schema::{BoundCheck, CheckKind, ValidationStep, validation_pipeline};
pub use templates::{Bindings, FieldBinding, Render, TemplateId};

/// Module prefix of the common support files unless configured otherwise
pub const DEFAULT_RUNTIME_MODULE: &str = "Lexicon";

/// Kind of per-document artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Struct,
    Schema,
    Xrpc,
}

impl ArtifactKind {
    /// File name within the document's directory
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Struct => "struct.ex",
            Self::Schema => "schema.ex",
            Self::Xrpc => "xrpc.ex",
        }
    }
}

/// A rendered file, with its path relative to the output root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: String,
}

/// Code generator for compiled lexicons
pub struct CodeGenerator<R = ElixirRenderer> {
    renderer: R,
    runtime_module: String,
    /// Output roots that already hold the common files
    common_written: Mutex<HashSet<PathBuf>>,
}

impl CodeGenerator<ElixirRenderer> {
    /// Create a generator using the built-in Elixir renderer
    pub fn new(runtime_module: impl Into<String>) -> Self {
        Self::with_renderer(ElixirRenderer, runtime_module)
    }
}

impl<R: Render> CodeGenerator<R> {
    /// Create a generator around a custom renderer
    pub fn with_renderer(renderer: R, runtime_module: impl Into<String>) -> Self {
        Self {
            renderer,
            runtime_module: runtime_module.into(),
            common_written: Mutex::new(HashSet::new()),
        }
    }

    pub fn runtime_module(&self) -> &str {
        &self.runtime_module
    }

    /// Render every artifact of one lexicon
    pub fn generate(&self, lexicon: &Lexicon) -> Result<Vec<GeneratedFile>> {
        let dir = lexicon.output_dir();
        let defs = &lexicon.definitions;
        let mut files = Vec::new();
        for kind in plan(lexicon) {
            let contents = match kind {
                ArtifactKind::Struct => self.generate_structs(lexicon, &defs.structs)?,
                ArtifactKind::Schema => match &defs.schema {
                    Some(schema) => self.generate_schema(lexicon, schema)?,
                    None => continue,
                },
                ArtifactKind::Xrpc => match defs.xrpc() {
                    Some((rpc_kind, rpc)) => self.generate_xrpc(lexicon, rpc_kind, rpc)?,
                    None => continue,
                },
            };
            files.push(GeneratedFile {
                path: dir.join(kind.file_name()),
                contents,
            });
        }
        Ok(files)
    }
}

/// Which artifacts a lexicon produces; empty when it has no recognised definitions
pub fn plan(lexicon: &Lexicon) -> Vec<ArtifactKind> {
    let defs = &lexicon.definitions;
    let mut kinds = Vec::new();
    if !defs.structs.is_empty() {
        kinds.push(ArtifactKind::Struct);
    }
    if defs.schema.is_some() {
        kinds.push(ArtifactKind::Schema);
    }
    if defs.xrpc().is_some() {
        kinds.push(ArtifactKind::Xrpc);
    }
    kinds
}

/// Target spellings of one field
pub fn field_binding(field: &FieldSpec) -> FieldBinding {
    let native = field.native_type.to_string();
    let nilable = matches!(field.native_type, NativeType::Null | NativeType::Any);
    let typespec = if field.required || nilable {
        native
    } else {
        format!("{native} | nil")
    };
    FieldBinding {
        name: field.name.to_string(),
        atom: syntax::atom(&field.name),
        key: syntax::keyword_key(&field.name),
        typespec,
        storage: field.storage_type.to_string(),
        is_virtual: field.storage_type.is_virtual(),
        required: field.required,
        default: field.default.literal().map(syntax::literal),
        description: field.description.as_ref().map(ToString::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::build_fields;
    use serde_json::json;

    const THING: &str = r#"{"id":"com.example.thing","defs":{"main":{"type":"record","key":"tid","record":{"type":"object","required":["value"],"properties":{"value":{"type":"integer"}}}}}}"#;

    #[test]
    fn test_plan() {
        let lexicon = Lexicon::from_json_str(THING).unwrap();
        assert_eq!(plan(&lexicon), vec![ArtifactKind::Schema]);

        let lexicon = Lexicon::from_value(json!({
            "id": "com.example.mixed",
            "defs": {
                "main": {"type": "query"},
                "view": {"type": "object", "properties": {}},
                "rec": {"type": "record", "record": {"type": "object"}}
            }
        }))
        .unwrap();
        assert_eq!(
            plan(&lexicon),
            vec![ArtifactKind::Struct, ArtifactKind::Schema, ArtifactKind::Xrpc]
        );

        let empty = Lexicon::from_json_str(r#"{"id":"com.example.marker","defs":{"main":{"type":"token"}}}"#).unwrap();
        assert!(plan(&empty).is_empty());
    }

    #[test]
    fn test_generate_schema_for_tid_record() {
        let lexicon = Lexicon::from_json_str(THING).unwrap();
        let files = CodeGenerator::new(DEFAULT_RUNTIME_MODULE).generate(&lexicon).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(
            files[0].path,
            PathBuf::from("com").join("example").join("thing").join("schema.ex")
        );
        let src = &files[0].contents;
        assert!(src.starts_with("# @generated by dobby-lexicon. DO NOT EDIT."));
        assert!(src.contains("defmodule Com.Example.Thing.Main do"));
        assert!(src.contains("@primary_key {:id, :string, autogenerate: {Lexicon.TID, :generate, []}}"));
        assert!(src.contains("schema \"com_example_thing\" do"));
        assert!(src.contains("field :value, :integer, default: 0"));
        assert!(src.contains("|> cast(params, [:value])"));
        assert!(src.contains("|> validate_required([:value])"));
        assert!(!src.contains("validate_number"));
    }

    #[test]
    fn test_generate_is_deterministic() {
        let lexicon = Lexicon::from_json_str(THING).unwrap();
        let codegen = CodeGenerator::new(DEFAULT_RUNTIME_MODULE);
        assert_eq!(codegen.generate(&lexicon).unwrap(), codegen.generate(&lexicon).unwrap());
    }

    #[test]
    fn test_sequential_primary_key_and_virtual_null() {
        let lexicon = Lexicon::from_value(json!({
            "id": "com.example.profile",
            "defs": {"main": {"type": "record", "key": "literal:self", "record": {
                "type": "object",
                "properties": {"gone": {"type": "null"}, "name": {"type": "string", "minGraphemes": 1}}
            }}}
        }))
        .unwrap();
        let files = CodeGenerator::new("MyApp.Lexicon").generate(&lexicon).unwrap();
        let src = &files[0].contents;
        assert!(src.contains("@primary_key {:id, :id, autogenerate: true}"));
        assert!(src.contains("field :gone, :any, virtual: true"));
        assert!(src.contains("|> validate_length(:name, min: 1)"));
    }

    #[test]
    fn test_record_with_id_property_renames_primary_key() {
        let lexicon = Lexicon::from_value(json!({
            "id": "com.example.item",
            "defs": {"main": {"type": "record", "key": "tid", "record": {
                "type": "object",
                "properties": {"id": {"type": "string"}}
            }}}
        }))
        .unwrap();
        let files = CodeGenerator::new(DEFAULT_RUNTIME_MODULE).generate(&lexicon).unwrap();
        let src = &files[0].contents;
        assert!(src.contains("schema \"com_example_item\" do"));
        assert!(src.contains("@primary_key {:rkey, :string, autogenerate: {Lexicon.TID, :generate, []}}"));
        assert!(src.contains("field :id, :string"));
        assert!(!src.contains("@primary_key {:id,"));
    }

    #[test]
    fn test_field_binding() {
        let fields = build_fields(
            &json!({"type": "object", "required": ["a"], "properties": {
                "a": {"type": "string"},
                "b": {"type": "string", "default": "en"},
                "c": {"type": "unknown"}
            }}),
            "x.y.z",
        );
        let a = field_binding(&fields[0]);
        assert_eq!((a.atom.as_str(), a.typespec.as_str()), (":a", "String.t()"));
        assert_eq!(a.default, None);
        let b = field_binding(&fields[1]);
        assert_eq!(b.typespec, "String.t() | nil");
        assert_eq!(b.default.as_deref(), Some("\"en\""));
        let c = field_binding(&fields[2]);
        assert_eq!(c.typespec, "any()");
        assert_eq!(c.storage, ":map");
    }
}
