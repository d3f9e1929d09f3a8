//! Lexicon loading and definition compilation.
//!
//! A [`Lexicon`] is built once per document and never mutated afterwards.
//! Definitions are visited in key order; the first record and the first RPC
//! definition win, and later ones are skipped with a warning.

use crate::constraints::Constraints;
use crate::error::Result;
use crate::lexicon::{LexType, LexiconDoc, properties, required_names, str_field};
use crate::names::{def_module_name, nsid_to_dir, split_nsid, title_case};
use crate::types::{
    DefaultValue, NativeType, StorageType, collect_refs, default_value, resolve_native_type,
    resolve_storage_type,
};
use serde::Serialize;
use serde_json::Value;
use serde_with::skip_serializing_none;
use smol_str::SmolStr;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// One resolved field of a definition
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: SmolStr,
    pub native_type: NativeType,
    pub storage_type: StorageType,
    pub required: bool,
    pub constraints: Constraints,
    pub default: DefaultValue,
    pub description: Option<SmolStr>,
}

/// Resolve the `properties` of an object-shaped node into fields
///
/// Fields come out in property-name order. `required` is a membership test;
/// names listed there without a matching property are ignored.
pub fn build_fields(node: &Value, nsid: &str) -> Vec<FieldSpec> {
    let required = required_names(node);
    let Some(props) = properties(node) else {
        return Vec::new();
    };
    props
        .iter()
        .map(|(name, prop)| FieldSpec {
            name: SmolStr::new(name),
            native_type: resolve_native_type(prop, nsid),
            storage_type: resolve_storage_type(prop),
            required: required.contains(&name.as_str()),
            constraints: Constraints::extract(prop),
            default: default_value(prop),
            description: str_field(prop, "description").map(SmolStr::new),
        })
        .collect()
}

/// Plain data shape with no persistence semantics
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructDef {
    pub key: SmolStr,
    pub fields: Vec<FieldSpec>,
    pub description: Option<SmolStr>,
}

/// How a persisted record is keyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrimaryKeyKind {
    SequentialInteger,
    /// Keyed by TID
    OpaqueSortableId,
}

impl PrimaryKeyKind {
    /// Derive from a record's declared `key` style
    pub fn from_key_style(style: Option<&str>) -> Self {
        match style {
            Some("tid") => Self::OpaqueSortableId,
            _ => Self::SequentialInteger,
        }
    }
}

/// A persisted record
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDef {
    pub key: SmolStr,
    pub primary_key: PrimaryKeyKind,
    pub fields: Vec<FieldSpec>,
    pub description: Option<SmolStr>,
}

/// Query or procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcKind {
    Query,
    Procedure,
}

/// An RPC operation
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcDef {
    pub key: SmolStr,
    pub nsid: SmolStr,
    /// Query parameters, or the properties of an inline procedure body
    pub input_fields: Vec<FieldSpec>,
    /// Procedure body type when it is not an inline object with properties
    pub input_type: Option<NativeType>,
    pub output_type: NativeType,
    pub input_encoding: Option<SmolStr>,
    pub output_encoding: Option<SmolStr>,
    pub errors: Vec<SmolStr>,
    pub description: Option<SmolStr>,
}

/// A compiled `defs` entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CompiledDefinition {
    Struct(StructDef),
    Schema(SchemaDef),
    Query(RpcDef),
    Procedure(RpcDef),
}

impl CompiledDefinition {
    pub fn key(&self) -> &SmolStr {
        match self {
            Self::Struct(def) => &def.key,
            Self::Schema(def) => &def.key,
            Self::Query(def) | Self::Procedure(def) => &def.key,
        }
    }

    /// Lexicon tag the definition was compiled from
    pub fn kind(&self) -> LexType {
        match self {
            Self::Struct(_) => LexType::Object,
            Self::Schema(_) => LexType::Record,
            Self::Query(_) => LexType::Query,
            Self::Procedure(_) => LexType::Procedure,
        }
    }
}

/// The compiled definitions of one document
///
/// Holds at most one schema and at most one RPC definition (query or
/// procedure), and any number of structs in key order.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Definitions {
    pub structs: Vec<StructDef>,
    pub schema: Option<SchemaDef>,
    pub query: Option<RpcDef>,
    pub procedure: Option<RpcDef>,
}

impl Definitions {
    /// Add a definition, handing it back if its slot is already taken
    pub fn insert(&mut self, def: CompiledDefinition) -> std::result::Result<(), CompiledDefinition> {
        match def {
            CompiledDefinition::Struct(s) => self.structs.push(s),
            CompiledDefinition::Schema(s) if self.schema.is_none() => self.schema = Some(s),
            CompiledDefinition::Query(q) if self.xrpc().is_none() => self.query = Some(q),
            CompiledDefinition::Procedure(p) if self.xrpc().is_none() => self.procedure = Some(p),
            rejected => return Err(rejected),
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.structs.is_empty() && self.schema.is_none() && self.xrpc().is_none()
    }

    pub fn len(&self) -> usize {
        self.structs.len() + usize::from(self.schema.is_some()) + usize::from(self.xrpc().is_some())
    }

    /// The RPC definition, whichever kind it is
    pub fn xrpc(&self) -> Option<(RpcKind, &RpcDef)> {
        match (&self.query, &self.procedure) {
            (Some(query), _) => Some((RpcKind::Query, query)),
            (None, Some(procedure)) => Some((RpcKind::Procedure, procedure)),
            (None, None) => None,
        }
    }
}

/// One compiled lexicon document
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lexicon {
    pub nsid: SmolStr,
    /// Every segment but the last
    pub namespace: SmolStr,
    /// The last segment
    pub id: SmolStr,
    pub title_nsid: String,
    pub title_namespace: String,
    pub title_id: String,
    pub description: Option<SmolStr>,
    pub revision: Option<u32>,
    /// Every `defs` key, recognised or not
    pub def_keys: Vec<SmolStr>,
    /// Every reference in the document, as `nsid#name`
    pub references: BTreeSet<SmolStr>,
    pub definitions: Definitions,
}

impl Lexicon {
    /// Load and compile a document from raw bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(Self::from_doc(&LexiconDoc::from_slice(bytes)?))
    }

    /// Load and compile a document from text
    pub fn from_json_str(text: &str) -> Result<Self> {
        Self::from_slice(text.as_bytes())
    }

    /// Compile an already-parsed JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(Self::from_doc(&LexiconDoc::from_value(value)?))
    }

    /// Compile a parsed document
    pub fn from_doc(doc: &LexiconDoc) -> Self {
        let nsid = doc.id.as_str();
        let (namespace, id) = split_nsid(nsid);
        let mut definitions = Definitions::default();
        let mut references = BTreeSet::new();

        for (key, node) in &doc.defs {
            collect_refs(node, nsid, &mut references);
            let Some(def) = compile_definition(nsid, key, node) else {
                continue;
            };
            if let Err(rejected) = definitions.insert(def) {
                tracing::warn!(
                    nsid,
                    key = %rejected.key(),
                    kind = %rejected.kind(),
                    "skipping duplicate definition; only one record and one query or procedure are emitted per document"
                );
            }
        }

        Self {
            nsid: doc.id.clone(),
            namespace: SmolStr::new(namespace),
            id: SmolStr::new(id),
            title_nsid: title_case(nsid),
            title_namespace: title_case(namespace),
            title_id: title_case(id),
            description: doc.description.clone(),
            revision: doc.revision,
            def_keys: doc.defs.keys().cloned().collect(),
            references,
            definitions,
        }
    }

    /// Module name of one of this document's definitions
    pub fn module_name(&self, key: &str) -> String {
        def_module_name(&self.nsid, key)
    }

    /// Directory this document's artifacts are written to, relative to the output root
    pub fn output_dir(&self) -> PathBuf {
        nsid_to_dir(&self.nsid)
    }

    pub fn has_definition(&self, key: &str) -> bool {
        self.def_keys.iter().any(|k| k == key)
    }
}

/// Compile one `defs` entry, or `None` for kinds that produce no code
pub fn compile_definition(nsid: &str, key: &str, node: &Value) -> Option<CompiledDefinition> {
    let key = SmolStr::new(key);
    let description = description_of(node);
    let def = match LexType::of(node) {
        Some(LexType::Object) => CompiledDefinition::Struct(StructDef {
            key,
            fields: build_fields(node, nsid),
            description,
        }),
        Some(LexType::Record) => {
            let record = node.get("record").unwrap_or(&Value::Null);
            CompiledDefinition::Schema(SchemaDef {
                key,
                primary_key: PrimaryKeyKind::from_key_style(str_field(node, "key")),
                fields: build_fields(record, nsid),
                description: description.or_else(|| description_of(record)),
            })
        }
        Some(LexType::Query) => {
            let params = node.get("parameters").unwrap_or(&Value::Null);
            CompiledDefinition::Query(RpcDef {
                input_fields: build_fields(params, nsid),
                input_type: None,
                input_encoding: None,
                ..rpc_common(nsid, key, node, description)
            })
        }
        Some(LexType::Procedure) => {
            let input = node.get("input");
            let schema = input.and_then(|i| i.get("schema"));
            let (input_fields, input_type) = match schema {
                Some(schema) if LexType::of(schema) == Some(LexType::Object) => {
                    let fields = build_fields(schema, nsid);
                    // a property-less object is still a body to send
                    let input_type = if fields.is_empty() {
                        input.map(|body| body_type(body, nsid))
                    } else {
                        None
                    };
                    (fields, input_type)
                }
                _ => (Vec::new(), input.map(|body| body_type(body, nsid))),
            };
            CompiledDefinition::Procedure(RpcDef {
                input_fields,
                input_type,
                input_encoding: input.and_then(|i| str_field(i, "encoding")).map(SmolStr::new),
                ..rpc_common(nsid, key, node, description)
            })
        }
        other => {
            tracing::debug!(
                nsid,
                %key,
                kind = other.map(LexType::as_str).unwrap_or("<none>"),
                "no code emitted for definition kind"
            );
            return None;
        }
    };
    Some(def)
}

/// Output and error details shared by queries and procedures
fn rpc_common(nsid: &str, key: SmolStr, node: &Value, description: Option<SmolStr>) -> RpcDef {
    let output = node.get("output");
    let errors = node
        .get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| str_field(e, "name"))
                .map(SmolStr::new)
                .collect()
        })
        .unwrap_or_default();
    RpcDef {
        key,
        nsid: SmolStr::new(nsid),
        input_fields: Vec::new(),
        input_type: None,
        output_type: output.map_or(NativeType::Null, |body| body_type(body, nsid)),
        input_encoding: None,
        output_encoding: output.and_then(|o| str_field(o, "encoding")).map(SmolStr::new),
        errors,
        description,
    }
}

/// Type of an RPC body: its schema, or raw bytes for non-JSON encodings
fn body_type(body: &Value, nsid: &str) -> NativeType {
    match body.get("schema") {
        Some(schema) => resolve_native_type(schema, nsid),
        None if is_json(str_field(body, "encoding")) => NativeType::Any,
        None => NativeType::Bytes,
    }
}

fn is_json(encoding: Option<&str>) -> bool {
    matches!(encoding, None | Some("application/json"))
}

fn description_of(node: &Value) -> Option<SmolStr> {
    str_field(node, "description").map(SmolStr::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintKind;
    use serde_json::json;

    #[test]
    fn test_record_with_tid_key() {
        let lexicon = Lexicon::from_json_str(
            r#"{"id":"com.example.thing","defs":{"main":{"type":"record","key":"tid","record":{"type":"object","required":["value"],"properties":{"value":{"type":"integer"}}}}}}"#,
        )
        .unwrap();
        let defs = &lexicon.definitions;
        assert!(defs.structs.is_empty());
        assert!(defs.xrpc().is_none());
        let schema = defs.schema.as_ref().unwrap();
        assert_eq!(schema.key, "main");
        assert_eq!(schema.primary_key, PrimaryKeyKind::OpaqueSortableId);
        assert_eq!(schema.fields.len(), 1);
        let value = &schema.fields[0];
        assert_eq!(value.name, "value");
        assert_eq!(value.native_type, NativeType::Integer);
        assert_eq!(value.storage_type, StorageType::Integer);
        assert!(value.required);
        assert!(value.constraints.is_empty());
        assert_eq!(value.default, DefaultValue::Literal(json!(0)));
    }

    #[test]
    fn test_name_components() {
        let lexicon = Lexicon::from_json_str(r#"{"id":"app.bsky.feed.getFeed","defs":{}}"#).unwrap();
        assert_eq!(lexicon.namespace, "app.bsky.feed");
        assert_eq!(lexicon.id, "getFeed");
        assert_eq!(lexicon.title_nsid, "App.Bsky.Feed.GetFeed");
        assert_eq!(lexicon.title_namespace, "App.Bsky.Feed");
        assert_eq!(lexicon.title_id, "GetFeed");
        assert_eq!(lexicon.module_name("main"), "App.Bsky.Feed.GetFeed.Main");
        assert!(lexicon.definitions.is_empty());
    }

    #[test]
    fn test_other_key_styles_are_sequential() {
        for key in [json!("literal:self"), json!("any"), json!(null)] {
            let def = compile_definition(
                "com.example.profile",
                "main",
                &json!({"type": "record", "key": key, "record": {"type": "object", "properties": {}}}),
            );
            match def {
                Some(CompiledDefinition::Schema(s)) => {
                    assert_eq!(s.primary_key, PrimaryKeyKind::SequentialInteger)
                }
                other => panic!("expected schema, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_unrecognized_kinds_are_skipped() {
        let lexicon = Lexicon::from_value(json!({
            "id": "com.example.misc",
            "defs": {
                "token": {"type": "token"},
                "sub": {"type": "subscription"},
                "str": {"type": "string"},
                "weird": {"type": "permission-set"}
            }
        }))
        .unwrap();
        assert!(lexicon.definitions.is_empty());
        assert_eq!(lexicon.def_keys, vec!["str", "sub", "token", "weird"]);
    }

    #[test]
    fn test_structs_keep_key_order() {
        let lexicon = Lexicon::from_value(json!({
            "id": "app.bsky.feed.defs",
            "defs": {
                "viewerState": {"type": "object", "properties": {}},
                "postView": {"type": "object", "properties": {}},
                "feedViewPost": {"type": "object", "properties": {}}
            }
        }))
        .unwrap();
        let keys: Vec<_> = lexicon.definitions.structs.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["feedViewPost", "postView", "viewerState"]);
    }

    #[test]
    fn test_build_fields() {
        let node = json!({
            "type": "object",
            "required": ["text", "missing"],
            "properties": {
                "text": {"type": "string", "maxLength": 3000, "maxGraphemes": 300, "foo": 1, "description": "The post"},
                "langs": {"type": "array", "maxLength": 3, "items": {"type": "string"}},
                "createdAt": {"type": "string", "format": "datetime"}
            }
        });
        let fields = build_fields(&node, "app.bsky.feed.post");
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["createdAt", "langs", "text"]);
        let text = &fields[2];
        assert!(text.required);
        assert_eq!(text.constraints.len(), 2);
        assert_eq!(text.constraints.bound(ConstraintKind::MaxGraphemes), Some(300));
        assert_eq!(text.default, DefaultValue::Absent);
        assert_eq!(text.description.as_deref(), Some("The post"));
        assert!(!fields[1].required);
        assert_eq!(fields[1].default, DefaultValue::Literal(json!([])));
        assert_eq!(fields[0].storage_type, StorageType::Timestamp);
        assert!(build_fields(&json!({"type": "object"}), "x.y").is_empty());
    }

    #[test]
    fn test_query() {
        let lexicon = Lexicon::from_value(json!({
            "id": "app.bsky.feed.getFeed",
            "defs": {
                "main": {
                    "type": "query",
                    "description": "Get a feed",
                    "parameters": {
                        "type": "params",
                        "required": ["feed"],
                        "properties": {
                            "feed": {"type": "string", "format": "at-uri"},
                            "limit": {"type": "integer", "minimum": 1, "maximum": 100, "default": 50}
                        }
                    },
                    "output": {
                        "encoding": "application/json",
                        "schema": {"type": "ref", "ref": "app.bsky.feed.defs#feedPage"}
                    },
                    "errors": [{"name": "UnknownFeed"}]
                }
            }
        }))
        .unwrap();
        let (kind, rpc) = lexicon.definitions.xrpc().unwrap();
        assert_eq!(kind, RpcKind::Query);
        assert_eq!(rpc.nsid, "app.bsky.feed.getFeed");
        assert_eq!(rpc.input_fields.len(), 2);
        assert_eq!(rpc.input_fields[1].default, DefaultValue::Literal(json!(50)));
        assert_eq!(rpc.output_type.to_string(), "App.Bsky.Feed.Defs.FeedPage.t()");
        assert_eq!(rpc.output_encoding.as_deref(), Some("application/json"));
        assert_eq!(rpc.errors, vec![SmolStr::new("UnknownFeed")]);
        assert_eq!(rpc.description.as_deref(), Some("Get a feed"));
        assert!(lexicon.references.contains("app.bsky.feed.defs#feedPage"));
    }

    #[test]
    fn test_procedure_bodies() {
        let inline = compile_definition(
            "com.atproto.repo.createRecord",
            "main",
            &json!({
                "type": "procedure",
                "input": {
                    "encoding": "application/json",
                    "schema": {"type": "object", "required": ["repo"], "properties": {"repo": {"type": "string"}}}
                }
            }),
        );
        let Some(CompiledDefinition::Procedure(rpc)) = inline else {
            panic!("expected procedure");
        };
        assert_eq!(rpc.input_fields.len(), 1);
        assert_eq!(rpc.input_type, None);
        assert_eq!(rpc.output_type, NativeType::Null);

        let upload = compile_definition(
            "com.atproto.repo.uploadBlob",
            "main",
            &json!({
                "type": "procedure",
                "input": {"encoding": "*/*"},
                "output": {"encoding": "application/json", "schema": {"type": "object", "properties": {"blob": {"type": "blob"}}}}
            }),
        );
        let Some(CompiledDefinition::Procedure(rpc)) = upload else {
            panic!("expected procedure");
        };
        assert!(rpc.input_fields.is_empty());
        assert_eq!(rpc.input_type, Some(NativeType::Bytes));
        assert_eq!(rpc.input_encoding.as_deref(), Some("*/*"));
        assert_eq!(rpc.output_type.to_string(), "%{blob: map()}");
    }

    #[test]
    fn test_empty_inline_body_is_still_sent() {
        let def = compile_definition(
            "com.example.ping",
            "main",
            &json!({
                "type": "procedure",
                "input": {"encoding": "application/json", "schema": {"type": "object", "properties": {}}}
            }),
        );
        let Some(CompiledDefinition::Procedure(rpc)) = def else {
            panic!("expected procedure");
        };
        assert!(rpc.input_fields.is_empty());
        assert_eq!(rpc.input_type, Some(NativeType::Record(Vec::new())));
        assert_eq!(rpc.input_encoding.as_deref(), Some("application/json"));
    }

    #[test]
    fn test_second_rpc_is_skipped() {
        let lexicon = Lexicon::from_value(json!({
            "id": "com.example.both",
            "defs": {
                "main": {"type": "procedure"},
                "alt": {"type": "query"},
                "other": {"type": "record", "record": {"type": "object"}},
                "zzz": {"type": "record", "key": "tid", "record": {"type": "object"}}
            }
        }))
        .unwrap();
        let defs = &lexicon.definitions;
        // "alt" sorts first
        let (kind, rpc) = defs.xrpc().unwrap();
        assert_eq!((kind, rpc.key.as_str()), (RpcKind::Query, "alt"));
        assert!(defs.procedure.is_none());
        assert_eq!(defs.schema.as_ref().unwrap().key, "other");
        assert_eq!(defs.len(), 2);
    }

    #[test]
    fn test_malformed_documents() {
        assert!(Lexicon::from_json_str("[]").unwrap_err().is_document_error());
        assert!(Lexicon::from_json_str(r#"{"defs":{}}"#).unwrap_err().is_document_error());
        assert!(
            Lexicon::from_json_str(r#"{"id":"a.b","defs":[]}"#)
                .unwrap_err()
                .is_document_error()
        );
        // an absolute path smuggled into the id never reaches nsid_to_dir
        let err = Lexicon::from_json_str(
            r#"{"id":"x./tmp/escape","defs":{"main":{"type":"object","properties":{}}}}"#,
        )
        .unwrap_err();
        assert!(err.is_document_error());
    }

    #[test]
    fn test_ir_serializes() {
        let lexicon = Lexicon::from_json_str(
            r#"{"id":"com.example.thing","defs":{"main":{"type":"record","key":"tid","record":{"type":"object","properties":{"n":{"type":"integer","minimum":0}}}}}}"#,
        )
        .unwrap();
        let ir = serde_json::to_value(&lexicon).unwrap();
        assert_eq!(ir["definitions"]["schema"]["primary_key"], json!("opaque-sortable-id"));
        let field = &ir["definitions"]["schema"]["fields"][0];
        assert_eq!(field["native_type"], json!("integer()"));
        assert_eq!(field["storage_type"], json!(":integer"));
        assert_eq!(field["constraints"], json!({"minimum": 0}));
        assert_eq!(field["default"], json!(0));
    }
}
