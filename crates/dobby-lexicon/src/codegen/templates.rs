//! The seam between artifact planning and text rendering.
//!
//! Bindings hold pre-rendered target syntax (atoms, typespecs, literals), so
//! a renderer only arranges them. They are all `Serialize`, which lets any
//! serde-driven template engine stand in for [`super::ElixirRenderer`].

use crate::compiler::{PrimaryKeyKind, RpcKind};
use crate::error::Result;
use serde::Serialize;
use serde_with::skip_serializing_none;
use std::fmt;

use super::schema::ValidationStep;

/// Identifies a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateId {
    Structs,
    Schema,
    Xrpc,
    CommonTid,
    CommonXrpc,
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Structs => "structs",
            Self::Schema => "schema",
            Self::Xrpc => "xrpc",
            Self::CommonTid => "common-tid",
            Self::CommonXrpc => "common-xrpc",
        };
        f.write_str(name)
    }
}

/// Renders a template against a binding set
pub trait Render: Send + Sync {
    fn render(&self, template: TemplateId, bindings: &Bindings) -> Result<String>;
}

/// Binding set for one template
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Bindings {
    Structs(StructsBindings),
    Schema(SchemaBindings),
    Xrpc(XrpcBindings),
    Common(CommonBindings),
}

/// One field, with every target spelling precomputed
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldBinding {
    /// Wire name
    pub name: String,
    /// `:name`
    pub atom: String,
    /// `name:`
    pub key: String,
    /// Typespec; optional fields include `| nil`
    pub typespec: String,
    /// Ecto type
    pub storage: String,
    pub is_virtual: bool,
    pub required: bool,
    /// Elixir term, absent when there is no default
    pub default: Option<String>,
    pub description: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructModule {
    pub module: String,
    pub description: Option<String>,
    pub fields: Vec<FieldBinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructsBindings {
    pub nsid: String,
    pub modules: Vec<StructModule>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaBindings {
    pub nsid: String,
    pub module: String,
    pub description: Option<String>,
    /// Ecto source (table) name
    pub source: String,
    pub primary_key: PrimaryKeyKind,
    /// Primary key atom, `:id` unless a field already claims that name
    pub primary_key_atom: String,
    pub runtime_module: String,
    pub fields: Vec<FieldBinding>,
    pub pipeline: Vec<ValidationStep>,
}

/// One RPC call parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcParam {
    /// Snake-cased parameter atom, `:include_pins`
    pub atom: String,
    /// Snake-cased keyword key, `include_pins:`
    pub key: String,
    /// Wire name, `includePins`
    pub wire_name: String,
    pub required: bool,
    pub typespec: String,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XrpcBindings {
    pub nsid: String,
    pub module: String,
    pub kind: RpcKind,
    /// Call function name
    pub function: String,
    pub description: Option<String>,
    pub params: Vec<RpcParam>,
    /// Structural literal for the parameter bag
    pub params_type: String,
    /// Body type of a procedure whose input is not an inline object
    pub input_type: Option<String>,
    pub output_type: String,
    pub input_encoding: Option<String>,
    pub output_encoding: Option<String>,
    pub errors: Vec<String>,
    pub runtime_module: String,
}

/// Bindings shared by the common support files
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommonBindings {
    pub runtime_module: String,
    /// Base-32 TID alphabet, in digit order
    pub tid_alphabet: String,
    pub tid_length: usize,
    pub clock_id_bits: u32,
}
