use crate::error::{CodegenError, Result};
use dobby_common::types::nsid;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// A lexicon document as it appears on disk, before compilation.
///
/// Definitions stay as raw JSON nodes: the compiler classifies them by their
/// `type` tag and silently skips kinds it does not emit code for.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LexiconDoc {
    pub lexicon: Option<u32>,
    pub id: SmolStr,
    pub revision: Option<u32>,
    pub description: Option<SmolStr>,
    #[serde(default)]
    pub defs: BTreeMap<SmolStr, Value>,
}

impl LexiconDoc {
    /// Parse a document from raw bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let doc: Self = serde_json::from_slice(bytes).map_err(CodegenError::malformed_json)?;
        doc.check_id()?;
        Ok(doc)
    }

    /// Parse a document from text
    pub fn from_json_str(text: &str) -> Result<Self> {
        Self::from_slice(text.as_bytes())
    }

    /// Convert an already-parsed JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        let doc: Self = serde_json::from_value(value).map_err(CodegenError::malformed_json)?;
        doc.check_id()?;
        Ok(doc)
    }

    fn check_id(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(CodegenError::malformed("`id` is empty"));
        }
        // the id becomes a directory path and a module name
        nsid::validate(&self.id).map_err(|err| CodegenError::malformed(err.to_string()))
    }
}

/// The `type` discriminator of a lexicon node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LexType {
    // lexRefVariant
    Ref,
    Union,
    // lexPrimitive
    Null,
    Boolean,
    Integer,
    String,
    Unknown,
    // lexIpldType
    Bytes,
    CidLink,
    Blob,
    // complex
    Array,
    Object,
    Token,
    // primary
    Record,
    Query,
    Procedure,
    Subscription,
}

impl LexType {
    /// Parse a `type` tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        let ty = match tag {
            "ref" => Self::Ref,
            "union" => Self::Union,
            "null" => Self::Null,
            "boolean" => Self::Boolean,
            "integer" => Self::Integer,
            "string" => Self::String,
            "unknown" => Self::Unknown,
            "bytes" => Self::Bytes,
            "cid-link" => Self::CidLink,
            "blob" => Self::Blob,
            "array" => Self::Array,
            "object" => Self::Object,
            "token" => Self::Token,
            "record" => Self::Record,
            "query" => Self::Query,
            "procedure" => Self::Procedure,
            "subscription" => Self::Subscription,
            _ => return None,
        };
        Some(ty)
    }

    /// Read the `type` tag of a node
    pub fn of(node: &Value) -> Option<Self> {
        node.get("type").and_then(Value::as_str).and_then(Self::from_tag)
    }

    /// The tag as written in lexicon JSON
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ref => "ref",
            Self::Union => "union",
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Unknown => "unknown",
            Self::Bytes => "bytes",
            Self::CidLink => "cid-link",
            Self::Blob => "blob",
            Self::Array => "array",
            Self::Object => "object",
            Self::Token => "token",
            Self::Record => "record",
            Self::Query => "query",
            Self::Procedure => "procedure",
            Self::Subscription => "subscription",
        }
    }
}

impl std::fmt::Display for LexType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// String member of a node
pub(crate) fn str_field<'v>(node: &'v Value, key: &str) -> Option<&'v str> {
    node.get(key).and_then(Value::as_str)
}

/// `properties` map of an object-shaped node
pub(crate) fn properties(node: &Value) -> Option<&Map<String, Value>> {
    node.get("properties").and_then(Value::as_object)
}

/// Names listed in a node's `required` array; non-string entries are ignored
pub(crate) fn required_names(node: &Value) -> Vec<&str> {
    node.get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}
