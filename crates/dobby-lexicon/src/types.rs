//! Type resolution for individual field definitions.
//!
//! Every function here is total: an unrecognised or malformed node resolves
//! to the open/any type instead of failing. Recursion into arrays and
//! inline objects is bounded by [`MAX_DEPTH`].

use crate::lexicon::{LexType, properties, str_field};
use crate::names::{qualify_ref, resolve_ref};
use crate::syntax;
use serde::Serialize;
use serde_json::Value;
use serde_with::SerializeDisplay;
use smol_str::SmolStr;
use std::collections::BTreeSet;
use std::fmt;

/// Nesting depth past which nodes resolve to the open/any type
pub const MAX_DEPTH: usize = 32;

/// Coarse type tag used by persistence and validation code
#[derive(Debug, Clone, PartialEq, Eq, Hash, SerializeDisplay)]
pub enum StorageType {
    Text,
    Timestamp,
    Null,
    Integer,
    Boolean,
    ByteSequence,
    GenericStructured,
    ArrayOf(Box<StorageType>),
}

impl StorageType {
    /// Whether the column has no database representation
    pub fn is_virtual(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The element type, for arrays
    pub fn element(&self) -> Option<&StorageType> {
        match self {
            Self::ArrayOf(inner) => Some(inner),
            _ => None,
        }
    }
}

/// Renders as the Ecto field type
impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str(":string"),
            Self::Timestamp => f.write_str(":utc_datetime_usec"),
            Self::Null => f.write_str(":any"),
            Self::Integer => f.write_str(":integer"),
            Self::Boolean => f.write_str(":boolean"),
            Self::ByteSequence => f.write_str(":binary"),
            Self::GenericStructured => f.write_str(":map"),
            Self::ArrayOf(inner) => write!(f, "{{:array, {inner}}}"),
        }
    }
}

/// Native type expression of a field
#[derive(Debug, Clone, PartialEq, Eq, Hash, SerializeDisplay)]
pub enum NativeType {
    Text,
    Timestamp,
    Null,
    Integer,
    Boolean,
    Bytes,
    /// Blob reference: a generic map
    Map,
    /// Open type: unions and `unknown`
    Any,
    List(Box<NativeType>),
    /// Module name of a referenced definition
    Ref(String),
    /// Inline object, properties in key order
    Record(Vec<(SmolStr, NativeType)>),
}

/// Renders as an Elixir typespec
impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("String.t()"),
            Self::Timestamp => f.write_str("DateTime.t()"),
            Self::Null => f.write_str("nil"),
            Self::Integer => f.write_str("integer()"),
            Self::Boolean => f.write_str("boolean()"),
            Self::Bytes => f.write_str("binary()"),
            Self::Map => f.write_str("map()"),
            Self::Any => f.write_str("any()"),
            Self::List(inner) => write!(f, "list({inner})"),
            Self::Ref(module) => write!(f, "{module}.t()"),
            Self::Record(fields) if fields.is_empty() => f.write_str("map()"),
            Self::Record(fields) => {
                f.write_str("%{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} {ty}", syntax::keyword_key(name))?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Default value of a field
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DefaultValue {
    /// No default; the field starts out empty
    #[default]
    Absent,
    Literal(Value),
}

impl DefaultValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn literal(&self) -> Option<&Value> {
        match self {
            Self::Absent => None,
            Self::Literal(value) => Some(value),
        }
    }
}

/// Renders as an Elixir term, `nil` when absent
impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("nil"),
            Self::Literal(value) => f.write_str(&syntax::literal(value)),
        }
    }
}

/// Resolve the native type of a field definition
///
/// `nsid` is the enclosing document, used to qualify local references.
pub fn resolve_native_type(field: &Value, nsid: &str) -> NativeType {
    native_at(field, nsid, 0)
}

fn native_at(field: &Value, nsid: &str, depth: usize) -> NativeType {
    if depth > MAX_DEPTH {
        return NativeType::Any;
    }
    let Some(ty) = LexType::of(field) else {
        return NativeType::Any;
    };
    match ty {
        LexType::Ref => match str_field(field, "ref") {
            Some(reference) => NativeType::Ref(resolve_ref(nsid, reference)),
            None => NativeType::Any,
        },
        LexType::String if str_field(field, "format") == Some("datetime") => {
            NativeType::Timestamp
        }
        LexType::String | LexType::CidLink => NativeType::Text,
        LexType::Null => NativeType::Null,
        LexType::Integer => NativeType::Integer,
        LexType::Boolean => NativeType::Boolean,
        LexType::Bytes => NativeType::Bytes,
        LexType::Blob => NativeType::Map,
        LexType::Array => {
            let item = match field.get("items") {
                Some(items) => native_at(items, nsid, depth + 1),
                None => NativeType::Any,
            };
            NativeType::List(Box::new(item))
        }
        LexType::Object => {
            let fields = properties(field)
                .map(|props| {
                    props
                        .iter()
                        .map(|(name, prop)| (SmolStr::new(name), native_at(prop, nsid, depth + 1)))
                        .collect()
                })
                .unwrap_or_default();
            NativeType::Record(fields)
        }
        LexType::Union
        | LexType::Unknown
        | LexType::Token
        | LexType::Record
        | LexType::Query
        | LexType::Procedure
        | LexType::Subscription => NativeType::Any,
    }
}

/// Resolve the storage type of a field definition
pub fn resolve_storage_type(field: &Value) -> StorageType {
    storage_at(field, 0)
}

fn storage_at(field: &Value, depth: usize) -> StorageType {
    if depth > MAX_DEPTH {
        return StorageType::GenericStructured;
    }
    match LexType::of(field) {
        Some(LexType::String) if str_field(field, "format") == Some("datetime") => {
            StorageType::Timestamp
        }
        Some(LexType::String | LexType::CidLink) => StorageType::Text,
        Some(LexType::Null) => StorageType::Null,
        Some(LexType::Integer) => StorageType::Integer,
        Some(LexType::Boolean) => StorageType::Boolean,
        Some(LexType::Bytes) => StorageType::ByteSequence,
        Some(LexType::Array) => {
            let item = match field.get("items") {
                Some(items) => storage_at(items, depth + 1),
                None => StorageType::GenericStructured,
            };
            StorageType::ArrayOf(Box::new(item))
        }
        _ => StorageType::GenericStructured,
    }
}

/// Derive the default value of a field definition
///
/// An explicit `default` wins (stringified for `string` fields); otherwise
/// integers start at zero, booleans at false, arrays empty, and everything
/// else is absent.
pub fn default_value(field: &Value) -> DefaultValue {
    let ty = LexType::of(field);
    if let Some(explicit) = field.get("default").filter(|v| !v.is_null()) {
        let literal = match (ty, explicit) {
            (Some(LexType::String), Value::String(_)) => explicit.clone(),
            (Some(LexType::String), other) => Value::String(other.to_string()),
            _ => explicit.clone(),
        };
        return DefaultValue::Literal(literal);
    }
    match ty {
        Some(LexType::Integer) => DefaultValue::Literal(Value::from(0)),
        Some(LexType::Boolean) => DefaultValue::Literal(Value::Bool(false)),
        Some(LexType::Array) => DefaultValue::Literal(Value::Array(Vec::new())),
        _ => DefaultValue::Absent,
    }
}

/// Collect every reference reachable from `node`, qualified as `nsid#name`
pub fn collect_refs(node: &Value, nsid: &str, out: &mut BTreeSet<SmolStr>) {
    refs_at(node, nsid, out, 0);
}

fn refs_at(node: &Value, nsid: &str, out: &mut BTreeSet<SmolStr>, depth: usize) {
    if depth > MAX_DEPTH {
        return;
    }
    match node {
        Value::Object(map) => {
            match LexType::of(node) {
                Some(LexType::Ref) => {
                    if let Some(reference) = str_field(node, "ref") {
                        out.insert(qualify_ref(nsid, reference));
                    }
                }
                Some(LexType::Union) => {
                    let refs = node.get("refs").and_then(Value::as_array);
                    for reference in refs.into_iter().flatten().filter_map(Value::as_str) {
                        out.insert(qualify_ref(nsid, reference));
                    }
                }
                _ => {}
            }
            for child in map.values() {
                refs_at(child, nsid, out, depth + 1);
            }
        }
        Value::Array(items) => {
            for item in items {
                refs_at(item, nsid, out, depth + 1);
            }
        }
        _ => {}
    }
}
