//! Per-field constraint sets.
//!
//! Which constraint keys a field may carry depends on its JSON type. Keys
//! that do not apply to the type are dropped, as are absent and `null`
//! values, so a constraint set never contains an entry it cannot honour.

use crate::lexicon::LexType;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// A constraint key from the lexicon vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstraintKind {
    Default,
    Const,
    Minimum,
    Maximum,
    Enum,
    Format,
    MinLength,
    MaxLength,
    MinGraphemes,
    MaxGraphemes,
    KnownValues,
    Items,
    Accept,
    MaxSize,
    Refs,
    Closed,
}

const BOOLEAN: &[ConstraintKind] = &[ConstraintKind::Default, ConstraintKind::Const];

const INTEGER: &[ConstraintKind] = &[
    ConstraintKind::Minimum,
    ConstraintKind::Maximum,
    ConstraintKind::Enum,
    ConstraintKind::Default,
    ConstraintKind::Const,
];

const STRING: &[ConstraintKind] = &[
    ConstraintKind::Format,
    ConstraintKind::MinLength,
    ConstraintKind::MaxLength,
    ConstraintKind::MinGraphemes,
    ConstraintKind::MaxGraphemes,
    ConstraintKind::KnownValues,
    ConstraintKind::Enum,
    ConstraintKind::Default,
    ConstraintKind::Const,
];

const BYTES: &[ConstraintKind] = &[ConstraintKind::MinLength, ConstraintKind::MaxLength];

const ARRAY: &[ConstraintKind] = &[
    ConstraintKind::MinLength,
    ConstraintKind::MaxLength,
    ConstraintKind::Items,
];

const BLOB: &[ConstraintKind] = &[ConstraintKind::Accept, ConstraintKind::MaxSize];

const UNION: &[ConstraintKind] = &[ConstraintKind::Refs, ConstraintKind::Closed];

impl ConstraintKind {
    /// The key as spelled in lexicon JSON
    pub fn key(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Const => "const",
            Self::Minimum => "minimum",
            Self::Maximum => "maximum",
            Self::Enum => "enum",
            Self::Format => "format",
            Self::MinLength => "minLength",
            Self::MaxLength => "maxLength",
            Self::MinGraphemes => "minGraphemes",
            Self::MaxGraphemes => "maxGraphemes",
            Self::KnownValues => "knownValues",
            Self::Items => "items",
            Self::Accept => "accept",
            Self::MaxSize => "maxSize",
            Self::Refs => "refs",
            Self::Closed => "closed",
        }
    }

    /// Constraint keys valid for a JSON type
    pub fn applicable(ty: LexType) -> &'static [ConstraintKind] {
        match ty {
            LexType::Boolean => BOOLEAN,
            LexType::Integer => INTEGER,
            LexType::String => STRING,
            LexType::Bytes => BYTES,
            LexType::Array => ARRAY,
            LexType::Blob => BLOB,
            LexType::Union => UNION,
            _ => &[],
        }
    }
}

/// Constraints attached to one field, keyed by kind
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Constraints(BTreeMap<ConstraintKind, Value>);

impl Constraints {
    /// Collect the applicable constraints of a field definition
    ///
    /// A node without a recognised `type` has no applicable constraints.
    pub fn extract(field: &Value) -> Self {
        let Some(ty) = LexType::of(field) else {
            return Self::default();
        };
        let constraints = ConstraintKind::applicable(ty)
            .iter()
            .filter_map(|kind| match field.get(kind.key()) {
                None | Some(Value::Null) => None,
                Some(bound) => Some((*kind, bound.clone())),
            })
            .collect();
        Self(constraints)
    }

    pub fn get(&self, kind: ConstraintKind) -> Option<&Value> {
        self.0.get(&kind)
    }

    /// Integer bound for `kind`, if present and integral
    pub fn bound(&self, kind: ConstraintKind) -> Option<i64> {
        self.get(kind).and_then(Value::as_i64)
    }

    pub fn contains(&self, kind: ConstraintKind) -> bool {
        self.0.contains_key(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConstraintKind, &Value)> {
        self.0.iter().map(|(kind, value)| (*kind, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unrelated_keys_are_dropped() {
        let c = Constraints::extract(&json!({"type": "string", "minLength": 1, "foo": 2}));
        assert_eq!(c.len(), 1);
        assert_eq!(c.get(ConstraintKind::MinLength), Some(&json!(1)));
    }

    #[test]
    fn test_keys_of_other_types_are_dropped() {
        // minimum is an integer constraint
        let c = Constraints::extract(&json!({"type": "string", "minimum": 3, "maxGraphemes": 30}));
        assert!(!c.contains(ConstraintKind::Minimum));
        assert_eq!(c.bound(ConstraintKind::MaxGraphemes), Some(30));
    }

    #[test]
    fn test_null_values_are_omitted() {
        let c = Constraints::extract(&json!({"type": "integer", "maximum": null, "minimum": 0}));
        assert_eq!(c.len(), 1);
        assert_eq!(c.bound(ConstraintKind::Minimum), Some(0));
    }

    #[test]
    fn test_types_without_constraints() {
        for node in [
            json!({"type": "ref", "ref": "#x", "minLength": 1}),
            json!({"type": "unknown", "default": 1}),
            json!({"type": "cid-link", "maxLength": 1}),
            json!({"maxLength": 3}),
        ] {
            assert!(Constraints::extract(&node).is_empty(), "{node}");
        }
    }

    #[test]
    fn test_union_and_blob() {
        let c = Constraints::extract(&json!({"type": "union", "refs": ["#a"], "closed": true}));
        assert_eq!(c.len(), 2);
        let c = Constraints::extract(&json!({"type": "blob", "accept": ["image/*"], "maxSize": 1000000}));
        assert_eq!(c.bound(ConstraintKind::MaxSize), Some(1_000_000));
    }

    #[test]
    fn test_serializes_with_lexicon_keys() {
        let c = Constraints::extract(&json!({"type": "array", "maxLength": 4, "items": {"type": "string"}}));
        let out = serde_json::to_value(&c).unwrap();
        assert_eq!(out["maxLength"], json!(4));
        assert_eq!(out["items"], json!({"type": "string"}));
    }
}
