use crate::compiler::{FieldSpec, Lexicon, SchemaDef};
use crate::constraints::ConstraintKind;
use crate::error::Result;
use crate::names::snake_name;
use crate::syntax;
use crate::types::StorageType;
use serde::Serialize;
use serde_with::skip_serializing_none;
use smol_str::SmolStr;

use super::{CodeGenerator, field_binding};
use super::templates::{Bindings, Render, SchemaBindings, TemplateId};

/// Which measure a bound applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckKind {
    /// Numeric value
    Range,
    /// Length in bytes, for text and byte sequences
    ByteLength,
    /// Length in grapheme clusters
    GraphemeLength,
    /// Number of array items
    ItemCount,
}

/// A min/max check; at least one side is set
#[skip_serializing_none]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundCheck {
    pub kind: CheckKind,
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl BoundCheck {
    fn from_pair(
        field: &FieldSpec,
        kind: CheckKind,
        min: ConstraintKind,
        max: ConstraintKind,
    ) -> Option<Self> {
        let min = field.constraints.bound(min);
        let max = field.constraints.bound(max);
        (min.is_some() || max.is_some()).then_some(Self { kind, min, max })
    }
}

/// One operation of a record's validation pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
pub enum ValidationStep {
    /// Accept these fields from input
    Cast { fields: Vec<SmolStr> },
    /// Require these fields to be present
    Required { fields: Vec<SmolStr> },
    /// Bound checks on one field
    Check { field: SmolStr, checks: Vec<BoundCheck> },
}

/// Derive the validation pipeline for a record's fields
///
/// Cast comes first, then required, then one check step per field with a
/// recognised min/max pair for its storage type. A field whose constraints
/// hold no such pair contributes nothing.
pub fn validation_pipeline(fields: &[FieldSpec]) -> Vec<ValidationStep> {
    let mut steps = Vec::new();
    if !fields.is_empty() {
        steps.push(ValidationStep::Cast {
            fields: fields.iter().map(|f| f.name.clone()).collect(),
        });
    }
    let required: Vec<_> = fields
        .iter()
        .filter(|f| f.required)
        .map(|f| f.name.clone())
        .collect();
    if !required.is_empty() {
        steps.push(ValidationStep::Required { fields: required });
    }

    for field in fields.iter().filter(|f| !f.constraints.is_empty()) {
        let checks = bound_checks(field);
        if checks.is_empty() {
            tracing::debug!(field = %field.name, "no recognised bound pair; no check emitted");
            continue;
        }
        steps.push(ValidationStep::Check {
            field: field.name.clone(),
            checks,
        });
    }
    steps
}

fn bound_checks(field: &FieldSpec) -> Vec<BoundCheck> {
    use ConstraintKind::{MaxGraphemes, MaxLength, Maximum, MinGraphemes, MinLength, Minimum};
    let candidates = match &field.storage_type {
        StorageType::Integer => vec![BoundCheck::from_pair(field, CheckKind::Range, Minimum, Maximum)],
        StorageType::Text => vec![
            BoundCheck::from_pair(field, CheckKind::ByteLength, MinLength, MaxLength),
            BoundCheck::from_pair(field, CheckKind::GraphemeLength, MinGraphemes, MaxGraphemes),
        ],
        StorageType::ByteSequence => {
            vec![BoundCheck::from_pair(field, CheckKind::ByteLength, MinLength, MaxLength)]
        }
        StorageType::ArrayOf(_) => {
            vec![BoundCheck::from_pair(field, CheckKind::ItemCount, MinLength, MaxLength)]
        }
        _ => Vec::new(),
    };
    candidates.into_iter().flatten().collect()
}

/// Ecto source name: `app.bsky.feed.post` → `app_bsky_feed_post`
pub fn source_name(nsid: &str) -> String {
    nsid.split('.').map(snake_name).collect::<Vec<_>>().join("_")
}

/// Name of the primary key column
///
/// `id` when free, otherwise `rkey`, otherwise `rkey_2`, `rkey_3` and so on.
pub fn primary_key_name(fields: &[FieldSpec]) -> String {
    let taken = |name: &str| fields.iter().any(|f| f.name == name);
    if !taken("id") {
        return "id".to_string();
    }
    std::iter::once("rkey".to_string())
        .chain((2..).map(|n| format!("rkey_{n}")))
        .find(|name| !taken(name))
        .unwrap_or_default()
}

impl<R: Render> CodeGenerator<R> {
    /// Render the schema artifact for a record definition
    pub(super) fn generate_schema(&self, lexicon: &Lexicon, schema: &SchemaDef) -> Result<String> {
        let bindings = SchemaBindings {
            nsid: lexicon.nsid.to_string(),
            module: lexicon.module_name(&schema.key),
            description: schema.description.as_ref().map(ToString::to_string),
            source: source_name(&lexicon.nsid),
            primary_key: schema.primary_key,
            primary_key_atom: syntax::atom(&primary_key_name(&schema.fields)),
            runtime_module: self.runtime_module.clone(),
            fields: schema.fields.iter().map(field_binding).collect(),
            pipeline: validation_pipeline(&schema.fields),
        };
        self.renderer
            .render(TemplateId::Schema, &Bindings::Schema(bindings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::build_fields;
    use serde_json::json;

    fn fields(properties: serde_json::Value, required: &[&str]) -> Vec<FieldSpec> {
        build_fields(
            &json!({"type": "object", "properties": properties, "required": required}),
            "com.example.thing",
        )
    }

    #[test]
    fn test_cast_then_required_then_checks() {
        let fields = fields(
            json!({
                "text": {"type": "string", "maxLength": 3000, "maxGraphemes": 300},
                "count": {"type": "integer", "minimum": 1},
                "note": {"type": "string"}
            }),
            &["text"],
        );
        let steps = validation_pipeline(&fields);
        assert_eq!(
            steps,
            vec![
                ValidationStep::Cast {
                    fields: vec!["count".into(), "note".into(), "text".into()]
                },
                ValidationStep::Required {
                    fields: vec!["text".into()]
                },
                ValidationStep::Check {
                    field: "count".into(),
                    checks: vec![BoundCheck { kind: CheckKind::Range, min: Some(1), max: None }]
                },
                ValidationStep::Check {
                    field: "text".into(),
                    checks: vec![
                        BoundCheck { kind: CheckKind::ByteLength, min: None, max: Some(3000) },
                        BoundCheck { kind: CheckKind::GraphemeLength, min: None, max: Some(300) },
                    ]
                },
            ]
        );
    }

    #[test]
    fn test_no_required_step_without_required_fields() {
        let steps = validation_pipeline(&fields(json!({"a": {"type": "boolean"}}), &[]));
        assert_eq!(steps.len(), 1);
        assert!(matches!(steps[0], ValidationStep::Cast { .. }));
        assert!(validation_pipeline(&[]).is_empty());
    }

    #[test]
    fn test_bound_variants() {
        let fields = fields(
            json!({
                "both": {"type": "integer", "minimum": 0, "maximum": 10},
                "items": {"type": "array", "minLength": 1, "items": {"type": "string"}},
                "raw": {"type": "bytes", "maxLength": 64}
            }),
            &[],
        );
        let checks: Vec<_> = validation_pipeline(&fields)
            .into_iter()
            .filter_map(|step| match step {
                ValidationStep::Check { checks, .. } => Some(checks[0]),
                _ => None,
            })
            .collect();
        assert_eq!(
            checks,
            vec![
                BoundCheck { kind: CheckKind::Range, min: Some(0), max: Some(10) },
                BoundCheck { kind: CheckKind::ItemCount, min: Some(1), max: None },
                BoundCheck { kind: CheckKind::ByteLength, min: None, max: Some(64) },
            ]
        );
    }

    #[test]
    fn test_constraints_without_bounds_contribute_nothing() {
        let fields = fields(
            json!({
                "lang": {"type": "string", "knownValues": ["en"], "format": "language"},
                "flag": {"type": "boolean", "const": true},
                "when": {"type": "string", "format": "datetime", "maxLength": 64}
            }),
            &[],
        );
        let steps = validation_pipeline(&fields);
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn test_primary_key_avoids_field_names() {
        assert_eq!(primary_key_name(&fields(json!({"text": {"type": "string"}}), &[])), "id");
        assert_eq!(primary_key_name(&[]), "id");
        assert_eq!(primary_key_name(&fields(json!({"id": {"type": "string"}}), &[])), "rkey");
        let crowded = fields(
            json!({"id": {"type": "string"}, "rkey": {"type": "string"}, "rkey_2": {"type": "integer"}}),
            &[],
        );
        assert_eq!(primary_key_name(&crowded), "rkey_3");
    }

    #[test]
    fn test_source_name() {
        assert_eq!(source_name("app.bsky.feed.post"), "app_bsky_feed_post");
        assert_eq!(source_name("app.bsky.graph.listItem"), "app_bsky_graph_list_item");
    }
}
