use crate::compiler::{FieldSpec, Lexicon, RpcDef, RpcKind};
use crate::error::Result;
use crate::names::snake_name;
use crate::syntax;
use std::collections::HashSet;

use super::CodeGenerator;
use super::templates::{Bindings, Render, RpcParam, TemplateId, XrpcBindings};

/// Call parameter for one RPC input field
pub fn rpc_param(field: &FieldSpec) -> RpcParam {
    param_named(field, &snake_name(&field.name))
}

/// Call parameters for all input fields, in field order
///
/// Fields are snake-cased unless that would clash with another field's name;
/// the clashing field keeps its wire name. Names already in snake case win.
pub fn rpc_params(fields: &[FieldSpec]) -> Vec<RpcParam> {
    let mut taken: HashSet<String> = fields
        .iter()
        .filter(|f| snake_name(&f.name) == f.name.as_str())
        .map(|f| f.name.to_string())
        .collect();
    fields
        .iter()
        .map(|field| {
            let snake = snake_name(&field.name);
            if snake == field.name.as_str() {
                return param_named(field, &snake);
            }
            if taken.insert(snake.clone()) {
                param_named(field, &snake)
            } else {
                tracing::debug!(field = %field.name, clashes_with = %snake, "keeping wire name for parameter");
                taken.insert(field.name.to_string());
                param_named(field, &field.name)
            }
        })
        .collect()
}

fn param_named(field: &FieldSpec, name: &str) -> RpcParam {
    RpcParam {
        atom: syntax::atom(name),
        key: syntax::keyword_key(name),
        wire_name: field.name.to_string(),
        required: field.required,
        typespec: field.native_type.to_string(),
    }
}

/// Structural type of the parameter bag:
/// `%{required(:feed) => String.t(), optional(:limit) => integer()}`
pub fn params_type(params: &[RpcParam]) -> String {
    let entries: Vec<_> = params
        .iter()
        .map(|p| {
            let presence = if p.required { "required" } else { "optional" };
            format!("{presence}({}) => {}", p.atom, p.typespec)
        })
        .collect();
    format!("%{{{}}}", entries.join(", "))
}

impl<R: Render> CodeGenerator<R> {
    /// Render the xrpc artifact for a query or procedure
    pub(super) fn generate_xrpc(&self, lexicon: &Lexicon, kind: RpcKind, rpc: &RpcDef) -> Result<String> {
        let params = rpc_params(&rpc.input_fields);
        let bindings = XrpcBindings {
            nsid: rpc.nsid.to_string(),
            module: lexicon.module_name(&rpc.key),
            kind,
            function: snake_name(&lexicon.id),
            description: rpc.description.as_ref().map(ToString::to_string),
            params_type: params_type(&params),
            params,
            input_type: rpc.input_type.as_ref().map(ToString::to_string),
            output_type: rpc.output_type.to_string(),
            input_encoding: rpc.input_encoding.as_ref().map(ToString::to_string),
            output_encoding: rpc.output_encoding.as_ref().map(ToString::to_string),
            errors: rpc.errors.iter().map(ToString::to_string).collect(),
            runtime_module: self.runtime_module.clone(),
        };
        self.renderer
            .render(TemplateId::Xrpc, &Bindings::Xrpc(bindings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::build_fields;
    use serde_json::json;

    fn generate(json: serde_json::Value) -> String {
        let lexicon = Lexicon::from_value(json).unwrap();
        let (kind, rpc) = lexicon.definitions.xrpc().unwrap();
        CodeGenerator::new("Lexicon")
            .generate_xrpc(&lexicon, kind, rpc)
            .unwrap()
    }

    #[test]
    fn test_params() {
        let fields = build_fields(
            &json!({
                "type": "params",
                "required": ["feed"],
                "properties": {
                    "feed": {"type": "string"},
                    "limit": {"type": "integer"},
                    "includePins": {"type": "boolean"}
                }
            }),
            "app.bsky.feed.getFeed",
        );
        let params: Vec<_> = fields.iter().map(rpc_param).collect();
        assert_eq!(params[1].atom, ":include_pins");
        assert_eq!(params[1].wire_name, "includePins");
        assert_eq!(
            params_type(&params),
            "%{required(:feed) => String.t(), optional(:include_pins) => boolean(), optional(:limit) => integer()}"
        );
        assert_eq!(params_type(&[]), "%{}");
    }

    #[test]
    fn test_params_that_snake_case_alike() {
        let fields = build_fields(
            &json!({"type": "params", "properties": {
                "fooBar": {"type": "string"},
                "foo_bar": {"type": "integer"},
                "limit": {"type": "integer"}
            }}),
            "com.example.list",
        );
        let atoms: Vec<_> = rpc_params(&fields).into_iter().map(|p| p.atom).collect();
        assert_eq!(atoms, vec![":fooBar", ":foo_bar", ":limit"]);

        let out = generate(json!({
            "id": "com.example.list",
            "defs": {"main": {"type": "query", "parameters": {"type": "params", "properties": {
                "fooBar": {"type": "string"},
                "foo_bar": {"type": "integer"}
            }}}}
        }));
        assert!(out.contains("@params %{fooBar: \"fooBar\", foo_bar: \"foo_bar\"}"));
        assert!(out.contains("@type params :: %{optional(:fooBar) => String.t(), optional(:foo_bar) => integer()}"));
    }

    #[test]
    fn test_query_module() {
        let out = generate(json!({
            "id": "app.bsky.feed.getAuthorFeed",
            "defs": {"main": {
                "type": "query",
                "parameters": {"type": "params", "required": ["actor"], "properties": {
                    "actor": {"type": "string"},
                    "includePins": {"type": "boolean"}
                }},
                "output": {"encoding": "application/json", "schema": {"type": "ref", "ref": "app.bsky.feed.defs#feedPage"}},
                "errors": [{"name": "BlockedActor"}]
            }}
        }));
        assert!(out.contains("defmodule App.Bsky.Feed.GetAuthorFeed.Main do"));
        assert!(out.contains("@nsid \"app.bsky.feed.getAuthorFeed\""));
        assert!(out.contains("@params %{actor: \"actor\", include_pins: \"includePins\"}"));
        assert!(out.contains(
            "@type params :: %{required(:actor) => String.t(), optional(:include_pins) => boolean()}"
        ));
        assert!(out.contains("@type output :: App.Bsky.Feed.Defs.FeedPage.t()"));
        assert!(out.contains("def get_author_feed(client, params) do"));
        assert!(out.contains("Lexicon.XRPC.query(client, @nsid, Lexicon.XRPC.encode_params(params, @params))"));
        assert!(out.contains("BlockedActor"));
    }

    #[test]
    fn test_procedure_with_opaque_body() {
        let out = generate(json!({
            "id": "com.atproto.repo.uploadBlob",
            "defs": {"main": {
                "type": "procedure",
                "input": {"encoding": "*/*"},
                "output": {"encoding": "application/json", "schema": {"type": "object", "required": ["blob"], "properties": {"blob": {"type": "blob"}}}}
            }}
        }));
        assert!(out.contains("@type input :: binary()"));
        assert!(out.contains("def upload_blob(client, input) do"));
        assert!(out.contains("Lexicon.XRPC.procedure(client, @nsid, input, \"*/*\")"));
        assert!(out.contains("@type output :: %{blob: map()}"));
    }

    #[test]
    fn test_procedure_with_empty_inline_body() {
        let out = generate(json!({
            "id": "com.example.ping",
            "defs": {"main": {
                "type": "procedure",
                "input": {"encoding": "application/json", "schema": {"type": "object", "properties": {}}}
            }}
        }));
        assert!(out.contains("@type input :: map()"));
        assert!(out.contains("def ping(client, input) do"));
        assert!(out.contains("Lexicon.XRPC.procedure(client, @nsid, input, \"application/json\")"));
        assert!(!out.contains("nil, nil"));
    }

    #[test]
    fn test_procedure_without_input() {
        let out = generate(json!({
            "id": "com.atproto.server.deleteSession",
            "defs": {"main": {"type": "procedure"}}
        }));
        assert!(out.contains("def delete_session(client) do"));
        assert!(out.contains("Lexicon.XRPC.procedure(client, @nsid, nil, nil)"));
        assert!(out.contains("@type output :: nil"));
    }
}
