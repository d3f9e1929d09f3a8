//! Built-in renderer producing Elixir source.

use crate::compiler::{PrimaryKeyKind, RpcKind};
use crate::error::{CodegenError, Result};
use crate::syntax;
use std::fmt::{self, Write};

use super::schema::{BoundCheck, CheckKind, ValidationStep};
use super::templates::{
    Bindings, CommonBindings, FieldBinding, Render, SchemaBindings, StructsBindings, TemplateId,
    XrpcBindings,
};

const GENERATED: &str = "# @generated by dobby-lexicon. DO NOT EDIT.";

/// Renders every template as Elixir using `std::fmt`
#[derive(Debug, Clone, Copy, Default)]
pub struct ElixirRenderer;

impl Render for ElixirRenderer {
    fn render(&self, template: TemplateId, bindings: &Bindings) -> Result<String> {
        let mut out = String::new();
        let written = match (template, bindings) {
            (TemplateId::Structs, Bindings::Structs(b)) => structs(&mut out, b),
            (TemplateId::Schema, Bindings::Schema(b)) => schema(&mut out, b),
            (TemplateId::Xrpc, Bindings::Xrpc(b)) => xrpc(&mut out, b),
            (TemplateId::CommonTid, Bindings::Common(b)) => common_tid(&mut out, b),
            (TemplateId::CommonXrpc, Bindings::Common(b)) => common_xrpc(&mut out, b),
            (template, _) => {
                return Err(CodegenError::render(
                    template,
                    "bindings do not belong to this template",
                ));
            }
        };
        written.map_err(|_| CodegenError::render(template, "formatter error"))?;
        Ok(out)
    }
}

fn header(out: &mut String, nsid: Option<&str>) -> fmt::Result {
    writeln!(out, "{GENERATED}")?;
    if let Some(nsid) = nsid {
        writeln!(out, "#")?;
        writeln!(out, "# Lexicon: {nsid}")?;
    }
    writeln!(out)
}

fn moduledoc(out: &mut String, text: Option<&str>) -> fmt::Result {
    match text {
        Some(text) if !text.trim().is_empty() => {
            writeln!(out, "  @moduledoc {}", syntax::heredoc(text, 2))?;
            writeln!(out)
        }
        _ => Ok(()),
    }
}

/// Atom list: `[:a, :b]`
fn atom_list<'a>(atoms: impl IntoIterator<Item = &'a str>) -> String {
    let atoms: Vec<_> = atoms.into_iter().collect();
    format!("[{}]", atoms.join(", "))
}

fn struct_type(out: &mut String, fields: &[FieldBinding]) -> fmt::Result {
    if fields.is_empty() {
        return writeln!(out, "  @type t :: %__MODULE__{{}}");
    }
    writeln!(out, "  @type t :: %__MODULE__{{")?;
    let last = fields.len() - 1;
    for (i, field) in fields.iter().enumerate() {
        let sep = if i == last { "" } else { "," };
        writeln!(out, "          {} {}{sep}", field.key, field.typespec)?;
    }
    writeln!(out, "        }}")
}

fn structs(out: &mut String, b: &StructsBindings) -> fmt::Result {
    header(out, Some(&b.nsid))?;
    for (i, module) in b.modules.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        writeln!(out, "defmodule {} do", module.module)?;
        moduledoc(out, module.description.as_deref())?;

        let enforced: Vec<_> = module
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.atom.as_str())
            .collect();
        if !enforced.is_empty() {
            writeln!(out, "  @enforce_keys {}", atom_list(enforced))?;
        }

        if module.fields.is_empty() {
            writeln!(out, "  defstruct []")?;
        } else {
            writeln!(out, "  defstruct [")?;
            let last = module.fields.len() - 1;
            for (i, field) in module.fields.iter().enumerate() {
                let sep = if i == last { "" } else { "," };
                let default = field.default.as_deref().unwrap_or("nil");
                writeln!(out, "    {} {default}{sep}", field.key)?;
            }
            writeln!(out, "  ]")?;
        }
        writeln!(out)?;
        struct_type(out, &module.fields)?;
        writeln!(out, "end")?;
    }
    Ok(())
}

fn schema(out: &mut String, b: &SchemaBindings) -> fmt::Result {
    header(out, Some(&b.nsid))?;
    writeln!(out, "defmodule {} do", b.module)?;
    moduledoc(out, b.description.as_deref())?;
    writeln!(out, "  use Ecto.Schema")?;
    writeln!(out, "  import Ecto.Changeset")?;
    writeln!(out)?;

    match b.primary_key {
        PrimaryKeyKind::OpaqueSortableId => writeln!(
            out,
            "  @primary_key {{{}, :string, autogenerate: {{{}.TID, :generate, []}}}}",
            b.primary_key_atom, b.runtime_module
        )?,
        PrimaryKeyKind::SequentialInteger => writeln!(
            out,
            "  @primary_key {{{}, :id, autogenerate: true}}",
            b.primary_key_atom
        )?,
    }
    writeln!(out, "  schema {} do", syntax::string(&b.source))?;
    for field in &b.fields {
        write!(out, "    field {}, {}", field.atom, field.storage)?;
        if let Some(default) = &field.default {
            write!(out, ", default: {default}")?;
        }
        if field.is_virtual {
            write!(out, ", virtual: true")?;
        }
        writeln!(out)?;
    }
    writeln!(out, "  end")?;
    writeln!(out)?;

    writeln!(out, "  @type t :: %__MODULE__{{}}")?;
    writeln!(out)?;
    writeln!(out, "  @spec changeset(t(), map()) :: Ecto.Changeset.t()")?;
    if b.pipeline.is_empty() {
        writeln!(out, "  def changeset(record, _params \\\\ %{{}}), do: change(record)")?;
    } else {
        writeln!(out, "  def changeset(record, params \\\\ %{{}}) do")?;
        writeln!(out, "    record")?;
        for step in &b.pipeline {
            pipeline_step(out, step)?;
        }
        writeln!(out, "  end")?;
    }
    writeln!(out, "end")
}

fn pipeline_step(out: &mut String, step: &ValidationStep) -> fmt::Result {
    match step {
        ValidationStep::Cast { fields } => {
            let atoms: Vec<_> = fields.iter().map(|f| syntax::atom(f)).collect();
            writeln!(out, "    |> cast(params, {})", atom_list(atoms.iter().map(String::as_str)))
        }
        ValidationStep::Required { fields } => {
            let atoms: Vec<_> = fields.iter().map(|f| syntax::atom(f)).collect();
            writeln!(out, "    |> validate_required({})", atom_list(atoms.iter().map(String::as_str)))
        }
        ValidationStep::Check { field, checks } => {
            let atom = syntax::atom(field);
            for check in checks {
                bound_check(out, &atom, check)?;
            }
            Ok(())
        }
    }
}

fn bound_check(out: &mut String, atom: &str, check: &BoundCheck) -> fmt::Result {
    let mut opts = Vec::new();
    let (min_key, max_key) = match check.kind {
        CheckKind::Range => ("greater_than_or_equal_to", "less_than_or_equal_to"),
        _ => ("min", "max"),
    };
    if let Some(min) = check.min {
        opts.push(format!("{min_key}: {min}"));
    }
    if let Some(max) = check.max {
        opts.push(format!("{max_key}: {max}"));
    }
    let function = match check.kind {
        CheckKind::Range => "validate_number",
        CheckKind::ByteLength => {
            opts.push("count: :bytes".to_string());
            "validate_length"
        }
        CheckKind::GraphemeLength | CheckKind::ItemCount => "validate_length",
    };
    writeln!(out, "    |> {function}({atom}, {})", opts.join(", "))
}

fn xrpc(out: &mut String, b: &XrpcBindings) -> fmt::Result {
    let runtime = format!("{}.XRPC", b.runtime_module);
    header(out, Some(&b.nsid))?;
    writeln!(out, "defmodule {} do", b.module)?;

    let mut doc = b.description.clone().unwrap_or_default();
    if !b.errors.is_empty() {
        if !doc.is_empty() {
            doc.push_str("\n\n");
        }
        let names: Vec<_> = b.errors.iter().map(|e| format!("`{e}`")).collect();
        doc.push_str(&format!("Errors: {}.", names.join(", ")));
    }
    moduledoc(out, Some(&doc))?;

    writeln!(out, "  @nsid {}", syntax::string(&b.nsid))?;
    let inline_params = b.kind == RpcKind::Query || !b.params.is_empty();
    if inline_params {
        let names: Vec<_> = b
            .params
            .iter()
            .map(|p| format!("{} {}", p.key, syntax::string(&p.wire_name)))
            .collect();
        writeln!(out, "  @params %{{{}}}", names.join(", "))?;
    }
    writeln!(out)?;

    let arg = match b.kind {
        RpcKind::Query => {
            writeln!(out, "  @type params :: {}", b.params_type)?;
            Some("params")
        }
        RpcKind::Procedure if inline_params => {
            writeln!(out, "  @type input :: {}", b.params_type)?;
            Some("input")
        }
        RpcKind::Procedure => match &b.input_type {
            Some(input) => {
                writeln!(out, "  @type input :: {input}")?;
                Some("input")
            }
            None => None,
        },
    };
    writeln!(out, "  @type output :: {}", b.output_type)?;
    writeln!(out)?;

    let spec_args = match arg {
        Some(arg) => format!("{runtime}.client(), {arg}()"),
        None => format!("{runtime}.client()"),
    };
    writeln!(
        out,
        "  @spec {}({spec_args}) :: {{:ok, output()}} | {{:error, term()}}",
        b.function
    )?;

    let optional = b.kind == RpcKind::Query && b.params.iter().all(|p| !p.required);
    let signature = match arg {
        Some(arg) if optional => format!("client, {arg} \\\\ %{{}}"),
        Some(arg) => format!("client, {arg}"),
        None => "client".to_string(),
    };
    writeln!(out, "  def {}({signature}) do", b.function)?;

    let encoding = syntax::string(b.input_encoding.as_deref().unwrap_or("application/json"));
    match (b.kind, arg) {
        (RpcKind::Query, _) => writeln!(
            out,
            "    {runtime}.query(client, @nsid, {runtime}.encode_params(params, @params))"
        )?,
        (RpcKind::Procedure, Some(arg)) if inline_params => writeln!(
            out,
            "    {runtime}.procedure(client, @nsid, {runtime}.encode_params({arg}, @params), {encoding})"
        )?,
        (RpcKind::Procedure, Some(arg)) => writeln!(
            out,
            "    {runtime}.procedure(client, @nsid, {arg}, {encoding})"
        )?,
        (RpcKind::Procedure, None) => {
            writeln!(out, "    {runtime}.procedure(client, @nsid, nil, nil)")?
        }
    }
    writeln!(out, "  end")?;
    writeln!(out, "end")
}

fn common_tid(out: &mut String, b: &CommonBindings) -> fmt::Result {
    header(out, None)?;
    let module = format!("{}.TID", b.runtime_module);
    let alphabet = syntax::string(&b.tid_alphabet);
    let length = b.tid_length;
    let bits = b.clock_id_bits;
    write!(
        out,
        r#"defmodule {module} do
  @moduledoc """
  Timestamp identifiers.

  A TID packs a 53-bit microsecond timestamp and a {bits}-bit clock id into
  a 63-bit integer, written as {length} base-32 characters. String order
  matches numeric order.
  """

  import Bitwise

  @alphabet {alphabet}
  @length {length}
  @clock_id_bits {bits}
  @clock_id_mask (1 <<< @clock_id_bits) - 1
  @max_value (1 <<< 63) - 1
  @timestamp_mask @max_value - @clock_id_mask

  @type t :: String.t()

  @doc "Generates a TID for the current time with a random clock id."
  @spec generate() :: t()
  def generate, do: encode(nil, nil)

  @doc """
  Encodes a microsecond timestamp and clock id.

  A missing timestamp means now; a missing clock id is drawn at random.
  Clock ids are truncated to their low {bits} bits.
  """
  @spec encode(non_neg_integer() | nil, non_neg_integer() | nil) :: t()
  def encode(timestamp \\ nil, clock_id \\ nil) do
    timestamp = timestamp || System.os_time(:microsecond)
    clock_id = clock_id || :rand.uniform(@clock_id_mask + 1) - 1

    value =
      ((timestamp <<< @clock_id_bits) &&& @timestamp_mask) |||
        (clock_id &&& @clock_id_mask)

    encode_integer(value)
  end

  @doc "Encodes a 63-bit integer as a fixed-width TID string."
  @spec encode_integer(non_neg_integer()) :: t()
  def encode_integer(value) do
    for shift <- (@length - 1)..0//-1, into: "" do
      binary_part(@alphabet, (value >>> (shift * 5)) &&& 31, 1)
    end
  end

  @spec decode(t()) ::
          {{:ok, %{{timestamp: non_neg_integer(), clock_id: non_neg_integer()}}}}
          | {{:error, :invalid_tid}}
  def decode(tid) when is_binary(tid) and byte_size(tid) == @length do
    tid
    |> :binary.bin_to_list()
    |> Enum.reduce_while(0, fn char, acc ->
      case :binary.match(@alphabet, <<char>>) do
        {{index, 1}} -> {{:cont, acc * 32 + index}}
        :nomatch -> {{:halt, :error}}
      end
    end)
    |> case do
      value when is_integer(value) and value <= @max_value ->
        {{:ok, %{{timestamp: value >>> @clock_id_bits, clock_id: value &&& @clock_id_mask}}}}

      _ ->
        {{:error, :invalid_tid}}
    end
  end

  def decode(_tid), do: {{:error, :invalid_tid}}

  @spec valid?(term()) :: boolean()
  def valid?(tid), do: match?({{:ok, _}}, decode(tid))
end
"#
    )
}

fn common_xrpc(out: &mut String, b: &CommonBindings) -> fmt::Result {
    header(out, None)?;
    let module = format!("{}.XRPC", b.runtime_module);
    write!(
        out,
        r#"defmodule {module} do
  @moduledoc """
  Runtime support for generated XRPC modules.

  A client is a map holding a `:base_url` and a `:request` function. The
  request function receives a request map and returns `{{:ok, body}}` or
  `{{:error, reason}}`, so generated code does not depend on an HTTP library.
  """

  @type request :: %{{
          method: :get | :post,
          url: String.t(),
          query: %{{optional(String.t()) => term()}},
          body: term(),
          content_type: String.t() | nil
        }}

  @type client :: %{{
          required(:base_url) => String.t(),
          required(:request) => (request() -> {{:ok, term()}} | {{:error, term()}})
        }}

  @spec query(client(), String.t(), map()) :: {{:ok, term()}} | {{:error, term()}}
  def query(client, nsid, params) do
    send_request(client, %{{
      method: :get,
      url: url(client, nsid),
      query: params,
      body: nil,
      content_type: nil
    }})
  end

  @spec procedure(client(), String.t(), term(), String.t() | nil) ::
          {{:ok, term()}} | {{:error, term()}}
  def procedure(client, nsid, body, content_type) do
    send_request(client, %{{
      method: :post,
      url: url(client, nsid),
      query: %{{}},
      body: body,
      content_type: content_type
    }})
  end

  @doc "Drops `nil` values and renames parameter atoms to their wire names."
  @spec encode_params(map() | keyword(), %{{optional(atom()) => String.t()}}) ::
          %{{optional(String.t()) => term()}}
  def encode_params(params, names) do
    for {{key, value}} <- params, not is_nil(value), into: %{{}} do
      {{Map.get(names, key, to_string(key)), encode_value(value)}}
    end
  end

  defp encode_value(%DateTime{{}} = value), do: DateTime.to_iso8601(value)
  defp encode_value(values) when is_list(values), do: Enum.map(values, &encode_value/1)
  defp encode_value(value), do: value

  defp url(%{{base_url: base_url}}, nsid),
    do: String.trim_trailing(base_url, "/") <> "/xrpc/" <> nsid

  defp send_request(%{{request: request}}, req) when is_function(request, 1), do: request.(req)
  defp send_request(_client, _req), do: {{:error, :missing_request_function}}
end
"#
    )
}
