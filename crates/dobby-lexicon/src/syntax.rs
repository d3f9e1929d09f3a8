//! Elixir lexical helpers: atoms, keyword keys, strings and literals.

use serde_json::Value;

/// Whether `name` can be written as a bare atom (`:name`, `name:`)
pub fn is_bare_atom(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// An atom literal: `:name`, or `:"odd-name"` when quoting is needed
pub fn atom(name: &str) -> String {
    if is_bare_atom(name) {
        format!(":{name}")
    } else {
        format!(":{}", string(name))
    }
}

/// A keyword/map shorthand key: `name:`, or `"odd-name":`
pub fn keyword_key(name: &str) -> String {
    if is_bare_atom(name) {
        format!("{name}:")
    } else {
        format!("{}:", string(name))
    }
}

/// A double-quoted string literal with escapes and interpolation disabled
pub fn string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '#' if chars.peek() == Some(&'{') => out.push_str("\\#"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render a JSON value as the equivalent Elixir term
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "nil".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => string(s),
        Value::Array(items) => {
            let items: Vec<_> = items.iter().map(literal).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => {
            let entries: Vec<_> = map
                .iter()
                .map(|(k, v)| format!("{} => {}", string(k), literal(v)))
                .collect();
            format!("%{{{}}}", entries.join(", "))
        }
    }
}

/// Render free text as a heredoc whose lines are indented by `indent` spaces
pub fn heredoc(text: &str, indent: usize) -> String {
    let pad = " ".repeat(indent);
    let mut out = String::from("\"\"\"\n");
    for line in text.trim_end().lines() {
        let line = line
            .trim_end()
            .replace('\\', "\\\\")
            .replace("\"\"\"", "\\\"\"\"")
            .replace("#{", "\\#{");
        if !line.is_empty() {
            out.push_str(&pad);
            out.push_str(&line);
        }
        out.push('\n');
    }
    out.push_str(&pad);
    out.push_str("\"\"\"");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_atoms() {
        assert_eq!(atom("text"), ":text");
        assert_eq!(atom("likeCount"), ":likeCount");
        assert_eq!(atom("$type"), ":\"$type\"");
        assert_eq!(atom("Upper"), ":\"Upper\"");
        assert_eq!(keyword_key("cid"), "cid:");
        assert_eq!(keyword_key("x-y"), "\"x-y\":");
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(string("a\"b"), "\"a\\\"b\"");
        assert_eq!(string("#{x}"), "\"\\#{x}\"");
        assert_eq!(string("# plain"), "\"# plain\"");
    }

    #[test]
    fn test_literals() {
        assert_eq!(literal(&json!(null)), "nil");
        assert_eq!(literal(&json!(0)), "0");
        assert_eq!(literal(&json!([])), "[]");
        assert_eq!(literal(&json!(["en", 2])), "[\"en\", 2]");
        assert_eq!(literal(&json!({"a": true})), "%{\"a\" => true}");
    }

    #[test]
    fn test_heredoc() {
        assert_eq!(heredoc("one\n\ntwo\n", 2), "\"\"\"\n  one\n\n  two\n  \"\"\"");
        assert_eq!(heredoc("say \"\"\" #{x}", 0), "\"\"\"\nsay \\\"\"\" \\#{x}\n\"\"\"");
    }
}
