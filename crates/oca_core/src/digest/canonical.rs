//! Canonical JSON rendering used as digest input.
//!
//! Object keys are emitted in byte order, no insignificant whitespace is
//! written, and strings use minimal escaping. Two values that differ only in
//! map insertion order render to identical bytes.

use serde_json::{Map, Number, Value};
use std::fmt::Write as _;

/// Renders `value` in canonical form.
pub fn to_canonical_string(value: &Value) -> String {
    let mut output = String::new();
    emit_value(value, &mut output);
    output
}

fn emit_value(value: &Value, output: &mut String) {
    match value {
        Value::Null => output.push_str("null"),
        Value::Bool(b) => output.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => emit_number(n, output),
        Value::String(s) => emit_string(s, output),
        Value::Array(items) => emit_array(items, output),
        Value::Object(obj) => emit_object(obj, output),
    }
}

fn emit_number(n: &Number, output: &mut String) {
    if let Some(i) = n.as_i64() {
        let _ = write!(output, "{i}");
    } else if let Some(u) = n.as_u64() {
        let _ = write!(output, "{u}");
    } else {
        output.push_str(&n.to_string());
    }
}

fn emit_string(s: &str, output: &mut String) {
    output.push('"');
    for c in s.chars() {
        match c {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\u{0008}' => output.push_str("\\b"),
            '\u{000C}' => output.push_str("\\f"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            c if ('\u{0000}'..='\u{001F}').contains(&c) => {
                let _ = write!(output, "\\u{:04x}", c as u32);
            }
            c => output.push(c),
        }
    }
    output.push('"');
}

fn emit_array(items: &[Value], output: &mut String) {
    output.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            output.push(',');
        }
        emit_value(item, output);
    }
    output.push(']');
}

fn emit_object(obj: &Map<String, Value>, output: &mut String) {
    let mut keys: Vec<&String> = obj.keys().collect();
    keys.sort();

    output.push('{');
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            output.push(',');
        }
        emit_string(key, output);
        output.push(':');
        emit_value(&obj[*key], output);
    }
    output.push('}');
}
