//! Bind parameter translation
//!
//! The SQL API only understands positional `?` bindings keyed "1", "2", ...
//! with string values and an explicit type.

use serde::Serialize;
use snowkit_core::{QueryParams, Result, SnowkitError, Value};
use std::collections::BTreeMap;

/// One positional binding as sent to the SQL API
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Binding {
    #[serde(rename = "type")]
    pub type_name: &'static str,
    pub value: Option<String>,
}

impl Binding {
    pub fn from_value(value: &Value) -> Self {
        let (type_name, value) = match value {
            Value::Null => ("TEXT", None),
            Value::Bool(b) => ("BOOLEAN", Some(b.to_string())),
            Value::Int64(i) => ("FIXED", Some(i.to_string())),
            Value::Float64(f) => ("REAL", Some(f.to_string())),
            Value::Decimal(d) => ("FIXED", Some(d.clone())),
            Value::String(s) => ("TEXT", Some(s.clone())),
            Value::Bytes(b) => ("BINARY", Some(hex::encode(b))),
            // Temporal and semi-structured values travel as text and are
            // cast by the server.
            Value::Date(d) => ("TEXT", Some(d.format("%Y-%m-%d").to_string())),
            Value::Time(t) => ("TEXT", Some(t.format("%H:%M:%S%.f").to_string())),
            Value::DateTime(dt) => ("TEXT", Some(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string())),
            Value::DateTimeUtc(dt) => ("TEXT", Some(dt.to_rfc3339())),
            Value::Json(j) => ("TEXT", Some(j.to_string())),
        };
        Self { type_name, value }
    }
}

/// Positional bindings keyed by 1-based index
pub type Bindings = BTreeMap<String, Binding>;

/// Build positional bindings from values in order
pub fn positional_bindings<'a>(values: impl IntoIterator<Item = &'a Value>) -> Bindings {
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| ((i + 1).to_string(), Binding::from_value(v)))
        .collect()
}

/// Replace `:name` placeholders with `?`.
///
/// Returns the rewritten SQL and the placeholder names in order of
/// appearance. Placeholders inside string literals, quoted identifiers and
/// comments are left alone, as are `::` casts.
pub fn rewrite_named_placeholders(sql: &str) -> (String, Vec<String>) {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut names = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                let end = skip_quoted(&chars, i, c);
                out.extend(&chars[i..end]);
                i = end;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                let end = chars[i..]
                    .iter()
                    .position(|&ch| ch == '\n')
                    .map_or(chars.len(), |p| i + p);
                out.extend(&chars[i..end]);
                i = end;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let end = find_block_comment_end(&chars, i + 2);
                out.extend(&chars[i..end]);
                i = end;
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                out.push_str("::");
                i += 2;
            }
            ':' if chars
                .get(i + 1)
                .is_some_and(|ch| ch.is_ascii_alphabetic() || *ch == '_') =>
            {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                    end += 1;
                }
                names.push(chars[start..end].iter().collect());
                out.push('?');
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    (out, names)
}

/// Rewrite `sql` and bind `params` in placeholder order.
///
/// A placeholder with no matching parameter is an error; parameters that
/// no placeholder uses are ignored.
pub fn bind_named(sql: &str, params: Option<&QueryParams>) -> Result<(String, Bindings)> {
    let Some(params) = params else {
        return Ok((sql.to_string(), Bindings::new()));
    };

    let (rewritten, names) = rewrite_named_placeholders(sql);
    let mut values = Vec::with_capacity(names.len());
    for name in &names {
        let value = params
            .get(name)
            .ok_or_else(|| SnowkitError::Query(format!("missing bind parameter ':{}'", name)))?;
        values.push(value);
    }
    Ok((rewritten, positional_bindings(values)))
}

fn skip_quoted(chars: &[char], start: usize, quote: char) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            // A doubled quote is an escaped quote
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        if chars[i] == '\\' && quote == '\'' {
            i += 2;
            continue;
        }
        i += 1;
    }
    chars.len()
}

fn find_block_comment_end(chars: &[char], from: usize) -> usize {
    let mut i = from;
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '/' {
            return i + 2;
        }
        i += 1;
    }
    chars.len()
}
