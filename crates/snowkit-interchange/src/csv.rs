//! CSV serialisation of in-memory tables

use snowkit_core::{Table, Value};

/// Formatting knobs for [`to_csv`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvOptions {
    pub field_delimiter: char,
    pub record_delimiter: String,
    /// Quote character, doubled when it appears inside a field
    pub text_qualifier: char,
    pub include_header: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            field_delimiter: ',',
            record_delimiter: "\n".to_string(),
            text_qualifier: '"',
            include_header: true,
        }
    }
}

/// Serialise `table` as CSV.
///
/// Fields are quoted only when they contain the delimiter, the qualifier or
/// a line break. NULL is written as an empty field. Row labels are never
/// written.
pub fn to_csv(table: &Table, options: &CsvOptions) -> String {
    let mut out = String::new();

    if options.include_header {
        let header: Vec<String> = table
            .columns
            .iter()
            .map(|c| qualify_field(&c.name, options))
            .collect();
        push_record(&mut out, &header, options);
    }

    for row in &table.rows {
        let fields: Vec<String> = row
            .values
            .iter()
            .map(|value| format_value(value, options))
            .collect();
        push_record(&mut out, &fields, options);
    }

    out
}

fn push_record(out: &mut String, fields: &[String], options: &CsvOptions) {
    let mut delimiter = [0u8; 4];
    let delimiter = options.field_delimiter.encode_utf8(&mut delimiter);
    out.push_str(&fields.join(delimiter));
    out.push_str(&options.record_delimiter);
}

fn format_value(value: &Value, options: &CsvOptions) -> String {
    match value {
        Value::Null => String::new(),
        other => qualify_field(&other.to_string(), options),
    }
}

fn qualify_field(value: &str, options: &CsvOptions) -> String {
    let q = options.text_qualifier;
    let needs_quotes = value.contains(options.field_delimiter)
        || value.contains(q)
        || value.contains('\n')
        || value.contains('\r');

    if !needs_quotes {
        return value.to_string();
    }
    let escaped = value.replace(q, &format!("{}{}", q, q));
    format!("{}{}{}", q, escaped, q)
}
