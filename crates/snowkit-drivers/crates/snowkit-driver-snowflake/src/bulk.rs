//! SQL generation for bulk loads

use snowkit_core::{Table, Value};

use crate::binding::{positional_bindings, Bindings};

/// Quote an identifier, doubling embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column type inferred from the first non-null value in each column
pub fn infer_column_types(table: &Table) -> Vec<&'static str> {
    (0..table.column_count())
        .map(|idx| {
            table
                .rows
                .iter()
                .filter_map(|row| row.get(idx))
                .find(|v| !v.is_null())
                .map_or("VARCHAR", column_type_for)
        })
        .collect()
}

fn column_type_for(value: &Value) -> &'static str {
    match value {
        Value::Null | Value::String(_) => "VARCHAR",
        Value::Bool(_) => "BOOLEAN",
        Value::Int64(_) => "NUMBER(38, 0)",
        Value::Float64(_) => "FLOAT",
        Value::Decimal(_) => "NUMBER(38, 12)",
        Value::Bytes(_) => "BINARY",
        Value::Date(_) => "DATE",
        Value::Time(_) => "TIME",
        Value::DateTime(_) => "TIMESTAMP_NTZ",
        Value::DateTimeUtc(_) => "TIMESTAMP_TZ",
        Value::Json(_) => "VARIANT",
    }
}

pub fn create_table_sql(qualified_name: &str, table: &Table) -> String {
    let columns = table
        .columns
        .iter()
        .zip(infer_column_types(table))
        .map(|(column, ty)| format!("{} {}", quote_identifier(&column.name), ty))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({})", qualified_name, columns)
}

/// One multi-row insert for a slice of rows.
///
/// Rows go through a `VALUES` subquery so semi-structured columns can be
/// wrapped in `PARSE_JSON`.
pub fn insert_chunk_sql(
    qualified_name: &str,
    table: &Table,
    column_types: &[&'static str],
    start: usize,
    len: usize,
) -> (String, Bindings) {
    let column_list = table
        .columns
        .iter()
        .map(|c| quote_identifier(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let select_list = column_types
        .iter()
        .enumerate()
        .map(|(idx, ty)| match *ty {
            "VARIANT" => format!("PARSE_JSON(column{})", idx + 1),
            _ => format!("column{}", idx + 1),
        })
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = format!("({})", vec!["?"; table.column_count()].join(", "));
    let rows = &table.rows[start..start + len];
    let tuples = vec![placeholders; rows.len()].join(", ");

    let values = rows.iter().flat_map(|row| {
        (0..table.column_count()).map(move |idx| row.get(idx).unwrap_or(&Value::Null))
    });

    let sql = format!(
        "INSERT INTO {} ({}) SELECT {} FROM VALUES {}",
        qualified_name, column_list, select_list, tuples
    );
    (sql, positional_bindings(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Table {
        Table::from_records(
            ["ID", "NAME", "ATTRS"],
            vec![
                vec![Value::Int64(1), Value::Null, Value::Json(serde_json::json!({"k": 1}))],
                vec![Value::Int64(2), Value::String("b".into()), Value::Null],
            ],
        )
    }

    #[test]
    fn test_create_table_sql() {
        assert_eq!(
            create_table_sql("DB.S.T", &sample()),
            "CREATE TABLE IF NOT EXISTS DB.S.T (\"ID\" NUMBER(38, 0), \"NAME\" VARCHAR, \"ATTRS\" VARIANT)"
        );
    }

    #[test]
    fn test_insert_chunk_sql() {
        let table = sample();
        let types = infer_column_types(&table);
        let (sql, bindings) = insert_chunk_sql("T", &table, &types, 0, 2);

        assert_eq!(
            sql,
            "INSERT INTO T (\"ID\", \"NAME\", \"ATTRS\") SELECT column1, column2, PARSE_JSON(column3) FROM VALUES (?, ?, ?), (?, ?, ?)"
        );
        assert_eq!(bindings.len(), 6);
        assert_eq!(bindings["5"].value.as_deref(), Some("b"));
        assert_eq!(bindings["6"].value, None);
    }

    #[test]
    fn test_quote_identifier_escapes() {
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }
}
