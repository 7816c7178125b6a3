//! Result formatting for tool output.
//!
//! Renders an executed result set as plain text in one of three formats.
//! Formatting is pure: it never touches the database and operates only on
//! already-materialized columns and rows, so the same result renders
//! identically no matter which backend produced it.

use std::str::FromStr;

use serde_json::{Map, Value as JsonValue};
use unicode_width::UnicodeWidthStr;

use crate::db::types::ColumnValue;
use crate::error::{GateError, GateResult};

/// Output format for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Aligned ASCII table (default)
    #[default]
    Table,
    /// Pretty-printed JSON array of objects
    Json,
    /// RFC 4180 CSV with a header row
    Csv,
}

impl FromStr for OutputFormat {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(GateError::format(format!(
                "Unknown output format '{}' (expected table, json, or csv)",
                other
            ))),
        }
    }
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

/// Render a value for table output.
///
/// Binary data is never echoed verbatim; it renders as a placeholder.
fn render_text(value: &ColumnValue) -> String {
    match value {
        ColumnValue::Null => "NULL".to_string(),
        ColumnValue::Bool(b) => b.to_string(),
        ColumnValue::Int(i) => i.to_string(),
        ColumnValue::Float(f) => f.to_string(),
        ColumnValue::Text(s) => s.clone(),
        ColumnValue::Binary(_) => "<binary>".to_string(),
        ColumnValue::Timestamp(ts) => ts.to_rfc3339(),
    }
}

/// Render a value for CSV output. Same as table text except null, which is
/// an empty field.
fn render_csv_cell(value: &ColumnValue) -> String {
    match value {
        ColumnValue::Null => String::new(),
        other => render_text(other),
    }
}

/// Render a value for JSON output, preserving native types where JSON has
/// them.
fn render_json(value: &ColumnValue) -> JsonValue {
    match value {
        ColumnValue::Null => JsonValue::Null,
        ColumnValue::Bool(b) => JsonValue::Bool(*b),
        ColumnValue::Int(i) => JsonValue::from(*i),
        ColumnValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(f.to_string())),
        ColumnValue::Text(s) => JsonValue::String(s.clone()),
        ColumnValue::Binary(_) => JsonValue::String("<binary>".to_string()),
        ColumnValue::Timestamp(ts) => JsonValue::String(ts.to_rfc3339()),
    }
}

/// Render columns and rows in the requested format.
pub fn render(
    columns: &[String],
    rows: &[Vec<ColumnValue>],
    format: OutputFormat,
) -> GateResult<String> {
    match format {
        OutputFormat::Table => Ok(render_table(columns, rows)),
        OutputFormat::Json => render_json_rows(columns, rows),
        OutputFormat::Csv => render_csv(columns, rows),
    }
}

/// One-line summary appended after a successful result.
pub fn result_summary(row_count: usize, column_count: usize, truncated: bool) -> String {
    let mut summary = format!("{} row(s), {} column(s)", row_count, column_count);
    if truncated {
        summary.push_str(", truncated");
    }
    summary
}

fn render_table(columns: &[String], rows: &[Vec<ColumnValue>]) -> String {
    if columns.is_empty() {
        return "(no columns)".to_string();
    }

    let rendered: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(render_text).collect())
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.width()).collect();
    for row in &rendered {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.width());
            }
        }
    }

    let mut out = String::new();
    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(name, w)| pad_right(name, *w))
        .collect();
    out.push_str(header.join(" | ").trim_end());
    out.push('\n');
    let divider: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&divider.join("-+-"));

    if rendered.is_empty() {
        out.push_str("\n(no rows)");
        return out;
    }

    for row in &rendered {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| pad_right(cell, *w))
            .collect();
        out.push('\n');
        out.push_str(cells.join(" | ").trim_end());
    }
    out
}

/// Left-justify to a display width, accounting for wide characters.
fn pad_right(s: &str, width: usize) -> String {
    let current = s.width();
    if current >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - current))
    }
}

fn render_json_rows(columns: &[String], rows: &[Vec<ColumnValue>]) -> GateResult<String> {
    let objects: Vec<Map<String, JsonValue>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .zip(row)
                .map(|(name, value)| (name.clone(), render_json(value)))
                .collect()
        })
        .collect();
    serde_json::to_string_pretty(&objects)
        .map_err(|e| GateError::format(format!("JSON serialization failed: {}", e)))
}

fn render_csv(columns: &[String], rows: &[Vec<ColumnValue>]) -> GateResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(columns)
        .map_err(|e| GateError::format(format!("CSV write failed: {}", e)))?;
    for row in rows {
        let record: Vec<String> = row.iter().map(render_csv_cell).collect();
        writer
            .write_record(&record)
            .map_err(|e| GateError::format(format!("CSV write failed: {}", e)))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| GateError::format(format!("CSV write failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| GateError::format(format!("CSV output not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample() -> (Vec<String>, Vec<Vec<ColumnValue>>) {
        let columns = vec!["id".to_string(), "name".to_string()];
        let rows = vec![
            vec![ColumnValue::Int(1), ColumnValue::Text("alice".to_string())],
            vec![ColumnValue::Int(2), ColumnValue::Null],
        ];
        (columns, rows)
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(" csv ".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        let err = "xml".parse::<OutputFormat>().unwrap_err();
        assert_eq!(err.kind(), "FormatError");
    }

    #[test]
    fn test_table_layout() {
        let (columns, rows) = sample();
        let text = render(&columns, &rows, OutputFormat::Table).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id | name");
        assert_eq!(lines[1], "---+-----");
        assert_eq!(lines[2], "1  | alice");
        assert_eq!(lines[3], "2  | NULL");
    }

    #[test]
    fn test_table_no_rows() {
        let columns = vec!["id".to_string()];
        let text = render(&columns, &[], OutputFormat::Table).unwrap();
        assert!(text.ends_with("(no rows)"));
        assert!(text.starts_with("id\n"));
    }

    #[test]
    fn test_table_no_columns() {
        let text = render(&[], &[], OutputFormat::Table).unwrap();
        assert_eq!(text, "(no columns)");
    }

    #[test]
    fn test_json_preserves_column_order_and_types() {
        let (columns, rows) = sample();
        let text = render(&columns, &rows, OutputFormat::Json).unwrap();
        let id_pos = text.find("\"id\"").unwrap();
        let name_pos = text.find("\"name\"").unwrap();
        assert!(id_pos < name_pos);
        let parsed: Vec<serde_json::Map<String, JsonValue>> =
            serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["id"], JsonValue::from(1));
        assert_eq!(parsed[1]["name"], JsonValue::Null);
    }

    #[test]
    fn test_csv_quoting() {
        let columns = vec!["note".to_string()];
        let rows = vec![vec![ColumnValue::Text("a,b \"c\"".to_string())]];
        let text = render(&columns, &rows, OutputFormat::Csv).unwrap();
        assert!(text.starts_with("note\n"));
        assert!(text.contains("\"a,b \"\"c\"\"\""));
    }

    #[test]
    fn test_csv_null_is_empty_field() {
        let columns = vec!["a".to_string(), "b".to_string()];
        let rows = vec![vec![ColumnValue::Null, ColumnValue::Int(1)]];
        let text = render(&columns, &rows, OutputFormat::Csv).unwrap();
        assert_eq!(text, "a,b\n,1\n");
    }

    #[test]
    fn test_binary_never_rendered_verbatim() {
        let columns = vec!["blob".to_string()];
        let rows = vec![vec![ColumnValue::Binary(vec![0xde, 0xad, 0xbe, 0xef])]];
        for format in [OutputFormat::Table, OutputFormat::Json, OutputFormat::Csv] {
            let text = render(&columns, &rows, format).unwrap();
            assert!(text.contains("<binary>"), "format {:?}", format);
        }
    }

    #[test]
    fn test_timestamp_rfc3339() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let columns = vec!["created".to_string()];
        let rows = vec![vec![ColumnValue::Timestamp(ts)]];
        let text = render(&columns, &rows, OutputFormat::Table).unwrap();
        assert!(text.contains("2024-05-01T12:30:00+00:00"));
    }

    #[test]
    fn test_float_without_json_representation_falls_back_to_string() {
        assert_eq!(
            render_json(&ColumnValue::Float(f64::NAN)),
            JsonValue::String("NaN".to_string())
        );
    }

    #[test]
    fn test_result_summary() {
        assert_eq!(result_summary(3, 2, false), "3 row(s), 2 column(s)");
        assert_eq!(result_summary(50_000, 2, true), "50000 row(s), 2 column(s), truncated");
    }
}
