//! Persists shaped query results to disk as JSON or CSV. Export is always
//! non-fatal: any I/O failure is reported as a structured error alongside
//! the row count, and the in-memory result stays valid.

use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::shape::JsonRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

#[derive(Debug, Error)]
enum ExportError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
pub struct ExportArtifact {
    pub filename: String,
    pub format: ExportFormat,
    pub size: String,
    pub row_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ExportOutcome {
    Saved(ExportArtifact),
    NothingToWrite { status: &'static str, row_count: usize },
    Failed { error: String, row_count: usize },
}

/// Writes a shaped result to the export directory. Never panics and never
/// propagates I/O errors: the caller gets an artifact descriptor, an
/// explicit nothing-to-write status, or a structured failure.
pub fn save_query_results(
    export_dir: &Path,
    query: &str,
    data: &[JsonRow],
    format: ExportFormat,
    params: &[JsonValue],
    custom_filename: Option<&str>,
) -> ExportOutcome {
    let row_count = data.len();

    // A CSV header is inferred from the first row; with zero rows there is
    // nothing to infer, so no data file and no sidecar are written.
    if format == ExportFormat::Csv && data.is_empty() {
        return ExportOutcome::NothingToWrite {
            status: "no rows to write",
            row_count,
        };
    }

    match write_files(export_dir, query, data, format, params, custom_filename) {
        Ok(artifact) => ExportOutcome::Saved(artifact),
        Err(e) => {
            warn!("Failed to save query results: {e}");
            ExportOutcome::Failed {
                error: format!("Failed to save file: {e}"),
                row_count,
            }
        }
    }
}

fn write_files(
    export_dir: &Path,
    query: &str,
    data: &[JsonRow],
    format: ExportFormat,
    params: &[JsonValue],
    custom_filename: Option<&str>,
) -> Result<ExportArtifact, ExportError> {
    fs::create_dir_all(export_dir)?;

    let filename = resolve_filename(query, format, custom_filename);
    let path = export_dir.join(&filename);
    let timestamp = chrono::Local::now().to_rfc3339();

    match format {
        ExportFormat::Json => {
            let document = json!({
                "metadata": {
                    "timestamp": timestamp,
                    "query": query,
                    "params": params,
                    "row_count": data.len(),
                    "filename": filename,
                },
                "data": data,
            });
            let mut file = BufWriter::new(File::create(&path)?);
            serde_json::to_writer_pretty(&mut file, &document)?;
            file.flush()?;
        }
        ExportFormat::Csv => {
            write_csv(&path, data)?;

            // Sidecar carries the metadata a self-describing format embeds.
            let sidecar_name = format!(
                "{}_metadata.json",
                filename.strip_suffix(".csv").unwrap_or(&filename)
            );
            let metadata = json!({
                "timestamp": timestamp,
                "query": query,
                "params": params,
                "row_count": data.len(),
                "csv_file": filename,
            });
            let mut sidecar = BufWriter::new(File::create(export_dir.join(sidecar_name))?);
            serde_json::to_writer_pretty(&mut sidecar, &metadata)?;
            sidecar.flush()?;
        }
    }

    let size_bytes = fs::metadata(&path)?.len();

    Ok(ExportArtifact {
        filename,
        format,
        size: format_file_size(size_bytes),
        row_count: data.len(),
    })
}

fn write_csv(path: &Path, data: &[JsonRow]) -> Result<(), ExportError> {
    let Some(first_row) = data.first() else {
        return Ok(());
    };
    let mut file = BufWriter::new(File::create(path)?);

    let headers: Vec<&str> = first_row.keys().map(String::as_str).collect();
    let header_line: Vec<String> = headers.iter().map(|h| csv_field(h)).collect();
    writeln!(file, "{}", header_line.join(","))?;

    for row in data {
        let fields: Vec<String> = headers
            .iter()
            .map(|header| csv_field(&render_value(row.get(*header))))
            .collect();
        writeln!(file, "{}", fields.join(","))?;
    }

    file.flush()?;
    Ok(())
}

fn render_value(value: Option<&JsonValue>) -> String {
    match value {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Custom names keep alphanumerics, spaces, underscores, hyphens and dots,
/// lose any pre-existing extension, and have spaces collapsed to
/// underscores. Auto names derive from a timestamp plus a sanitized
/// 50-character prefix of the query text.
fn resolve_filename(query: &str, format: ExportFormat, custom: Option<&str>) -> String {
    match custom {
        Some(name) => {
            let mut safe = sanitize(name, true);
            if let Some(dot) = safe.rfind('.') {
                safe.truncate(dot);
            }
            format!("{}.{}", safe, format.extension())
        }
        None => {
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            let snippet: String = query
                .replace('\n', " ")
                .replace('\r', "")
                .chars()
                .take(50)
                .collect();
            let safe = sanitize(&snippet, false);
            format!("query_{}_{}.{}", timestamp, safe, format.extension())
        }
    }
}

fn sanitize(name: &str, keep_dots: bool) -> String {
    name.chars()
        .filter(|c| {
            c.is_alphanumeric() || *c == ' ' || *c == '_' || *c == '-' || (keep_dots && *c == '.')
        })
        .collect::<String>()
        .trim()
        .replace(' ', "_")
}

/// Human-scaled size string from the actual written byte count.
fn format_file_size(size_bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if size_bytes < KB {
        format!("{size_bytes} B")
    } else if size_bytes < MB {
        format!("{:.1} KB", size_bytes as f64 / KB as f64)
    } else if size_bytes < GB {
        format!("{:.1} MB", size_bytes as f64 / MB as f64)
    } else {
        format!("{:.1} GB", size_bytes as f64 / GB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_rows() -> Vec<JsonRow> {
        let mut first = JsonRow::new();
        first.insert("id".into(), json!(1));
        first.insert("name".into(), json!("Alice"));
        first.insert("note".into(), json!("likes \"quotes\", commas"));

        let mut second = JsonRow::new();
        second.insert("id".into(), json!(2));
        second.insert("name".into(), json!("Bob"));
        second.insert("note".into(), JsonValue::Null);

        vec![first, second]
    }

    #[test]
    fn test_json_export_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let rows = sample_rows();

        let outcome = save_query_results(
            dir.path(),
            "SELECT * FROM users",
            &rows,
            ExportFormat::Json,
            &[],
            Some("users_dump"),
        );

        let ExportOutcome::Saved(artifact) = outcome else {
            panic!("expected saved artifact");
        };
        assert_eq!(artifact.filename, "users_dump.json");
        assert_eq!(artifact.row_count, 2);

        let raw = fs::read_to_string(dir.path().join(&artifact.filename)).unwrap();
        let document: JsonValue = serde_json::from_str(&raw).unwrap();

        assert_eq!(document["metadata"]["row_count"], json!(2));
        assert_eq!(document["metadata"]["query"], json!("SELECT * FROM users"));
        let data = document["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        let columns: Vec<&String> = data[0].as_object().unwrap().keys().collect();
        assert_eq!(columns, ["id", "name", "note"]);
    }

    #[test]
    fn test_csv_export_writes_data_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let rows = sample_rows();

        let outcome = save_query_results(
            dir.path(),
            "SELECT * FROM users",
            &rows,
            ExportFormat::Csv,
            &[json!(42)],
            Some("users dump"),
        );

        let ExportOutcome::Saved(artifact) = outcome else {
            panic!("expected saved artifact");
        };
        assert_eq!(artifact.filename, "users_dump.csv");

        let csv = fs::read_to_string(dir.path().join("users_dump.csv")).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("id,name,note"));
        assert_eq!(
            lines.next(),
            Some("1,Alice,\"likes \"\"quotes\"\", commas\"")
        );
        assert_eq!(lines.next(), Some("2,Bob,"));

        let sidecar =
            fs::read_to_string(dir.path().join("users_dump_metadata.json")).unwrap();
        let metadata: JsonValue = serde_json::from_str(&sidecar).unwrap();
        assert_eq!(metadata["row_count"], json!(2));
        assert_eq!(metadata["csv_file"], json!("users_dump.csv"));
        assert_eq!(metadata["params"], json!([42]));
    }

    #[test]
    fn test_zero_row_csv_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();

        let outcome = save_query_results(
            dir.path(),
            "SELECT * FROM empty",
            &[],
            ExportFormat::Csv,
            &[],
            None,
        );

        assert!(matches!(
            outcome,
            ExportOutcome::NothingToWrite { row_count: 0, .. }
        ));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_zero_row_json_still_written() {
        let dir = tempfile::tempdir().unwrap();

        let outcome = save_query_results(
            dir.path(),
            "SELECT * FROM empty",
            &[],
            ExportFormat::Json,
            &[],
            Some("empty"),
        );

        let ExportOutcome::Saved(artifact) = outcome else {
            panic!("expected saved artifact");
        };
        assert_eq!(artifact.row_count, 0);
        assert!(dir.path().join("empty.json").exists());
    }

    #[test]
    fn test_export_failure_is_structured() {
        // A file path in place of a directory forces create_dir_all to fail.
        let dir = tempfile::tempdir().unwrap();
        let blocking_file = dir.path().join("not_a_dir");
        fs::write(&blocking_file, b"x").unwrap();

        let outcome = save_query_results(
            &blocking_file,
            "SELECT 1",
            &sample_rows(),
            ExportFormat::Json,
            &[],
            None,
        );

        assert!(matches!(
            outcome,
            ExportOutcome::Failed { row_count: 2, .. }
        ));
    }

    #[test]
    fn test_custom_filename_sanitized() {
        assert_eq!(
            resolve_filename("q", ExportFormat::Json, Some("my report.v2.txt")),
            "my_report.v2.json"
        );
        assert_eq!(
            resolve_filename("q", ExportFormat::Csv, Some("../../etc/passwd")),
            "....csv"
        );
    }

    #[test]
    fn test_auto_filename_uses_query_prefix() {
        let name = resolve_filename(
            "SELECT id,\nname FROM users WHERE active = 1",
            ExportFormat::Json,
            None,
        );
        assert!(name.starts_with("query_"));
        assert!(name.ends_with("_SELECT_id_name_FROM_users_WHERE_active__1.json"));
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }
}
