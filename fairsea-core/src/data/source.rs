//! Record sources: load labeled model outputs from JSON, JSONL or CSV files.

use crate::data::record::Record;
use crate::error::FairseaError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Columns every dataset must provide.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "prompt_id_full",
    "prompt_text",
    "llm_output",
    "Gender",
    "Race",
    "Nationality",
];

/// Optional column carrying the identity of the responding model.
pub const MODEL_COLUMN: &str = "model";

/// On-disk format of a record file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    Csv,
    Json,
    Jsonl,
}

impl RecordFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, FairseaError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("json") => Ok(Self::Json),
            Some("jsonl") | Some("ndjson") => Ok(Self::Jsonl),
            _ => Err(FairseaError::config(format!(
                "cannot infer record format from '{}'",
                path.display()
            ))),
        }
    }
}

/// Anything that can hand the analysis engine a record collection.
pub trait RecordSource {
    fn load(&self) -> Result<Vec<Record>, FairseaError>;

    /// Human-readable location, for logging.
    fn describe(&self) -> String;
}

/// Record file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub path: PathBuf,
    pub format: RecordFormat,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, FairseaError> {
        let path = path.into();
        let format = RecordFormat::from_path(&path)?;
        Ok(Self { path, format })
    }
}

impl RecordSource for FileSource {
    fn load(&self) -> Result<Vec<Record>, FairseaError> {
        let content = std::fs::read_to_string(&self.path)?;
        let records = match self.format {
            RecordFormat::Csv => parse_csv_records(&content, ',')?,
            RecordFormat::Json => parse_json_records(&content)?,
            RecordFormat::Jsonl => parse_jsonl_records(&content)?,
        };
        tracing::info!(
            path = %self.path.display(),
            rows = records.len(),
            "Loaded records"
        );
        Ok(records)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Apply output normalization to every record, returning a new collection.
pub fn prepare_records(records: &[Record]) -> Vec<Record> {
    records.iter().map(Record::cleaned).collect()
}

/// Parse CSV content with a header row. Quoted fields may contain delimiters,
/// doubled quotes and newlines.
pub fn parse_csv_records(content: &str, delimiter: char) -> Result<Vec<Record>, FairseaError> {
    let mut rows = split_csv(content, delimiter)?.into_iter();
    let header = rows
        .next()
        .ok_or_else(|| FairseaError::config("empty CSV file"))?;
    let index: HashMap<&str, usize> = header
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim(), i))
        .collect();
    check_columns(|column| index.contains_key(column))?;

    let body: Vec<Vec<String>> = rows.collect();
    let mut records = Vec::with_capacity(body.len());
    for (row_idx, row) in body.iter().enumerate() {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let field = |column: &str| {
            index
                .get(column)
                .and_then(|&i| row.get(i))
                .map(|s| s.to_string())
        };
        records.push(record_from_fields(field, row_idx)?);
    }
    Ok(records)
}

/// Parse a JSON array of record objects.
pub fn parse_json_records(content: &str) -> Result<Vec<Record>, FairseaError> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(_) => vec![value],
        _ => return Err(FairseaError::config("JSON must be an array or object")),
    };
    records_from_objects(&items)
}

/// Parse newline-delimited JSON objects.
pub fn parse_jsonl_records(content: &str) -> Result<Vec<Record>, FairseaError> {
    let items = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str::<serde_json::Value>)
        .collect::<Result<Vec<_>, _>>()?;
    records_from_objects(&items)
}

fn records_from_objects(items: &[serde_json::Value]) -> Result<Vec<Record>, FairseaError> {
    if let Some(first) = items.first() {
        check_columns(|column| first.get(column).is_some())?;
    }
    items
        .iter()
        .enumerate()
        .map(|(row_idx, item)| {
            let field = |column: &str| match item.get(column) {
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(serde_json::Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            };
            record_from_fields(field, row_idx)
        })
        .collect()
}

fn check_columns(has_column: impl Fn(&str) -> bool) -> Result<(), FairseaError> {
    match REQUIRED_COLUMNS.iter().find(|c| !has_column(c)) {
        Some(missing) => Err(FairseaError::missing_column(*missing)),
        None => Ok(()),
    }
}

fn record_from_fields(
    field: impl Fn(&str) -> Option<String>,
    row: usize,
) -> Result<Record, FairseaError> {
    let demographic = |column: &str| -> Result<String, FairseaError> {
        match field(column).map(|v| v.trim().to_string()) {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(FairseaError::MissingValue {
                column: column.to_string(),
                row,
            }),
        }
    };

    let prompt_id = field("prompt_id_full").unwrap_or_default();
    if prompt_id.trim().is_empty() {
        return Err(FairseaError::MissingValue {
            column: "prompt_id_full".to_string(),
            row,
        });
    }

    Ok(Record {
        prompt_id: prompt_id.trim().to_string(),
        prompt_text: field("prompt_text").unwrap_or_default(),
        llm_output: field("llm_output").unwrap_or_default(),
        gender: demographic("Gender")?,
        race: demographic("Race")?,
        nationality: demographic("Nationality")?,
        model: field(MODEL_COLUMN)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty()),
    })
}

fn split_csv(content: &str, delimiter: char) -> Result<Vec<Vec<String>>, FairseaError> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            c if c == delimiter => row.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(FairseaError::config("unterminated quoted field in CSV"));
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "prompt_id_full,prompt_text,llm_output,Gender,Race,Nationality,model";

    #[test]
    fn test_parse_csv_with_quoted_commas() {
        let csv = format!(
            "{HEADER}\nI2-1,\"Pick, one\",\"Retail trade, mostly\",Female,Chinese,Singaporean,m1\n"
        );
        let records = parse_csv_records(&csv, ',').unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].prompt_text, "Pick, one");
        assert_eq!(records[0].llm_output, "Retail trade, mostly");
        assert_eq!(records[0].model.as_deref(), Some("m1"));
    }

    #[test]
    fn test_parse_csv_multiline_and_escaped_quotes() {
        let csv = format!(
            "{HEADER}\nD1-1,p,\"He said \"\"no\"\"\nthen left\",Male,Malay,Malaysian,\n"
        );
        let records = parse_csv_records(&csv, ',').unwrap();
        assert_eq!(records[0].llm_output, "He said \"no\"\nthen left");
        assert!(records[0].model.is_none());
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let csv = "prompt_id_full,prompt_text,llm_output,Gender,Race\nD1-1,p,o,Male,Malay\n";
        let err = parse_csv_records(csv, ',').unwrap_err();
        assert!(matches!(err, FairseaError::MissingColumn { ref column } if column == "Nationality"));
    }

    #[test]
    fn test_empty_demographic_value() {
        let csv = format!("{HEADER}\nD1-1,p,o,,Malay,Malaysian,\n");
        let err = parse_csv_records(&csv, ',').unwrap_err();
        assert!(matches!(err, FairseaError::MissingValue { row: 0, .. }));
    }

    #[test]
    fn test_parse_jsonl() {
        let jsonl = r#"{"prompt_id_full":"D2-1","prompt_text":"p","llm_output":"good","Gender":"Male","Race":"Chinese","Nationality":"Singaporean"}
{"prompt_id_full":"D2-2","prompt_text":"p","llm_output":"bad","Gender":"Female","Race":"Chinese","Nationality":"Singaporean","model":"m2"}
"#;
        let records = parse_jsonl_records(jsonl).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].model.as_deref(), Some("m2"));
    }

    #[test]
    fn test_file_source_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "D3-1,p,Kind,Female,Indian,Malaysian,").unwrap();
        let source = FileSource::new(&path).unwrap();
        assert_eq!(source.format, RecordFormat::Csv);
        let records = source.load().unwrap();
        assert_eq!(records[0].gender, "Female");
    }

    #[test]
    fn test_format_from_unknown_extension() {
        assert!(RecordFormat::from_path(Path::new("data.parquet")).is_err());
    }

    #[test]
    fn test_prepare_records_does_not_mutate_source() {
        let records = vec![Record::new("D3-1", "\"Kind.\"", "Male", "Chinese", "Singaporean")];
        let prepared = prepare_records(&records);
        assert_eq!(prepared[0].llm_output, "kind");
        assert_eq!(records[0].llm_output, "\"Kind.\"");
    }
}
