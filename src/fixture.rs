//! Fixture source parsing
//!
//! A fixture is an external structured-text file loaded exactly once when a
//! collection is built. Two sub-formats are accepted:
//!
//! - hierarchical YAML: a top-level sequence, one mapping per record
//! - delimited tabular text: a header row of raw field names, then one row
//!   per record (`,` for `.csv`, tab for `.tsv`, or an explicit delimiter)
//!
//! The loader produces raw name -> raw value maps and performs no schema
//! coercion itself; delimited cells always load as strings. Scalar strings
//! shaped `YYYY-MM-DD` in YAML load as dates, matching how date-typed
//! fixture fields are written in practice.

use crate::error::{Error, Result};
use crate::record::{Attrs, Value};
use chrono::NaiveDate;
use std::path::Path;

/// Sub-format of a fixture source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureFormat {
    Yaml,
    Delimited { delimiter: char },
}

/// A raw record: fixture field names (not yet normalized) to raw values
pub type RawRecord = Attrs;

/// Detect the sub-format from the file extension. An explicit delimiter
/// forces the delimited format's separator but not its detection.
pub fn detect_format(path: &Path, delimiter: Option<char>) -> Result<FixtureFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "yml" | "yaml" => Ok(FixtureFormat::Yaml),
        "csv" => Ok(FixtureFormat::Delimited {
            delimiter: delimiter.unwrap_or(','),
        }),
        "tsv" => Ok(FixtureFormat::Delimited {
            delimiter: delimiter.unwrap_or('\t'),
        }),
        _ => Err(Error::UnsupportedFixture {
            path: path.display().to_string(),
        }),
    }
}

/// Load and parse a fixture file into an ordered sequence of raw records.
pub fn load_path(path: &Path, delimiter: Option<char>) -> Result<Vec<RawRecord>> {
    let format = detect_format(path, delimiter)?;
    let content = std::fs::read_to_string(path).map_err(|source| Error::FixtureRead {
        path: path.display().to_string(),
        source,
    })?;
    parse(&content, format, &path.display().to_string())
}

/// Parse fixture content in the given sub-format.
pub fn parse(content: &str, format: FixtureFormat, path: &str) -> Result<Vec<RawRecord>> {
    match format {
        FixtureFormat::Yaml => parse_yaml(content, path),
        FixtureFormat::Delimited { delimiter } => parse_delimited(content, delimiter, path),
    }
}

fn parse_yaml(content: &str, path: &str) -> Result<Vec<RawRecord>> {
    if content.trim().is_empty() {
        return Err(Error::EmptyFixture {
            path: path.to_string(),
        });
    }

    let doc: serde_yaml::Value = serde_yaml::from_str(content)?;

    let entries = match doc {
        serde_yaml::Value::Sequence(seq) if !seq.is_empty() => seq,
        serde_yaml::Value::Sequence(_) | serde_yaml::Value::Null => {
            return Err(Error::EmptyFixture {
                path: path.to_string(),
            });
        }
        _ => {
            return Err(Error::MalformedFixture {
                path: path.to_string(),
                message: "top level must be a sequence of mappings".to_string(),
            });
        }
    };

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let serde_yaml::Value::Mapping(map) = entry else {
            return Err(Error::MalformedFixture {
                path: path.to_string(),
                message: "each record must be a mapping".to_string(),
            });
        };

        let mut record = RawRecord::new();
        for (key, value) in map {
            let key = match key {
                serde_yaml::Value::String(s) => s,
                other => yaml_to_value(other).to_string(),
            };
            record.insert(key, yaml_to_value(value));
        }
        records.push(record);
    }

    Ok(records)
}

fn parse_delimited(content: &str, delimiter: char, path: &str) -> Result<Vec<RawRecord>> {
    let mut lines = content.lines().filter(|line| !line.trim().is_empty());

    let header: Vec<String> = match lines.next() {
        Some(line) => split_row(line, delimiter),
        None => {
            return Err(Error::EmptyFixture {
                path: path.to_string(),
            });
        }
    };

    let mut records = Vec::new();
    for line in lines {
        let cells = split_row(line, delimiter);
        let mut record = RawRecord::new();
        for (name, cell) in header.iter().zip(cells) {
            record.insert(name.clone(), Value::Str(cell));
        }
        records.push(record);
    }

    if records.is_empty() {
        return Err(Error::EmptyFixture {
            path: path.to_string(),
        });
    }

    Ok(records)
}

/// Split one delimited row. Cells may be wrapped in double quotes; a doubled
/// quote inside a quoted cell is a literal quote.
fn split_row(line: &str, delimiter: char) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if quoted {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    cell.push('"');
                } else {
                    quoted = false;
                }
            } else {
                cell.push(c);
            }
        } else if c == '"' && cell.is_empty() {
            quoted = true;
        } else if c == delimiter {
            cells.push(std::mem::take(&mut cell));
        } else {
            cell.push(c);
        }
    }
    cells.push(cell);

    cells
}

/// Convert a parsed YAML value into the crate's value model.
pub fn yaml_to_value(v: serde_yaml::Value) -> Value {
    match v {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::Null
            }
        }
        serde_yaml::Value::String(s) => match NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
            Ok(date) => Value::Date(date),
            Err(_) => Value::Str(s),
        },
        serde_yaml::Value::Sequence(seq) => {
            Value::List(seq.into_iter().map(yaml_to_value).collect())
        }
        // nested mappings have no counterpart in the flat value model;
        // flatten to their rendered form
        serde_yaml::Value::Mapping(map) => Value::Str(
            serde_yaml::to_string(&map)
                .unwrap_or_default()
                .trim_end()
                .to_string(),
        ),
        serde_yaml::Value::Tagged(tagged) => yaml_to_value(tagged.value),
    }
}

/// Convert a crate value back to YAML, used by the YAML dump surface.
pub fn value_to_yaml(v: &Value) -> serde_yaml::Value {
    match v {
        Value::Null => serde_yaml::Value::Null,
        Value::Bool(b) => serde_yaml::Value::Bool(*b),
        Value::Int(i) => serde_yaml::Value::Number((*i).into()),
        Value::Float(f) => serde_yaml::Value::Number(serde_yaml::Number::from(*f)),
        Value::Str(s) => serde_yaml::Value::String(s.clone()),
        Value::Date(d) => serde_yaml::Value::String(d.format("%Y-%m-%d").to_string()),
        Value::List(items) => {
            serde_yaml::Value::Sequence(items.iter().map(value_to_yaml).collect())
        }
    }
}
