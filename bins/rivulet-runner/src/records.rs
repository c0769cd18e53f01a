use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use rivulet_api::{FlowRecord, Relationship};
use serde::{Deserialize, Serialize};

use crate::error::RunnerError;

/// One input line: `{"attributes": {...}, "content": ...}`.
///
/// String content is taken verbatim; any other JSON value is stored as its
/// compact JSON text.
#[derive(Debug, Deserialize)]
struct InputLine {
    #[serde(default)]
    attributes: BTreeMap<String, String>,
    #[serde(default)]
    content: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OutputLine<'a> {
    relationship: &'a str,
    attributes: &'a BTreeMap<String, String>,
    content: String,
    penalized: bool,
}

/// Read NDJSON records. Blank lines are skipped.
pub fn read_records(reader: impl BufRead) -> Result<Vec<FlowRecord>, RunnerError> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let input: InputLine = serde_json::from_str(&line).map_err(|e| RunnerError::Input {
            line: idx + 1,
            detail: e.to_string(),
        })?;
        let content = match input.content {
            serde_json::Value::String(s) => s.into_bytes(),
            serde_json::Value::Null => Vec::new(),
            other => other.to_string().into_bytes(),
        };
        records.push(FlowRecord::from((content, input.attributes)));
    }
    Ok(records)
}

/// Write every routed record as one NDJSON line.
pub fn write_routed(
    mut writer: impl Write,
    routed: &[(Relationship, FlowRecord)],
) -> Result<(), RunnerError> {
    for (relationship, record) in routed {
        let line = OutputLine {
            relationship: relationship.name(),
            attributes: record.attributes(),
            content: record.content_lossy(),
            penalized: record.is_penalized(),
        };
        serde_json::to_writer(&mut writer, &line)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
