use encoding_rs::Encoding;
use serde_json::{Map, Value};

use crate::config::UpsertMode;

/// Bulk operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Index,
    Update,
    Upsert,
    Delete,
}

impl OperationKind {
    /// Case-insensitive parse. `None` for anything unrecognized.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "index" => Some(Self::Index),
            "update" => Some(Self::Update),
            "upsert" => Some(Self::Upsert),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Update => "update",
            Self::Upsert => "upsert",
            Self::Delete => "delete",
        }
    }

    /// Action name on the wire. Upserts travel as `update`.
    fn action(self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Update | Self::Upsert => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation settings resolved for one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationSpec {
    pub index: String,
    pub doc_type: String,
    pub id: Option<String>,
    pub operation: String,
    pub script: Option<String>,
    pub upsert: Option<UpsertMode>,
    /// Label of the content's character set.
    pub charset: String,
}

/// Why a record was left out of the bulk payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExclusionReason {
    #[error("no value for index")]
    MissingIndex,
    #[error("no index operation specified")]
    MissingOperation,
    #[error("unsupported operation '{0}'")]
    UnsupportedOperation(String),
    #[error("operation {0} requires a non-empty document identifier")]
    MissingIdentifier(OperationKind),
    #[error("scripted upsert requires a non-blank script")]
    MissingScript,
    #[error("unknown charset '{0}'")]
    UnknownCharset(String),
    #[error("content is not valid {0}")]
    Undecodable(&'static str),
}

#[derive(Debug)]
pub struct Excluded<R> {
    pub record: R,
    pub reason: ExclusionReason,
}

/// Output of [`BulkRequestBuilder::finish`].
#[derive(Debug)]
pub struct BulkRequest<R> {
    /// Newline-delimited action/body lines.
    pub payload: String,
    /// Records represented in `payload`, in submission order. The
    /// response items pair with these by position.
    pub pending: Vec<R>,
    pub excluded: Vec<Excluded<R>>,
}

/// Accumulates records into one bulk payload.
///
/// Generic over the record type so the wire format can be built and
/// checked without a host session.
#[derive(Debug)]
pub struct BulkRequestBuilder<R> {
    payload: String,
    pending: Vec<R>,
    excluded: Vec<Excluded<R>>,
}

impl<R> Default for BulkRequestBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> BulkRequestBuilder<R> {
    pub fn new() -> Self {
        Self {
            payload: String::new(),
            pending: Vec::new(),
            excluded: Vec::new(),
        }
    }

    /// Validate `spec` and append the record's lines, or set the record
    /// aside with the reason it was excluded.
    pub fn push(&mut self, record: R, spec: &OperationSpec, content: &[u8]) {
        match self.append(spec, content) {
            Ok(()) => self.pending.push(record),
            Err(reason) => self.excluded.push(Excluded { record, reason }),
        }
    }

    pub fn finish(self) -> BulkRequest<R> {
        BulkRequest {
            payload: self.payload,
            pending: self.pending,
            excluded: self.excluded,
        }
    }

    fn append(&mut self, spec: &OperationSpec, content: &[u8]) -> Result<(), ExclusionReason> {
        let (kind, id) = validate(spec)?;
        let encoding = Encoding::for_label(spec.charset.trim().as_bytes())
            .ok_or_else(|| ExclusionReason::UnknownCharset(spec.charset.clone()))?;
        let document = || decode(encoding, content);

        let body = match (kind, spec.upsert) {
            (OperationKind::Delete, _) => None,
            (OperationKind::Index, _) => Some(document()?),
            (_, Some(UpsertMode::DocAsUpsert)) => {
                Some(format!(r#"{{"doc":{},"doc_as_upsert":true}}"#, document()?))
            }
            (_, Some(UpsertMode::ScriptedUpsert)) => {
                let script = spec
                    .script
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or(ExclusionReason::MissingScript)?;
                Some(format!(
                    r#"{{"upsert":{{}},"scripted_upsert":true,"script":{}}}"#,
                    normalize_line_breaks(script)
                ))
            }
            (OperationKind::Upsert, None) => Some(format!(r#"{{"upsert":{}}}"#, document()?)),
            (_, None) => Some(format!(r#"{{"doc":{}}}"#, document()?)),
        };

        self.payload.push_str(&action_line(kind, spec, id));
        self.payload.push('\n');
        if let Some(body) = body {
            self.payload.push_str(&body);
            self.payload.push('\n');
        }
        Ok(())
    }
}

/// Per-record checks, in order: index, operation, identifier.
pub fn validate(spec: &OperationSpec) -> Result<(OperationKind, Option<&str>), ExclusionReason> {
    if spec.index.is_empty() {
        return Err(ExclusionReason::MissingIndex);
    }
    if spec.operation.is_empty() {
        return Err(ExclusionReason::MissingOperation);
    }
    let kind = OperationKind::parse(&spec.operation)
        .ok_or_else(|| ExclusionReason::UnsupportedOperation(spec.operation.clone()))?;

    let id = spec.id.as_deref().filter(|id| !id.is_empty());
    if id.is_none() && kind != OperationKind::Index {
        return Err(ExclusionReason::MissingIdentifier(kind));
    }
    Ok((kind, id))
}

/// Decode record content strictly; malformed input is an exclusion, never
/// replacement characters.
fn decode(encoding: &'static Encoding, content: &[u8]) -> Result<String, ExclusionReason> {
    encoding
        .decode_without_bom_handling_and_without_replacement(content)
        .map(|text| normalize_line_breaks(&text))
        .ok_or(ExclusionReason::Undecodable(encoding.name()))
}

/// The bulk wire format is line-delimited; embedded line breaks become spaces.
pub fn normalize_line_breaks(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

fn action_line(kind: OperationKind, spec: &OperationSpec, id: Option<&str>) -> String {
    let mut meta = Map::new();
    meta.insert("_index".to_string(), Value::from(spec.index.as_str()));
    if !spec.doc_type.is_empty() {
        meta.insert("_type".to_string(), Value::from(spec.doc_type.as_str()));
    }
    if let Some(id) = id {
        meta.insert("_id".to_string(), Value::from(id));
    }
    let mut action = Map::new();
    action.insert(kind.action().to_string(), Value::Object(meta));
    Value::Object(action).to_string()
}
