use serde::Deserialize;

use crate::record::FlowRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Attribute(String),
}

/// Configuration string that may reference record attributes as `${name}`.
///
/// Each reference renders to the attribute value, or to the empty string
/// when the record has no such attribute. An unterminated `${` is kept
/// as literal text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub struct AttributeTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl AttributeTemplate {
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut rest = source;
        while let Some(start) = rest.find("${") {
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                break;
            };
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            segments.push(Segment::Attribute(after[..end].trim().to_string()));
            rest = &after[end + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        Self { source: source.to_string(), segments }
    }

    /// The template text as written in the configuration.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// `Some` when the template references no attributes.
    pub fn as_literal(&self) -> Option<&str> {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
            .then_some(self.source.as_str())
    }

    pub fn render(&self, record: &FlowRecord) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Attribute(name) => {
                    if let Some(value) = record.attribute(name) {
                        out.push_str(value);
                    }
                }
            }
        }
        out
    }
}

impl From<String> for AttributeTemplate {
    fn from(source: String) -> Self {
        Self::parse(&source)
    }
}

impl From<&str> for AttributeTemplate {
    fn from(source: &str) -> Self {
        Self::parse(source)
    }
}
