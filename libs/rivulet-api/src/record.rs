use std::collections::BTreeMap;

/// Unit of data moving through the flow: opaque content bytes plus
/// string-keyed, string-valued attributes.
///
/// Records are owned values. Session operations that resolve a record
/// (transfer, remove) take it by value, so a record is resolved at most
/// once per cycle. `Clone` produces an independent copy with no aliasing,
/// which is how fan-out is expressed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowRecord {
    content: Vec<u8>,
    attributes: BTreeMap<String, String>,
    penalized: bool,
}

impl FlowRecord {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            attributes: BTreeMap::new(),
            penalized: false,
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Content decoded as UTF-8, invalid sequences replaced.
    pub fn content_lossy(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn put_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn is_penalized(&self) -> bool {
        self.penalized
    }

    /// Mark the record for delayed reprocessing. Sessions call this from
    /// `ProcessSession::penalize`; processors go through the session.
    pub fn set_penalized(&mut self, penalized: bool) {
        self.penalized = penalized;
    }
}

impl From<(Vec<u8>, BTreeMap<String, String>)> for FlowRecord {
    fn from((content, attributes): (Vec<u8>, BTreeMap<String, String>)) -> Self {
        Self { content, attributes, penalized: false }
    }
}
