use std::borrow::Cow;

/// Named output a processor routes records to.
///
/// Static outputs are declared as constants (`Relationship::new("success")`);
/// dynamic ones (e.g. one per configured rule) own their name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Relationship {
    name: Cow<'static, str>,
}

impl Relationship {
    pub const fn new(name: &'static str) -> Self {
        Self { name: Cow::Borrowed(name) }
    }

    pub fn dynamic(name: impl Into<String>) -> Self {
        Self { name: Cow::Owned(name.into()) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
