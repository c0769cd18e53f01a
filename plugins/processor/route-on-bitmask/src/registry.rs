use dashmap::DashMap;
use rivulet_api::{PluginError, Relationship};

/// Output for records whose value matches no rule.
pub const REL_UNMATCHED: Relationship = Relationship::new("unmatched");
/// Output for records without a usable integer value.
pub const REL_FAILURE: Relationship = Relationship::new("failure");

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("rule name must not be empty")]
    EmptyName,
    #[error("'{0}' is reserved and cannot be used as a rule name")]
    ReservedName(String),
    #[error("mask for rule '{name}' must be a non-negative integer, got '{value}'")]
    InvalidMask { name: String, value: String },
}

impl From<RuleError> for PluginError {
    fn from(e: RuleError) -> Self {
        PluginError::config(e.to_string())
    }
}

#[derive(Debug, Clone)]
struct Rule {
    relationship: Relationship,
    mask: i64,
}

/// Named masks, each backing one output of the same name.
///
/// Registration and removal may happen while records are being routed;
/// routing works on a [`RuleRegistry::snapshot`].
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: DashMap<String, Rule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, replacing any rule already registered under `name`.
    pub fn register(&self, name: &str, mask: i64) -> Result<(), RuleError> {
        if name.is_empty() {
            return Err(RuleError::EmptyName);
        }
        if name == REL_UNMATCHED.name() || name == REL_FAILURE.name() {
            return Err(RuleError::ReservedName(name.to_string()));
        }
        if mask < 0 {
            return Err(RuleError::InvalidMask {
                name: name.to_string(),
                value: mask.to_string(),
            });
        }
        let rule = Rule {
            relationship: Relationship::dynamic(name),
            mask,
        };
        self.rules.insert(name.to_string(), rule);
        Ok(())
    }

    /// Same as [`register`](Self::register) with the mask given as text.
    pub fn register_text(&self, name: &str, mask: &str) -> Result<(), RuleError> {
        let parsed = mask.trim().parse::<i64>().map_err(|_| RuleError::InvalidMask {
            name: name.to_string(),
            value: mask.to_string(),
        })?;
        self.register(name, parsed)
    }

    /// Returns `true` when a rule was removed.
    pub fn remove(&self, name: &str) -> bool {
        self.rules.remove(name).is_some()
    }

    pub fn mask(&self, name: &str) -> Option<i64> {
        self.rules.get(name).map(|rule| rule.mask)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Point-in-time copy of every rule, ordered by name.
    pub fn snapshot(&self) -> Vec<(Relationship, i64)> {
        let mut rules: Vec<(Relationship, i64)> = self
            .rules
            .iter()
            .map(|entry| (entry.relationship.clone(), entry.mask))
            .collect();
        rules.sort_by(|a, b| a.0.cmp(&b.0));
        rules
    }
}
