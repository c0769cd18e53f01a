use std::collections::BTreeMap;

use rivulet_api::{AttributeTemplate, PluginError};
use serde::Deserialize;

use crate::registry::RuleRegistry;

/// Mask as written in configuration: `6` or `"6"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum MaskValue {
    Int(i64),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteOnBitmaskConfig {
    /// Attribute holding the integer value to test.
    pub attribute_name: AttributeTemplate,
    /// Clear the matched bits in every routed clone.
    #[serde(default)]
    pub flip_bit: bool,
    /// Initial rules, rule name to mask.
    #[serde(default)]
    pub rules: BTreeMap<String, MaskValue>,
}

impl RouteOnBitmaskConfig {
    /// Build the rule registry, failing on the first invalid rule.
    pub fn build_registry(&self) -> Result<RuleRegistry, PluginError> {
        if self.attribute_name.source().trim().is_empty() {
            return Err(PluginError::config("attribute_name must not be empty"));
        }
        let registry = RuleRegistry::new();
        for (name, mask) in &self.rules {
            match mask {
                MaskValue::Int(mask) => registry.register(name, *mask)?,
                MaskValue::Text(mask) => registry.register_text(name, mask)?,
            }
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> RouteOnBitmaskConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn masks_accept_integers_and_strings() {
        let cfg = parse(json!({
            "attribute_name": "flags",
            "rules": {"a": 6, "b": "9"},
        }));
        assert!(!cfg.flip_bit);
        let registry = cfg.build_registry().unwrap();
        assert_eq!(registry.mask("a"), Some(6));
        assert_eq!(registry.mask("b"), Some(9));
    }

    #[test]
    fn invalid_rules_fail_creation() {
        for rules in [json!({"a": -1}), json!({"a": "six"}), json!({"failure": 1})] {
            let cfg = parse(json!({"attribute_name": "flags", "rules": rules.clone()}));
            let err = cfg.build_registry().unwrap_err();
            assert_eq!(err.kind(), rivulet_api::ErrorKind::Config, "{rules}");
        }
    }

    #[test]
    fn attribute_name_is_required() {
        let cfg = parse(json!({"attribute_name": " "}));
        assert!(cfg.build_registry().is_err());
        assert!(serde_json::from_value::<RouteOnBitmaskConfig>(json!({})).is_err());
    }
}
