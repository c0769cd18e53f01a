use std::future::Future;
use std::pin::Pin;

use rivulet_api::{
    AttributeTemplate, FlowProcessor, PluginError, ProcessSession, Relationship, Scheduling,
};

use crate::config::RouteOnBitmaskConfig;
use crate::registry::{REL_FAILURE, REL_UNMATCHED, RuleRegistry};

/// Routing decision for one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Matching rules, in rule-name order.
    pub matched: Vec<Relationship>,
    /// Value with every matched bit cleared. Set only when clearing is
    /// enabled and at least one rule matched.
    pub cleared: Option<i64>,
}

/// A rule matches when every bit of its mask is set in `value`.
pub fn decide(rules: &[(Relationship, i64)], value: i64, flip_bit: bool) -> Decision {
    let mut matched = Vec::new();
    let mut combined = 0i64;
    for (relationship, mask) in rules {
        if value & mask == *mask {
            matched.push(relationship.clone());
            combined |= mask;
        }
    }
    let cleared = (flip_bit && !matched.is_empty()).then_some(value ^ combined);
    Decision { matched, cleared }
}

/// Fans records out to one output per rule whose mask matches the value
/// of an integer attribute.
pub struct RouteOnBitmask {
    attribute_name: AttributeTemplate,
    flip_bit: bool,
    rules: RuleRegistry,
}

impl RouteOnBitmask {
    pub fn from_config(config: RouteOnBitmaskConfig) -> Result<Self, PluginError> {
        let rules = config.build_registry()?;
        Ok(Self {
            attribute_name: config.attribute_name,
            flip_bit: config.flip_bit,
            rules,
        })
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    fn route_one(&self, session: &mut dyn ProcessSession) {
        let Some(record) = session.get(1).into_iter().next() else {
            return;
        };

        let attribute = self.attribute_name.render(&record);
        let raw = record.attribute(&attribute).unwrap_or_default();
        if raw.is_empty() {
            tracing::warn!(attribute = %attribute, "attribute missing or empty, routing to failure");
            session.transfer(record, &REL_FAILURE);
            return;
        }
        let value = match raw.parse::<i64>() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(attribute = %attribute, value = raw, error = %e, "attribute is not an integer, routing to failure");
                session.transfer(record, &REL_FAILURE);
                return;
            }
        };

        let decision = decide(&self.rules.snapshot(), value, self.flip_bit);
        if decision.matched.is_empty() {
            tracing::debug!(value, "no rule matched");
            session.transfer(record, &REL_UNMATCHED);
            return;
        }

        tracing::debug!(value, matched = decision.matched.len(), cleared = ?decision.cleared, "routing clones");
        for relationship in &decision.matched {
            let mut clone = record.clone();
            if let Some(cleared) = decision.cleared {
                clone.put_attribute(attribute.as_str(), cleared.to_string());
            }
            session.transfer(clone, relationship);
        }
        session.remove(record);
    }
}

impl FlowProcessor for RouteOnBitmask {
    fn relationships(&self) -> Vec<Relationship> {
        let mut relationships = vec![REL_UNMATCHED, REL_FAILURE];
        relationships.extend(self.rules.snapshot().into_iter().map(|(rel, _)| rel));
        relationships
    }

    fn on_trigger<'a>(
        &'a self,
        session: &'a mut dyn ProcessSession,
    ) -> Pin<Box<dyn Future<Output = Result<Scheduling, PluginError>> + Send + 'a>> {
        Box::pin(async move {
            self.route_one(session);
            Ok(Scheduling::Continue)
        })
    }

    fn on_dynamic_property(&self, name: &str, value: Option<&str>) -> Result<(), PluginError> {
        match value {
            Some(mask) => {
                self.rules.register_text(name, mask)?;
                tracing::info!(rule = name, mask, "bitmask rule registered");
            }
            None => {
                if self.rules.remove(name) {
                    tracing::info!(rule = name, "bitmask rule removed");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rivulet_api::{FlowRecord, MemorySession};
    use serde_json::json;

    use super::*;

    fn router(config: serde_json::Value) -> RouteOnBitmask {
        RouteOnBitmask::from_config(serde_json::from_value(config).unwrap()).unwrap()
    }

    fn flagged(value: &str) -> FlowRecord {
        FlowRecord::new("payload").with_attribute("flags", value)
    }

    #[test]
    fn decide_matches_subset_masks() {
        let rules = vec![
            (Relationship::dynamic("a"), 0b0110),
            (Relationship::dynamic("b"), 0b0001),
        ];
        let d = decide(&rules, 0b1110, false);
        assert_eq!(d.matched, vec![Relationship::dynamic("a")]);
        assert_eq!(d.cleared, None);

        let d = decide(&rules, 0b1110, true);
        assert_eq!(d.cleared, Some(0b1000));

        let d = decide(&rules, 0b0001, true);
        assert_eq!(d.matched, vec![Relationship::dynamic("b")]);
        assert_eq!(d.cleared, Some(0));
    }

    #[test]
    fn zero_mask_always_matches() {
        let rules = vec![(Relationship::dynamic("any"), 0)];
        assert_eq!(decide(&rules, 0, false).matched.len(), 1);
        assert_eq!(decide(&rules, -7, false).matched.len(), 1);
    }

    #[tokio::test]
    async fn single_match_clears_bits() {
        let router = router(json!({"attribute_name": "flags", "flip_bit": true, "rules": {"a": 6}}));
        let mut session = MemorySession::new();
        session.enqueue(flagged(&0b1110.to_string()));

        router.on_trigger(&mut session).await.unwrap();

        let routed = session.transferred("a");
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].attribute("flags"), Some("8"));
        assert_eq!(routed[0].content(), b"payload");
        assert_eq!(session.removed_count(), 1);
        assert_eq!(session.routed().len(), 1);
    }

    #[tokio::test]
    async fn no_match_routes_original_unmodified() {
        let router = router(json!({"attribute_name": "flags", "flip_bit": true, "rules": {"a": 6}}));
        let mut session = MemorySession::new();
        session.enqueue(flagged("1"));

        router.on_trigger(&mut session).await.unwrap();

        assert_eq!(session.transferred("unmatched"), vec![&flagged("1")]);
        assert_eq!(session.removed_count(), 0);
    }

    #[tokio::test]
    async fn fans_out_one_clone_per_rule_in_name_order() {
        let router = router(json!({
            "attribute_name": "flags",
            "rules": {"low": 1, "high": 4, "both": 5, "other": 8},
        }));
        let mut session = MemorySession::new();
        session.enqueue(flagged("5"));

        router.on_trigger(&mut session).await.unwrap();

        let names: Vec<&str> = session.routed().iter().map(|(rel, _)| rel.name()).collect();
        assert_eq!(names, vec!["both", "high", "low"]);
        assert!(session.routed().iter().all(|(_, r)| r.attribute("flags") == Some("5")));
        assert_eq!(session.removed_count(), 1);
    }

    #[tokio::test]
    async fn unusable_values_route_to_failure() {
        let router = router(json!({"attribute_name": "flags", "rules": {"a": 1}}));
        let mut session = MemorySession::new();
        session.enqueue(flagged(""));
        session.enqueue(flagged("0b11"));
        session.enqueue(FlowRecord::new("no attribute"));

        for _ in 0..3 {
            router.on_trigger(&mut session).await.unwrap();
        }

        assert_eq!(session.transferred_count("failure"), 3);
        assert_eq!(session.transferred_count("a"), 0);
    }

    #[tokio::test]
    async fn attribute_name_is_resolved_per_record() {
        let router = router(json!({"attribute_name": "${field}", "rules": {"a": 2}}));
        let mut session = MemorySession::new();
        session.enqueue(FlowRecord::new("").with_attribute("field", "bits").with_attribute("bits", "3"));

        router.on_trigger(&mut session).await.unwrap();

        assert_eq!(session.transferred_count("a"), 1);
    }

    #[tokio::test]
    async fn empty_queue_is_a_no_op() {
        let router = router(json!({"attribute_name": "flags"}));
        let mut session = MemorySession::new();
        let scheduling = router.on_trigger(&mut session).await.unwrap();
        assert_eq!(scheduling, Scheduling::Continue);
        assert!(session.routed().is_empty());
    }

    #[test]
    fn dynamic_properties_change_declared_outputs() {
        let router = router(json!({"attribute_name": "flags"}));
        let names = |r: &RouteOnBitmask| -> Vec<String> {
            r.relationships().iter().map(|rel| rel.name().to_string()).collect()
        };
        assert_eq!(names(&router), vec!["unmatched", "failure"]);

        router.on_dynamic_property("odd", Some("1")).unwrap();
        router.on_dynamic_property("four", Some("4")).unwrap();
        assert_eq!(names(&router), vec!["unmatched", "failure", "four", "odd"]);

        router.on_dynamic_property("odd", Some("3")).unwrap();
        assert_eq!(router.rules().mask("odd"), Some(3));

        router.on_dynamic_property("four", None).unwrap();
        assert_eq!(names(&router), vec!["unmatched", "failure", "odd"]);

        let err = router.on_dynamic_property("unmatched", Some("1")).unwrap_err();
        assert_eq!(err.kind(), rivulet_api::ErrorKind::Config);
        assert!(router.on_dynamic_property("bad", Some("-2")).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn routing_is_stable_while_rules_change() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let router = Arc::new(router(json!({"attribute_name": "flags", "rules": {"stable": 1}})));
        let stop = Arc::new(AtomicBool::new(false));

        let churn = {
            let router = Arc::clone(&router);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    router.on_dynamic_property("two", Some("2")).unwrap();
                    router.on_dynamic_property("four", Some("4")).unwrap();
                    router.on_dynamic_property("two", Some("6")).unwrap();
                    router.on_dynamic_property("four", None).unwrap();
                    router.on_dynamic_property("two", None).unwrap();
                }
            })
        };

        let mut session = MemorySession::new();
        for i in 0..500 {
            session.enqueue(flagged("7"));
            router.on_trigger(&mut session).await.unwrap();

            assert_eq!(session.transferred_count("stable"), i + 1);
            assert_eq!(session.transferred_count("unmatched"), 0);
            assert_eq!(session.transferred_count("failure"), 0);
            assert_eq!(session.removed_count(), i + 1);
        }

        stop.store(true, Ordering::Relaxed);
        churn.join().unwrap();
        assert_eq!(router.rules().mask("stable"), Some(1));
    }
}
