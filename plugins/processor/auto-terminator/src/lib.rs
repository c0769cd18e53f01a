use std::future::Future;
use std::pin::Pin;

use rivulet_api::{
    FlowProcessor, PluginCreateResult, PluginError, ProcessSession, Relationship, Scheduling,
    parse_plugin_config_opt, plugin_err, plugin_ok,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AutoTerminatorConfig {
    /// Maximum number of records dropped per trigger.
    #[serde(default = "default_bulk")]
    pub bulk: usize,
}

fn default_bulk() -> usize {
    1
}

impl Default for AutoTerminatorConfig {
    fn default() -> Self {
        Self { bulk: default_bulk() }
    }
}

/// Sink that drops up to `bulk` records per trigger.
pub struct AutoTerminator {
    bulk: usize,
}

impl AutoTerminator {
    pub fn from_config(config: AutoTerminatorConfig) -> Result<Self, PluginError> {
        if config.bulk == 0 {
            return Err(PluginError::config("bulk must be at least 1"));
        }
        Ok(Self { bulk: config.bulk })
    }
}

impl FlowProcessor for AutoTerminator {
    fn relationships(&self) -> Vec<Relationship> {
        Vec::new()
    }

    fn on_trigger<'a>(
        &'a self,
        session: &'a mut dyn ProcessSession,
    ) -> Pin<Box<dyn Future<Output = Result<Scheduling, PluginError>> + Send + 'a>> {
        Box::pin(async move {
            let records = session.get(self.bulk);
            if !records.is_empty() {
                tracing::debug!(count = records.len(), "terminating records");
            }
            for record in records {
                session.remove(record);
            }
            Ok(Scheduling::Continue)
        })
    }
}

// ---------------------------------------------------------------------------
// FFI exports for dynamic (.so) loading
// ---------------------------------------------------------------------------

/// # Safety
/// `config_json_ptr` must point to `config_json_len` valid UTF-8 bytes (or be null).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qs_create_processor(
    config_json_ptr: *const u8,
    config_json_len: usize,
) -> PluginCreateResult {
    let config: AutoTerminatorConfig =
        match unsafe { parse_plugin_config_opt(config_json_ptr, config_json_len) } {
            Ok(c) => c,
            Err(e) => return plugin_err(e.to_string()),
        };
    match AutoTerminator::from_config(config) {
        Ok(p) => plugin_ok(Box::new(p) as Box<dyn FlowProcessor>),
        Err(e) => plugin_err(e.to_string()),
    }
}

rivulet_api::qs_destroy_fn!(qs_destroy_processor, rivulet_api::FlowProcessor);
rivulet_api::qs_abi_version_fn!();

#[cfg(test)]
mod tests {
    use rivulet_api::{FlowRecord, MemorySession};

    use super::*;

    fn queue(n: usize) -> MemorySession {
        let mut session = MemorySession::new();
        for i in 0..n {
            session.enqueue(FlowRecord::new(format!("record {i}")));
        }
        session
    }

    #[tokio::test]
    async fn drops_at_most_bulk_records_per_trigger() {
        let gate = AutoTerminator::from_config(AutoTerminatorConfig { bulk: 10 }).unwrap();
        let mut session = queue(25);

        gate.on_trigger(&mut session).await.unwrap();
        assert_eq!(session.removed_count(), 10);
        assert_eq!(session.queue_len(), 15);

        gate.on_trigger(&mut session).await.unwrap();
        gate.on_trigger(&mut session).await.unwrap();
        assert_eq!(session.removed_count(), 25);
        assert!(session.is_queue_empty());
        assert!(session.routed().is_empty());
    }

    #[tokio::test]
    async fn default_bulk_drops_one() {
        let gate = AutoTerminator::from_config(AutoTerminatorConfig::default()).unwrap();
        let mut session = queue(3);

        gate.on_trigger(&mut session).await.unwrap();

        assert_eq!(session.removed_count(), 1);
        assert_eq!(session.queue_len(), 2);
    }

    #[tokio::test]
    async fn empty_queue_is_a_no_op() {
        let gate = AutoTerminator::from_config(AutoTerminatorConfig { bulk: 5 }).unwrap();
        let mut session = MemorySession::new();
        let scheduling = gate.on_trigger(&mut session).await.unwrap();
        assert_eq!(scheduling, Scheduling::Continue);
        assert_eq!(session.removed_count(), 0);
    }

    #[test]
    fn zero_bulk_is_rejected() {
        let cfg: AutoTerminatorConfig = serde_json::from_str(r#"{"bulk": 0}"#).unwrap();
        assert!(AutoTerminator::from_config(cfg).is_err());
    }

    #[test]
    fn has_no_outputs() {
        let gate = AutoTerminator::from_config(AutoTerminatorConfig::default()).unwrap();
        assert!(gate.relationships().is_empty());
    }

    #[test]
    fn ffi_creation_reports_errors() {
        let ok = unsafe { qs_create_processor(std::ptr::null(), 0) };
        assert!(ok.error_ptr.is_null());
        unsafe { qs_destroy_processor(ok.plugin_ptr) };

        let json = r#"{"bulk": 0}"#;
        let bad = unsafe { qs_create_processor(json.as_ptr(), json.len()) };
        assert!(bad.plugin_ptr.is_null());
        let msg = unsafe { *Box::from_raw(bad.error_ptr as *mut String) };
        assert!(msg.contains("bulk"));
    }
}
