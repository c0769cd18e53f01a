use std::future::Future;
use std::pin::Pin;

use crate::error::PluginError;
use crate::relationship::Relationship;
use crate::session::ProcessSession;

/// What the host should do with this processor after a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduling {
    /// Schedule normally.
    Continue,
    /// Pause scheduling for the processor's yield period.
    Yield,
}

/// Flow processor, invoked by the host once per scheduling cycle.
///
/// Configuration is validated when the processor is created; an invalid
/// configuration means the processor is never created and never
/// scheduled. Per-record problems are reported by routing, not by
/// returning `Err` from `on_trigger`.
pub trait FlowProcessor: Send + Sync {
    /// Outputs currently declared by this processor. May change when
    /// dynamic properties change.
    fn relationships(&self) -> Vec<Relationship>;

    /// Run one cycle against the host session.
    fn on_trigger<'a>(
        &'a self,
        session: &'a mut dyn ProcessSession,
    ) -> Pin<Box<dyn Future<Output = Result<Scheduling, PluginError>> + Send + 'a>>;

    /// Apply a dynamic property change. `None` removes the property.
    ///
    /// Called from the management path, possibly concurrently with
    /// `on_trigger`.
    fn on_dynamic_property(&self, name: &str, value: Option<&str>) -> Result<(), PluginError> {
        let _ = value;
        Err(PluginError::config(format!(
            "dynamic property '{name}' is not supported by this processor"
        )))
    }
}
