use std::collections::BTreeMap;
use std::time::Duration;

use rivulet_api::{FlowProcessor, MemorySession, Scheduling};

/// Trigger loop limits.
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    pub max_triggers: usize,
    pub yield_period: Duration,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub triggers: usize,
    pub yields: usize,
    pub failed_triggers: usize,
    pub removed: usize,
    /// Routed record count per output.
    pub routed: BTreeMap<String, usize>,
}

/// Trigger `processor` until the queue drains or `max_triggers` is hit.
///
/// A trigger that returns `Err` is logged and counted; the loop backs off
/// for one yield period and keeps going.
pub async fn run_processor(
    name: &str,
    processor: &dyn FlowProcessor,
    session: &mut MemorySession,
    limits: RunLimits,
) -> RunSummary {
    let mut summary = RunSummary::default();

    while !session.is_queue_empty() && summary.triggers < limits.max_triggers {
        summary.triggers += 1;
        match processor.on_trigger(session).await {
            Ok(Scheduling::Continue) => {}
            Ok(Scheduling::Yield) => {
                summary.yields += 1;
                tracing::debug!(processor = %name, period_ms = limits.yield_period.as_millis() as u64, "processor yielded");
                tokio::time::sleep(limits.yield_period).await;
            }
            Err(e) => {
                summary.failed_triggers += 1;
                tracing::error!(processor = %name, error = %e, "trigger failed");
                tokio::time::sleep(limits.yield_period).await;
            }
        }
    }

    if !session.is_queue_empty() {
        tracing::warn!(
            processor = %name,
            remaining = session.queue_len(),
            max_triggers = limits.max_triggers,
            "trigger limit reached before the queue drained"
        );
    }

    for (relationship, _) in session.routed() {
        *summary.routed.entry(relationship.name().to_string()).or_default() += 1;
    }
    summary.removed = session.removed_count();
    summary
}
