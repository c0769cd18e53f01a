use std::collections::VecDeque;

use crate::record::FlowRecord;
use crate::relationship::Relationship;
use crate::session::ProcessSession;

/// Delivery event reported through `ProcessSession::report_send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendEvent {
    pub transit_uri: String,
    pub record: FlowRecord,
}

/// In-memory session: a FIFO input queue plus a log of every routing
/// decision. Used by the runner as its host and by tests as a harness.
#[derive(Debug, Default)]
pub struct MemorySession {
    queue: VecDeque<FlowRecord>,
    routed: Vec<(Relationship, FlowRecord)>,
    removed: usize,
    send_events: Vec<SendEvent>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, record: FlowRecord) {
        self.queue.push_back(record);
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_queue_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Every transfer so far, in order.
    pub fn routed(&self) -> &[(Relationship, FlowRecord)] {
        &self.routed
    }

    /// Records transferred to the output named `name`, in order.
    pub fn transferred(&self, name: &str) -> Vec<&FlowRecord> {
        self.routed
            .iter()
            .filter(|(rel, _)| rel.name() == name)
            .map(|(_, record)| record)
            .collect()
    }

    pub fn transferred_count(&self, name: &str) -> usize {
        self.routed.iter().filter(|(rel, _)| rel.name() == name).count()
    }

    /// Number of records dropped via `remove`.
    pub fn removed_count(&self) -> usize {
        self.removed
    }

    pub fn send_events(&self) -> &[SendEvent] {
        &self.send_events
    }

    /// Take the routing log, leaving it empty.
    pub fn drain_routed(&mut self) -> Vec<(Relationship, FlowRecord)> {
        std::mem::take(&mut self.routed)
    }
}

impl ProcessSession for MemorySession {
    fn get(&mut self, max: usize) -> Vec<FlowRecord> {
        let n = max.min(self.queue.len());
        self.queue.drain(..n).collect()
    }

    fn transfer(&mut self, record: FlowRecord, relationship: &Relationship) {
        self.routed.push((relationship.clone(), record));
    }

    fn remove(&mut self, _record: FlowRecord) {
        self.removed += 1;
    }

    fn report_send(&mut self, record: &FlowRecord, transit_uri: &str) {
        self.send_events.push(SendEvent {
            transit_uri: transit_uri.to_string(),
            record: record.clone(),
        });
    }
}
