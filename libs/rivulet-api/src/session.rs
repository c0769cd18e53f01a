use crate::record::FlowRecord;
use crate::relationship::Relationship;

/// Host-side view of one processing cycle.
///
/// The host owns queueing, persistence and provenance. A processor pulls
/// records, and must resolve every pulled record exactly once, either by
/// `transfer` or by `remove`. Both take the record by value.
pub trait ProcessSession: Send {
    /// Pull up to `max` pending records. Empty when nothing is queued.
    fn get(&mut self, max: usize) -> Vec<FlowRecord>;

    /// Route a record to a named output.
    fn transfer(&mut self, record: FlowRecord, relationship: &Relationship);

    /// Drop a record without routing it anywhere.
    fn remove(&mut self, record: FlowRecord);

    /// Mark a record for delayed reprocessing by the host.
    fn penalize(&mut self, mut record: FlowRecord) -> FlowRecord {
        record.set_penalized(true);
        record
    }

    /// Record a delivery event: `record` was sent to `transit_uri`.
    fn report_send(&mut self, record: &FlowRecord, transit_uri: &str);
}
