//! Event sink: the narrow interface the core pushes structured events into
//! (component B).

use std::sync::Arc;

use parking_lot::Mutex;

use crate::office::IssuanceResult;

/// Narrow interface the document orchestration subsystem pushes structured
/// events into. Every operation takes primitive fields and returns nothing;
/// implementations must be safe to call from any worker concurrently and
/// must never let a failure (e.g. an I/O error in a logging backend)
/// propagate into the core — hence the infallible signatures.
pub trait EventSink: Send + Sync {
    /// Engine-level lifecycle narration.
    fn system(&self, msg: &str);
    /// Office-internal log line.
    fn office(&self, office: &str, msg: &str);
    /// Per-customer narration.
    fn customer(&self, customer: &str, msg: &str);
    /// A request is about to be submitted to an office.
    fn office_arrival(&self, office: &str, customer: &str, doc: &str);
    /// The office has admitted a request into its queue.
    fn request_accepted(&self, office: &str, customer: &str, doc: &str);
    /// Current queue contents right after an admission.
    fn queue(&self, office: &str, customer: &str, doc: &str, snapshot: &[String]);
    /// A worker has begun service on a request.
    fn counter_start(&self, office: &str, counter: usize, customer: &str, doc: &str);
    /// A dependency is being sought at another office.
    fn transport(&self, from_office: &str, to_office: &str, doc: &str);
    /// A submission was rejected because prerequisites are missing.
    fn cancel(&self, office: &str, customer: &str, doc: &str, reason: &str);
    /// Service completed successfully.
    fn counter_finish(&self, office: &str, counter: usize, customer: &str, doc: &str);
    /// A document was produced; duration is now known.
    fn issued(&self, result: &IssuanceResult);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn system(&self, msg: &str) {
        (**self).system(msg);
    }
    fn office(&self, office: &str, msg: &str) {
        (**self).office(office, msg);
    }
    fn customer(&self, customer: &str, msg: &str) {
        (**self).customer(customer, msg);
    }
    fn office_arrival(&self, office: &str, customer: &str, doc: &str) {
        (**self).office_arrival(office, customer, doc);
    }
    fn request_accepted(&self, office: &str, customer: &str, doc: &str) {
        (**self).request_accepted(office, customer, doc);
    }
    fn queue(&self, office: &str, customer: &str, doc: &str, snapshot: &[String]) {
        (**self).queue(office, customer, doc, snapshot);
    }
    fn counter_start(&self, office: &str, counter: usize, customer: &str, doc: &str) {
        (**self).counter_start(office, counter, customer, doc);
    }
    fn transport(&self, from_office: &str, to_office: &str, doc: &str) {
        (**self).transport(from_office, to_office, doc);
    }
    fn cancel(&self, office: &str, customer: &str, doc: &str, reason: &str) {
        (**self).cancel(office, customer, doc, reason);
    }
    fn counter_finish(&self, office: &str, counter: usize, customer: &str, doc: &str) {
        (**self).counter_finish(office, counter, customer, doc);
    }
    fn issued(&self, result: &IssuanceResult) {
        (**self).issued(result);
    }
}

/// A no-op sink. Useful when only the return values of the simulation
/// matter, not its narration.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn system(&self, _msg: &str) {}
    fn office(&self, _office: &str, _msg: &str) {}
    fn customer(&self, _customer: &str, _msg: &str) {}
    fn office_arrival(&self, _office: &str, _customer: &str, _doc: &str) {}
    fn request_accepted(&self, _office: &str, _customer: &str, _doc: &str) {}
    fn queue(&self, _office: &str, _customer: &str, _doc: &str, _snapshot: &[String]) {}
    fn counter_start(&self, _office: &str, _counter: usize, _customer: &str, _doc: &str) {}
    fn transport(&self, _from_office: &str, _to_office: &str, _doc: &str) {}
    fn cancel(&self, _office: &str, _customer: &str, _doc: &str, _reason: &str) {}
    fn counter_finish(&self, _office: &str, _counter: usize, _customer: &str, _doc: &str) {}
    fn issued(&self, _result: &IssuanceResult) {}
}

/// A sink that forwards every event to `tracing`, structured with fields
/// rather than formatted strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn system(&self, msg: &str) {
        tracing::info!(msg, "bureau.system");
    }
    fn office(&self, office: &str, msg: &str) {
        tracing::info!(office, msg, "bureau.office");
    }
    fn customer(&self, customer: &str, msg: &str) {
        tracing::info!(customer, msg, "bureau.customer");
    }
    fn office_arrival(&self, office: &str, customer: &str, doc: &str) {
        tracing::info!(office, customer, doc, "bureau.arrive");
    }
    fn request_accepted(&self, office: &str, customer: &str, doc: &str) {
        tracing::info!(office, customer, doc, "bureau.request_accepted");
    }
    fn queue(&self, office: &str, customer: &str, doc: &str, snapshot: &[String]) {
        tracing::debug!(office, customer, doc, line = ?snapshot, "bureau.queue");
    }
    fn counter_start(&self, office: &str, counter: usize, customer: &str, doc: &str) {
        tracing::info!(office, counter, customer, doc, "bureau.counter_start");
    }
    fn transport(&self, from_office: &str, to_office: &str, doc: &str) {
        tracing::info!(from_office, to_office, doc, "bureau.transport");
    }
    fn cancel(&self, office: &str, customer: &str, doc: &str, reason: &str) {
        tracing::info!(office, customer, doc, reason, "bureau.cancel");
    }
    fn counter_finish(&self, office: &str, counter: usize, customer: &str, doc: &str) {
        tracing::info!(office, counter, customer, doc, "bureau.counter_finish");
    }
    fn issued(&self, result: &IssuanceResult) {
        tracing::info!(
            customer = result.customer_id,
            doc = result.document_name,
            office = result.issuing_office,
            duration_ms = result.service_duration.as_millis() as u64,
            "bureau.issued"
        );
    }
}

/// An in-memory sink recording both the canonical trace-line format from
/// spec §6 and the raw `issued` results, for test assertions.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
    issuances: Mutex<Vec<IssuanceResult>>,
}

impl MemorySink {
    /// Create a new, empty in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The canonical trace lines recorded so far, in emission order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Every `issued` result recorded so far, in emission order.
    #[must_use]
    pub fn issuances(&self) -> Vec<IssuanceResult> {
        self.issuances.lock().clone()
    }

    fn push(&self, line: String) {
        self.lines.lock().push(line);
    }
}

impl EventSink for MemorySink {
    fn system(&self, msg: &str) {
        self.push(format!("SYSTEM {msg}"));
    }
    fn office(&self, office: &str, msg: &str) {
        self.push(format!("OFFICE office <{office}> {msg}"));
    }
    fn customer(&self, customer: &str, msg: &str) {
        self.push(format!("CUSTOMER person <{customer}> {msg}"));
    }
    fn office_arrival(&self, office: &str, customer: &str, doc: &str) {
        self.push(format!(
            "ARRIVE office <{office}> person <{customer}> asking for <{doc}>"
        ));
    }
    fn request_accepted(&self, office: &str, customer: &str, doc: &str) {
        self.push(format!(
            "REQUEST office <{office}> person <{customer}> -> <{doc}> in progress"
        ));
    }
    fn queue(&self, office: &str, customer: &str, doc: &str, snapshot: &[String]) {
        self.push(format!(
            "QUEUE   office <{office}> person <{customer}> waiting for <{doc}> | line: {}",
            snapshot.join(",")
        ));
    }
    fn counter_start(&self, office: &str, counter: usize, customer: &str, doc: &str) {
        self.push(format!(
            "COUNTER office <{office}> counter {counter} now processing person <{customer}> for <{doc}>"
        ));
    }
    fn transport(&self, from_office: &str, to_office: &str, doc: &str) {
        self.push(format!(
            "TRANSPORTING from counter: {from_office} to counter: {to_office} document: {doc}"
        ));
    }
    fn cancel(&self, office: &str, customer: &str, doc: &str, reason: &str) {
        self.push(format!(
            "CANCELLED at office <{office}> person <{customer}> request <{doc}> -> {reason}"
        ));
    }
    fn counter_finish(&self, office: &str, counter: usize, customer: &str, doc: &str) {
        self.push(format!(
            "FINISHED person <{customer}> got <{doc}> from <{office}> counter {counter} LEAVING..."
        ));
    }
    fn issued(&self, result: &IssuanceResult) {
        self.issuances.lock().push(result.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn memory_sink_records_canonical_lines() {
        let sink = MemorySink::new();
        sink.office_arrival("A", "u", "X");
        sink.request_accepted("A", "u", "X");
        sink.queue("A", "u", "X", &["u REQUESTING X".to_string()]);
        sink.counter_start("A", 0, "u", "X");
        sink.counter_finish("A", 0, "u", "X");

        let lines = sink.lines();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("ARRIVE"));
        assert!(lines[4].contains("LEAVING"));
    }

    #[test]
    fn memory_sink_records_issuances() {
        let sink = MemorySink::new();
        let result = IssuanceResult {
            customer_id: "u".into(),
            document_name: "X".into(),
            issuing_office: "A".into(),
            dependencies: vec![],
            service_duration: Duration::from_millis(5),
        };
        sink.issued(&result);
        assert_eq!(sink.issuances(), vec![result]);
    }

    #[test]
    fn arc_wrapped_sink_forwards() {
        let sink: Arc<dyn EventSink> = Arc::new(MemorySink::new());
        sink.system("hello");
    }
}
