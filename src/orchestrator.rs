//! Document orchestrator (component E): builds the office pool from a
//! [`Configuration`] and exposes the single entry point ([`Orchestrator::resolve`])
//! that a [`Journey`] uses to drive one document request to completion.
//!
//! `Office::request` only ever runs one service attempt and settles with
//! either a result or a `MissingDependencies` signal — it never drives
//! dependency resolution itself (see DESIGN.md for why). This orchestrator
//! owns that loop: submit, and on `MissingDependencies`, resolve each one
//! (possibly at another office, possibly recursing back into this same
//! office) through the Journey, then resubmit. Because this loop runs on
//! the caller's own execution context rather than inside a worker, an
//! office never has to hold a counter across a dependency resolution that
//! might lead right back to itself.

use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::{Clock, DurationOracle};
use crate::config::Configuration;
use crate::error::BureauError;
use crate::events::EventSink;
use crate::journey::Journey;
use crate::office::{IssuanceResult, Office, ServiceOutcome};

/// Owns the office pool and the shared collaborators (event sink, duration
/// oracle, clock) every office is built with.
pub struct Orchestrator {
    config: Arc<Configuration>,
    offices: HashMap<String, Arc<Office>>,
    sink: Arc<dyn EventSink>,
}

impl Orchestrator {
    /// Build one office per entry in `config`, ready to accept requests.
    #[must_use]
    pub fn new(
        config: Arc<Configuration>,
        sink: Arc<dyn EventSink>,
        oracle: Arc<dyn DurationOracle>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let offices = config
            .offices()
            .enumerate()
            .map(|(id, spec)| {
                let office = Office::new(id, spec.clone(), Arc::clone(&sink), Arc::clone(&oracle), Arc::clone(&clock));
                (spec.name.clone(), office)
            })
            .collect();

        Arc::new(Self {
            config,
            offices,
            sink,
        })
    }

    /// The configuration this orchestrator was built from.
    #[must_use]
    pub fn config(&self) -> &Arc<Configuration> {
        &self.config
    }

    /// Look up a live office by name.
    #[must_use]
    pub fn office(&self, name: &str) -> Option<&Arc<Office>> {
        self.offices.get(name)
    }

    /// Every office this orchestrator owns, in unspecified order.
    pub fn offices(&self) -> impl Iterator<Item = &Arc<Office>> {
        self.offices.values()
    }

    pub(crate) fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    pub(crate) fn issuing_office_of(&self, document_name: &str) -> Result<String, BureauError> {
        self.config
            .document(document_name)
            .map(|doc| doc.issuing_office.clone())
            .ok_or_else(|| BureauError::UnknownDocument(document_name.to_string()))
    }

    /// Resolve `doc_name` for `journey`: look up its issuing office, submit
    /// a request there (directly or inline, per the office's reentrancy
    /// rule), and — if the office reports missing prerequisites — resolve
    /// each one through the journey and resubmit, per spec §4.5, until the
    /// document is produced or a fatal error occurs.
    ///
    /// Called by [`Journey::request_document`] only for the winner of the
    /// per-document put-if-absent race; every other caller just awaits the
    /// same [`Settled`](crate::settled::Settled) cell.
    pub(crate) async fn resolve(
        self: &Arc<Self>,
        journey: &Arc<Journey>,
        doc_name: &str,
    ) -> Result<IssuanceResult, BureauError> {
        let document = self
            .config
            .document(doc_name)
            .cloned()
            .ok_or_else(|| BureauError::UnknownDocument(doc_name.to_string()))?;
        let office = self
            .offices
            .get(&document.issuing_office)
            .cloned()
            .ok_or_else(|| BureauError::UnknownOffice(document.issuing_office.clone()))?;

        self.sink
            .office_arrival(&office.spec().name, &journey.customer_id, doc_name);

        loop {
            let outcome = office
                .request(Arc::clone(journey), document.clone(), journey.customer_id.clone())
                .await?;

            let missing = match outcome {
                ServiceOutcome::Issued(result) => return Ok(result),
                ServiceOutcome::MissingDependencies(missing) => missing,
            };

            self.sink.cancel(
                &office.spec().name,
                &journey.customer_id,
                doc_name,
                &format!("needs {}", missing.join(", ")),
            );

            // Sequential by design (spec §4.5): a later dependency may share
            // a prerequisite with an earlier one, and the Journey's
            // memoization only coalesces that if the earlier one has
            // already settled.
            for dep in &missing {
                let dep_office = self.issuing_office_of(dep)?;
                self.sink.transport(&office.spec().name, &dep_office, dep);
                journey.request_document(self, dep).await?;
            }
            // All prerequisites now held; loop back and resubmit.
        }
    }

    /// Shut every office down and wait for their worker pools to exit.
    pub async fn shutdown(&self) {
        for office in self.offices.values() {
            office.shutdown().await;
        }
    }
}
