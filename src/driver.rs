//! Simulation driver (component F): wires a [`Configuration`] into a live
//! orchestrator, fans customers out over it, and runs a background break
//! scheduler per office for the run's duration.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, DurationOracle};
use crate::config::{Configuration, CustomerProfile};
use crate::error::BureauError;
use crate::events::EventSink;
use crate::journey::Journey;
use crate::office::IssuanceResult;
use crate::orchestrator::Orchestrator;

/// How long an office stays open, on average, between unscheduled breaks.
/// Arbitrary but fixed so a run's narration is reproducible under the
/// deterministic clock/oracle pair the test suite uses.
const BREAK_CADENCE: std::ops::RangeInclusive<Duration> =
    Duration::from_secs(6)..=Duration::from_secs(10);

/// Everything one customer's workflow produced, one entry per requested
/// document in request order.
#[derive(Debug, Clone)]
pub struct CustomerOutcome {
    /// The customer this outcome belongs to.
    pub customer_id: String,
    /// One result per document in [`CustomerProfile::requested_documents`],
    /// in the same order.
    pub documents: Vec<Result<IssuanceResult, BureauError>>,
}

/// Owns a live [`Orchestrator`] and drives a batch of customers through it.
pub struct Simulation {
    orchestrator: Arc<Orchestrator>,
    oracle: Arc<dyn DurationOracle>,
    clock: Arc<dyn Clock>,
}

impl Simulation {
    /// Build every office described by `config` and make it ready to accept
    /// customer traffic.
    #[must_use]
    pub fn new(
        config: Arc<Configuration>,
        sink: Arc<dyn EventSink>,
        oracle: Arc<dyn DurationOracle>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        sink.system("simulation starting");
        let orchestrator = Orchestrator::new(config, sink, Arc::clone(&oracle), Arc::clone(&clock));
        Self {
            orchestrator,
            oracle,
            clock,
        }
    }

    /// The orchestrator this simulation is driving, for callers that want
    /// direct access to office state (e.g. a demo binary polling
    /// `queue_size`).
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Run `customers` to completion: each gets its own task (arrival delay,
    /// then a fan-out over its requested documents), a background break
    /// scheduler runs per office for the duration, and everything is torn
    /// down once every customer finishes.
    pub async fn run(&self, customers: Vec<CustomerProfile>) -> Vec<CustomerOutcome> {
        let cancellation = CancellationToken::new();
        let break_schedulers: Vec<_> = self
            .orchestrator
            .offices()
            .map(|office| {
                let office = Arc::clone(office);
                let oracle = Arc::clone(&self.oracle);
                let clock = Arc::clone(&self.clock);
                let cancellation = cancellation.clone();
                tokio::spawn(run_break_scheduler(office, oracle, clock, cancellation))
            })
            .collect();

        let customer_tasks = customers.into_iter().map(|profile| {
            let orchestrator = Arc::clone(&self.orchestrator);
            let clock = Arc::clone(&self.clock);
            tokio::spawn(run_customer(orchestrator, clock, profile))
        });

        let outcomes = join_all(customer_tasks)
            .await
            .into_iter()
            .map(|joined| joined.expect("customer task panicked"))
            .collect();

        cancellation.cancel();
        for scheduler in break_schedulers {
            let _ = scheduler.await;
        }
        self.orchestrator.shutdown().await;
        self.orchestrator.sink().system("simulation finished");

        outcomes
    }
}

async fn run_customer(
    orchestrator: Arc<Orchestrator>,
    clock: Arc<dyn Clock>,
    profile: CustomerProfile,
) -> CustomerOutcome {
    clock.delay(profile.arrival_delay).await;
    orchestrator
        .sink()
        .customer(&profile.id, "arrived");

    let journey = Journey::new(profile.id.clone());
    let document_futures = profile
        .requested_documents
        .iter()
        .map(|name| journey.request_document(&orchestrator, name));
    let documents = join_all(document_futures).await;

    orchestrator.sink().customer(&profile.id, "workflow complete");

    CustomerOutcome {
        customer_id: profile.id,
        documents,
    }
}

async fn run_break_scheduler(
    office: Arc<crate::office::Office>,
    oracle: Arc<dyn DurationOracle>,
    clock: Arc<dyn Clock>,
    cancellation: CancellationToken,
) {
    loop {
        let wait = oracle.sample(BREAK_CADENCE);
        tokio::select! {
            _ = cancellation.cancelled() => return,
            _ = clock.delay(wait) => {}
        }
        tokio::select! {
            _ = cancellation.cancelled() => return,
            _ = office.take_break() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{MidpointOracle, TokioClock};
    use crate::config::{DocumentSpec, OfficeSpec};
    use crate::events::MemorySink;

    fn config() -> Configuration {
        Configuration::new(
            vec![OfficeSpec::new("A", 2, Duration::ZERO, Duration::from_millis(1), Duration::ZERO).unwrap()],
            vec![
                DocumentSpec::new("X", "A", vec![]),
                DocumentSpec::new("Y", "A", vec!["X".into()]),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn run_resolves_every_customer() {
        let sink = Arc::new(MemorySink::new());
        let simulation = Simulation::new(
            Arc::new(config()),
            sink,
            Arc::new(MidpointOracle),
            Arc::new(TokioClock),
        );
        let customers = vec![
            CustomerProfile::new("u", vec!["X".into()], Duration::ZERO),
            CustomerProfile::new("v", vec!["Y".into()], Duration::ZERO),
        ];
        let outcomes = simulation.run(customers).await;
        assert_eq!(outcomes.len(), 2);
        for outcome in &outcomes {
            for result in &outcome.documents {
                assert!(result.is_ok(), "{result:?}");
            }
        }
    }
}
