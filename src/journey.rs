//! Per-customer document memoization (component D).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::BureauError;
use crate::office::IssuanceResult;
use crate::orchestrator::Orchestrator;
use crate::settled::{self, Settled};

type DocumentOutcome = Result<IssuanceResult, BureauError>;

/// One customer's in-flight and settled document requests.
///
/// Every document name a customer has ever asked for maps to exactly one
/// [`Settled`] cell, installed atomically the first time it is requested.
/// A document that failed stays failed: the crate deliberately does not
/// retry a settled error on a later request for the same name (see
/// DESIGN.md).
pub struct Journey {
    /// The customer this journey belongs to.
    pub customer_id: String,
    documents: Mutex<HashMap<String, Settled<DocumentOutcome>>>,
}

impl Journey {
    /// Start a fresh journey for `customer_id`.
    #[must_use]
    pub fn new(customer_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            customer_id: customer_id.into(),
            documents: Mutex::new(HashMap::new()),
        })
    }

    /// True only if `name` has been requested before and settled
    /// successfully.
    #[must_use]
    pub fn has_document(&self, name: &str) -> bool {
        self.documents
            .lock()
            .get(name)
            .and_then(Settled::peek)
            .is_some_and(|outcome| outcome.is_ok())
    }

    /// Request `name`, memoizing across concurrent and repeated calls.
    ///
    /// The first caller for a given document name wins an atomic
    /// put-if-absent and drives the orchestrator to resolve it; every other
    /// caller — concurrent or later — observes the same placeholder and
    /// simply awaits its settlement.
    pub async fn request_document(
        self: &Arc<Self>,
        orchestrator: &Arc<Orchestrator>,
        name: &str,
    ) -> DocumentOutcome {
        let (cell, installed_settler) = {
            let mut documents = self.documents.lock();
            if let Some(existing) = documents.get(name) {
                (existing.clone(), None)
            } else {
                let (cell, settler) = settled::pair();
                documents.insert(name.to_string(), cell.clone());
                (cell, Some(settler))
            }
        };

        match installed_settler {
            None => cell.wait().await,
            Some(settler) => {
                let outcome = orchestrator.resolve(self, name).await;
                if let Ok(result) = &outcome {
                    orchestrator.sink().issued(result);
                }
                settler.settle(outcome.clone());
                outcome
            }
        }
    }
}
