//! A concurrent bureaucracy simulation: customers queue at offices for
//! documents, documents can depend on other documents, and offices take
//! cooperative breaks without losing their place in line.
//!
//! The crate is organized the way the system is: a validated, immutable
//! [`Configuration`] (component A) feeds an [`Orchestrator`] (component E)
//! that owns one [`Office`] (component C) per named office. Each customer
//! gets its own [`Journey`] (component D), which memoizes document
//! requests and delegates resolution back to the orchestrator. [`Simulation`]
//! (component F) ties the whole thing together for a batch run; [`EventSink`]
//! (component B) is the narrow interface every component narrates through.

#![forbid(unsafe_code)]

mod clock;
mod config;
mod driver;
mod error;
mod events;
mod journey;
mod office;
mod orchestrator;
mod settled;

pub use clock::{Clock, DurationOracle, MidpointOracle, TokioClock, UniformOracle};
pub use config::{Configuration, CustomerProfile, DocumentSpec, OfficeSpec};
pub use driver::{CustomerOutcome, Simulation};
pub use error::BureauError;
pub use events::{EventSink, MemorySink, NullSink, TracingSink};
pub use journey::Journey;
pub use office::{IssuanceResult, Office, OfficeRuntimeState};
pub use orchestrator::Orchestrator;
pub use settled::{pair as settled_pair, Settled, Settler};
