//! renderflow: client-side orchestration of asynchronous generation jobs.
//!
//! A request goes through the [`gate`], which checks local preconditions and
//! submits it once. The jobs it creates are tracked by the [`poller`], which
//! refreshes their status on a fixed interval until every tracked job has an
//! output or the session deadline passes. Completions land in the ordered
//! [`aggregator`]; a drained session is handed to the [`reconciler`] exactly
//! once. [`orchestrator::Orchestrator`] ties the pieces together.

pub mod aggregator;
pub mod api;
pub mod cli;
pub mod config;
pub mod demo;
pub mod error;
pub mod gate;
pub mod jobs;
pub mod model;
pub mod orchestrator;
pub mod poller;
pub mod reconciler;
pub mod session;
pub mod timer;
pub mod ui;

#[cfg(test)]
mod testing;

pub use error::{SubmitError, ValidationError};
pub use gate::SubmissionOutcome;
pub use model::{AggregateSnapshot, OrchestratorEvent};
pub use orchestrator::Orchestrator;
pub use poller::PollPolicy;
