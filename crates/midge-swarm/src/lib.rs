//! Worker orchestration and rate control.
//!
//! A [`Swarm`] owns a population of [`Midge`] workers. Each midge drives one
//! [`Task`], which binds an [`ActionSet`] instance to a weighted [`ActionTable`].
//! Logs flow from the midges through a single channel back into the swarm.

pub mod action;
pub mod metrics;
pub mod midge;
pub mod registry;
pub mod swarm;
pub mod task;

pub use action::{Action, ActionError, ActionOutcome, ActionResult, ActionSet};
pub use midge::{ActionCallback, Midge};
pub use registry::{execute, LoadTest, TestRegistry};
pub use swarm::{distribute_rate, StopReason, Swarm, SwarmBuilder};
pub use task::{ActionTable, Task};
