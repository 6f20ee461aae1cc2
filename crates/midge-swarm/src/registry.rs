//! Named load tests: the boundary between test definitions and the runner.

use std::sync::Arc;

use async_trait::async_trait;
use midge_core::{ActionLog, MidgeError, MidgeResult};
use tracing::{info, warn};

use crate::action::ActionSet;
use crate::swarm::{StopReason, Swarm};

/// Type-erased swarm lifecycle, so swarms over different action sets can share a registry.
#[async_trait]
pub trait LoadTest: Send + Sync {
    fn name(&self) -> &str;

    async fn setup(&self) -> MidgeResult<()>;

    async fn run(&self) -> MidgeResult<Vec<ActionLog>>;

    async fn teardown(&self) -> MidgeResult<()>;

    /// Ends a running test early; logs already accepted are kept.
    fn stop(&self);
}

#[async_trait]
impl<S: ActionSet> LoadTest for Swarm<S> {
    fn name(&self) -> &str {
        self.id()
    }

    async fn setup(&self) -> MidgeResult<()> {
        Swarm::setup(self).await
    }

    async fn run(&self) -> MidgeResult<Vec<ActionLog>> {
        Swarm::run(self).await
    }

    async fn teardown(&self) -> MidgeResult<()> {
        Swarm::teardown(self).await
    }

    fn stop(&self) {
        Swarm::stop(self, StopReason::Manual);
    }
}

type Constructor = Arc<dyn Fn() -> MidgeResult<Box<dyn LoadTest>> + Send + Sync>;

/// Insertion-ordered mapping from test name to a zero-argument swarm constructor.
#[derive(Default, Clone)]
pub struct TestRegistry {
    tests: Vec<(String, Constructor)>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `constructor` under `name`, replacing an earlier registration in place.
    pub fn register<S, F>(&mut self, name: impl Into<String>, constructor: F)
    where
        S: ActionSet,
        F: Fn() -> MidgeResult<Swarm<S>> + Send + Sync + 'static,
    {
        let name = name.into();
        let constructor: Constructor =
            Arc::new(move || constructor().map(|swarm| Box::new(swarm) as Box<dyn LoadTest>));

        match self.tests.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = constructor,
            None => self.tests.push((name, constructor)),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tests.iter().map(|(name, _)| name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tests.iter().any(|(existing, _)| existing == name)
    }

    /// Builds a fresh instance of the named test.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for an unknown name, or whatever the constructor reports.
    pub fn construct(&self, name: &str) -> MidgeResult<Box<dyn LoadTest>> {
        let (_, constructor) = self
            .tests
            .iter()
            .find(|(existing, _)| existing == name)
            .ok_or_else(|| {
                MidgeError::invalid_config("test", format!("no test registered as `{name}`"))
            })?;
        constructor()
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

/// Runs a full setup / run / teardown cycle.
///
/// Teardown runs even when the run fails; the run error wins.
pub async fn execute(test: &dyn LoadTest) -> MidgeResult<Vec<ActionLog>> {
    test.setup().await?;
    let result = test.run().await;
    let teardown = test.teardown().await;

    match (result, teardown) {
        (Ok(logs), Ok(())) => {
            info!(test = %test.name(), logs = logs.len(), "load test finished");
            Ok(logs)
        }
        (Ok(_), Err(err)) => Err(err),
        (Err(err), teardown) => {
            if let Err(teardown_err) = teardown {
                warn!(
                    test = %test.name(),
                    error = %teardown_err,
                    "teardown failed after run error"
                );
            }
            Err(err)
        }
    }
}
