//! Action descriptors and the action-set capability trait.

use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use midge_core::{MidgeError, MidgeResult, AGGREGATE_KEY};
use serde_json::Value;

/// Error raised by user action code. Never escapes a task: it becomes a failed log.
pub type ActionError = Box<dyn Error + Send + Sync>;

/// Response of one action invocation and whether it counts as a success.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub response: Value,
    pub success: bool,
}

impl ActionOutcome {
    pub fn success(response: impl Into<Value>) -> Self {
        Self {
            response: response.into(),
            success: true,
        }
    }

    pub fn failure(response: impl Into<Value>) -> Self {
        Self {
            response: response.into(),
            success: false,
        }
    }
}

pub type ActionResult = Result<ActionOutcome, ActionError>;

type AsyncHandler<S> = Arc<dyn Fn(Arc<S>) -> BoxFuture<'static, ActionResult> + Send + Sync>;
type BlockingHandler<S> = Arc<dyn Fn(&S) -> ActionResult + Send + Sync>;

pub(crate) enum Handler<S> {
    /// Cooperative handler polled on the scheduler.
    Async(AsyncHandler<S>),
    /// Blocking handler run on the helper thread pool.
    Blocking(BlockingHandler<S>),
}

impl<S> Clone for Handler<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Async(handler) => Self::Async(Arc::clone(handler)),
            Self::Blocking(handler) => Self::Blocking(Arc::clone(handler)),
        }
    }
}

/// One selectable unit of work: a name, a positive weight and a handler.
pub struct Action<S> {
    name: String,
    weight: u32,
    pub(crate) handler: Handler<S>,
}

impl<S: Send + Sync + 'static> Action<S> {
    /// Registers an async action. The handler receives the task's action-set instance.
    ///
    /// # Errors
    ///
    /// Returns `MidgeError::InvalidConfig` when `weight` is below 1 or the name is
    /// empty or reserved.
    pub fn new<F, Fut>(name: impl Into<String>, weight: u32, handler: F) -> MidgeResult<Self>
    where
        F: Fn(Arc<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        let handler: AsyncHandler<S> =
            Arc::new(move |instance: Arc<S>| -> BoxFuture<'static, ActionResult> {
                Box::pin(handler(instance))
            });
        Self::with_handler(name.into(), weight, Handler::Async(handler))
    }

    /// Registers an action whose handler blocks the calling thread.
    ///
    /// Blocking handlers are offloaded to a helper pool bounded by the swarm
    /// population, so they never stall the cooperative scheduler.
    ///
    /// # Errors
    ///
    /// Returns `MidgeError::InvalidConfig` when `weight` is below 1 or the name is
    /// empty or reserved.
    pub fn blocking<F>(name: impl Into<String>, weight: u32, handler: F) -> MidgeResult<Self>
    where
        F: Fn(&S) -> ActionResult + Send + Sync + 'static,
    {
        Self::with_handler(name.into(), weight, Handler::Blocking(Arc::new(handler)))
    }

    fn with_handler(name: String, weight: u32, handler: Handler<S>) -> MidgeResult<Self> {
        if name.trim().is_empty() {
            return Err(MidgeError::invalid_config(
                "action",
                "action name must not be empty",
            ));
        }
        // `*` keys the whole-set aggregate in reports
        if name == AGGREGATE_KEY {
            return Err(MidgeError::invalid_config(
                "action",
                format!("action name `{AGGREGATE_KEY}` is reserved"),
            ));
        }
        if weight < 1 {
            return Err(MidgeError::invalid_config(
                "weight",
                format!("action `{name}` must have weight >= 1, got {weight}"),
            ));
        }

        Ok(Self {
            name,
            weight,
            handler,
        })
    }
}

impl<S> Action<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self.handler, Handler::Blocking(_))
    }
}

impl<S> Clone for Action<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            weight: self.weight,
            handler: self.handler.clone(),
        }
    }
}

impl<S> fmt::Debug for Action<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .field("blocking", &self.is_blocking())
            .finish()
    }
}

/// A user-defined set of weighted actions with optional lifecycle hooks.
///
/// Every swarm worker owns one instance. Hooks default to no-ops.
#[async_trait]
pub trait ActionSet: Send + Sync + Sized + 'static {
    /// The selectable actions of this set, in definition order.
    fn actions() -> MidgeResult<Vec<Action<Self>>>;

    /// Called once per worker before any action runs.
    async fn setup(&self) -> Result<(), ActionError> {
        Ok(())
    }

    /// Called once per worker after the swarm has finished.
    async fn teardown(&self) -> Result<(), ActionError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl ActionSet for Noop {
        fn actions() -> MidgeResult<Vec<Action<Self>>> {
            Ok(vec![Action::new("noop", 1, |_: Arc<Noop>| async {
                Ok(ActionOutcome::success("OK"))
            })?])
        }
    }

    #[test]
    fn test_zero_weight_is_rejected() {
        let err = Action::<Noop>::new("ping", 0, |_| async { Ok(ActionOutcome::success(1)) })
            .unwrap_err();
        assert!(matches!(err, MidgeError::InvalidConfig { field: "weight", .. }));
        assert!(err.to_string().contains("ping"));
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let err =
            Action::<Noop>::blocking("  ", 1, |_| Ok(ActionOutcome::success(1))).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_aggregate_key_is_reserved() {
        let err = Action::<Noop>::new("*", 1, |_| async { Ok(ActionOutcome::success(1)) })
            .unwrap_err();
        assert!(matches!(err, MidgeError::InvalidConfig { field: "action", .. }));
        assert!(err.to_string().contains("reserved"));

        assert!(Action::<Noop>::blocking("*", 1, |_| Ok(ActionOutcome::success(1))).is_err());
    }

    #[test]
    fn test_descriptor_accessors() {
        let action =
            Action::<Noop>::blocking("sync", 3, |_| Ok(ActionOutcome::failure("x"))).unwrap();
        assert_eq!(action.name(), "sync");
        assert_eq!(action.weight(), 3);
        assert!(action.is_blocking());

        let actions = Noop::actions().unwrap();
        assert!(!actions[0].is_blocking());
    }

    #[tokio::test]
    async fn test_default_hooks_are_noops() {
        assert!(Noop.setup().await.is_ok());
        assert!(Noop.teardown().await.is_ok());
    }
}
