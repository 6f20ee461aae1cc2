//! Weighted action selection and timed execution of a single attempt.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use midge_core::{now_ms, ActionLog, MidgeError, MidgeResult};
use rand::Rng;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::action::{Action, ActionError, ActionResult, ActionSet, Handler};
use crate::metrics;

/// Actions of one action set with their cumulative selection probabilities.
///
/// Built once per swarm and shared by every task.
pub struct ActionTable<S> {
    actions: Vec<Action<S>>,
    cumulative: Vec<f64>,
}

impl<S> ActionTable<S> {
    /// # Errors
    ///
    /// Returns `MidgeError::InvalidConfig` when the list is empty or names repeat.
    pub fn new(actions: Vec<Action<S>>) -> MidgeResult<Self> {
        if actions.is_empty() {
            return Err(MidgeError::invalid_config(
                "actions",
                "an action set must define at least one action",
            ));
        }

        let mut seen = HashSet::new();
        for action in &actions {
            if !seen.insert(action.name()) {
                return Err(MidgeError::invalid_config(
                    "actions",
                    format!("action `{}` is defined more than once", action.name()),
                ));
            }
        }

        let weight_sum: u64 = actions.iter().map(|a| u64::from(a.weight())).sum();
        let mut running = 0u64;
        let mut cumulative: Vec<f64> = actions
            .iter()
            .map(|action| {
                running += u64::from(action.weight());
                running as f64 / weight_sum as f64
            })
            .collect();
        // the last bucket must reach 1.0 exactly, whatever the float error
        if let Some(last) = cumulative.last_mut() {
            *last = 1.0;
        }

        Ok(Self {
            actions,
            cumulative,
        })
    }

    /// First action whose cumulative probability is `>= r`, for `r` in `[0, 1]`.
    pub fn choose(&self, r: f64) -> &Action<S> {
        let index = self
            .cumulative
            .iter()
            .position(|p| *p >= r)
            .unwrap_or(self.actions.len() - 1);
        &self.actions[index]
    }

    pub fn cumulative(&self) -> &[f64] {
        &self.cumulative
    }

    pub fn actions(&self) -> &[Action<S>] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// One action-set instance bound to the shared action table.
pub struct Task<S> {
    instance: Arc<S>,
    table: Arc<ActionTable<S>>,
    blocking_permits: Arc<Semaphore>,
}

impl<S: ActionSet> Task<S> {
    pub fn new(instance: S, table: Arc<ActionTable<S>>, blocking_permits: Arc<Semaphore>) -> Self {
        Self {
            instance: Arc::new(instance),
            table,
            blocking_permits,
        }
    }

    pub fn instance(&self) -> &Arc<S> {
        &self.instance
    }

    /// Draws a uniform value in `[0, 1)` and picks the matching action.
    pub fn choose_action(&self) -> &Action<S> {
        let r: f64 = rand::thread_rng().gen();
        self.table.choose(r)
    }

    /// Selects, executes and times one action.
    ///
    /// Errors and panics raised by the action are recorded as a failed log
    /// with a `null` response; they never reach the caller.
    pub async fn run(&self, worker_id: &str) -> ActionLog {
        let action = self.choose_action();

        // waiting for a helper thread is not part of the response time
        let permit = match action.handler {
            Handler::Blocking(_) => Some(self.blocking_permits.acquire().await),
            Handler::Async(_) => None,
        };

        let start = now_ms();
        let result = match permit.transpose() {
            Ok(_permit) => self.invoke(action).await,
            Err(closed) => Err(closed.into()),
        };
        let end = now_ms().max(start);

        let (response, success) = match result {
            Ok(outcome) => (outcome.response, outcome.success),
            Err(err) => {
                debug!(midge = %worker_id, action = %action.name(), error = %err, "action failed");
                (Value::Null, false)
            }
        };
        metrics::record_action(action.name(), success, end - start);

        ActionLog {
            worker_id: worker_id.to_string(),
            action_name: action.name().to_string(),
            start,
            end,
            success,
            response,
        }
    }

    async fn invoke(&self, action: &Action<S>) -> ActionResult {
        match &action.handler {
            Handler::Async(handler) => {
                let handler = Arc::clone(handler);
                let instance = Arc::clone(&self.instance);
                // the handler may panic before it hands back a future
                let call = async move { (handler)(instance).await };
                match AssertUnwindSafe(call).catch_unwind().await {
                    Ok(result) => result,
                    Err(panic) => Err(panic_error(action.name(), panic)),
                }
            }
            Handler::Blocking(handler) => {
                let handler = Arc::clone(handler);
                let instance = Arc::clone(&self.instance);
                match tokio::task::spawn_blocking(move || (handler)(&instance)).await {
                    Ok(result) => result,
                    Err(join_err) if join_err.is_panic() => {
                        Err(panic_error(action.name(), join_err.into_panic()))
                    }
                    Err(join_err) => Err(join_err.into()),
                }
            }
        }
    }
}

fn panic_error(action: &str, panic: Box<dyn Any + Send>) -> ActionError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("action `{action}` panicked: {message}").into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionOutcome;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Weighted;

    #[async_trait]
    impl ActionSet for Weighted {
        fn actions() -> MidgeResult<Vec<Action<Self>>> {
            Ok(vec![
                Action::new("one", 1, |_: Arc<Weighted>| async {
                    Ok(ActionOutcome::success(1))
                })?,
                Action::new("two", 2, |_: Arc<Weighted>| async {
                    Ok(ActionOutcome::success(2))
                })?,
                Action::new("three", 3, |_: Arc<Weighted>| async {
                    Ok(ActionOutcome::success(3))
                })?,
            ])
        }
    }

    struct Faulty {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ActionSet for Faulty {
        fn actions() -> MidgeResult<Vec<Action<Self>>> {
            Ok(vec![Action::new("faulty", 1, |set: Arc<Faulty>| async move {
                match set.calls.fetch_add(1, Ordering::SeqCst) {
                    0 => Err("connection refused".into()),
                    1 => panic!("handler exploded"),
                    _ => Ok(ActionOutcome::failure("HTTP 500")),
                }
            })?])
        }
    }

    struct Eager {
        ready: bool,
    }

    #[async_trait]
    impl ActionSet for Eager {
        fn actions() -> MidgeResult<Vec<Action<Self>>> {
            Ok(vec![Action::new("eager", 1, |set: Arc<Eager>| {
                assert!(set.ready, "session not ready");
                async { Ok(ActionOutcome::success("ready")) }
            })?])
        }
    }

    struct Blocking;

    #[async_trait]
    impl ActionSet for Blocking {
        fn actions() -> MidgeResult<Vec<Action<Self>>> {
            Ok(vec![Action::blocking("sleep", 1, |_: &Blocking| {
                std::thread::sleep(std::time::Duration::from_millis(50));
                Ok(ActionOutcome::success("slept"))
            })?])
        }
    }

    fn task<S: ActionSet>(instance: S) -> Task<S> {
        let table = Arc::new(ActionTable::new(S::actions().unwrap()).unwrap());
        Task::new(instance, table, Arc::new(Semaphore::new(1)))
    }

    #[test]
    fn test_cumulative_table_covers_unit_interval() {
        let table = ActionTable::new(Weighted::actions().unwrap()).unwrap();
        let cumulative = table.cumulative();

        assert_eq!(cumulative.len(), 3);
        assert!((cumulative[0] - 1.0 / 6.0).abs() < 1e-12);
        assert!((cumulative[1] - 0.5).abs() < 1e-12);
        assert_eq!(cumulative[2], 1.0);
    }

    #[test]
    fn test_choose_boundaries() {
        let table = ActionTable::new(Weighted::actions().unwrap()).unwrap();

        assert_eq!(table.choose(0.0).name(), "one");
        assert_eq!(table.choose(1.0 / 6.0).name(), "one");
        assert_eq!(table.choose(0.2).name(), "two");
        assert_eq!(table.choose(0.5).name(), "two");
        assert_eq!(table.choose(0.51).name(), "three");
        assert_eq!(table.choose(1.0).name(), "three");
    }

    #[test]
    fn test_weighted_selection_frequencies() {
        let task = task(Weighted);
        let mut counts = [0usize; 3];

        for _ in 0..6000 {
            match task.choose_action().name() {
                "one" => counts[0] += 1,
                "two" => counts[1] += 1,
                _ => counts[2] += 1,
            }
        }

        // 1000 / 2000 / 3000 expected, allow a few percent of drift
        assert!(counts[0] > 850 && counts[0] < 1150, "one: {}", counts[0]);
        assert!(counts[1] > 1800 && counts[1] < 2200, "two: {}", counts[1]);
        assert!(counts[2] > 2750 && counts[2] < 3250, "three: {}", counts[2]);
    }

    #[test]
    fn test_empty_and_duplicate_tables_are_rejected() {
        assert!(ActionTable::<Weighted>::new(Vec::new()).is_err());

        let mut actions = Weighted::actions().unwrap();
        actions.push(actions[0].clone());
        let err = ActionTable::new(actions).err().unwrap();
        assert!(err.to_string().contains("more than once"));
    }

    #[tokio::test]
    async fn test_run_records_timing_and_response() {
        let log = task(Weighted).run("M1@S1").await;

        assert_eq!(log.worker_id, "M1@S1");
        assert!(log.success);
        assert!(log.end >= log.start);
        let expected = match log.action_name.as_str() {
            "one" => 1,
            "two" => 2,
            _ => 3,
        };
        assert_eq!(log.response, serde_json::json!(expected));
    }

    #[tokio::test]
    async fn test_errors_and_panics_become_failed_logs() {
        let task = task(Faulty {
            calls: AtomicUsize::new(0),
        });

        let errored = task.run("M1@S1").await;
        assert!(!errored.success);
        assert_eq!(errored.response, Value::Null);

        let panicked = task.run("M1@S1").await;
        assert!(!panicked.success);
        assert_eq!(panicked.response, Value::Null);

        let unsuccessful = task.run("M1@S1").await;
        assert!(!unsuccessful.success);
        assert_eq!(unsuccessful.response, serde_json::json!("HTTP 500"));
    }

    #[tokio::test]
    async fn test_blocking_action_runs_off_scheduler() {
        let log = task(Blocking).run("M1@S1").await;

        assert!(log.success);
        assert_eq!(log.action_name, "sleep");
        assert!(log.end - log.start >= 49.0);
    }

    #[tokio::test]
    async fn test_handler_panicking_before_its_future_becomes_failed_log() {
        let log = task(Eager { ready: false }).run("M1@S1").await;
        assert!(!log.success);
        assert_eq!(log.response, Value::Null);

        let log = task(Eager { ready: true }).run("M1@S1").await;
        assert!(log.success);
    }

    #[tokio::test]
    async fn test_waiting_for_helper_thread_is_not_timed() {
        // four attempts share one helper permit and run one after another
        let task = task(Blocking);
        let started = std::time::Instant::now();
        let logs = futures::future::join_all((0..4).map(|_| task.run("M1@S1"))).await;

        assert!(started.elapsed() >= std::time::Duration::from_millis(195));
        for log in &logs {
            let response_time = log.end - log.start;
            assert!(response_time >= 49.0, "{response_time}");
            assert!(response_time < 120.0, "queueing was timed: {response_time}");
        }
    }
}
