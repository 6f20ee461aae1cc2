//! A single worker ("midge") driving one task in a loop.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use midge_core::{ActionLog, MidgeError, MidgeResult, WorkerId};
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::action::ActionSet;
use crate::task::Task;

/// Completion callback receiving every log a midge produces, exactly once.
pub type ActionCallback = Arc<dyn Fn(ActionLog) + Send + Sync>;

/// Represents a single worker executing a given task.
///
/// Without a rate, attempts run back to back. With a rate of `N`, every cycle
/// launches `N` attempts spread over one second by random jitter.
pub struct Midge<S> {
    id: WorkerId,
    task: Task<S>,
    rate: Option<u32>,
    cycle: Duration,
    active: watch::Sender<bool>,
    chance: Mutex<f64>,
}

impl<S: ActionSet> Midge<S> {
    pub fn new(id: impl Into<WorkerId>, task: Task<S>, rate: Option<u32>, cycle: Duration) -> Self {
        let (active, _) = watch::channel(true);
        Self {
            id: id.into(),
            task,
            rate,
            cycle,
            active,
            chance: Mutex::new(1.0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rate(&self) -> Option<u32> {
        self.rate
    }

    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    /// Probability that an attempt actually executes.
    pub fn chance(&self) -> f64 {
        *self.chance.lock()
    }

    pub fn set_chance(&self, chance: f64) {
        *self.chance.lock() = chance.clamp(0.0, 1.0);
    }

    /// Ends the loop at its next iteration. In-flight actions are not cancelled;
    /// pending jitter and pacing sleeps end early.
    pub fn stop(&self) {
        self.active.send_replace(false);
    }

    /// Re-activates a stopped midge without re-running setup.
    pub fn reset(&self) {
        self.active.send_replace(true);
    }

    pub async fn setup(&self) -> MidgeResult<()> {
        self.task
            .instance()
            .setup()
            .await
            .map_err(|err| MidgeError::Hook {
                midge: self.id.clone(),
                phase: "setup",
                message: err.to_string(),
            })
    }

    pub async fn teardown(&self) -> MidgeResult<()> {
        self.task
            .instance()
            .teardown()
            .await
            .map_err(|err| MidgeError::Hook {
                midge: self.id.clone(),
                phase: "teardown",
                message: err.to_string(),
            })
    }

    /// Runs until stopped, handing every completed attempt to `on_action_finished`.
    pub async fn run(&self, on_action_finished: ActionCallback) -> WorkerId {
        info!(midge = %self.id, rate = ?self.rate, "midge is now running");

        let mut iteration: u64 = 0;
        while self.is_active() {
            match self.rate {
                Some(rate) => {
                    // launch the whole tick at once; jitter spreads it over the second
                    let tick = Instant::now();
                    let attacks =
                        (0..rate).map(|_| self.attack(random_delay(), &on_action_finished));
                    let executed = join_all(attacks).await.into_iter().filter(|ran| *ran).count();

                    let remaining = self.cycle.saturating_sub(tick.elapsed());
                    debug!(
                        midge = %self.id,
                        executed,
                        remaining_ms = remaining.as_millis() as u64,
                        "tick finished"
                    );
                    self.pause(remaining).await;
                }
                None => {
                    let delay = if iteration == 0 {
                        random_delay()
                    } else {
                        Duration::ZERO
                    };
                    if !self.attack(delay, &on_action_finished).await {
                        self.pause(self.cycle).await;
                    }
                }
            }
            iteration += 1;
        }

        debug!(midge = %self.id, iterations = iteration, "midge loop exited");
        self.id.clone()
    }

    /// One attempt: wait out `delay`, roll against `chance`, run the task.
    /// Returns whether the task actually ran.
    async fn attack(&self, delay: Duration, on_action_finished: &ActionCallback) -> bool {
        // a zero delay still goes through the timer so the loop yields
        tokio::select! {
            biased;
            _ = self.stopped() => return false,
            _ = sleep(delay) => {}
        }

        if !self.roll() {
            return false;
        }

        let log = self.task.run(&self.id).await;
        (on_action_finished)(log);
        true
    }

    fn roll(&self) -> bool {
        let chance = self.chance();
        rand::thread_rng().gen::<f64>() < chance
    }

    /// Sleeps for `duration` unless stopped first.
    async fn pause(&self, duration: Duration) {
        tokio::select! {
            _ = self.stopped() => {}
            _ = sleep(duration) => {}
        }
    }

    async fn stopped(&self) {
        let mut active = self.active.subscribe();
        let _ = active.wait_for(|is_active| !*is_active).await;
    }
}

/// Uniform delay in `[0, 1)` seconds.
fn random_delay() -> Duration {
    Duration::from_secs_f64(rand::thread_rng().gen::<f64>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionOutcome};
    use crate::task::ActionTable;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    struct Quick;

    #[async_trait]
    impl ActionSet for Quick {
        fn actions() -> MidgeResult<Vec<Action<Self>>> {
            Ok(vec![Action::new("quick", 1, |_: Arc<Quick>| async {
                sleep(Duration::from_millis(20)).await;
                Ok(ActionOutcome::success("OK"))
            })?])
        }
    }

    fn midge(rate: Option<u32>) -> Arc<Midge<Quick>> {
        let table = Arc::new(ActionTable::new(Quick::actions().unwrap()).unwrap());
        let task = Task::new(Quick, table, Arc::new(Semaphore::new(1)));
        Arc::new(Midge::new("M1@S1", task, rate, Duration::from_millis(100)))
    }

    fn counting_callback() -> (ActionCallback, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let callback: ActionCallback = Arc::new(move |log: ActionLog| {
            assert_eq!(log.worker_id, "M1@S1");
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (callback, count)
    }

    #[test]
    fn test_random_delay_is_below_one_second() {
        for _ in 0..1000 {
            assert!(random_delay() < Duration::from_secs(1));
        }
    }

    #[test]
    fn test_state_transitions() {
        let midge = midge(None);
        assert!(midge.is_active());
        assert_eq!(midge.chance(), 1.0);

        midge.stop();
        assert!(!midge.is_active());
        midge.reset();
        assert!(midge.is_active());

        midge.set_chance(1.5);
        assert_eq!(midge.chance(), 1.0);
        midge.set_chance(-0.5);
        assert_eq!(midge.chance(), 0.0);
    }

    #[tokio::test]
    async fn test_zero_chance_produces_no_logs() {
        let midge = midge(None);
        midge.set_chance(0.0);
        let (callback, count) = counting_callback();

        let runner = Arc::clone(&midge);
        let handle = tokio::spawn(async move { runner.run(callback).await });
        sleep(Duration::from_millis(1500)).await;
        midge.stop();

        assert_eq!(handle.await.unwrap(), "M1@S1");
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unthrottled_runs_back_to_back() {
        let midge = midge(None);
        let (callback, count) = counting_callback();

        let runner = Arc::clone(&midge);
        let handle = tokio::spawn(async move { runner.run(callback).await });
        // up to 1s of startup jitter, then 20ms per attempt
        sleep(Duration::from_millis(1500)).await;
        midge.stop();
        handle.await.unwrap();

        let produced = count.load(Ordering::SeqCst);
        assert!(produced >= 10, "only {produced} attempts");
        assert!(produced <= 80, "{produced} attempts");
    }

    #[tokio::test]
    async fn test_rate_limited_tick_launches_rate_attempts() {
        let midge = midge(Some(5));
        let (callback, count) = counting_callback();

        let runner = Arc::clone(&midge);
        let handle = tokio::spawn(async move { runner.run(callback).await });
        // the first tick finishes within ~1s (jitter < 1s plus 20ms action)
        sleep(Duration::from_millis(1100)).await;
        midge.stop();
        handle.await.unwrap();

        let produced = count.load(Ordering::SeqCst);
        assert!(produced >= 5, "only {produced} attempts");
        assert!(produced <= 10, "{produced} attempts");
    }
}
