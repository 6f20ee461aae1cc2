//! Swarm orchestration: a population of midges, rate shares, warm-up and stop conditions.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, try_join_all};
use midge_core::{ActionLog, MidgeError, MidgeResult, SwarmConfig};
use parking_lot::RwLock;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::action::ActionSet;
use crate::metrics::DISCARDED_LOGS;
use crate::midge::{ActionCallback, Midge};
use crate::task::{ActionTable, Task};

/// Why a swarm stopped its midges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The configured duration elapsed.
    Duration,
    /// The accepted log count reached the request cap.
    RequestCap,
    /// The warm-up ramp finished.
    WarmupFinished,
    /// `stop` was called by the owner of the swarm.
    Manual,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            StopReason::Duration => "duration elapsed",
            StopReason::RequestCap => "request cap reached",
            StopReason::WarmupFinished => "warm-up finished",
            StopReason::Manual => "stopped manually",
        };
        f.write_str(reason)
    }
}

/// Splits a total rate across `population` workers.
///
/// Every worker gets `total / population`; the first `total % population`
/// workers get one more, so shares sum to `total` and differ by at most one.
pub fn distribute_rate(total: u32, population: usize) -> Vec<u32> {
    if population == 0 {
        return Vec::new();
    }
    let (base, extra) = match u32::try_from(population) {
        Ok(population) => (total / population, (total % population) as usize),
        // more workers than attempts: the first `total` get one each
        Err(_) => (0, total as usize),
    };
    (0..population)
        .map(|index| if index < extra { base + 1 } else { base })
        .collect()
}

type Factory<S> = Arc<dyn Fn() -> S + Send + Sync>;

/// Builder for [`Swarm`]. Every value is validated in [`SwarmBuilder::build`].
pub struct SwarmBuilder<S> {
    id: String,
    factory: Factory<S>,
    population: usize,
    rate: Option<u32>,
    total_requests: Option<u64>,
    duration: Option<u64>,
    warmup: Option<u64>,
    warmup_steps: u32,
    cycle: Duration,
    keep_warmup_logs: bool,
}

impl<S: ActionSet> SwarmBuilder<S> {
    /// Number of midges, each owning a fresh action-set instance.
    pub fn population(mut self, population: usize) -> Self {
        self.population = population;
        self
    }

    /// Total target rate in attempts per second, shared by all midges.
    pub fn rate(mut self, rate: u32) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Stop once this many logs have been accepted.
    pub fn total_requests(mut self, total_requests: u64) -> Self {
        self.total_requests = Some(total_requests);
        self
    }

    /// Stop after this many seconds of measured run.
    pub fn duration(mut self, seconds: u64) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// Ramp execution probability from 0 to 1 over this many seconds before measuring.
    pub fn warmup(mut self, seconds: u64) -> Self {
        self.warmup = Some(seconds);
        self
    }

    pub fn warmup_steps(mut self, steps: u32) -> Self {
        self.warmup_steps = steps;
        self
    }

    /// Nominal length of one rate-limited tick.
    pub fn cycle(mut self, cycle: Duration) -> Self {
        self.cycle = cycle;
        self
    }

    pub fn keep_warmup_logs(mut self, keep: bool) -> Self {
        self.keep_warmup_logs = keep;
        self
    }

    /// Applies warm-up steps, cycle length and warm-up log policy from configuration.
    pub fn with_config(self, config: &SwarmConfig) -> Self {
        self.warmup_steps(config.warmup_steps)
            .cycle(config.cycle())
            .keep_warmup_logs(config.keep_warmup_logs)
    }

    /// Validates the configuration and the action set.
    ///
    /// # Errors
    ///
    /// Returns `MidgeError::InvalidConfig` naming the first offending value.
    pub fn build(self) -> MidgeResult<Swarm<S>> {
        if self.id.trim().is_empty() {
            return Err(MidgeError::invalid_config("id", "swarm id must not be empty"));
        }
        if self.population < 1 || u32::try_from(self.population).is_err() {
            return Err(MidgeError::invalid_config(
                "population",
                format!("must be within 1..={}, got {}", u32::MAX, self.population),
            ));
        }
        if let Some(rate) = self.rate {
            if rate < 1 {
                return Err(MidgeError::invalid_config("rate", "must be >= 1, got 0"));
            }
        }
        if let Some(total) = self.total_requests {
            if total < 1 {
                return Err(MidgeError::invalid_config("total_requests", "must be >= 1, got 0"));
            }
        }
        if let Some(duration) = self.duration {
            if duration < 1 {
                return Err(MidgeError::invalid_config("duration", "must be >= 1, got 0"));
            }
        }
        if let Some(warmup) = self.warmup {
            if warmup < 1 {
                return Err(MidgeError::invalid_config("warmup", "must be >= 1, got 0"));
            }
        }
        if self.warmup_steps < 1 {
            return Err(MidgeError::invalid_config("warmup_steps", "must be >= 1, got 0"));
        }
        if self.cycle.is_zero() || self.cycle > Duration::from_secs(1) {
            return Err(MidgeError::invalid_config(
                "cycle",
                format!("must be within 1..=1000ms, got {:?}", self.cycle),
            ));
        }

        let table = ActionTable::new(S::actions()?)?;

        Ok(Swarm {
            id: self.id,
            factory: self.factory,
            table: Arc::new(table),
            population: self.population,
            rate: self.rate,
            total_requests: self.total_requests,
            duration: self.duration.map(Duration::from_secs),
            warmup: self.warmup.map(Duration::from_secs),
            warmup_steps: self.warmup_steps,
            cycle: self.cycle,
            keep_warmup_logs: self.keep_warmup_logs,
            midges: RwLock::new(Vec::new()),
            active: AtomicBool::new(false),
            halted: AtomicBool::new(false),
        })
    }
}

/// Owns a population of midges and enforces the global stop conditions.
///
/// Lifecycle: [`setup`](Swarm::setup), [`run`](Swarm::run) (repeatable),
/// [`teardown`](Swarm::teardown).
pub struct Swarm<S> {
    id: String,
    factory: Factory<S>,
    table: Arc<ActionTable<S>>,
    population: usize,
    rate: Option<u32>,
    total_requests: Option<u64>,
    duration: Option<Duration>,
    warmup: Option<Duration>,
    warmup_steps: u32,
    cycle: Duration,
    keep_warmup_logs: bool,
    midges: RwLock<Vec<Arc<Midge<S>>>>,
    active: AtomicBool,
    halted: AtomicBool,
}

impl<S: ActionSet> Swarm<S> {
    /// Starts a builder with population 1, no rate, no stop conditions and default timing.
    pub fn builder<F>(id: impl Into<String>, factory: F) -> SwarmBuilder<S>
    where
        F: Fn() -> S + Send + Sync + 'static,
    {
        let defaults = SwarmConfig::default();
        SwarmBuilder {
            id: id.into(),
            factory: Arc::new(factory),
            population: 1,
            rate: None,
            total_requests: None,
            duration: None,
            warmup: None,
            warmup_steps: defaults.warmup_steps,
            cycle: defaults.cycle(),
            keep_warmup_logs: defaults.keep_warmup_logs,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn population(&self) -> usize {
        self.population
    }

    pub fn rate(&self) -> Option<u32> {
        self.rate
    }

    pub fn total_requests(&self) -> Option<u64> {
        self.total_requests
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn warmup(&self) -> Option<Duration> {
        self.warmup
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Current execution chance of every midge, in midge order.
    pub fn chances(&self) -> Vec<f64> {
        self.midges.read().iter().map(|midge| midge.chance()).collect()
    }

    /// Per-midge rate shares, in midge order.
    pub fn rate_shares(&self) -> Vec<Option<u32>> {
        match self.rate {
            Some(total) => distribute_rate(total, self.population)
                .into_iter()
                .map(Some)
                .collect(),
            None => vec![None; self.population],
        }
    }

    /// Creates every midge and runs their setup hooks concurrently.
    ///
    /// # Errors
    ///
    /// `InvalidState` if already set up; `Hook` with the first failing midge otherwise.
    pub async fn setup(&self) -> MidgeResult<()> {
        if !self.midges.read().is_empty() {
            return Err(MidgeError::invalid_state(format!(
                "swarm {} is already set up",
                self.id
            )));
        }

        let blocking_permits = Arc::new(Semaphore::new(self.population));
        let midges: Vec<Arc<Midge<S>>> = self
            .rate_shares()
            .into_iter()
            .enumerate()
            .map(|(index, rate)| {
                let task = Task::new(
                    (self.factory)(),
                    Arc::clone(&self.table),
                    Arc::clone(&blocking_permits),
                );
                Arc::new(Midge::new(
                    format!("M{}@{}", index + 1, self.id),
                    task,
                    rate,
                    self.cycle,
                ))
            })
            .collect();

        try_join_all(midges.iter().map(|midge| midge.setup())).await?;

        info!(
            swarm = %self.id,
            population = self.population,
            rate = ?self.rate,
            "swarm set up"
        );
        *self.midges.write() = midges;
        Ok(())
    }

    /// Runs the optional warm-up, then the measured phase until a stop condition fires.
    ///
    /// Returns the logs accepted during the measured phase, unordered.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the swarm is not set up.
    pub async fn run(&self) -> MidgeResult<Vec<ActionLog>> {
        let midges = self.midges.read().clone();
        if midges.is_empty() {
            return Err(MidgeError::invalid_state(format!(
                "swarm {} must be set up before running",
                self.id
            )));
        }
        self.halted.store(false, Ordering::SeqCst);

        let warmup_logs = match self.warmup {
            Some(warmup) => self.warm_up(&midges, warmup).await,
            None => Vec::new(),
        };
        if self.halted.load(Ordering::SeqCst) {
            info!(swarm = %self.id, "swarm halted during warm-up");
            return Ok(if self.keep_warmup_logs {
                warmup_logs
            } else {
                Vec::new()
            });
        }

        info!(
            swarm = %self.id,
            duration = ?self.duration,
            total_requests = ?self.total_requests,
            "swarm is now running"
        );
        let duration = self.duration;
        let stopper = async move {
            match duration {
                Some(duration) => {
                    sleep(duration).await;
                    StopReason::Duration
                }
                None => std::future::pending().await,
            }
        };
        let measured = self.drive(&midges, self.total_requests, stopper).await;

        info!(swarm = %self.id, logs = measured.len(), "swarm run finished");
        if self.keep_warmup_logs {
            let mut logs = warmup_logs;
            logs.extend(measured);
            Ok(logs)
        } else {
            Ok(measured)
        }
    }

    /// Stops every midge. Logs that arrive afterwards are discarded.
    pub fn stop(&self, reason: StopReason) {
        if reason == StopReason::Manual {
            self.halted.store(true, Ordering::SeqCst);
        }
        // only the first stop of a phase is logged
        let was_active = self.active.swap(false, Ordering::SeqCst);
        for midge in self.midges.read().iter() {
            midge.stop();
        }
        if was_active {
            info!(swarm = %self.id, reason = %reason, "swarm stopped");
        }
    }

    /// Runs every midge's teardown hook concurrently and releases the midges.
    ///
    /// # Errors
    ///
    /// The first hook failure; every failure is logged.
    pub async fn teardown(&self) -> MidgeResult<()> {
        let midges = std::mem::take(&mut *self.midges.write());
        let results = join_all(midges.iter().map(|midge| midge.teardown())).await;

        let mut first_error = None;
        for result in results {
            if let Err(err) = result {
                warn!(swarm = %self.id, error = %err, "teardown hook failed");
                first_error.get_or_insert(err);
            }
        }

        info!(swarm = %self.id, "swarm torn down");
        first_error.map_or(Ok(()), Err)
    }

    /// Ramps every midge's chance from 0 toward 1 in equal steps, then resets them.
    async fn warm_up(&self, midges: &[Arc<Midge<S>>], warmup: Duration) -> Vec<ActionLog> {
        info!(swarm = %self.id, warmup = ?warmup, steps = self.warmup_steps, "warming up");

        for midge in midges {
            midge.set_chance(0.0);
        }

        let steps = self.warmup_steps;
        let step = warmup / steps;
        let ramp = async move {
            for index in 0..steps {
                let chance = f64::from(index) / f64::from(steps);
                for midge in midges {
                    midge.set_chance(chance);
                }
                debug!(chance, "warm-up step");
                sleep(step).await;
            }
            StopReason::WarmupFinished
        };
        let logs = self.drive(midges, None, ramp).await;

        for midge in midges {
            midge.set_chance(1.0);
            midge.reset();
        }
        debug!(swarm = %self.id, logs = logs.len(), "warm-up finished");
        logs
    }

    /// Spawns every midge and collects their logs until all have exited.
    ///
    /// All logs funnel through one channel; counting, capping and the active
    /// check happen only on this receiving side.
    async fn drive(
        &self,
        midges: &[Arc<Midge<S>>],
        request_cap: Option<u64>,
        stopper: impl Future<Output = StopReason>,
    ) -> Vec<ActionLog> {
        let (tx, mut rx) = mpsc::unbounded_channel::<ActionLog>();

        self.active.store(true, Ordering::SeqCst);
        let mut workers = JoinSet::new();
        for midge in midges {
            midge.reset();
            let tx = tx.clone();
            let on_action_finished: ActionCallback = Arc::new(move |log: ActionLog| {
                // the receiver outlives every midge
                let _ = tx.send(log);
            });
            let midge = Arc::clone(midge);
            workers.spawn(async move { midge.run(on_action_finished).await });
        }
        drop(tx);
        if self.halted.load(Ordering::SeqCst) {
            self.stop(StopReason::Manual);
        }

        tokio::pin!(stopper);
        let mut stopper_fired = false;
        let mut accepted: u64 = 0;
        let mut logs = Vec::new();

        loop {
            tokio::select! {
                reason = &mut stopper, if !stopper_fired => {
                    stopper_fired = true;
                    self.stop(reason);
                }
                received = rx.recv() => {
                    let Some(log) = received else { break };
                    if !self.is_active() {
                        DISCARDED_LOGS.inc();
                        debug!(swarm = %self.id, midge = %log.worker_id, "discarding late log");
                    } else {
                        accepted += 1;
                        logs.push(log);
                        if request_cap.is_some_and(|cap| accepted >= cap) {
                            self.stop(StopReason::RequestCap);
                        }
                    }
                }
            }
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(midge) => debug!(swarm = %self.id, midge = %midge, "midge stopped"),
                Err(err) => warn!(swarm = %self.id, error = %err, "midge task failed"),
            }
        }

        logs
    }
}
