//! Built-in demo load tests against a simulated shop backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use midge_core::{MidgeResult, SwarmConfig};
use midge_swarm::{Action, ActionError, ActionOutcome, ActionSet, Swarm, TestRegistry};
use rand::Rng;
use serde_json::json;
use tokio::time::sleep;
use tracing::debug;

/// A simulated shop session. Latencies and failure rates are randomized.
#[derive(Default)]
pub struct Shop {
    orders: AtomicU64,
}

impl Shop {
    async fn browse(self: Arc<Self>) -> Result<ActionOutcome, ActionError> {
        let latency = rand::thread_rng().gen_range(20..60);
        sleep(Duration::from_millis(latency)).await;
        Ok(ActionOutcome::success(json!({ "status": 200, "items": 24 })))
    }

    async fn purchase(self: Arc<Self>) -> Result<ActionOutcome, ActionError> {
        let (latency, roll) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(60..120), rng.gen::<f64>())
        };
        sleep(Duration::from_millis(latency)).await;

        if roll < 0.02 {
            return Err("payment gateway timed out".into());
        }
        if roll < 0.07 {
            return Ok(ActionOutcome::failure(json!({ "status": 409 })));
        }
        let order = self.orders.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(ActionOutcome::success(json!({ "status": 201, "order": order })))
    }

    fn render_receipt(&self) -> Result<ActionOutcome, ActionError> {
        // CPU-bound work stands in for a synchronous client
        std::thread::sleep(Duration::from_millis(5));
        Ok(ActionOutcome::success(json!({ "status": 200 })))
    }
}

#[async_trait]
impl ActionSet for Shop {
    fn actions() -> MidgeResult<Vec<Action<Self>>> {
        Ok(vec![
            Action::new("browse", 6, Shop::browse)?,
            Action::new("purchase", 2, Shop::purchase)?,
            Action::blocking("render_receipt", 1, Shop::render_receipt)?,
        ])
    }

    async fn teardown(&self) -> Result<(), ActionError> {
        debug!(orders = self.orders.load(Ordering::Relaxed), "shop session closed");
        Ok(())
    }
}

/// Registry with the demo tests, applying `config` to every swarm.
pub fn registry(config: &SwarmConfig) -> TestRegistry {
    let mut registry = TestRegistry::new();

    let steady = config.clone();
    registry.register("checkout", move || {
        Swarm::builder("Checkout", Shop::default)
            .with_config(&steady)
            .population(4)
            .rate(40)
            .warmup(2)
            .duration(10)
            .build()
    });

    let burst = config.clone();
    registry.register("burst", move || {
        Swarm::builder("Burst", Shop::default)
            .with_config(&burst)
            .population(8)
            .total_requests(500)
            .build()
    });

    registry
}
