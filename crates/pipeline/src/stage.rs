//! Stage fan-out: bounded-concurrency execution of a unit batch.
//!
//! Units are all spawned up front; a shared semaphore bounds how many
//! run at once. Cancellation short-circuits units still waiting for a
//! permit, so every spec always yields exactly one [`UnitOutcome`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use vitrine_core::retry::RetryPolicy;
use vitrine_provider::GenerationProvider;
use vitrine_store::AssetStore;

use crate::error::UnitError;
use crate::unit::{run_unit, UnitOutcome, UnitSpec};

/// Launches the units of one stage and streams their outcomes.
pub struct StageController {
    provider: Arc<dyn GenerationProvider>,
    assets: Arc<dyn AssetStore>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl StageController {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        assets: Arc<dyn AssetStore>,
        policy: RetryPolicy,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            assets,
            policy,
            attempt_timeout,
        }
    }

    /// Spawn all `units` with at most `concurrency` running at once.
    ///
    /// The receiver yields one outcome per spec, in resolution order.
    /// Outcomes are never lost: the channel is sized for the whole
    /// batch and senders never block.
    pub fn launch(
        &self,
        units: Vec<UnitSpec>,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<UnitOutcome> {
        let (tx, rx) = mpsc::channel(units.len().max(1));
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

        for spec in units {
            let provider = Arc::clone(&self.provider);
            let assets = Arc::clone(&self.assets);
            let policy = self.policy.clone();
            let attempt_timeout = self.attempt_timeout;
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let permit = tokio::select! {
                    _ = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let outcome = match permit {
                    Some(_permit) => {
                        run_unit(provider, assets, spec, policy, attempt_timeout, cancel).await
                    }
                    // Never got to run: resolve as a cancelled failure.
                    None => UnitOutcome {
                        slot: spec.slot,
                        name: spec.name,
                        kind: spec.kind,
                        attempts: 0,
                        result: Err(UnitError::Cancelled),
                    },
                };
                let _ = tx.send(outcome).await;
            });
        }

        rx
    }
}
