//! Shared fixtures for pipeline integration tests: a scripted
//! provider with per-prompt failure rules, and a harness wiring the
//! orchestrator to in-memory stores.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use vitrine_core::params::JobParams;
use vitrine_core::retry::RetryPolicy;
use vitrine_core::types::JobId;
use vitrine_events::EventBus;
use vitrine_pipeline::{JobOrchestrator, PipelineConfig};
use vitrine_provider::{GeneratedAsset, GenerationProvider, GenerationRequest, ProviderError};
use vitrine_store::{
    JobRecord, JobStore, MemoryAssetStore, MemoryJobStore, OwnerIndex, StaticOwnerIndex,
};

// ---------------------------------------------------------------------------
// Scripted provider
// ---------------------------------------------------------------------------

/// Fail requests whose prompt contains `needle`.
pub struct FailRule {
    pub needle: &'static str,
    /// `None` fails every matching call; `Some(n)` fails the first n.
    pub times: Option<u32>,
    pub error: ProviderError,
}

/// Deterministic in-process provider: succeeds by echoing the prompt
/// as the asset bytes, unless a rule matches.
pub struct ScriptedProvider {
    rules: Mutex<Vec<FailRule>>,
    calls: Mutex<Vec<GenerationRequest>>,
    delay: Duration,
}

impl ScriptedProvider {
    pub fn ok() -> Self {
        Self::with_rules(Vec::new())
    }

    pub fn with_rules(rules: Vec<FailRule>) -> Self {
        Self {
            rules: Mutex::new(rules),
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    /// A provider where every call hangs for `delay` before
    /// succeeding; used for cancellation and stall tests.
    pub fn slow(delay: Duration) -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            delay,
        }
    }

    /// Number of calls whose prompt contained `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.requests_matching(needle).len()
    }

    /// Recorded requests whose prompt contained `needle`.
    pub fn requests_matching(&self, needle: &str) -> Vec<GenerationRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.prompt.contains(needle))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GeneratedAsset, ProviderError> {
        self.calls.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut rules = self.rules.lock().unwrap();
        for rule in rules.iter_mut() {
            if request.prompt.contains(rule.needle) {
                match &mut rule.times {
                    Some(0) => {}
                    Some(n) => {
                        *n -= 1;
                        return Err(rule.error.clone());
                    }
                    None => return Err(rule.error.clone()),
                }
            }
        }
        Ok(GeneratedAsset {
            bytes: request.prompt.into_bytes(),
            content_type: request.unit_kind.content_type().to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub orchestrator: Arc<JobOrchestrator>,
    pub store: Arc<MemoryJobStore>,
    pub assets: Arc<MemoryAssetStore>,
    pub events: Arc<EventBus>,
    pub provider: Arc<ScriptedProvider>,
}

/// Config with tight timings so tests resolve in milliseconds.
pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        retry: RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(5),
            multiplier: 2.0,
            max_backoff: Duration::from_millis(20),
        },
        attempt_timeout: Duration::from_secs(5),
        progress_tick: Duration::from_millis(10),
        ..PipelineConfig::default()
    }
}

pub fn harness(provider: ScriptedProvider) -> Harness {
    harness_full(
        provider,
        fast_config(),
        Arc::new(StaticOwnerIndex::allow_all()),
    )
}

pub fn harness_with_config(provider: ScriptedProvider, config: PipelineConfig) -> Harness {
    harness_full(provider, config, Arc::new(StaticOwnerIndex::allow_all()))
}

pub fn harness_full(
    provider: ScriptedProvider,
    config: PipelineConfig,
    owners: Arc<dyn OwnerIndex>,
) -> Harness {
    let provider = Arc::new(provider);
    let store = Arc::new(MemoryJobStore::new());
    let assets = Arc::new(MemoryAssetStore::new());
    let events = Arc::new(EventBus::default());
    let orchestrator = Arc::new(JobOrchestrator::new(
        store.clone(),
        assets.clone(),
        provider.clone(),
        owners,
        events.clone(),
        config,
    ));
    Harness {
        orchestrator,
        store,
        assets,
        events,
        provider,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn params() -> JobParams {
    JobParams {
        name: "Orbit Notes".to_string(),
        description: "A note-taking app for stargazers.".to_string(),
        style: None,
        screens_total: None,
    }
}

/// Block until the job reaches a terminal status and return that
/// snapshot.
pub async fn wait_terminal(store: &MemoryJobStore, id: JobId) -> JobRecord {
    let mut rx = store.subscribe(id).await.expect("job exists");
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let snapshot = rx.borrow().clone();
            if snapshot.status.is_terminal() {
                return snapshot;
            }
            rx.changed().await.expect("store dropped");
        }
    })
    .await
    .expect("job did not reach a terminal status in time")
}
