//! Composition root.
//!
//! Owns every component (C1..C10) and spawns the cadence tasks: the
//! step-advancing tick loop, the periodic persistence loop, the dream
//! loop, and the external-interface ingestion point. All tasks share one
//! `CancellationToken` (C1), so `Runtime::shutdown` stops every task
//! together rather than needing per-task plumbing.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::cognitive_loop::CognitiveLoop;
use crate::core::clock::{Clock, TickSource};
use crate::core::types::{LifecycleMode, PersistentSnapshot, RecentThought};
use crate::dreaming::DreamConsolidator;
use crate::engines::provider::{FallbackChain, LlmProvider};
use crate::interface::ExternalInterface;
use crate::lifecycle::LifecycleManager;
use crate::memory::Memory;
use crate::persistence::{save_with_retry, PersistentStore};
use crate::queue::EventQueue;

/// A point-in-time view of the running system, returned by
/// [`Runtime::status`] — the control surface a host process polls or
/// exposes without reaching into any component directly.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RuntimeStatus {
    pub lifecycle_mode: LifecycleMode,
    pub cycle_count: u64,
    pub queue_len: usize,
    pub memory_node_count: usize,
    pub interface_degraded: bool,
}

pub struct Runtime {
    config: Config,
    memory: Arc<Memory>,
    queue: Arc<EventQueue>,
    lifecycle: Arc<LifecycleManager>,
    cognitive_loop: Arc<CognitiveLoop>,
    consolidator: Arc<DreamConsolidator>,
    store: Arc<PersistentStore>,
    interface: Arc<ExternalInterface>,
    cancellation: CancellationToken,
    identity_name: String,
}

impl Runtime {
    /// Builds every component and loads the last persisted snapshot, if
    /// any. `providers` is the ordered fallback chain (§9); pass an
    /// empty vec to run solely on the deterministic template fallback.
    pub async fn new(
        config: Config,
        storage_dir: PathBuf,
        identity_name: impl Into<String>,
        providers: Vec<Arc<dyn LlmProvider>>,
    ) -> anyhow::Result<Self> {
        let identity_name = identity_name.into();
        let memory = Arc::new(Memory::new());
        let queue = Arc::new(EventQueue::new(config.queue_capacity));
        let lifecycle = Arc::new(LifecycleManager::new(&config));
        let provider = if providers.is_empty() {
            Arc::new(FallbackChain::fallback_only(config.provider_timeout))
        } else {
            Arc::new(FallbackChain::new(providers, config.provider_timeout))
        };
        let cognitive_loop = Arc::new(CognitiveLoop::new(
            memory.clone(),
            queue.clone(),
            lifecycle.clone(),
            provider,
        ));
        let consolidator = Arc::new(DreamConsolidator::new(memory.clone(), config.retention_halflife));
        let store = Arc::new(PersistentStore::new(storage_dir));
        let interface = Arc::new(ExternalInterface::new(queue.clone()));

        let (snapshot, load_err) = store.load_or_empty(&identity_name).await;
        if let Some(e) = load_err {
            warn!(error = %e, "starting from an empty snapshot");
        }
        info!(
            cycles = snapshot.cycle_count,
            thoughts = snapshot.total_thoughts,
            "loaded persisted snapshot"
        );
        cognitive_loop
            .restore(snapshot.cycle_count, snapshot.total_thoughts, snapshot.total_insights)
            .await;
        lifecycle
            .restore(snapshot.lifecycle_mode, snapshot.fatigue, snapshot.last_dream_at, chrono::Utc::now())
            .await;

        Ok(Self {
            config,
            memory,
            queue,
            lifecycle,
            cognitive_loop,
            consolidator,
            store,
            interface,
            cancellation: CancellationToken::new(),
            identity_name,
        })
    }

    #[must_use]
    pub fn interface(&self) -> Arc<ExternalInterface> {
        self.interface.clone()
    }

    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub async fn status(&self) -> RuntimeStatus {
        let state = self.cognitive_loop.state().await;
        RuntimeStatus {
            lifecycle_mode: self.lifecycle.mode().await,
            cycle_count: state.cycle_count,
            queue_len: self.queue.len().await,
            memory_node_count: self.memory.node_count().await,
            interface_degraded: self.interface.status().degraded,
        }
    }

    pub async fn request_wake(&self) -> bool {
        self.lifecycle.request_wake(chrono::Utc::now()).await
    }

    /// Forces an out-of-cadence snapshot save, independent of the
    /// periodic interval.
    pub async fn force_snapshot(&self) -> anyhow::Result<()> {
        let snapshot = self.build_snapshot().await;
        save_with_retry(&self.store, &snapshot).await?;
        Ok(())
    }

    /// Spawns the tick loop, persistence loop, and dream loop, returning
    /// their join handles. Callers await [`Runtime::shutdown`] (or select
    /// on a signal) and then join these handles for a clean exit.
    pub fn spawn(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        vec![self.clone().spawn_tick_loop(), self.clone().spawn_persistence_loop(), self.clone().spawn_dream_loop()]
    }

    pub fn shutdown(&self) {
        self.cancellation.cancel();
    }

    fn spawn_tick_loop(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut clock = Clock::new(self.config.step_duration, self.cancellation.clone());
            loop {
                match clock.tick().await {
                    TickSource::Cancelled => break,
                    TickSource::Tick(_) => {
                        let now = chrono::Utc::now();
                        if let Some(execution) = self.cognitive_loop.run_step(now).await {
                            if !execution.success {
                                warn!(step = execution.step, error = ?execution.error, "step failed");
                            }
                        }
                        let load = self.cognitive_loop.state().await.cognitive_load;
                        self.lifecycle.on_tick(now, self.config.step_duration, load).await;
                    }
                }
            }
            info!("tick loop stopped");
        })
    }

    fn spawn_persistence_loop(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut clock = Clock::new(self.config.persistence_interval, self.cancellation.clone());
            loop {
                match clock.tick().await {
                    TickSource::Cancelled => break,
                    TickSource::Tick(_) => {
                        let snapshot = self.build_snapshot().await;
                        if let Err(e) = save_with_retry(&self.store, &snapshot).await {
                            error!(error = %e, "periodic snapshot save failed after retries");
                        }
                    }
                }
            }
            // Best-effort final save; shutdown should not lose the last interval's progress.
            let snapshot = self.build_snapshot().await;
            if let Err(e) = self.store.save(&snapshot).await {
                error!(error = %e, "final snapshot save failed");
            }
            info!("persistence loop stopped");
        })
    }

    fn spawn_dream_loop(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = self.cancellation.cancelled() => break,
                    () = tokio::time::sleep(self.config.tick_interval) => {}
                }
                if self.lifecycle.mode().await != LifecycleMode::Dreaming {
                    continue;
                }
                let recent_thoughts = self.memory.get_nodes_by_type(crate::core::types::NodeType::Thought).await;
                let recent_episodes = self.memory.get_nodes_by_type(crate::core::types::NodeType::Episode).await;
                let result = self.consolidator.begin(&recent_thoughts, &recent_episodes).await;
                info!(
                    patterns = result.patterns_created.len(),
                    insights = result.insights_created.len(),
                    pruned = result.nodes_pruned.len(),
                    "consolidation pass complete"
                );
                self.lifecycle.on_consolidation_done(chrono::Utc::now()).await;
            }
            info!("dream loop stopped");
        })
    }

    async fn build_snapshot(&self) -> PersistentSnapshot {
        let state = self.cognitive_loop.state().await;
        let metrics = self.cognitive_loop.metrics().await;
        let lifecycle = self.lifecycle.snapshot().await;
        let mut snapshot = PersistentSnapshot::empty(self.identity_name.as_str());
        snapshot.cycle_count = state.cycle_count;
        snapshot.total_thoughts = metrics.thoughts_produced;
        snapshot.total_insights = metrics.insights_produced;
        snapshot.lifecycle_mode = lifecycle.mode;
        snapshot.fatigue = lifecycle.fatigue;
        snapshot.last_dream_at = lifecycle.last_dream_at;

        let recent = self.memory.get_recent(32).await;
        for node in recent {
            snapshot.push_recent_thought(RecentThought {
                id: node.id,
                content: node.content,
                kind: node.node_type,
                importance: node.importance,
                timestamp: node.created_at,
            });
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_runtime_starts_from_an_empty_snapshot_in_a_fresh_directory() {
        let dir = std::env::temp_dir().join(format!("echobeats-runtime-test-{}", uuid::Uuid::new_v4()));
        let runtime = Runtime::new(Config::accelerated(1000), dir.clone(), "echobeats", Vec::new())
            .await
            .unwrap();
        let status = runtime.status().await;
        assert_eq!(status.cycle_count, 0);
        assert_eq!(status.lifecycle_mode, LifecycleMode::Awake);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn new_runtime_restores_cycle_count_and_lifecycle_mode_from_a_persisted_snapshot() {
        let dir = std::env::temp_dir().join(format!("echobeats-runtime-test-{}", uuid::Uuid::new_v4()));
        let store = crate::persistence::PersistentStore::new(dir.clone());
        let mut snapshot = PersistentSnapshot::empty("echobeats");
        snapshot.cycle_count = 3;
        snapshot.total_thoughts = 11;
        snapshot.total_insights = 4;
        snapshot.lifecycle_mode = LifecycleMode::Resting;
        snapshot.fatigue = 0.6;
        store.save(&snapshot).await.unwrap();

        let runtime = Runtime::new(Config::accelerated(1000), dir.clone(), "echobeats", Vec::new())
            .await
            .unwrap();
        let status = runtime.status().await;
        assert_eq!(status.cycle_count, 3);
        assert_eq!(status.lifecycle_mode, LifecycleMode::Resting);
        let metrics = runtime.cognitive_loop.metrics().await;
        assert_eq!(metrics.thoughts_produced, 11);
        assert_eq!(metrics.insights_produced, 4);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn periodic_snapshot_never_regresses_cycle_count_below_the_restored_value() {
        let dir = std::env::temp_dir().join(format!("echobeats-runtime-test-{}", uuid::Uuid::new_v4()));
        let store = crate::persistence::PersistentStore::new(dir.clone());
        let mut snapshot = PersistentSnapshot::empty("echobeats");
        snapshot.cycle_count = 5;
        snapshot.total_thoughts = 20;
        snapshot.total_insights = 9;
        store.save(&snapshot).await.unwrap();

        let runtime = Runtime::new(Config::accelerated(1000), dir.clone(), "echobeats", Vec::new())
            .await
            .unwrap();
        let rebuilt = runtime.build_snapshot().await;
        assert_eq!(rebuilt.cycle_count, 5);
        assert_eq!(rebuilt.total_thoughts, 20);
        assert_eq!(rebuilt.total_insights, 9);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn force_snapshot_writes_a_file() {
        let dir = std::env::temp_dir().join(format!("echobeats-runtime-test-{}", uuid::Uuid::new_v4()));
        let runtime = Runtime::new(Config::accelerated(1000), dir.clone(), "echobeats", Vec::new())
            .await
            .unwrap();
        runtime.force_snapshot().await.unwrap();
        assert!(dir.join("snapshot.json").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
