pub mod process;
#[cfg(test)]
pub mod scripted;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::app::EngineEvent;
use crate::config::EngineConfig;
use crate::models::{RunSummary, TestEntry, TestNode};

/// What the engine managed to materialize for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadResult {
    pub test_count: usize,
}

/// Boundary to the engine that discovers and executes tests.
///
/// Implementations stream lifecycle events over `tx` in execution order and
/// check `cancel` between tests: once it fires, the test in flight may finish
/// but no further test starts.
#[async_trait]
pub trait TestEngine: Send + Sync {
    /// Discover the test tree.
    async fn discover(&self) -> Result<TestNode>;

    /// Materialize the planned tests without running them.
    async fn load(&self, plan: &[TestEntry]) -> Result<LoadResult>;

    /// Run the planned tests, streaming events over the channel.
    async fn run(
        &self,
        plan: &[TestEntry],
        tx: mpsc::UnboundedSender<EngineEvent>,
        cancel: CancellationToken,
    ) -> Result<RunSummary>;

    /// Display name for this engine.
    fn name(&self) -> &str;
}

/// Construct the engine described by the configuration.
pub fn detect(config: &EngineConfig) -> Arc<dyn TestEngine> {
    Arc::new(process::ProcessEngine::new(config.clone()))
}
