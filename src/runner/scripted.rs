//! In-memory engine for driving the coordinator deterministically in tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

use crate::app::EngineEvent;
use crate::models::{ResultKind, RunSummary, TestEntry, TestNode, TestOutcome};

use super::{LoadResult, TestEngine};

const ELAPSED: Duration = Duration::from_millis(10);

pub struct ScriptedEngine {
    tree: TestNode,
    results: HashMap<String, ResultKind>,
    outputs: HashMap<String, String>,
    /// When set, every test waits for a permit before finishing.
    gate: Option<Arc<Semaphore>>,
    fail_load: bool,
    fail_run: Option<String>,
    panic_on_run: bool,
    pub runs_started: AtomicUsize,
    pub tests_started: AtomicUsize,
    /// Notified once per started test.
    pub started: Notify,
}

impl ScriptedEngine {
    pub fn new(tree: TestNode) -> Self {
        Self {
            tree,
            results: HashMap::new(),
            outputs: HashMap::new(),
            gate: None,
            fail_load: false,
            fail_run: None,
            panic_on_run: false,
            runs_started: AtomicUsize::new(0),
            tests_started: AtomicUsize::new(0),
            started: Notify::new(),
        }
    }

    /// Tests not listed here pass.
    pub fn with_result(mut self, full_name: &str, kind: ResultKind) -> Self {
        self.results.insert(full_name.to_string(), kind);
        self
    }

    pub fn with_output(mut self, full_name: &str, text: &str) -> Self {
        self.outputs.insert(full_name.to_string(), text.to_string());
        self
    }

    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn failing_run(mut self, message: &str) -> Self {
        self.fail_run = Some(message.to_string());
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic_on_run = true;
        self
    }

    fn outcome_for(&self, entry: &TestEntry) -> TestOutcome {
        let kind = self
            .results
            .get(&entry.full_name)
            .copied()
            .unwrap_or(ResultKind::Success);
        TestOutcome {
            test_id: entry.id.clone(),
            full_name: entry.full_name.clone(),
            fixture_name: entry.fixture_name.clone(),
            method_name: entry.method_name.clone(),
            description: entry.description.clone(),
            kind,
            message: match kind {
                ResultKind::Success => String::new(),
                _ => format!("{} did not pass", entry.method_name),
            },
            stack_trace: (kind == ResultKind::Error).then(|| format!("at {}()", entry.full_name)),
            elapsed: ELAPSED,
        }
    }
}

#[async_trait]
impl TestEngine for ScriptedEngine {
    async fn discover(&self) -> Result<TestNode> {
        Ok(self.tree.clone())
    }

    async fn load(&self, plan: &[TestEntry]) -> Result<LoadResult> {
        if self.fail_load {
            bail!("scripted assembly could not be loaded");
        }
        Ok(LoadResult {
            test_count: plan.len(),
        })
    }

    async fn run(
        &self,
        plan: &[TestEntry],
        tx: mpsc::UnboundedSender<EngineEvent>,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        self.runs_started.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(EngineEvent::RunStarted { total: plan.len() });

        if self.panic_on_run {
            panic!("scripted engine blew up");
        }

        let mut summary = RunSummary::default();
        for entry in plan {
            if cancel.is_cancelled() {
                break;
            }
            self.tests_started.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(EngineEvent::TestStarted {
                id: entry.id.clone(),
            });
            self.started.notify_one();

            if let Some(text) = self.outputs.get(&entry.full_name) {
                let _ = tx.send(EngineEvent::Output { text: text.clone() });
            }
            if let Some(gate) = &self.gate {
                gate.acquire().await?.forget();
            }

            let outcome = self.outcome_for(entry);
            summary.record(outcome.kind, outcome.elapsed);
            let _ = tx.send(EngineEvent::TestFinished { outcome });
        }

        if let Some(message) = &self.fail_run {
            let _ = tx.send(EngineEvent::RunFailed {
                message: message.clone(),
            });
            bail!(message.clone());
        }

        let _ = tx.send(EngineEvent::RunFinished { summary });
        Ok(summary)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
