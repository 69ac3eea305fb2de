use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::{
    app::{
        capture::CaptureSlot,
        events::handle_engine_event,
        notice::{Notice, RunReply},
    },
    catalog::Catalog,
    error::RunError,
    models::{TestEntry, TestOutcome},
    report::{self, junit},
    runner::TestEngine,
    selection::Selection,
};

type Completion = watch::Receiver<Option<Arc<RunReply>>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Cancelling,
}

/// The one mutable record of the current (or last) run.
#[derive(Debug, Default)]
pub struct RunState {
    pub(crate) status: RunStatus,
    pub(crate) total: usize,
    pub(crate) completed: usize,
    pub(crate) results: Vec<TestOutcome>,
    /// Text written by each test, keyed by full name.
    pub(crate) captured_output: IndexMap<String, String>,
    pub(crate) cancel: Option<CancellationToken>,
    pub(crate) completion: Option<Completion>,
}

impl RunState {
    fn begin(&mut self, total: usize, cancel: CancellationToken, completion: Completion) {
        self.status = RunStatus::Running;
        self.total = total;
        self.completed = 0;
        self.results.clear();
        self.captured_output.clear();
        self.cancel = Some(cancel);
        self.completion = Some(completion);
    }

    fn finish(&mut self) {
        self.status = RunStatus::Idle;
        self.cancel = None;
        self.completion = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunProgress {
    pub percent_complete: usize,
    pub active: bool,
}

/// Owns the single permitted run.
///
/// `start` either launches a run on a background task or, when one is already
/// in flight, waits for that run and hands back its reply. Every caller of the
/// same run gets the same `Arc<RunReply>`.
#[derive(Clone)]
pub struct Coordinator {
    engine: Arc<dyn TestEngine>,
    catalog: Arc<Catalog>,
    state: Arc<Mutex<RunState>>,
    capture: CaptureSlot,
    result_path: Option<PathBuf>,
}

impl Coordinator {
    pub fn new(
        engine: Arc<dyn TestEngine>,
        catalog: Arc<Catalog>,
        result_path: Option<PathBuf>,
    ) -> Self {
        Self {
            engine,
            catalog,
            state: Arc::new(Mutex::new(RunState::default())),
            capture: CaptureSlot::default(),
            result_path,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn start(&self, selection: Selection) -> Arc<RunReply> {
        let mut completion = {
            let mut state = self.lock();
            match state.completion.clone() {
                Some(in_flight) if state.status != RunStatus::Idle => {
                    tracing::info!(%selection, "run already in progress, waiting for it");
                    in_flight
                }
                _ => {
                    let plan = selection.plan(&self.catalog);
                    tracing::info!(
                        %selection,
                        planned = plan.len(),
                        engine = self.engine.name(),
                        "starting run"
                    );

                    let cancel = CancellationToken::new();
                    let (done, completion) = watch::channel(None);
                    state.begin(plan.len(), cancel.clone(), completion.clone());

                    let this = self.clone();
                    tokio::spawn(async move { this.execute(plan, cancel, done).await });
                    completion
                }
            }
        };

        let reply = match completion.wait_for(Option::is_some).await {
            Ok(reply) => (*reply).clone(),
            Err(_) => None,
        };
        reply.unwrap_or_else(|| {
            Arc::new(RunError::Failed("run ended without a result".into()).into())
        })
    }

    pub fn status(&self) -> RunProgress {
        let state = self.lock();
        let percent_complete = match state.total {
            0 => 0,
            total => (state.completed * 100 / total).min(100),
        };
        RunProgress {
            percent_complete,
            active: state.status != RunStatus::Idle,
        }
    }

    /// Ask the engine to stop after the test in flight. Returns at once.
    pub fn cancel(&self) -> Notice {
        let mut state = self.lock();
        if state.status == RunStatus::Running {
            state.status = RunStatus::Cancelling;
            if let Some(token) = &state.cancel {
                token.cancel();
            }
            tracing::info!(
                completed = state.completed,
                total = state.total,
                "cancellation requested"
            );
        }
        Notice::warning("Runner cancelled")
    }

    /// Runs `drive` on its own task so that a panicking engine still lands
    /// here, then returns the state to idle and wakes every waiter.
    async fn execute(
        self,
        plan: Vec<TestEntry>,
        cancel: CancellationToken,
        done: watch::Sender<Option<Arc<RunReply>>>,
    ) {
        let started = Instant::now();
        let inner = self.clone();
        let reply = match tokio::spawn(async move { inner.drive(plan, cancel).await }).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "test run aborted");
                RunError::Failed(format!("test run aborted: {e}")).into()
            }
        };

        self.lock().finish();
        tracing::info!(
            elapsed = ?started.elapsed(),
            status = ?reply.notice().status,
            "run complete"
        );
        done.send_replace(Some(Arc::new(reply)));
    }

    async fn drive(&self, plan: Vec<TestEntry>, cancel: CancellationToken) -> RunReply {
        let Some(mut capture) = self.capture.acquire() else {
            let message = "test output is already being captured by another run";
            return RunError::Failed(message.into()).into();
        };

        match self.engine.load(&plan).await {
            Ok(loaded) if loaded.test_count > 0 => {}
            Ok(_) => {
                tracing::warn!("engine loaded no tests");
                return RunError::Load("engine loaded no tests".into()).into();
            }
            Err(e) => {
                tracing::warn!(error = ?e, "failed to load tests");
                return RunError::Load(format!("{e:#}")).into();
            }
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let run = self.engine.run(&plan, tx, cancel);
        let consume = async {
            while let Some(event) = rx.recv().await {
                let mut state = self.lock();
                handle_engine_event(&mut state, &mut capture, event);
            }
        };
        let (outcome, ()) = tokio::join!(run, consume);
        drop(capture);

        if let Err(e) = outcome {
            tracing::error!(error = ?e, "test run failed");
            return RunError::Failed(format!("{e:#}")).into();
        }

        let (results, captured) = {
            let state = self.lock();
            (state.results.clone(), state.captured_output.clone())
        };
        let report = report::aggregate(&results, &captured);
        tracing::info!(
            passed = report.summary.passed,
            failed = report.summary.failed,
            errors = report.summary.errors,
            total = report.summary.total,
            "{}",
            report.message.text
        );

        self.persist(results, captured).await;
        RunReply::Report(report)
    }

    async fn persist(&self, results: Vec<TestOutcome>, captured: IndexMap<String, String>) {
        let Some(path) = self.result_path.clone() else {
            return;
        };
        let written = tokio::task::spawn_blocking(move || {
            junit::write_results(&path, &results, &captured).map(|()| path)
        })
        .await;
        match written {
            Ok(Ok(path)) => tracing::debug!(path = %path.display(), "wrote test results"),
            Ok(Err(e)) => tracing::warn!(error = ?e, "failed to persist test results"),
            Err(e) => tracing::warn!(error = %e, "result writer task failed"),
        }
    }
}
