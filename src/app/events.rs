use crate::{
    app::{
        capture::OutputCapture,
        coordinator::{RunState, RunStatus},
    },
    models::{RunSummary, TestOutcome},
};

/// Events streamed from the engine into the coordinator, in execution order.
#[derive(Debug)]
pub enum EngineEvent {
    RunStarted { total: usize },
    TestStarted { id: String },
    TestFinished { outcome: TestOutcome },
    /// Text written by the tests themselves.
    Output { text: String },
    RunFinished { summary: RunSummary },
    RunFailed { message: String },
}

/// Fold one engine event into the run state.
pub fn handle_engine_event(state: &mut RunState, capture: &mut OutputCapture, event: EngineEvent) {
    match event {
        EngineEvent::RunStarted { total } => {
            if total != state.total {
                tracing::debug!(
                    planned = state.total,
                    reported = total,
                    "engine reported a different test count"
                );
            }
        }

        EngineEvent::TestStarted { id } => {
            if state.status == RunStatus::Cancelling {
                tracing::debug!(test = %id, "test started while cancelling");
            } else {
                tracing::trace!(test = %id, "test started");
            }
        }

        EngineEvent::Output { text } => capture.write(&text),

        EngineEvent::TestFinished { outcome } => {
            if let Some(text) = capture.take() {
                state
                    .captured_output
                    .entry(outcome.full_name.clone())
                    .or_default()
                    .push_str(&text);
            }
            tracing::debug!(test = %outcome.full_name, result = ?outcome.kind, "test finished");
            state.results.push(outcome);
            state.completed += 1;
            // An engine that runs more than it was asked to must not push progress past 100%.
            state.total = state.total.max(state.completed);
        }

        EngineEvent::RunFinished { summary } => {
            tracing::debug!(total = summary.total, "engine finished");
        }

        EngineEvent::RunFailed { message } => {
            tracing::warn!(%message, "engine reported a run failure");
        }
    }
}
