use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::severity::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultKind {
    Success,
    Failure,
    Error,
    Inconclusive,
    NotRunnable,
    Ignored,
    Skipped,
}

impl ResultKind {
    pub fn severity(&self) -> Severity {
        match self {
            ResultKind::Success => Severity::Success,
            ResultKind::Failure | ResultKind::Error => Severity::Danger,
            ResultKind::Inconclusive
            | ResultKind::NotRunnable
            | ResultKind::Ignored
            | ResultKind::Skipped => Severity::Warning,
        }
    }
}

/// Result of one executed test, in the order the engine reported it.
#[derive(Debug, Clone, PartialEq)]
pub struct TestOutcome {
    pub test_id: String,
    pub full_name: String,
    pub fixture_name: String,
    pub method_name: String,
    pub description: String,
    pub kind: ResultKind,
    pub message: String,
    /// Only kept for `ResultKind::Error`.
    pub stack_trace: Option<String>,
    pub elapsed: Duration,
}

impl TestOutcome {
    /// The text shown for this outcome: the message, plus the stack trace on a
    /// new line for errors.
    pub fn display_message(&self) -> String {
        match (&self.kind, &self.stack_trace) {
            (ResultKind::Error, Some(trace)) => format!("{}\n{}", self.message, trace),
            _ => self.message.clone(),
        }
    }
}

/// Per-kind counters for a set of outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub inconclusive: usize,
    pub invalid: usize,
    pub ignored: usize,
    pub skipped: usize,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a TestOutcome>) -> Self {
        let mut summary = RunSummary::default();
        for outcome in outcomes {
            summary.record(outcome.kind, outcome.elapsed);
        }
        summary
    }

    pub fn record(&mut self, kind: ResultKind, elapsed: Duration) {
        self.total += 1;
        self.elapsed += elapsed;
        match kind {
            ResultKind::Success => self.passed += 1,
            ResultKind::Failure => self.failed += 1,
            ResultKind::Error => self.errors += 1,
            ResultKind::Inconclusive => self.inconclusive += 1,
            ResultKind::NotRunnable => self.invalid += 1,
            ResultKind::Ignored => self.ignored += 1,
            ResultKind::Skipped => self.skipped += 1,
        }
    }

    pub fn severity(&self) -> Severity {
        if self.passed == self.total {
            Severity::Success
        } else if self.failed + self.errors > 0 {
            Severity::Danger
        } else {
            Severity::Warning
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::try_from_secs_f64(secs).unwrap_or_default())
    }
}
