use serde::{Serialize, Serializer};

use crate::{
    error::{RunError, SelectionError},
    models::Severity,
    report::RunReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Info,
    Warning,
    Danger,
    Error,
}

impl From<Severity> for NoticeKind {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Success => NoticeKind::Success,
            Severity::Warning => NoticeKind::Warning,
            Severity::Danger => NoticeKind::Danger,
        }
    }
}

/// A one-line message for the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub text: String,
    pub status: NoticeKind,
}

impl Notice {
    pub fn new(text: impl Into<String>, status: NoticeKind) -> Self {
        Self {
            text: text.into(),
            status,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(text, NoticeKind::Info)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(text, NoticeKind::Warning)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(text, NoticeKind::Error)
    }
}

/// What every run request answers with.
#[derive(Debug, Clone, PartialEq)]
pub enum RunReply {
    Report(RunReport),
    /// The request was not runnable; nothing was started.
    Info(String),
    /// The engine could not load the selected tests.
    Warning(String),
    /// The run broke down.
    Error(String),
}

impl RunReply {
    pub fn notice(&self) -> Notice {
        match self {
            RunReply::Report(report) => report.message.clone(),
            RunReply::Info(text) => Notice::info(text.clone()),
            RunReply::Warning(text) => Notice::warning(text.clone()),
            RunReply::Error(text) => Notice::error(text.clone()),
        }
    }

    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunReply::Report(report) => Some(report),
            _ => None,
        }
    }
}

impl From<SelectionError> for RunReply {
    fn from(err: SelectionError) -> Self {
        RunReply::Info(err.to_string())
    }
}

impl From<RunError> for RunReply {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Load(_) => RunReply::Warning(err.to_string()),
            RunError::Failed(message) => RunReply::Error(message),
        }
    }
}

#[derive(Serialize)]
struct MessageOnly {
    message: Notice,
}

impl Serialize for RunReply {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RunReply::Report(report) => report.serialize(serializer),
            other => MessageOnly {
                message: other.notice(),
            }
            .serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_serialize_under_message_key() {
        let reply = RunReply::from(SelectionError::InvalidTest);
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"message": {"text": "Please select a valid test", "status": "info"}})
        );
    }

    #[test]
    fn load_failures_are_warnings() {
        let reply = RunReply::from(RunError::Load("assembly missing".into()));
        assert_eq!(reply.notice(), Notice::warning("Unable to load the tests"));
        let reply = RunReply::from(RunError::Failed("engine crashed".into()));
        assert_eq!(reply.notice(), Notice::error("engine crashed"));
    }
}
