use serde::{Deserialize, Serialize};

/// Three-level outcome bucket shared by single tests, fixtures and whole runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Success,
    Warning,
    Danger,
}
