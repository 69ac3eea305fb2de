pub mod outcome;
pub mod severity;
pub mod tree;

pub use outcome::{ResultKind, RunSummary, TestOutcome};
pub use severity::Severity;
pub use tree::{NodeKind, TestEntry, TestNode};
