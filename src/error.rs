use std::path::PathBuf;

use thiserror::Error;

/// Startup configuration problems. Any of these keeps the process from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("you must configure an engine command")]
    MissingEngine,
    #[error("engine command could not be parsed: {0}")]
    InvalidEngine(String),
    #[error("you must configure at least one assembly")]
    NoAssemblies,
    #[error("invalid assembly pattern {pattern}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("cannot find test assembly at {0}")]
    AssemblyNotFound(PathBuf),
}

/// A selection that matched nothing or could not be parsed. The `Display` text
/// is what callers see.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("Please select a valid test")]
    InvalidTest,
    #[error("Please select a valid fixture")]
    InvalidFixture,
    #[error("Please select a valid category/categories")]
    InvalidCategories,
    #[error("There are not any test to run")]
    EmptyCatalog,
}

/// Failures at the run boundary. The coordinator turns both into replies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("Unable to load the tests")]
    Load(String),
    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to create result directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write result file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: atomicwrites::Error<quick_junit::SerializeError>,
    },
}
