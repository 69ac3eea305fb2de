use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "runway.toml";
pub const DEFAULT_LISTEN: &str = "127.0.0.1:7878";

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    listen: Option<String>,
    /// Where the result file of the latest run is written, if anywhere.
    #[serde(default)]
    result_path: Option<PathBuf>,
    #[serde(default)]
    engine: RawEngineConfig,
}

/// Controls how the external test engine is launched.
#[derive(Debug, Default, Deserialize)]
struct RawEngineConfig {
    /// Program and arguments, shell-quoted.
    /// Example: "dotnet tools/engine.dll --verbose"
    #[serde(default)]
    command: Option<String>,
    /// Test assemblies handed to the engine, relative to this file. Glob
    /// patterns are expanded.
    /// Example: ["bin/Sample.Tests.dll", "bin/*.Specs.dll"]
    #[serde(default)]
    assemblies: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub result_path: Option<PathBuf>,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub program: String,
    pub args: Vec<String>,
    pub assemblies: Vec<PathBuf>,
    pub working_dir: PathBuf,
}

/// The configuration as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigListing {
    pub assembly_list: Vec<PathBuf>,
    pub test_result_path: Option<PathBuf>,
}

impl Config {
    /// Load and validate the configuration file. Every failure is fatal.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let path = std::path::absolute(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let raw: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        let base = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        Self::resolve(raw, &base)
    }

    fn resolve(raw: RawConfig, base: &Path) -> Result<Self, ConfigError> {
        let command = raw
            .engine
            .command
            .filter(|c| !c.trim().is_empty())
            .ok_or(ConfigError::MissingEngine)?;
        let mut words =
            shell_words::split(&command).map_err(|e| ConfigError::InvalidEngine(e.to_string()))?;
        if words.is_empty() {
            return Err(ConfigError::MissingEngine);
        }
        let program = words.remove(0);

        if raw.engine.assemblies.is_empty() {
            return Err(ConfigError::NoAssemblies);
        }
        let mut assemblies = Vec::new();
        for pattern in &raw.engine.assemblies {
            for assembly in resolve_assembly(base, pattern)? {
                if !assemblies.contains(&assembly) {
                    assemblies.push(assembly);
                }
            }
        }

        Ok(Config {
            listen: raw.listen.unwrap_or_else(|| DEFAULT_LISTEN.to_string()),
            result_path: raw.result_path.map(|p| base.join(p)),
            engine: EngineConfig {
                program,
                args: words,
                assemblies,
                working_dir: base.to_path_buf(),
            },
        })
    }

    pub fn listing(&self) -> ConfigListing {
        ConfigListing {
            assembly_list: self.engine.assemblies.clone(),
            test_result_path: self.result_path.clone(),
        }
    }
}

/// Expand one declared assembly into existing files.
fn resolve_assembly(base: &Path, pattern: &str) -> Result<Vec<PathBuf>, ConfigError> {
    let joined = base.join(pattern);
    if !pattern.contains(['*', '?', '[']) {
        return match joined.canonicalize() {
            Ok(path) if path.is_file() => Ok(vec![path]),
            _ => Err(ConfigError::AssemblyNotFound(joined)),
        };
    }

    let full = joined.to_string_lossy().to_string();
    let entries = glob::glob(&full).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;
    let found: Vec<PathBuf> = entries
        .flatten()
        .filter(|p| p.is_file())
        .filter_map(|p| p.canonicalize().ok())
        .collect();
    if found.is_empty() {
        return Err(ConfigError::AssemblyNotFound(joined));
    }
    Ok(found)
}
