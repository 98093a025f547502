//! Process settings, loaded from an optional YAML file.
//!
//! Every field defaults so a missing file (when no explicit path was given)
//! means "run with defaults". An explicitly named file must exist.

pub mod error;

pub use error::ConfigError;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SETTINGS_FILE: &str = "datatunnel.yml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelSettings {
    pub engine: EngineSettings,
    pub planner: PlannerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Upper bound on units executing at once.
    pub max_parallel_units: usize,
    /// Capacity of the per-unit batch queue between reader and writer.
    pub batch_queue_depth: usize,
    /// Extra attempts after a transient failure before the unit is failed.
    pub retry_attempts: u32,
    /// Base backoff between attempts; attempt n waits n times this.
    pub retry_backoff_ms: u64,
    /// Skip all not-yet-started units after the first unit failure.
    pub fail_fast: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_parallel_units: 4,
            batch_queue_depth: 4,
            retry_attempts: 2,
            retry_backoff_ms: 500,
            fail_fast: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    /// Accept a pattern that matches no catalog entities and produce an
    /// empty plan instead of rejecting the statement.
    pub tolerate_empty_match: bool,
}

impl TunnelSettings {
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        match path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(ConfigError::MissingFile(
                        explicit.to_string_lossy().to_string(),
                    ));
                }
                Self::read_file(&explicit)
            }
            None => {
                let default_path = Path::new(DEFAULT_SETTINGS_FILE);
                if default_path.exists() {
                    Self::read_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let file = fs::File::open(path)?;
        let settings: TunnelSettings = serde_yaml::from_reader(file)?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            "engine:\n  max_parallel_units: 8\n  fail_fast: true\n"
        )
        .expect("write");

        let settings =
            TunnelSettings::load(Some(file.path().to_path_buf())).expect("load failed");
        assert_eq!(settings.engine.max_parallel_units, 8);
        assert!(settings.engine.fail_fast);
        // untouched fields keep defaults
        assert_eq!(settings.engine.retry_attempts, 2);
        assert_eq!(settings.planner, PlannerSettings::default());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = TunnelSettings::load(Some(PathBuf::from("/no/such/settings.yml")))
            .expect_err("expected missing-file error");
        assert!(matches!(err, ConfigError::MissingFile(_)));
    }
}
