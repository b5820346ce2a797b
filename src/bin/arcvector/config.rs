use std::fs;
use std::path::{Path, PathBuf};

use arcvector::storage::DEFAULT_RETRY_INTERVAL;
use arcvector::{ArcVectorConfig, ArcVectorOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Defaults for the `stress` command, overridable on the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StressDefaults {
    pub vertices: usize,
    pub ops: usize,
    pub threads: usize,
    pub seed: u64,
    pub budget_ms: u64,
    pub relationships: u16,
}

impl Default for StressDefaults {
    fn default() -> Self {
        Self {
            vertices: 64,
            ops: 10_000,
            threads: 4,
            seed: 0x5eed,
            budget_ms: 50,
            relationships: 8,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    arcvector: ArcVectorConfig,
    stress: StressDefaults,
}

/// Configuration file of the `arcvector` binary.
#[derive(Debug, Default)]
pub struct CliConfig {
    path: Option<PathBuf>,
    data: RawConfig,
}

impl CliConfig {
    /// Loads `explicit` if given. A missing file is an error only when named
    /// explicitly.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let Some(path) = explicit else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Err(ConfigError::Missing { path });
        }
        let data = read_file(&path)?;
        Ok(Self {
            path: Some(path),
            data,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn arcvector(&self) -> &ArcVectorConfig {
        &self.data.arcvector
    }

    pub fn stress(&self) -> &StressDefaults {
        &self.data.stress
    }

    /// Engine options with the file values applied over the defaults.
    pub fn options(&self) -> ArcVectorOptions {
        self.data.arcvector.apply(ArcVectorOptions::new())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(&self.data).map_err(ConfigError::Serialize)
    }

    /// Writes a fresh configuration file with every default spelled out.
    pub fn write_template(path: &Path, force: bool) -> Result<(), ConfigError> {
        if path.exists() && !force {
            return Err(ConfigError::Exists {
                path: path.to_path_buf(),
            });
        }
        let template = RawConfig {
            arcvector: ArcVectorConfig {
                multi_arc_capacity: Some(arcvector::storage::MULTI_ARC_CAPACITY),
                retry_interval_ms: Some(DEFAULT_RETRY_INTERVAL.as_millis() as u64),
                accumulator: Some(Default::default()),
                dump_on_error: Some(true),
            },
            stress: StressDefaults::default(),
        };
        let text = toml::to_string_pretty(&template).map_err(ConfigError::Serialize)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {path} does not exist")]
    Missing { path: PathBuf },
    #[error("config file {path} already exists (use --force to overwrite)")]
    Exists { path: PathBuf },
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to render config: {0}")]
    Serialize(#[source] toml::ser::Error),
}
