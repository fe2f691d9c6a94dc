use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Config layout version understood by this crate.
pub const CONFIG_VERSION: u32 = 1;

/// Upper bound for `compiler.workers`.
pub const MAX_WORKERS: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FxConfig {
    pub version: u32,
    #[serde(default)]
    pub compiler: CompilerSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CompilerSection {
    /// Root that `#include` names resolve against.
    #[serde(default = "default_effects_dir")]
    pub effects_dir: PathBuf,
    /// Overrides the platform cache directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub disable_cache: bool,
    /// Compile threads; 0 picks the available parallelism.
    #[serde(default)]
    pub workers: usize,
    #[serde(default = "default_terminal_effect")]
    pub terminal_effect: bool,
}

impl Default for CompilerSection {
    fn default() -> Self {
        Self {
            effects_dir: default_effects_dir(),
            cache_dir: None,
            disable_cache: false,
            workers: 0,
            terminal_effect: default_terminal_effect(),
        }
    }
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            compiler: CompilerSection::default(),
        }
    }
}

fn default_effects_dir() -> PathBuf {
    PathBuf::from("effects")
}

fn default_terminal_effect() -> bool {
    true
}

impl FxConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: FxConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }

        let compiler = &self.compiler;
        if compiler.effects_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "compiler.effects_dir must not be empty".into(),
            ));
        }
        if compiler
            .cache_dir
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            return Err(ConfigError::Invalid(
                "compiler.cache_dir must not be empty when set".into(),
            ));
        }
        if compiler.workers > MAX_WORKERS {
            return Err(ConfigError::Invalid(format!(
                "compiler.workers must be at most {MAX_WORKERS}"
            )));
        }
        Ok(())
    }
}
