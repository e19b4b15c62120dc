//! Application configuration.
//!
//! [`AppConfig`] is loaded once at startup and passed down by value.  The
//! CLI layer owns config; the core crate only ever sees the
//! [`GenerationOptions`] derived from it.
//!
//! # Resolution order (highest priority first)
//!
//! 1. CLI flags (handled at the call-site, not here)
//! 2. Environment variables: `TRESTLE__SECTION__KEY`, e.g. `TRESTLE__HOOKS__TIMEOUT_SECS=30`
//! 3. Config file: `--config FILE`, or `config.toml` in the platform config dir
//! 4. Built-in defaults (always present)

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use trestle_core::application::GenerationOptions;

use crate::error::{CliError, CliResult};

/// Catalogue used when neither `--catalog` nor `catalog.dir` is set.
pub const DEFAULT_CATALOG_DIR: &str = "blueprints";

const ENV_PREFIX: &str = "TRESTLE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub hooks: HooksConfig,
    pub generation: GenerationConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Directory holding one sub-directory per blueprint.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    pub enabled: bool,
    /// Timeout for hooks that do not declare their own.
    pub timeout_secs: u64,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub parallel: bool,
    pub overwrite: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            overwrite: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub no_color: bool,
}

impl AppConfig {
    /// Load configuration from the default layers.
    ///
    /// An explicit `config_file` must exist; the platform default is optional.
    pub fn load(config_file: Option<&PathBuf>) -> CliResult<Self> {
        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true);

        match config_file {
            Some(path) => Self::build(Some((path, true)), env),
            None => {
                let default = Self::config_path();
                Self::build(Some((&default, false)), env)
            }
        }
    }

    fn build(file: Option<(&Path, bool)>, env: Environment) -> CliResult<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("hooks.enabled", defaults.hooks.enabled)
            .and_then(|b| b.set_default("hooks.timeout_secs", defaults.hooks.timeout_secs as i64))
            .and_then(|b| b.set_default("generation.parallel", defaults.generation.parallel))
            .and_then(|b| b.set_default("generation.overwrite", defaults.generation.overwrite))
            .and_then(|b| b.set_default("output.no_color", defaults.output.no_color))
            .map_err(config_error)?;

        if let Some((path, required)) = file {
            debug!(path = %path.display(), required, "Reading config file");
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(required),
            );
        }

        builder
            .add_source(env)
            .build()
            .and_then(|c| c.try_deserialize::<AppConfig>())
            .map_err(config_error)
    }

    /// Path to the default configuration file.
    ///
    /// Uses `directories::ProjectDirs` for cross-platform correctness,
    /// falling back to `.trestle.toml` in the current directory.
    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("dev", "trestle", "trestle")
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".trestle.toml"))
    }

    /// `--catalog` if given, else `catalog.dir`, else [`DEFAULT_CATALOG_DIR`].
    pub fn catalog_dir(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.catalog.dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_DIR))
    }

    /// Options for the engine before CLI flags are applied.
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            hook_timeout: Duration::from_secs(self.hooks.timeout_secs),
            run_hooks: self.hooks.enabled,
            parallel: self.generation.parallel,
            overwrite: self.generation.overwrite,
        }
    }
}

fn config_error(err: config::ConfigError) -> CliError {
    CliError::ConfigError {
        message: err.to_string(),
        source: Some(Box::new(err)),
    }
}
