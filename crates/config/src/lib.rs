//! Manages application configuration by loading settings from standard locations.
//!
//! This crate provides a unified configuration object (`Config`) that aggregates
//! settings from files and environment variables, making them accessible
//! globally via a lazily initialized static reference (`CONFIG`).

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use etcetera::BaseStrategy;
use figment::providers::{Env, Format, Toml};
use figment::{Figment, Metadata, Provider};
use serde::{Deserialize, Serialize};

/// The default configuration values
const DEFAULT_TOML_CONFIG: &str = include_str!("./archiver.default.toml");

//================================================================================================
// Statics
//================================================================================================

/// Provides a lazily instantiated static reference to the application `Config`.
///
/// This static variable ensures that configuration is parsed only once from
/// canonical locations and then made immutably available throughout the
/// application's lifecycle.
pub static CONFIG: LazyLock<Config> = LazyLock::new(load_config);

//================================================================================================
// Types
//================================================================================================

/// Settings for the rooted-archive store.
#[derive(Deserialize, Serialize)]
pub struct StoreConfig {
    /// The root directory under which bucketed archive containers are written.
    pub root: PathBuf,
    /// How many leading hex characters of the root hash form each bucket directory level.
    ///
    /// Must be `0` or `2`; a store refuses to open against a root stamped with a different
    /// depth than the one it was created with.
    pub bucket_depth: u8,
}

/// Settings for the scratch/clone filesystem area.
#[derive(Deserialize, Serialize)]
pub struct ScratchConfig {
    /// The root directory under which temporary clone mirrors are created.
    pub root: PathBuf,
}

/// Settings for the distributed lock backend.
#[derive(Deserialize, Serialize)]
pub struct LockConfig {
    timeout_secs: u64,
}

/// Settings for the job executor.
#[derive(Deserialize, Serialize)]
pub struct JobConfig {
    deadline_secs: u64,
}

/// Represents the application's primary configuration structure.
#[derive(Deserialize, Serialize)]
pub struct Config {
    /// Rooted-archive store settings.
    pub store: StoreConfig,
    /// Scratch clone settings.
    pub scratch: ScratchConfig,
    /// Distributed lock settings.
    pub lock: LockConfig,
    /// Job executor settings.
    pub job: JobConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: get_data_dir().join("store"),
            bucket_depth: 2,
        }
    }
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir().join("archiver"),
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self { deadline_secs: 3600 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            scratch: ScratchConfig::default(),
            lock: LockConfig::default(),
            job: JobConfig::default(),
        }
    }
}

impl LockConfig {
    /// The lease timeout used when acquiring a repository or archive lock.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl JobConfig {
    /// The deadline a single archiver job is allotted end-to-end.
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

impl Config {
    /// Constructs a `Figment` instance for configuration loading.
    ///
    /// This method builds a configuration provider by layering default settings,
    /// user-specific configuration files, and environment variables.
    pub fn figment() -> Figment {
        let mut fig = Figment::from(Config::default()).merge(Toml::string(DEFAULT_TOML_CONFIG));

        if let Ok(c) = etcetera::choose_base_strategy() {
            let config = c.config_dir().join("archiver.toml");
            fig = fig.admerge(Toml::file(config));
        }

        fig.admerge(Env::prefixed("ARCHIVER_").split("_"))
    }

    /// Creates a `Config` instance from a given provider.
    pub fn from<T: Provider>(provider: T) -> Result<Config, Box<figment::Error>> {
        Figment::from(provider).extract().map_err(Box::new)
    }
}

impl Provider for Config {
    fn metadata(&self) -> figment::Metadata {
        Metadata::named("Archiver Config")
    }

    fn data(
        &self,
    ) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        figment::providers::Serialized::defaults(self).data()
    }
}

//================================================================================================
// Functions
//================================================================================================

/// Determines the appropriate data directory based on the operating system.
fn get_data_dir() -> PathBuf {
    if let Ok(c) = etcetera::choose_base_strategy() {
        c.data_dir().join("archiver")
    } else {
        std::env::temp_dir().join("archiver")
    }
}

/// Loads the application configuration using the default `Figment` provider.
///
/// This function is used to initialize the `CONFIG` static variable.
fn load_config() -> Config {
    Config::figment().extract().unwrap_or_else(|e| {
        tracing::error!(error = %e, "problem loading config from default sources, falling back to nearly empty configuration");
        Config::default()
    })
}
