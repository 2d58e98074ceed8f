//! Manifest and run settings for clockke.
//!
//! ```toml
//! [manifest]
//! manifest_id = "CLOCKKE.DEFAULT.V2_1"
//! tick_ms = 1000.0
//! stamp_hash = "sha256"
//!
//! [[manifest.bands]]
//! label = "A+"
//! cutoff = 0.8
//!
//! [run]
//! noise_ampl = 0.01
//! max_ticks = 0
//! ```
//!
//! Every key is optional. A present `bands` list replaces the default list.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use clockke_types::{ConfigError, Manifest, RawManifest};

/// Environment variable naming a manifest file.
pub const MANIFEST_ENV: &str = "CLOCKKE_MANIFEST";

const TOP_LEVEL_KEYS: [&str; 2] = ["manifest", "run"];
const RUN_KEYS: [&str; 2] = ["noise_ampl", "max_ticks"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid manifest in {}: {source}", path.display())]
    Invalid { path: PathBuf, source: ConfigError },
    #[error("invalid [run] settings in {}: noise_ampl must be finite and >= 0 (got {noise_ampl})", path.display())]
    InvalidRun { path: PathBuf, noise_ampl: f64 },
}

impl LoadError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Read { path, .. }
            | Self::Parse { path, .. }
            | Self::Invalid { path, .. }
            | Self::InvalidRun { path, .. } => path,
        }
    }
}

/// Tick source settings from the `[run]` table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Amplitude of uniform noise added to stress each tick.
    pub noise_ampl: f64,
    /// Stop after this many ticks; `0` runs until interrupted.
    pub max_ticks: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            noise_ampl: 0.01,
            max_ticks: 0,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawConfigFile {
    manifest: RawManifest,
    run: RunConfig,
}

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Flag(PathBuf),
    Env(PathBuf),
    Home(PathBuf),
    Default,
}

impl ConfigSource {
    /// Pick the first source present: flag, env, an existing home file, else the default.
    #[must_use]
    pub fn resolve(
        flag: Option<&Path>,
        env: Option<OsString>,
        home_file: Option<PathBuf>,
    ) -> Self {
        if let Some(path) = flag {
            return Self::Flag(path.to_path_buf());
        }
        if let Some(value) = env.filter(|v| !v.is_empty()) {
            return Self::Env(PathBuf::from(value));
        }
        match home_file {
            Some(path) if path.is_file() => Self::Home(path),
            _ => Self::Default,
        }
    }

    /// Resolve against the real process environment and home directory.
    #[must_use]
    pub fn discover(flag: Option<&Path>) -> Self {
        Self::resolve(flag, std::env::var_os(MANIFEST_ENV), config_path())
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Flag(path) | Self::Env(path) | Self::Home(path) => Some(path),
            Self::Default => None,
        }
    }

    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Flag(path) => format!("--manifest {}", path.display()),
            Self::Env(path) => format!("{MANIFEST_ENV}={}", path.display()),
            Self::Home(path) => path.display().to_string(),
            Self::Default => "built-in default".to_string(),
        }
    }
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockkeConfig {
    pub manifest: Manifest,
    pub run: RunConfig,
    pub source: ConfigSource,
}

impl ClockkeConfig {
    /// Load from the first available source.
    pub fn load(flag: Option<&Path>) -> Result<Self, LoadError> {
        Self::load_from(ConfigSource::discover(flag))
    }

    pub fn load_from(source: ConfigSource) -> Result<Self, LoadError> {
        let Some(path) = source.path() else {
            return Ok(Self {
                manifest: Manifest::default(),
                run: RunConfig::default(),
                source,
            });
        };

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read manifest at {:?}: {}", path, err);
                return Err(LoadError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        let (manifest, run) = parse(&content, path)?;
        tracing::debug!(source = %source.describe(), manifest = manifest.manifest_id(), "manifest loaded");
        Ok(Self {
            manifest,
            run,
            source,
        })
    }
}

/// Parse and validate a config document. `path` is only used for error context.
pub fn parse(content: &str, path: &Path) -> Result<(Manifest, RunConfig), LoadError> {
    let parse_err = |source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let table: toml::Table = toml::from_str(content).map_err(parse_err)?;
    warn_unknown_keys(&table, path);

    let raw: RawConfigFile = toml::from_str(content).map_err(parse_err)?;
    if !raw.run.noise_ampl.is_finite() || raw.run.noise_ampl < 0.0 {
        return Err(LoadError::InvalidRun {
            path: path.to_path_buf(),
            noise_ampl: raw.run.noise_ampl,
        });
    }
    let manifest = Manifest::new(raw.manifest).map_err(|source| LoadError::Invalid {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((manifest, raw.run))
}

fn warn_unknown_keys(table: &toml::Table, path: &Path) {
    for key in table.keys() {
        if !TOP_LEVEL_KEYS.contains(&key.as_str()) {
            tracing::warn!("Ignoring unknown table [{}] in {:?}", key, path);
        }
    }
    if let Some(run) = table.get("run").and_then(toml::Value::as_table) {
        for key in run.keys() {
            if !RUN_KEYS.contains(&key.as_str()) {
                tracing::warn!("Ignoring unknown key run.{} in {:?}", key, path);
            }
        }
    }
}

/// Render a manifest and run settings as a config document.
pub fn to_toml(manifest: &Manifest, run: &RunConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&RawConfigFile {
        manifest: manifest.to_raw(),
        run: *run,
    })
}

/// `~/.clockke/manifest.toml`
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".clockke").join("manifest.toml"))
}
