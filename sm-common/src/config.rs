//! Configuration loading and config file resolution
//!
//! StreetMatch bootstraps from a small TOML file. Everything has a built-in
//! default, so a missing or unreadable file never stops the server: it logs a
//! warning and continues on defaults.
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `SM_CONFIG` environment variable
//! 3. User config directory (`<config_dir>/streetmatch/config.toml`)
//! 4. Compiled defaults (no file)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "SM_CONFIG";

/// Smallest batch that can still form a pair
pub const MIN_BATCH_SIZE: usize = 2;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP server port
    pub port: u16,

    /// Interface to bind
    pub bind: String,

    /// Image catalog settings
    pub images: ImagesConfig,

    /// Similarity data settings
    pub similarity: SimilarityConfig,

    /// Game rules
    pub game: GameConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: "127.0.0.1".to_string(),
            images: ImagesConfig::default(),
            similarity: SimilarityConfig::default(),
            game: GameConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Where the image files and their manifest live
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Directory holding the image files (served under `/images`)
    pub dir: PathBuf,

    /// Prefix joined to each catalog entry to form its `src`
    pub base_path: String,

    /// Manifest location: a local JSON file or an http(s) URL.
    /// Defaults to `<dir>/manifest.json` when neither this nor `entries` is set.
    pub manifest: Option<String>,

    /// Inline catalog entries; takes priority over `manifest` when present
    pub entries: Option<Vec<String>>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("images"),
            base_path: "images/".to_string(),
            manifest: None,
            entries: None,
        }
    }
}

impl ImagesConfig {
    /// Manifest location with the directory default applied
    pub fn manifest_location(&self) -> String {
        match &self.manifest {
            Some(location) => location.clone(),
            None => self.dir.join("manifest.json").to_string_lossy().to_string(),
        }
    }
}

/// Where the pairwise similarity rows live
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// JSON (or `window.SIMILARITY_DATA = [...]` script) file with similarity rows
    pub path: PathBuf,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/similarity.json"),
        }
    }
}

/// Batch sizing rules
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Batch size used when the client does not ask for one
    pub default_batch_size: usize,

    /// Upper bound for a requested batch size
    pub max_batch_size: usize,

    /// Sessions idle for longer than this are dropped
    pub session_ttl_secs: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            default_batch_size: 4,
            max_batch_size: 12,
            session_ttl_secs: 1800,
        }
    }
}

impl GameConfig {
    /// Idle lifetime of a session (at least one second)
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs.max(1))
    }

    /// Effective upper bound (never below [`MIN_BATCH_SIZE`])
    pub fn max_batch(&self) -> usize {
        self.max_batch_size.max(MIN_BATCH_SIZE)
    }

    /// Clamp a user-supplied batch size into `[MIN_BATCH_SIZE, max_batch]`
    ///
    /// Missing, non-finite or below-minimum input yields [`MIN_BATCH_SIZE`];
    /// fractional input is floored; oversized input is capped at the maximum.
    pub fn clamp_batch_size(&self, requested: Option<f64>) -> usize {
        let Some(value) = requested.filter(|v| v.is_finite()) else {
            return MIN_BATCH_SIZE;
        };
        let floored = value.floor();
        if floored < MIN_BATCH_SIZE as f64 {
            return MIN_BATCH_SIZE;
        }
        if floored >= self.max_batch() as f64 {
            return self.max_batch();
        }
        floored as usize
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_port() -> u16 {
    5780
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolves which config file (if any) to read
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Create a resolver; `cli_path` is the `--config` argument if given
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Resolve the config file path following the priority order above
    ///
    /// Returns `None` when no candidate exists, meaning compiled defaults apply.
    pub fn resolve(&self) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: User config directory
        user_config_path().filter(|path| path.exists())
    }

    /// Resolve and load, degrading to defaults on any failure
    pub fn load(&self) -> TomlConfig {
        match self.resolve() {
            Some(path) => load_or_default(&path),
            None => {
                info!("No config file found, using built-in defaults");
                TomlConfig::default()
            }
        }
    }
}

/// `<config_dir>/streetmatch/config.toml` for the current platform
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("streetmatch").join("config.toml"))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

/// Load a TOML config file, falling back to defaults with a warning
pub fn load_or_default(path: &Path) -> TomlConfig {
    match load_toml_config(path) {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            warn!("Could not load config ({}), using built-in defaults", e);
            TomlConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.port, 5780);
        assert_eq!(config.bind, "127.0.0.1");
        assert_eq!(config.images.base_path, "images/");
        assert_eq!(config.game.default_batch_size, 4);
        assert_eq!(config.game.max_batch_size, 12);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 6000

            [game]
            max_batch_size = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 6000);
        assert_eq!(config.game.max_batch_size, 8);
        assert_eq!(config.game.default_batch_size, 4);
        assert_eq!(config.images.dir, PathBuf::from("images"));
    }

    #[test]
    fn test_manifest_location_defaults_to_images_dir() {
        let images = ImagesConfig {
            dir: PathBuf::from("pics"),
            ..Default::default()
        };
        assert!(images.manifest_location().ends_with("manifest.json"));
        assert!(images.manifest_location().starts_with("pics"));

        let remote = ImagesConfig {
            manifest: Some("http://localhost/manifest.json".to_string()),
            ..Default::default()
        };
        assert_eq!(remote.manifest_location(), "http://localhost/manifest.json");
    }

    #[test]
    fn test_clamp_batch_size() {
        let game = GameConfig::default();

        assert_eq!(game.clamp_batch_size(Some(5.0)), 5);
        assert_eq!(game.clamp_batch_size(Some(5.9)), 5);
        assert_eq!(game.clamp_batch_size(Some(1.0)), 2);
        assert_eq!(game.clamp_batch_size(Some(-3.0)), 2);
        assert_eq!(game.clamp_batch_size(Some(99.0)), 12);
        assert_eq!(game.clamp_batch_size(Some(f64::NAN)), 2);
        assert_eq!(game.clamp_batch_size(Some(f64::INFINITY)), 2);
        assert_eq!(game.clamp_batch_size(None), 2);
    }

    #[test]
    fn test_session_ttl() {
        assert_eq!(GameConfig::default().session_ttl(), Duration::from_secs(1800));
        let game = GameConfig {
            session_ttl_secs: 0,
            ..Default::default()
        };
        assert_eq!(game.session_ttl(), Duration::from_secs(1));
    }

    #[test]
    fn test_max_batch_never_below_minimum() {
        let game = GameConfig {
            max_batch_size: 0,
            ..Default::default()
        };
        assert_eq!(game.max_batch(), MIN_BATCH_SIZE);
        assert_eq!(game.clamp_batch_size(Some(10.0)), MIN_BATCH_SIZE);
    }
}
