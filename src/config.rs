//! Options and config file handling
//!
//! `FlipbookOptions` controls scheduling (parallel vs serial, sweep step,
//! worker count). It can be loaded from `flipbook.json`; CLI flags override
//! whatever the file says.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name looked up in the config directory
pub const CONFIG_FILE: &str = "flipbook.json";

/// Scheduling options for one flipbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlipbookOptions {
    /// Issue sweep fetches without waiting for earlier ones (faster, more CPU)
    pub parallel_fetch: bool,
    /// Largest sweep step; the sweep walks step = load_step..=1
    pub load_step: usize,
    /// Worker threads for parallel mode (None = 75% of cores)
    pub workers: Option<usize>,
}

impl Default for FlipbookOptions {
    fn default() -> Self {
        Self {
            parallel_fetch: true,
            load_step: 10,
            workers: None,
        }
    }
}

impl FlipbookOptions {
    /// Serial fetching with the default step
    pub fn serial() -> Self {
        Self {
            parallel_fetch: false,
            ..Self::default()
        }
    }

    /// Worker count actually used in parallel mode
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| num_cpus::get() * 3 / 4)
            .max(1)
    }

    /// Read options from a JSON file. Missing fields fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let options: Self = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        debug!("Loaded options from {}: {:?}", path.display(), options);
        Ok(options)
    }

    /// Load from the resolved config file if it exists, defaults otherwise.
    pub fn load_or_default(config: &PathConfig) -> Result<Self> {
        let path = config_file(CONFIG_FILE, config);
        if path.exists() {
            Self::load(&path)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Write options as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize options")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

/// Configuration for overriding the default config directory
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args -> ENV var (FLIPBOOK_CONFIG_DIR) -> None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| {
            std::env::var("FLIPBOOK_CONFIG_DIR")
                .ok()
                .map(PathBuf::from)
        });

        Self { config_dir }
    }
}

/// Get path to a configuration file
///
/// Priority:
/// 1. CLI --config-dir argument
/// 2. FLIPBOOK_CONFIG_DIR environment variable
/// 3. Local folder IF flipbook.json exists there
/// 4. Platform-specific config directory from dirs-next (default)
///
/// Platform paths:
/// - Linux: ~/.config/flipbook/{name}
/// - macOS: ~/Library/Application Support/flipbook/{name}
/// - Windows: %APPDATA%\flipbook\{name}
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    get_config_dir(config).join(name)
}

/// Create the config directory if missing
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = get_config_dir(config);
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
    }
    Ok(())
}

fn get_config_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }

    if let Ok(current_dir) = std::env::current_dir() {
        if current_dir.join(CONFIG_FILE).exists() {
            return current_dir;
        }
    }

    if let Some(dir) = dirs_next::config_dir() {
        return dir.join("flipbook");
    }

    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("flipbook_cfg_{}_{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_defaults() {
        let o = FlipbookOptions::default();
        assert!(o.parallel_fetch);
        assert_eq!(o.load_step, 10);
        assert!(o.worker_count() >= 1);
        assert!(!FlipbookOptions::serial().parallel_fetch);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let o: FlipbookOptions = serde_json::from_str(r#"{ "load_step": 4 }"#).unwrap();
        assert_eq!(o.load_step, 4);
        assert!(o.parallel_fetch);
        assert_eq!(o.workers, None);
    }

    #[test]
    fn test_save_load_via_config_dir() {
        let dir = temp_dir("save");
        let paths = PathConfig::from_env_and_cli(Some(dir.clone()));
        let o = FlipbookOptions {
            parallel_fetch: false,
            load_step: 3,
            workers: Some(2),
        };
        o.save(&config_file(CONFIG_FILE, &paths)).unwrap();

        assert_eq!(FlipbookOptions::load_or_default(&paths).unwrap(), o);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_config_is_default() {
        let dir = temp_dir("missing");
        let paths = PathConfig::from_env_and_cli(Some(dir.clone()));
        assert_eq!(FlipbookOptions::load_or_default(&paths).unwrap(), FlipbookOptions::default());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_bad_json_is_error() {
        let dir = temp_dir("bad");
        let path = dir.join(CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(FlipbookOptions::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
