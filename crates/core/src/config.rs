//! Engine configuration with precedence and validation
//!
//! Values are resolved in order: built-in defaults, the JSON config file,
//! `DOCLIB_*` environment variables, then explicit overrides from the caller
//! (command line). Later sources win.

use crate::constants::{DOCLIB_CONFIG_VAR, DOCLIB_ROOT_VAR, MAX_TREE_DEPTH_CEILING};
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete configuration for a document service
#[derive(Debug, Clone, PartialEq)]
pub struct DocLibConfig {
    /// Root directory of the document library
    pub docs_root: PathBuf,
    /// Maximum number of cached document bodies
    pub content_cache_size: usize,
    /// Lifetime of a cached document body
    pub content_cache_ttl: Duration,
    /// Maximum number of cached metadata records
    pub metadata_cache_size: usize,
    /// Lifetime of a cached metadata record
    pub metadata_cache_ttl: Duration,
    /// Maximum number of cached breadcrumb trails
    pub breadcrumb_cache_size: usize,
    /// Lifetime of a cached breadcrumb trail
    pub breadcrumb_cache_ttl: Duration,
    /// Maximum number of cached tree snapshots (top level plus subtrees)
    pub tree_cache_size: usize,
    /// Lifetime of a cached tree snapshot
    pub tree_cache_ttl: Duration,
    /// Lifetime of the recent-documents listing
    pub recent_docs_ttl: Duration,
    /// Depth limit for explicit subtree requests
    pub max_tree_depth: usize,
    /// Quiet period that closes a batch of file system events
    pub debounce_window: Duration,
    /// Interval between maintenance passes
    pub maintenance_interval: Duration,
    /// Accesses after which a document counts as hot
    pub hot_document_threshold: u64,
    /// Deadline for the external metadata extractor
    pub metadata_timeout: Duration,
    /// Lifetime of degraded metadata served after an extractor failure
    pub degraded_ttl: Duration,
    /// Whether to start the file system watcher
    pub watch: bool,
}

impl Default for DocLibConfig {
    fn default() -> Self {
        Self {
            docs_root: PathBuf::from("static/docs"),
            content_cache_size: 100,
            content_cache_ttl: Duration::from_secs(3600), // 1 hour
            metadata_cache_size: 500,
            metadata_cache_ttl: Duration::from_secs(3600),
            breadcrumb_cache_size: 1000,
            breadcrumb_cache_ttl: Duration::from_secs(3600),
            tree_cache_size: 256,
            tree_cache_ttl: Duration::from_secs(300),
            recent_docs_ttl: Duration::from_secs(1800), // 30 minutes
            max_tree_depth: MAX_TREE_DEPTH_CEILING,
            debounce_window: Duration::from_secs(1),
            maintenance_interval: Duration::from_secs(60),
            hot_document_threshold: 5,
            metadata_timeout: Duration::from_secs(10),
            degraded_ttl: Duration::from_secs(30),
            watch: true,
        }
    }
}

impl DocLibConfig {
    /// Configuration with defaults rooted at `docs_root`
    #[must_use]
    pub fn with_root(docs_root: impl Into<PathBuf>) -> Self {
        Self {
            docs_root: docs_root.into(),
            ..Self::default()
        }
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("content_cache_size", self.content_cache_size),
            ("metadata_cache_size", self.metadata_cache_size),
            ("breadcrumb_cache_size", self.breadcrumb_cache_size),
            ("tree_cache_size", self.tree_cache_size),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(Error::configuration(format!("{name} must be at least 1")));
            }
        }

        let durations = [
            ("debounce_window", self.debounce_window),
            ("maintenance_interval", self.maintenance_interval),
            ("metadata_timeout", self.metadata_timeout),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(Error::configuration(format!("{name} must be non-zero")));
            }
        }

        if self.max_tree_depth > MAX_TREE_DEPTH_CEILING {
            return Err(Error::configuration(format!(
                "max_tree_depth {} exceeds the ceiling of {MAX_TREE_DEPTH_CEILING}",
                self.max_tree_depth
            )));
        }

        if self.hot_document_threshold == 0 {
            return Err(Error::configuration("hot_document_threshold must be at least 1"));
        }

        Ok(())
    }

    /// Overlay values from a parsed config file.
    ///
    /// Keys match [`ConfigOverlay`]. Unknown keys and wrongly typed values
    /// are rejected.
    pub fn apply_json(&mut self, value: &serde_json::Value) -> Result<()> {
        if !value.is_object() {
            return Err(Error::configuration("config file must contain a JSON object"));
        }
        let overlay: ConfigOverlay = serde_json::from_value(value.clone())
            .map_err(|e| Error::configuration(format!("invalid config file: {e}")))?;
        overlay.apply_to(self);
        Ok(())
    }

    /// Overlay values from `DOCLIB_*` variables resolved through `lookup`.
    ///
    /// Returns whether any variable was present.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<bool>
    where
        F: Fn(&str) -> Option<String>,
    {
        let overlay = ConfigOverlay::from_env(lookup)?;
        Ok(overlay.apply_to(self))
    }
}

/// A partial configuration read from a config file or the environment.
///
/// Sizes are plain integers and durations are whole seconds, except
/// `debounce_window_ms` and `metadata_timeout_ms`. Environment variables use
/// the upper-cased key with a `DOCLIB_` prefix; `docs_root` is `DOCLIB_ROOT`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverlay {
    pub docs_root: Option<PathBuf>,
    pub content_cache_size: Option<usize>,
    pub content_cache_ttl: Option<u64>,
    pub metadata_cache_size: Option<usize>,
    pub metadata_cache_ttl: Option<u64>,
    pub breadcrumb_cache_size: Option<usize>,
    pub breadcrumb_cache_ttl: Option<u64>,
    pub tree_cache_size: Option<usize>,
    pub tree_cache_ttl: Option<u64>,
    pub recent_docs_ttl: Option<u64>,
    pub max_tree_depth: Option<usize>,
    pub debounce_window_ms: Option<u64>,
    pub maintenance_interval: Option<u64>,
    pub hot_document_threshold: Option<u64>,
    pub metadata_timeout_ms: Option<u64>,
    pub degraded_ttl: Option<u64>,
    pub watch: Option<bool>,
}

impl ConfigOverlay {
    /// Read every `DOCLIB_*` variable through `lookup`
    pub fn from_env<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| format!("DOCLIB_{}", key.to_ascii_uppercase());
        let number = |key: &str| -> Result<Option<u64>> {
            let name = var(key);
            lookup(&name)
                .map(|raw| {
                    raw.trim().parse::<u64>().map_err(|e| {
                        Error::configuration(format!("{name} must be an unsigned integer: {e}"))
                    })
                })
                .transpose()
        };
        let size = |key: &str| -> Result<Option<usize>> {
            let name = var(key);
            lookup(&name)
                .map(|raw| {
                    raw.trim().parse::<usize>().map_err(|e| {
                        Error::configuration(format!("{name} must be an unsigned integer: {e}"))
                    })
                })
                .transpose()
        };
        let flag = |key: &str| -> Result<Option<bool>> {
            let name = var(key);
            lookup(&name)
                .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
                    "1" | "true" | "yes" | "on" => Ok(true),
                    "0" | "false" | "no" | "off" => Ok(false),
                    other => Err(Error::configuration(format!(
                        "{name} must be a boolean, got '{other}'"
                    ))),
                })
                .transpose()
        };

        Ok(Self {
            docs_root: lookup(DOCLIB_ROOT_VAR).map(PathBuf::from),
            content_cache_size: size("content_cache_size")?,
            content_cache_ttl: number("content_cache_ttl")?,
            metadata_cache_size: size("metadata_cache_size")?,
            metadata_cache_ttl: number("metadata_cache_ttl")?,
            breadcrumb_cache_size: size("breadcrumb_cache_size")?,
            breadcrumb_cache_ttl: number("breadcrumb_cache_ttl")?,
            tree_cache_size: size("tree_cache_size")?,
            tree_cache_ttl: number("tree_cache_ttl")?,
            recent_docs_ttl: number("recent_docs_ttl")?,
            max_tree_depth: size("max_tree_depth")?,
            debounce_window_ms: number("debounce_window_ms")?,
            maintenance_interval: number("maintenance_interval")?,
            hot_document_threshold: number("hot_document_threshold")?,
            metadata_timeout_ms: number("metadata_timeout_ms")?,
            degraded_ttl: number("degraded_ttl")?,
            watch: flag("watch")?,
        })
    }

    /// Copy every present value into `config`; returns whether any was present
    pub fn apply_to(self, config: &mut DocLibConfig) -> bool {
        fn set<T>(slot: &mut T, value: Option<T>, found: &mut bool) {
            if let Some(value) = value {
                *slot = value;
                *found = true;
            }
        }
        let secs = |v: Option<u64>| v.map(Duration::from_secs);
        let millis = |v: Option<u64>| v.map(Duration::from_millis);

        let mut found = false;
        set(&mut config.docs_root, self.docs_root, &mut found);
        set(&mut config.content_cache_size, self.content_cache_size, &mut found);
        set(&mut config.content_cache_ttl, secs(self.content_cache_ttl), &mut found);
        set(&mut config.metadata_cache_size, self.metadata_cache_size, &mut found);
        set(&mut config.metadata_cache_ttl, secs(self.metadata_cache_ttl), &mut found);
        set(&mut config.breadcrumb_cache_size, self.breadcrumb_cache_size, &mut found);
        set(&mut config.breadcrumb_cache_ttl, secs(self.breadcrumb_cache_ttl), &mut found);
        set(&mut config.tree_cache_size, self.tree_cache_size, &mut found);
        set(&mut config.tree_cache_ttl, secs(self.tree_cache_ttl), &mut found);
        set(&mut config.recent_docs_ttl, secs(self.recent_docs_ttl), &mut found);
        set(&mut config.max_tree_depth, self.max_tree_depth, &mut found);
        set(&mut config.debounce_window, millis(self.debounce_window_ms), &mut found);
        set(&mut config.maintenance_interval, secs(self.maintenance_interval), &mut found);
        set(&mut config.hot_document_threshold, self.hot_document_threshold, &mut found);
        set(&mut config.metadata_timeout, millis(self.metadata_timeout_ms), &mut found);
        set(&mut config.degraded_ttl, secs(self.degraded_ttl), &mut found);
        set(&mut config.watch, self.watch, &mut found);
        found
    }
}

/// Source of configuration for debugging and precedence tracking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default configuration
    Default,
    /// Configuration file
    ConfigFile(PathBuf),
    /// Environment variable
    EnvironmentVariable(String),
    /// Command line argument
    CommandLine,
}

/// Configuration loader that handles precedence
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from defaults, config file and environment.
    ///
    /// Returns the configuration and the sources that contributed to it.
    pub fn load(explicit_file: Option<PathBuf>) -> Result<(DocLibConfig, Vec<ConfigSource>)> {
        let mut config = DocLibConfig::default();
        let mut sources = vec![ConfigSource::Default];

        let file = match explicit_file {
            Some(path) => Some(path),
            None => match std::env::var(DOCLIB_CONFIG_VAR) {
                Ok(path) => Some(PathBuf::from(path)),
                Err(_) => Self::default_config_file_path(),
            },
        };

        if let Some(path) = file {
            if path.exists() {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| Error::file_system(&path, "read config file", e))?;
                let value: serde_json::Value = serde_json::from_str(&content)?;
                config.apply_json(&value)?;
                sources.push(ConfigSource::ConfigFile(path));
            }
        }

        if config.apply_env(|name| std::env::var(name).ok())? {
            sources.push(ConfigSource::EnvironmentVariable("DOCLIB_*".to_string()));
        }

        config.validate()?;
        Ok((config, sources))
    }

    /// `$XDG_CONFIG_HOME/doclib/config.json`, falling back to the platform config dir
    fn default_config_file_path() -> Option<PathBuf> {
        let config_dir = match std::env::var("XDG_CONFIG_HOME") {
            Ok(xdg_config_home) => PathBuf::from(xdg_config_home),
            Err(_) => dirs::config_dir()?,
        };
        Some(config_dir.join("doclib").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = DocLibConfig::default();
        config.validate().unwrap();
        assert_eq!(config.content_cache_size, 100);
        assert_eq!(config.debounce_window, Duration::from_secs(1));
        assert_eq!(config.hot_document_threshold, 5);
    }

    #[test]
    fn test_apply_json_overrides() {
        let mut config = DocLibConfig::default();
        let value = serde_json::json!({
            "docs_root": "/srv/library",
            "content_cache_size": 10,
            "content_cache_ttl": 60,
            "debounce_window_ms": 250,
            "watch": false
        });
        config.apply_json(&value).unwrap();

        assert_eq!(config.docs_root, PathBuf::from("/srv/library"));
        assert_eq!(config.content_cache_size, 10);
        assert_eq!(config.content_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.debounce_window, Duration::from_millis(250));
        assert!(!config.watch);
        // untouched values keep their defaults
        assert_eq!(config.metadata_cache_size, 500);
    }

    #[test]
    fn test_apply_json_rejects_non_object() {
        let mut config = DocLibConfig::default();
        assert!(config.apply_json(&serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn test_apply_env() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DOCLIB_ROOT", "/tmp/docs"),
            ("DOCLIB_METADATA_TIMEOUT_MS", "1500"),
            ("DOCLIB_HOT_DOCUMENT_THRESHOLD", "3"),
        ]);
        let mut config = DocLibConfig::default();
        let found = config
            .apply_env(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert!(found);
        assert_eq!(config.docs_root, PathBuf::from("/tmp/docs"));
        assert_eq!(config.metadata_timeout, Duration::from_millis(1500));
        assert_eq!(config.hot_document_threshold, 3);
    }

    #[test]
    fn test_apply_env_invalid_number() {
        let mut config = DocLibConfig::default();
        let result = config.apply_env(|name| {
            (name == "DOCLIB_CONTENT_CACHE_SIZE").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_apply_json_rejects_wrong_types() {
        let mut config = DocLibConfig::default();
        let value = serde_json::json!({"content_cache_size": "10"});
        assert!(matches!(
            config.apply_json(&value),
            Err(Error::Configuration { .. })
        ));

        let value = serde_json::json!({"content_cache_ttl": -5});
        assert!(config.apply_json(&value).is_err());
        assert_eq!(config, DocLibConfig::default());
    }

    #[test]
    fn test_apply_json_rejects_unknown_keys() {
        let mut config = DocLibConfig::default();
        let value = serde_json::json!({"content_cache_sise": 10});
        let err = config.apply_json(&value).unwrap_err();
        assert!(err.to_string().contains("content_cache_sise"));
    }

    #[test]
    fn test_apply_env_covers_every_key() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DOCLIB_BREADCRUMB_CACHE_SIZE", "7"),
            ("DOCLIB_BREADCRUMB_CACHE_TTL", "8"),
            ("DOCLIB_TREE_CACHE_SIZE", "9"),
            ("DOCLIB_TREE_CACHE_TTL", "10"),
            ("DOCLIB_RECENT_DOCS_TTL", "11"),
            ("DOCLIB_DEGRADED_TTL", "12"),
            ("DOCLIB_WATCH", "false"),
        ]);
        let mut config = DocLibConfig::default();
        assert!(config
            .apply_env(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap());

        assert_eq!(config.breadcrumb_cache_size, 7);
        assert_eq!(config.breadcrumb_cache_ttl, Duration::from_secs(8));
        assert_eq!(config.tree_cache_size, 9);
        assert_eq!(config.tree_cache_ttl, Duration::from_secs(10));
        assert_eq!(config.recent_docs_ttl, Duration::from_secs(11));
        assert_eq!(config.degraded_ttl, Duration::from_secs(12));
        assert!(!config.watch);
    }

    #[test]
    fn test_apply_env_without_variables() {
        let mut config = DocLibConfig::default();
        assert!(!config.apply_env(|_| None).unwrap());
        assert_eq!(config, DocLibConfig::default());
    }

    #[test]
    fn test_apply_env_invalid_flag() {
        let mut config = DocLibConfig::default();
        let result = config.apply_env(|name| (name == "DOCLIB_WATCH").then(|| "maybe".to_string()));
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_sizes_and_deep_trees() {
        let config = DocLibConfig {
            content_cache_size: 0,
            ..DocLibConfig::default()
        };
        assert!(config.validate().is_err());

        let config = DocLibConfig {
            max_tree_depth: MAX_TREE_DEPTH_CEILING + 1,
            ..DocLibConfig::default()
        };
        assert!(config.validate().is_err());

        let config = DocLibConfig {
            debounce_window: Duration::ZERO,
            ..DocLibConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"tree_cache_size": 8, "tree_cache_ttl": 5}"#).unwrap();

        let (config, sources) = ConfigLoader::load(Some(path.clone())).unwrap();
        assert_eq!(config.tree_cache_size, 8);
        assert_eq!(config.tree_cache_ttl, Duration::from_secs(5));
        assert!(sources.contains(&ConfigSource::ConfigFile(path)));
    }
}
