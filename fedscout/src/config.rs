use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{ScoutResult, SearchError};
use crate::ranking::DEFAULT_PARALLEL_THRESHOLD;
use crate::search::DEFAULT_BATCH_SIZE;

/// Engine configuration: worker pools, batching, deadlines and ranking knobs.
///
/// # Configuration Locations
///
/// Files are merged in order of increasing precedence:
/// 1. Global `$CONFIG_DIR/fedscout/config.yaml`
/// 2. Local `.fedscout.yaml` in the current directory
/// 3. Custom config file passed to `load_from` (the CLI's `--config` flag)
///
/// Missing files are skipped; every field has a default.
///
/// # Configuration Format
///
/// ```yaml
/// # Threads running performers
/// perform_threads: 3
///
/// # Threads running crawler performers and crawl tasks
/// crawl_threads: 6
///
/// # Results per delivered batch
/// batch_size: 100
///
/// # Cooperative deadline per performer (humantime syntax)
/// performer_timeout: "30s"
///
/// # Drop English/Spanish/German stopwords from ranking tokens
/// remove_stopwords: false
///
/// # Batch size at which ranking keys are computed in parallel
/// parallel_rank_threshold: 512
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "warn"
/// ```
///
/// # CLI Integration
///
/// Command-line values take precedence over file values; see `merge_with_cli`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_perform_threads")]
    pub perform_threads: NonZeroUsize,

    #[serde(default = "default_crawl_threads")]
    pub crawl_threads: NonZeroUsize,

    /// Results per batch handed to the listener
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Deadline after which a performer's further batches are refused,
    /// e.g. `"30s"` or `"1m 30s"`
    #[serde(default)]
    pub performer_timeout: Option<String>,

    #[serde(default)]
    pub remove_stopwords: bool,

    #[serde(default = "default_parallel_rank_threshold")]
    pub parallel_rank_threshold: usize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_perform_threads() -> NonZeroUsize {
    NonZeroUsize::new(3).unwrap_or(NonZeroUsize::MIN)
}

fn default_crawl_threads() -> NonZeroUsize {
    NonZeroUsize::new(6).unwrap_or(NonZeroUsize::MIN)
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_parallel_rank_threshold() -> usize {
    DEFAULT_PARALLEL_THRESHOLD
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            perform_threads: default_perform_threads(),
            crawl_threads: default_crawl_threads(),
            batch_size: default_batch_size(),
            performer_timeout: None,
            remove_stopwords: false,
            parallel_rank_threshold: default_parallel_rank_threshold(),
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from the default locations
    pub fn load() -> ScoutResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus a specific file.
    ///
    /// An explicitly named file must exist.
    pub fn load_from(config_path: Option<&Path>) -> ScoutResult<Self> {
        let mut builder = ConfigBuilder::builder();

        let defaults = [
            dirs::config_dir().map(|p| p.join("fedscout/config.yaml")),
            Some(PathBuf::from(".fedscout.yaml")),
        ];
        for path in defaults.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(SearchError::config_error(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path));
        }

        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| SearchError::config_error(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the engine cannot run with
    pub fn validate(&self) -> ScoutResult<()> {
        if self.batch_size == 0 {
            return Err(SearchError::config_error("batch_size must be greater than 0"));
        }
        self.performer_deadline()?;
        Ok(())
    }

    /// Parsed `performer_timeout`
    pub fn performer_deadline(&self) -> ScoutResult<Option<Duration>> {
        match &self.performer_timeout {
            None => Ok(None),
            Some(text) => humantime::parse_duration(text).map(Some).map_err(|e| {
                SearchError::config_error(format!("invalid performer_timeout '{}': {}", text, e))
            }),
        }
    }

    /// Applies command-line overrides on top of file values.
    ///
    /// Only values the user actually passed replace file values, so an
    /// override equal to the default still wins over a file setting.
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if let Some(threads) = cli.perform_threads {
            self.perform_threads = threads;
        }
        if let Some(threads) = cli.crawl_threads {
            self.crawl_threads = threads;
        }
        if let Some(batch_size) = cli.batch_size {
            self.batch_size = batch_size;
        }
        if cli.performer_timeout.is_some() {
            self.performer_timeout = cli.performer_timeout;
        }
        if cli.remove_stopwords {
            self.remove_stopwords = true;
        }
        if let Some(threshold) = cli.parallel_rank_threshold {
            self.parallel_rank_threshold = threshold;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }
}

/// Values given on the command line; `None` means "not passed"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub perform_threads: Option<NonZeroUsize>,
    pub crawl_threads: Option<NonZeroUsize>,
    pub batch_size: Option<usize>,
    pub performer_timeout: Option<String>,
    /// A flag: passing it turns stopword removal on
    pub remove_stopwords: bool,
    pub parallel_rank_threshold: Option<usize>,
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        config_path
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let config_path = write_config(
            dir.path(),
            r#"
            perform_threads: 2
            crawl_threads: 4
            batch_size: 50
            performer_timeout: "1m 30s"
            remove_stopwords: true
            parallel_rank_threshold: 1000
            log_level: "debug"
        "#,
        );

        let config = EngineConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.perform_threads, NonZeroUsize::new(2).unwrap());
        assert_eq!(config.crawl_threads, NonZeroUsize::new(4).unwrap());
        assert_eq!(config.batch_size, 50);
        assert_eq!(
            config.performer_deadline().unwrap(),
            Some(Duration::from_secs(90))
        );
        assert!(config.remove_stopwords);
        assert_eq!(config.parallel_rank_threshold, 1000);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_default_values() {
        let dir = tempdir().unwrap();
        let config_path = write_config(dir.path(), "log_level: \"info\"\n");

        let config = EngineConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.perform_threads.get(), 3);
        assert_eq!(config.crawl_threads.get(), 6);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.performer_deadline().unwrap(), None);
        assert!(!config.remove_stopwords);
        assert_eq!(config.parallel_rank_threshold, 512);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_merge_with_cli() {
        let file_config = EngineConfig {
            perform_threads: NonZeroUsize::new(2).unwrap(),
            batch_size: 25,
            performer_timeout: Some("5s".to_string()),
            log_level: "info".to_string(),
            ..EngineConfig::default()
        };
        let cli = CliOverrides {
            crawl_threads: NonZeroUsize::new(1),
            performer_timeout: Some("10s".to_string()),
            remove_stopwords: true,
            ..CliOverrides::default()
        };

        let merged = file_config.merge_with_cli(cli);
        assert_eq!(merged.perform_threads.get(), 2); // File value
        assert_eq!(merged.crawl_threads.get(), 1); // CLI value
        assert_eq!(merged.batch_size, 25); // File value
        assert_eq!(merged.performer_timeout.as_deref(), Some("10s")); // CLI value
        assert!(merged.remove_stopwords); // CLI value
        assert_eq!(merged.log_level, "info"); // File value (not passed)
    }

    #[test]
    fn test_cli_value_equal_to_default_overrides_file() {
        let file_config = EngineConfig {
            perform_threads: NonZeroUsize::new(2).unwrap(),
            log_level: "debug".to_string(),
            ..EngineConfig::default()
        };
        let cli = CliOverrides {
            perform_threads: NonZeroUsize::new(3),
            log_level: Some("warn".to_string()),
            ..CliOverrides::default()
        };

        let merged = file_config.merge_with_cli(cli);
        assert_eq!(merged.perform_threads.get(), 3);
        assert_eq!(merged.log_level, "warn");
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let dir = tempdir().unwrap();
        let config_path = write_config(dir.path(), "batch_size: 0\n");

        let err = EngineConfig::load_from(Some(&config_path)).unwrap_err();
        assert!(matches!(err, SearchError::ConfigError(_)));
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let config = EngineConfig {
            performer_timeout: Some("soon".to_string()),
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SearchError::ConfigError(_))
        ));
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempdir().unwrap();
        let config_path = write_config(
            dir.path(),
            r#"
            perform_threads: "many"  # Should be number
            batch_size: []           # Should be number
        "#,
        );

        let result = EngineConfig::load_from(Some(&config_path));
        assert!(result.is_err(), "Expected error loading invalid config");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = EngineConfig::load_from(Some(Path::new("nonexistent.yaml")));
        assert!(matches!(result, Err(SearchError::ConfigError(_))));
    }
}
