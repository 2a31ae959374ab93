use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use gallery_ingest_adapters::snowflake::MAX_NODE_ID;
use gallery_ingest_application::{ApplicationError, PipelineConfig, StorageLayout};
use gallery_ingest_domain::DEFAULT_CAPTURE_OFFSET_HOURS;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub catalog_path: PathBuf,
    pub log_level: String,
    pub storage: StorageConfig,
    pub pipeline: PipelineSettings,
    pub ids: IdConfig,
    pub status: StatusConfig,
    pub channel: ChannelConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub full_size_dir: PathBuf,
    pub medium_dir: PathBuf,
    pub thumbnail_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
    pub medium_budget_kb: u64,
    pub thumbnail_budget_kb: u64,
    pub workers: usize,
    pub default_author: String,
    pub capture_time_offset_hours: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdConfig {
    pub machine_id: u64,
    pub datacenter_id: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatusConfig {
    pub ttl_hours: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelConfig {
    pub consumers: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("catalog.sqlite3"),
            log_level: "info".to_string(),
            storage: StorageConfig::default(),
            pipeline: PipelineSettings::default(),
            ids: IdConfig::default(),
            status: StatusConfig::default(),
            channel: ChannelConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            full_size_dir: PathBuf::from("storage/full"),
            medium_dir: PathBuf::from("storage/1000K"),
            thumbnail_dir: PathBuf::from("storage/100K"),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            medium_budget_kb: 1000,
            thumbnail_budget_kb: 100,
            workers: thread::available_parallelism().map_or(1, NonZeroUsize::get),
            default_author: "gallery".to_string(),
            capture_time_offset_hours: DEFAULT_CAPTURE_OFFSET_HOURS,
        }
    }
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            machine_id: 1,
            datacenter_id: 1,
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self { ttl_hours: 24 }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { consumers: 1 }
    }
}

impl AppConfig {
    /// Reads `path` as TOML. No path, or a path that does not exist, gives
    /// the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ApplicationError> {
        let Some(path) = path.filter(|path| path.exists()) else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path).map_err(|error| {
            ApplicationError::Configuration(format!("cannot read {}: {error}", path.display()))
        })?;
        let config: Self = toml::from_str(&raw).map_err(|error| {
            ApplicationError::Configuration(format!("invalid {}: {error}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ApplicationError> {
        let problem = if self.ids.machine_id > MAX_NODE_ID {
            Some(format!("ids.machine_id must be at most {MAX_NODE_ID}"))
        } else if self.ids.datacenter_id > MAX_NODE_ID {
            Some(format!("ids.datacenter_id must be at most {MAX_NODE_ID}"))
        } else if self.pipeline.medium_budget_kb == 0 || self.pipeline.thumbnail_budget_kb == 0 {
            Some("rendition budgets must be positive".to_string())
        } else if self.pipeline.workers == 0 {
            Some("pipeline.workers must be positive".to_string())
        } else if self.channel.consumers == 0 {
            Some("channel.consumers must be positive".to_string())
        } else if self.catalog_path.as_os_str().is_empty() {
            Some("catalog_path must not be empty".to_string())
        } else {
            None
        };
        match problem {
            Some(reason) => Err(ApplicationError::Configuration(reason)),
            None => Ok(()),
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            layout: StorageLayout {
                full_size_dir: self.storage.full_size_dir.clone(),
                medium_dir: self.storage.medium_dir.clone(),
                thumbnail_dir: self.storage.thumbnail_dir.clone(),
            },
            medium_budget_bytes: self.pipeline.medium_budget_kb * 1024,
            thumbnail_budget_bytes: self.pipeline.thumbnail_budget_kb * 1024,
            default_author: self.pipeline.default_author.clone(),
        }
    }

    pub fn status_ttl(&self) -> Duration {
        Duration::from_secs(self.status.ttl_hours.saturating_mul(3600))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("gallery-ingest.toml");
        fs::write(&path, body).expect("write");
        path
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let config = AppConfig::load(Some(&dir.path().join("absent.toml"))).expect("load");

        assert_eq!(config, AppConfig::default());
        assert_eq!(config.pipeline_config().medium_budget_bytes, 1000 * 1024);
        assert_eq!(config.pipeline_config().thumbnail_budget_bytes, 100 * 1024);
        assert_eq!(config.status_ttl(), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(
            &dir,
            r#"
catalog_path = "db/photos.sqlite3"

[pipeline]
thumbnail_budget_kb = 50
workers = 3

[ids]
machine_id = 7
"#,
        );

        let config = AppConfig::load(Some(&path)).expect("load");

        assert_eq!(config.catalog_path, PathBuf::from("db/photos.sqlite3"));
        assert_eq!(config.pipeline.thumbnail_budget_kb, 50);
        assert_eq!(config.pipeline.medium_budget_kb, 1000);
        assert_eq!(config.pipeline.workers, 3);
        assert_eq!(config.ids.machine_id, 7);
        assert_eq!(config.ids.datacenter_id, 1);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn out_of_range_node_id_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(&dir, "[ids]\ndatacenter_id = 32\n");

        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(ApplicationError::Configuration(_))
        ));
    }

    #[test]
    fn zero_budget_and_zero_workers_are_rejected() {
        let mut config = AppConfig::default();
        config.pipeline.medium_budget_kb = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.pipeline.workers = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.channel.consumers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_a_configuration_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(&dir, "catalog_path = [\n");

        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(ApplicationError::Configuration(_))
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(&dir, "[pipeline]\nworker = 2\n");

        assert!(AppConfig::load(Some(&path)).is_err());
    }
}
