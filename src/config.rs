use crate::poller::{NotificationPermission, DEFAULT_INTERVAL, DEFAULT_TOLERANCE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TABLE: &str = "taches";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("serializing config: {0}")]
    Serialize(#[from] serde_yaml::Error),
    #[error("no backend configured: set backend_url and anon_key in {0:?} or TACHES_BACKEND_URL / TACHES_ANON_KEY")]
    MissingBackend(PathBuf),
    #[error("config file already exists: {0:?}")]
    AlreadyExists(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend_url: Option<String>,
    pub anon_key: Option<String>,
    pub table: String,
    pub poll_interval_secs: u64,
    pub reminder_tolerance_secs: u64,
    pub notifications: NotificationPermission,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend_url: None,
            anon_key: None,
            table: DEFAULT_TABLE.to_string(),
            poll_interval_secs: DEFAULT_INTERVAL.as_secs(),
            reminder_tolerance_secs: DEFAULT_TOLERANCE.as_secs(),
            notifications: NotificationPermission::System,
        }
    }
}

/// Everything the HTTP adapter needs.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    pub table: String,
}

impl Config {
    /// Reads `path` if it exists, otherwise starts from defaults, then
    /// applies environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            serde_yaml::from_str(&data).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn default_path() -> anyhow::Result<PathBuf> {
        Ok(crate::storage::config_dir()?.join("config.yml"))
    }

    /// Writes a template; refuses to overwrite an existing file.
    pub fn write_template(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let template = Config {
            backend_url: Some("https://your-project.supabase.co".into()),
            anon_key: Some("your-anon-key".into()),
            ..Config::default()
        };
        fs::write(path, serde_yaml::to_string(&template)?).map_err(io_err)?;
        Ok(())
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("TACHES_BACKEND_URL").filter(|v| !v.is_empty()) {
            self.backend_url = Some(url);
        }
        if let Some(key) = lookup("TACHES_ANON_KEY").filter(|v| !v.is_empty()) {
            self.anon_key = Some(key);
        }
    }

    pub fn backend(&self, source: &Path) -> Result<BackendConfig, ConfigError> {
        match (&self.backend_url, &self.anon_key) {
            (Some(url), Some(key)) if !url.trim().is_empty() && !key.trim().is_empty() => {
                Ok(BackendConfig {
                    url: url.trim().trim_end_matches('/').to_string(),
                    anon_key: key.trim().to_string(),
                    table: self.table.clone(),
                })
            }
            _ => Err(ConfigError::MissingBackend(source.to_path_buf())),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn reminder_tolerance(&self) -> Duration {
        Duration::from_secs(self.reminder_tolerance_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(
            &path,
            "backend_url: https://abc.supabase.co/\nanon_key: key\nnotifications: alert\n",
        )
        .unwrap();
        let config: Config = serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(config.table, "taches");
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.reminder_tolerance(), Duration::from_secs(60));
        assert_eq!(config.notifications, NotificationPermission::Alert);
        let backend = config.backend(&path).unwrap();
        assert_eq!(backend.url, "https://abc.supabase.co");
    }

    #[test]
    fn missing_backend_is_reported() {
        let config = Config::default();
        assert!(matches!(
            config.backend(Path::new("config.yml")),
            Err(ConfigError::MissingBackend(_))
        ));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config {
            backend_url: Some("https://file".into()),
            ..Config::default()
        };
        config.apply_env(|key| match key {
            "TACHES_BACKEND_URL" => Some("https://env".into()),
            "TACHES_ANON_KEY" => Some("env-key".into()),
            _ => None,
        });
        assert_eq!(config.backend_url.as_deref(), Some("https://env"));
        assert_eq!(config.anon_key.as_deref(), Some("env-key"));
    }

    #[test]
    fn template_is_loadable_and_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("config.yml");
        Config::write_template(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let config: Config = serde_yaml::from_str(&text).unwrap();
        assert_eq!(config.notifications, NotificationPermission::System);
        assert!(matches!(
            Config::write_template(&path),
            Err(ConfigError::AlreadyExists(_))
        ));
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "poll_interval_secs: soon").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }
}
