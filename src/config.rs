//! Settings read from `supplier-score.toml`, then overridden by flags and
//! environment variables.
use crate::auth::DEFAULT_API_TIMEOUT_SECS;
use crate::error::ConfigError;
use crate::ingest::{DEFAULT_SHEET2, DEFAULT_SHEET3};
use crate::output::EXPORT_FILE_NAME;
use crate::remote::DEFAULT_ANALYZE_TIMEOUT_SECS;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "supplier-score.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: Option<String>,
    pub sheet2: String,
    pub sheet3: String,
    pub state_dir: PathBuf,
    pub export_path: PathBuf,
    pub log_level: String,
    pub analyze_timeout_secs: u64,
    pub api_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            sheet2: DEFAULT_SHEET2.to_string(),
            sheet3: DEFAULT_SHEET3.to_string(),
            state_dir: PathBuf::from("./.supplier-score"),
            export_path: PathBuf::from(EXPORT_FILE_NAME),
            log_level: "info".to_string(),
            analyze_timeout_secs: DEFAULT_ANALYZE_TIMEOUT_SECS,
            api_timeout_secs: DEFAULT_API_TIMEOUT_SECS,
        }
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub state_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Read `explicit` if given, else the default file when it exists, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let p = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !p.exists() {
                    return Ok(Self::default());
                }
                p
            }
        };
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text, &path)
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(url) = overrides.api_url {
            self.api_url = Some(url);
        }
        if let Some(dir) = overrides.state_dir {
            self.state_dir = dir;
        }
        self
    }

    /// Backend base URL without a trailing `/`; blank means none.
    pub fn api_url(&self) -> Option<&str> {
        self.api_url
            .as_deref()
            .map(|u| u.trim().trim_end_matches('/'))
            .filter(|u| !u.is_empty())
    }

    pub fn analyze_timeout(&self) -> Duration {
        Duration::from_secs(self.analyze_timeout_secs)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.state_dir.join(crate::store::DATASET_FILE_NAME)
    }

    pub fn session_path(&self) -> PathBuf {
        self.state_dir.join(crate::auth::SESSION_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = Config::from_toml_str(
            "api_url = \"http://localhost:8000/\"\nsheet2 = \"Epicerie\"\n",
            Path::new("t.toml"),
        )
        .unwrap();
        assert_eq!(cfg.api_url(), Some("http://localhost:8000"));
        assert_eq!(cfg.sheet2, "Epicerie");
        assert_eq!(cfg.sheet3, DEFAULT_SHEET3);
        assert_eq!(cfg.analyze_timeout(), Duration::from_secs(120));
        assert_eq!(cfg.api_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn blank_api_url_is_not_configured() {
        let cfg = Config {
            api_url: Some("  ".into()),
            ..Config::default()
        };
        assert_eq!(cfg.api_url(), None);
        assert_eq!(Config::default().api_url(), None);
    }

    #[test]
    fn overrides_win_over_file() {
        let cfg = Config::from_toml_str("api_url = \"http://a\"\nstate_dir = \"/tmp/a\"\n", Path::new("t.toml"))
            .unwrap()
            .with_overrides(Overrides {
                api_url: Some("http://b".into()),
                state_dir: None,
            });
        assert_eq!(cfg.api_url(), Some("http://b"));
        assert_eq!(cfg.dataset_path(), PathBuf::from("/tmp/a/sf-data-v2.json"));
        assert_eq!(cfg.session_path(), PathBuf::from("/tmp/a/sf-auth-v2.json"));
    }

    #[test]
    fn invalid_file_names_path() {
        let err = Config::from_toml_str("sheet2 = [", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(dir.path().join("absent.toml").as_path())).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
