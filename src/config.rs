//! Application configuration loaded from a TOML file.
//!
//! Arbitrary keys are reachable through [`Config::get`] with dotted paths
//! (`app.name`), and the `[server]` table deserializes into [`Settings`].

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    table: toml::Table,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse()
    }

    /// Looks up a value by dotted key.
    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        let mut parts = key.split('.');
        let mut value = self.table.get(parts.next()?)?;
        for part in parts {
            value = value.as_table()?.get(part)?;
        }
        Some(value)
    }

    /// Looks up and deserializes a value; `None` if missing or of the wrong shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)?.clone().try_into().ok()
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get_as(key).unwrap_or(default)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    /// The `[server]` table, with defaults for anything left out.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        match self.table.get("server") {
            Some(server) => Ok(server.clone().try_into()?),
            None => Ok(Settings::default()),
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            table: toml::from_str(s)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub address: String,
    pub views_dir: PathBuf,
    pub storage_dir: PathBuf,
    /// Lets a POST carry its real method in the `_method` field.
    pub method_spoofing: bool,
    pub max_body_bytes: usize,
    pub tls: Option<TlsSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
            views_dir: PathBuf::from("views"),
            storage_dir: PathBuf::from("storage"),
            method_spoofing: false,
            max_body_bytes: 1024 * 1024,
            tls: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TlsSettings {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [app]
        name = "demo"
        debug = true

        [app.mail]
        from = "noreply@example.com"

        [server]
        address = "0.0.0.0:8080"
        method_spoofing = true
    "#;

    #[test]
    fn dotted_lookup() {
        let config: Config = SAMPLE.parse().unwrap();
        assert_eq!(config.get_str("app.name"), Some("demo"));
        assert_eq!(config.get_str("app.mail.from"), Some("noreply@example.com"));
        assert!(config.get("app.missing").is_none());
        assert!(config.get("app.name.deeper").is_none());
    }

    #[test]
    fn typed_lookup_with_defaults() {
        let config: Config = SAMPLE.parse().unwrap();
        assert!(config.get_or("app.debug", false));
        assert_eq!(config.get_or("app.port", 9000u16), 9000);
        assert_eq!(config.get_or("app.name", 0u16), 0);
    }

    #[test]
    fn settings_fill_in_defaults() {
        let config: Config = SAMPLE.parse().unwrap();
        let settings = config.settings().unwrap();
        assert_eq!(settings.address, "0.0.0.0:8080");
        assert!(settings.method_spoofing);
        assert_eq!(settings.views_dir, PathBuf::from("views"));
        assert!(settings.tls.is_none());

        let empty = Config::default().settings().unwrap();
        assert!(!empty.method_spoofing);
        assert_eq!(empty.max_body_bytes, 1024 * 1024);
    }

    #[test]
    fn load_reports_missing_files_and_bad_toml() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.toml");
        fs::write(&path, "server = [").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));

        fs::write(&path, SAMPLE).unwrap();
        assert_eq!(Config::load(&path).unwrap().get_str("app.name"), Some("demo"));
    }
}
