//! Startup configuration: an optional TOML file named by `FOLIO_CONFIG`,
//! with `FOLIO_*` environment variables taking precedence over it.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct FileConfig {
    pub http: HttpSection,
    pub storage: StorageSection,
    pub settings: SettingsSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct HttpSection {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct StorageSection {
    pub path: Option<PathBuf>,
    pub busy_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SettingsSection {
    /// Extra defaults seeded beside the built-in ones; may override them.
    pub defaults: BTreeMap<String, toml::Value>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

pub(crate) fn load_from_env() -> Result<FileConfig, ConfigError> {
    match std::env::var("FOLIO_CONFIG") {
        Ok(path) if !path.trim().is_empty() => {
            let cfg = load_file(Path::new(path.trim()))?;
            info!(target: "folio::config", path = %path.trim(), "loaded config file");
            Ok(cfg)
        }
        _ => Ok(FileConfig::default()),
    }
}

pub(crate) fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl FileConfig {
    /// `FOLIO_DB`, then `[storage] path`, then `folio.sqlite` under
    /// `FOLIO_STATE_DIR` (default `state`).
    pub fn db_path(&self) -> PathBuf {
        if let Some(db) = env_nonempty("FOLIO_DB") {
            return PathBuf::from(db);
        }
        if let Some(path) = &self.storage.path {
            return path.clone();
        }
        let dir = env_nonempty("FOLIO_STATE_DIR").unwrap_or_else(|| "state".into());
        PathBuf::from(dir).join(folio_kernel::DB_FILE_NAME)
    }

    pub fn busy_ms(&self) -> u64 {
        env_nonempty("FOLIO_SQLITE_BUSY_MS")
            .and_then(|v| v.parse().ok())
            .or(self.storage.busy_ms)
            .unwrap_or(folio_kernel::DEFAULT_BUSY_MS)
    }

    /// Built-in defaults with `[settings.defaults]` merged over them.
    pub fn seed_defaults(&self) -> BTreeMap<String, String> {
        let mut map = folio_kernel::default_settings();
        for (key, value) in &self.settings.defaults {
            map.insert(key.clone(), toml_text(value));
        }
        map
    }
}

fn toml_text(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::env as test_env;

    #[test]
    fn parses_all_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.toml");
        std::fs::write(
            &path,
            r##"
                [http]
                bind = "127.0.0.1"
                port = 9000

                [storage]
                path = "/srv/folio/db.sqlite"
                busy_ms = 250

                [settings.defaults]
                site_title = "My Folio"
                maintenance_mode = 1
                announcement_active = false
            "##,
        )
        .unwrap();
        let cfg = load_file(&path).unwrap();
        assert_eq!(cfg.http.port, Some(9000));
        assert_eq!(cfg.storage.busy_ms, Some(250));
        let seeds = cfg.seed_defaults();
        assert_eq!(seeds["site_title"], "My Folio");
        assert_eq!(seeds["maintenance_mode"], "1");
        assert_eq!(seeds["announcement_active"], "false");
        // untouched built-ins remain
        assert_eq!(seeds["announcement_type"], "banner");
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[http\nport = ").unwrap();
        assert!(matches!(load_file(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            load_file(&dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn env_wins_over_file_for_storage() {
        let mut guard = test_env::guard();
        guard.remove("FOLIO_STATE_DIR");
        guard.set("FOLIO_DB", "/tmp/from-env.sqlite");
        guard.set("FOLIO_SQLITE_BUSY_MS", "42");
        let mut cfg = FileConfig::default();
        cfg.storage.path = Some(PathBuf::from("/tmp/from-file.sqlite"));
        cfg.storage.busy_ms = Some(7);
        assert_eq!(cfg.db_path(), PathBuf::from("/tmp/from-env.sqlite"));
        assert_eq!(cfg.busy_ms(), 42);

        guard.remove("FOLIO_DB");
        guard.remove("FOLIO_SQLITE_BUSY_MS");
        assert_eq!(cfg.db_path(), PathBuf::from("/tmp/from-file.sqlite"));
        assert_eq!(cfg.busy_ms(), 7);
    }

    #[test]
    fn db_defaults_to_state_dir() {
        let mut guard = test_env::guard();
        guard.remove("FOLIO_DB");
        guard.remove("FOLIO_STATE_DIR");
        let cfg = FileConfig::default();
        assert_eq!(cfg.db_path(), Path::new("state").join("folio.sqlite"));
        guard.set("FOLIO_STATE_DIR", "/var/lib/folio");
        assert_eq!(cfg.db_path(), Path::new("/var/lib/folio").join("folio.sqlite"));
    }
}
