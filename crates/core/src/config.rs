//! TOML-based configuration for dbsync.
//!
//! Sensitive values (the remote API key) are stored as `_env` fields that
//! reference environment variable names. The actual secrets are resolved at
//! runtime via [`AppConfig::resolve_env_vars`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote history-service settings.
    pub remote: RemoteConfig,

    /// Commit author settings.
    #[serde(default)]
    pub author: AuthorConfig,

    /// Local cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

/// Remote service endpoint and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the remote history service.
    #[serde(default = "default_remote_url")]
    pub url: String,

    /// Account name that owns the databases on the remote.
    pub owner: String,

    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Resolved API key (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_remote_url() -> String {
    "https://db4s.dbhub.io".into()
}

// ---------------------------------------------------------------------------
// Author
// ---------------------------------------------------------------------------

/// Default commit author identity, overridable per push on the command line.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthorConfig {
    /// Author name recorded in commits.
    #[serde(default)]
    pub name: String,

    /// Author email recorded in commits.
    #[serde(default)]
    pub email: String,
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Local blob-cache and metadata directory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory for per-database cache state.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".dbsync")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve the `*_env` fields from environment variables and populate
    /// the corresponding resolved fields.
    ///
    /// A missing variable logs a warning but does **not** fail -- pulls of
    /// public databases work without credentials.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref env_name) = self.remote.api_key_env {
            self.remote.api_key = resolve_optional_env(env_name, "remote.api_key_env");
        }
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "remote.url".into(),
                detail: "remote URL must not be empty".into(),
            });
        }
        if !self.remote.url.starts_with("http://") && !self.remote.url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "remote.url".into(),
                detail: "remote URL must start with http:// or https://".into(),
            });
        }
        if self.remote.owner.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "remote.owner".into(),
                detail: "remote owner must not be empty".into(),
            });
        }
        if self.remote.owner.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: "remote.owner".into(),
                detail: "remote owner must be a bare account name".into(),
            });
        }
        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[remote]
url = "https://db.example.com"
owner = "alice"
api_key_env = "DBSYNC_API_KEY"

[author]
name = "Alice Example"
email = "alice@example.com"

[cache]
dir = "/tmp/dbsync-cache"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.remote.url, "https://db.example.com");
        assert_eq!(config.remote.owner, "alice");
        assert_eq!(config.author.name, "Alice Example");
        assert_eq!(config.cache.dir, PathBuf::from("/tmp/dbsync-cache"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.author.email, "alice@example.com");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_validate_rejects_empty_owner() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.remote.owner = String::new();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "remote.owner"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_url_scheme() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.remote.url = "ftp://db.example.com".into();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "remote.url"
        ));
    }

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("TEST_DBSYNC_KEY", "k3y");

        let toml_str = r#"
[remote]
owner = "alice"
api_key_env = "TEST_DBSYNC_KEY"
"#;
        let mut config: AppConfig = toml::from_str(toml_str).unwrap();
        config.resolve_env_vars().unwrap();
        assert_eq!(config.remote.api_key.as_deref(), Some("k3y"));

        std::env::remove_var("TEST_DBSYNC_KEY");
    }

    #[test]
    fn test_defaults() {
        let minimal = r#"
[remote]
owner = "alice"
"#;
        let config: AppConfig = toml::from_str(minimal).unwrap();
        assert_eq!(config.remote.url, "https://db4s.dbhub.io");
        assert!(config.author.name.is_empty());
        assert_eq!(config.cache.dir, PathBuf::from(".dbsync"));
    }
}
