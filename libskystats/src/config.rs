//! Configuration management for Skystats

use chrono::NaiveTime;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Environment variable that overrides the config file location
pub const CONFIG_ENV: &str = "SKYSTATS_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "config.json";
const POST_AT_FORMAT: &str = "%H:%M";

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the PDS, e.g. `https://bsky.social`
    pub host: String,
    pub handle: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,

    /// Directory holding the credential cache and baseline files
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Local wall-clock time of the daily post, `HH:MM`
    #[serde(default = "default_post_at")]
    pub post_at: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Rewrite the credential cache after a successful refresh at startup
    #[serde(default)]
    pub persist_refreshed_session: bool,

    /// Keep the last published snapshot on disk across restarts
    #[serde(default)]
    pub persist_baseline: bool,
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(SecretString::from(value))
}

fn default_cache_dir() -> String {
    ".".to_string()
}

fn default_post_at() -> String {
    "00:00".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Build a config with every optional setting at its default
    pub fn new(host: &str, handle: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            handle: handle.to_string(),
            password: SecretString::from(password.to_string()),
            cache_dir: default_cache_dir(),
            post_at: default_post_at(),
            request_timeout_secs: default_request_timeout_secs(),
            persist_refreshed_session: false,
            persist_baseline: false,
        }
    }

    /// Load configuration, honouring an explicit path first
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = resolve_config_path(explicit)?;
        tracing::debug!("Loading configuration from {}", config_path.display());
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// Files ending in `.toml` are parsed as TOML, everything else as JSON.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.finish()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.finish()
    }

    /// Host and handle are kept byte for byte: they name the credential cache
    fn finish(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    /// Check required fields and value ranges
    pub fn validate(&self) -> Result<()> {
        use secrecy::ExposeSecret;

        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingField("host".to_string()).into());
        }
        if !(self.host.starts_with("https://") || self.host.starts_with("http://")) {
            return Err(ConfigError::InvalidValue {
                field: "host".to_string(),
                reason: format!("'{}' must start with http:// or https://", self.host),
            }
            .into());
        }
        if self.handle.trim().is_empty() {
            return Err(ConfigError::MissingField("handle".to_string()).into());
        }
        if self.password.expose_secret().is_empty() {
            return Err(ConfigError::MissingField("password".to_string()).into());
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }
        self.post_time()?;
        Ok(())
    }

    /// Parsed daily trigger time
    pub fn post_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.post_at, POST_AT_FORMAT).map_err(|e| {
            ConfigError::InvalidValue {
                field: "post_at".to_string(),
                reason: format!("'{}' is not HH:MM ({})", self.post_at, e),
            }
            .into()
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Cache directory with `~` expanded
    pub fn cache_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.cache_dir).to_string())
    }
}

/// Resolve the configuration file path
///
/// Order: explicit path, `SKYSTATS_CONFIG`, `./config.json`, then
/// `<config_dir>/skystats/config.json`.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("skystats").join(DEFAULT_CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SkystatsError;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_json_config_with_defaults() {
        let config = Config::from_json_str(
            r#"{"host": "https://bsky.social/", "handle": "alice.bsky.social", "password": "app-pass"}"#,
        )
        .unwrap();

        assert_eq!(config.host, "https://bsky.social/");
        assert_eq!(config.handle, "alice.bsky.social");
        assert_eq!(config.password.expose_secret(), "app-pass");
        assert_eq!(config.cache_dir, ".");
        assert_eq!(config.post_at, "00:00");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(!config.persist_refreshed_session);
        assert!(!config.persist_baseline);
    }

    #[test]
    fn test_cache_key_uses_host_as_configured() {
        use sha2::{Digest, Sha256};

        let config = Config::from_json_str(
            r#"{"host": "https://bsky.social/", "handle": "alice.bsky.social", "password": "app-pass"}"#,
        )
        .unwrap();

        let expected = format!("{:x}", Sha256::digest(b"https://bsky.social/_alice.bsky.social"));
        assert_eq!(
            crate::credentials::derive_key(&config.host, &config.handle),
            expected
        );
    }

    #[test]
    fn test_toml_config_with_overrides() {
        let config = Config::from_toml_str(
            r#"
host = "https://pds.example.com"
handle = "bob.example.com"
password = "secret"
cache_dir = "/var/lib/skystats"
post_at = "06:30"
request_timeout_secs = 10
persist_refreshed_session = true
persist_baseline = true
"#,
        )
        .unwrap();

        assert_eq!(config.cache_path(), PathBuf::from("/var/lib/skystats"));
        assert_eq!(
            config.post_time().unwrap(),
            NaiveTime::from_hms_opt(6, 30, 0).unwrap()
        );
        assert_eq!(config.request_timeout_secs, 10);
        assert!(config.persist_refreshed_session);
        assert!(config.persist_baseline);
    }

    #[test]
    fn test_missing_password_is_parse_error() {
        let result = Config::from_json_str(r#"{"host": "https://bsky.social", "handle": "a"}"#);
        match result {
            Err(SkystatsError::Config(ConfigError::ParseError(msg))) => {
                assert!(msg.contains("password"));
            }
            other => panic!("Expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_handle_rejected() {
        let result = Config::from_json_str(
            r#"{"host": "https://bsky.social", "handle": "  ", "password": "x"}"#,
        );
        match result {
            Err(SkystatsError::Config(ConfigError::MissingField(field))) => {
                assert_eq!(field, "handle");
            }
            other => panic!("Expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_host_without_scheme_rejected() {
        let result = Config::from_json_str(
            r#"{"host": "bsky.social", "handle": "a", "password": "x"}"#,
        );
        assert!(matches!(
            result,
            Err(SkystatsError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_invalid_post_at_rejected() {
        let result = Config::from_json_str(
            r#"{"host": "https://bsky.social", "handle": "a", "password": "x", "post_at": "25:00"}"#,
        );
        match result {
            Err(SkystatsError::Config(ConfigError::InvalidValue { field, .. })) => {
                assert_eq!(field, "post_at");
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = Config::from_json_str(
            r#"{"host": "https://bsky.social", "handle": "a", "password": "x", "request_timeout_secs": 0}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_password_not_in_debug_output() {
        let config = Config::new("https://bsky.social", "alice.bsky.social", "hunter2");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_load_from_path_picks_format_by_extension() {
        let temp_dir = TempDir::new().unwrap();

        let json_path = temp_dir.path().join("config.json");
        std::fs::write(
            &json_path,
            r#"{"host": "https://bsky.social", "handle": "a", "password": "x"}"#,
        )
        .unwrap();
        assert_eq!(Config::load_from_path(&json_path).unwrap().handle, "a");

        let toml_path = temp_dir.path().join("config.toml");
        std::fs::write(
            &toml_path,
            "host = \"https://bsky.social\"\nhandle = \"b\"\npassword = \"y\"\n",
        )
        .unwrap();
        assert_eq!(Config::load_from_path(&toml_path).unwrap().handle, "b");
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = Config::load_from_path(&temp_dir.path().join("nope.json"));
        assert!(matches!(
            result,
            Err(SkystatsError::Config(ConfigError::ReadError(_)))
        ));
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_prefers_explicit() {
        std::env::set_var(CONFIG_ENV, "/tmp/from-env.json");
        let path = resolve_config_path(Some(Path::new("/tmp/explicit.json"))).unwrap();
        std::env::remove_var(CONFIG_ENV);

        assert_eq!(path, PathBuf::from("/tmp/explicit.json"));
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_uses_env() {
        std::env::set_var(CONFIG_ENV, "/tmp/from-env.json");
        let path = resolve_config_path(None).unwrap();
        std::env::remove_var(CONFIG_ENV);

        assert_eq!(path, PathBuf::from("/tmp/from-env.json"));
    }
}
