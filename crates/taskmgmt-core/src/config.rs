// Copyright (C) 2025 Archivers Space contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration resolved from a JSON file and environment variables.
//!
//! Sources, later ones winning for the keys they actually set:
//!
//! 1. Built-in empty values.
//! 2. `config.<mode>.json` in the config directory, or `config.json` if the
//!    mode file does not exist. Only one file is read. No file at all is fine.
//! 3. Environment variables named like the file keys (`PORT`,
//!    `POSTGRES_DB_URL`, ...). Unset or empty variables are ignored.
//!
//! | Key | Required | Default | Description |
//! |-----|----------|---------|-------------|
//! | `PORT` | Yes | `8080` | Listen port |
//! | `URL_ROOT` | No | - | Public root URL of the service |
//! | `PUBLIC_KEY` | No | - | Public key used for signing |
//! | `TLS` | No | `false` | Serve HTTPS via LetsEncrypt |
//! | `PROXY_FORCE_HTTPS` | No | `false` | Redirect `X-Forwarded-Proto: http` (file only) |
//! | `POSTGRES_DB_URL` | Yes | - | Backing store connection URL |
//! | `CERTBOT_RESPONSE` | No | - | Manual ACME challenge response |
//! | `GITHUB_REPO_OWNER` | Yes | - | Owner of the task code repository |
//! | `GITHUB_REPO_NAME` | Yes | - | Name of the task code repository |
//! | `POSTMARK_KEY` | No | - | Email delivery key |
//! | `USER_COOKIE_KEY` | No | - | Cookie forwarded to the identity server |
//! | `IDENTITY_SERVER_URL` | Yes | - | Identity server location |
//! | `EMAIL_NOTIFICATION_RECIPIENTS` | No | - | Comma-separated addresses |
//!
//! Configuration is resolved once at startup and never changes afterwards.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

/// Environment variable naming the directory that holds the config files.
pub const CONFIG_DIR_ENV: &str = "TASKMGMT_CONFIG_DIR";

/// Port used when no source sets one.
pub const DEFAULT_PORT: u16 = 8080;

/// Resolved service configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    /// Port to listen on.
    pub port: u16,
    /// Root URL for the service.
    pub url_root: String,
    /// Backing store connection URL.
    pub postgres_db_url: String,
    /// Public key used for signing.
    pub public_key: String,
    /// Enable HTTPS via LetsEncrypt. Not needed behind a TLS proxy.
    pub tls: bool,
    /// Redirect requests carrying `X-Forwarded-Proto: http` to https.
    pub proxy_force_https: bool,
    /// Key for sending emails.
    pub postmark_key: String,
    /// Addresses that get task notifications.
    pub email_notification_recipients: Vec<String>,
    /// Owner of the task code repository.
    pub github_repo_owner: String,
    /// Name of the task code repository.
    pub github_repo_name: String,
    /// Location of the identity server.
    pub identity_server_url: String,
    /// Cookie holding user credentials to forward to the identity server.
    pub user_cookie_key: String,
    /// Manual certificate challenge response.
    pub certbot_response: String,
}

// Secrets stay out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn redact(s: &str) -> &'static str {
            if s.is_empty() { "" } else { "<redacted>" }
        }

        f.debug_struct("Config")
            .field("port", &self.port)
            .field("url_root", &self.url_root)
            .field("postgres_db_url", &self.postgres_db_url)
            .field("public_key", &redact(&self.public_key))
            .field("tls", &self.tls)
            .field("proxy_force_https", &self.proxy_force_https)
            .field("postmark_key", &redact(&self.postmark_key))
            .field(
                "email_notification_recipients",
                &self.email_notification_recipients,
            )
            .field("github_repo_owner", &self.github_repo_owner)
            .field("github_repo_name", &self.github_repo_name)
            .field("identity_server_url", &self.identity_server_url)
            .field("user_cookie_key", &self.user_cookie_key)
            .field("certbot_response", &redact(&self.certbot_response))
            .finish()
    }
}

impl Config {
    /// Resolve configuration for `mode` from the process environment.
    ///
    /// Config files are looked up in `TASKMGMT_CONFIG_DIR`, or the current
    /// directory when that is unset.
    pub fn resolve(mode: &str) -> Result<Self, ConfigError> {
        let dir = std::env::var(CONFIG_DIR_ENV)
            .ok()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| ".".to_string());
        ConfigResolver::new(dir).resolve(mode)
    }

    /// Address to bind the listener to.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required key is unset after every source was consulted.
    #[error("{0} env variable or config key must be set")]
    Missing(&'static str),

    /// A key has a value that cannot be used.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),

    /// A config file exists but could not be read.
    #[error("error reading {}: {source}", .path.display())]
    Read {
        /// The file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A config file is not valid JSON for this schema.
    #[error("error parsing {}: {source}", .path.display())]
    Parse {
        /// The file.
        path: PathBuf,
        /// Underlying decode error.
        source: serde_json::Error,
    },
}

/// On-disk shape of `config.json` / `config.<mode>.json`.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(rename = "PORT")]
    port: Option<String>,
    #[serde(rename = "URL_ROOT")]
    url_root: Option<String>,
    #[serde(rename = "POSTGRES_DB_URL")]
    postgres_db_url: Option<String>,
    #[serde(rename = "PUBLIC_KEY")]
    public_key: Option<String>,
    #[serde(rename = "TLS")]
    tls: Option<bool>,
    #[serde(rename = "PROXY_FORCE_HTTPS", alias = "ProxyForceHttps")]
    proxy_force_https: Option<bool>,
    #[serde(rename = "POSTMARK_KEY")]
    postmark_key: Option<String>,
    #[serde(rename = "EMAIL_NOTIFICATION_RECIPIENTS")]
    email_notification_recipients: Option<Vec<String>>,
    #[serde(rename = "GITHUB_REPO_OWNER")]
    github_repo_owner: Option<String>,
    #[serde(rename = "GITHUB_REPO_NAME")]
    github_repo_name: Option<String>,
    #[serde(rename = "IDENTITY_SERVER_URL")]
    identity_server_url: Option<String>,
    #[serde(rename = "USER_COOKIE_KEY")]
    user_cookie_key: Option<String>,
    #[serde(rename = "CERTBOT_RESPONSE")]
    certbot_response: Option<String>,
}

/// Resolves [`Config`] from a config directory and an environment.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    config_dir: PathBuf,
    env: Option<HashMap<String, String>>,
}

impl ConfigResolver {
    /// Resolver reading files from `config_dir` and the process environment.
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            env: None,
        }
    }

    /// Use `vars` instead of the process environment.
    pub fn with_env(mut self, vars: HashMap<String, String>) -> Self {
        self.env = Some(vars);
        self
    }

    /// Run the full cascade for `mode` and validate the result.
    pub fn resolve(&self, mode: &str) -> Result<Config, ConfigError> {
        let file = self.load_file(mode)?.unwrap_or_default();

        let port = self.string("PORT", file.port);
        let port = if port.is_empty() {
            DEFAULT_PORT
        } else {
            port.parse::<u16>().map_err(|_| {
                ConfigError::Invalid("PORT", format!("'{}' is not a valid port number", port))
            })?
        };

        let config = Config {
            port,
            url_root: self.string("URL_ROOT", file.url_root),
            public_key: self.string("PUBLIC_KEY", file.public_key),
            tls: self.bool("TLS", file.tls),
            proxy_force_https: file.proxy_force_https.unwrap_or(false),
            postgres_db_url: self.string("POSTGRES_DB_URL", file.postgres_db_url),
            certbot_response: self.string("CERTBOT_RESPONSE", file.certbot_response),
            github_repo_name: self.string("GITHUB_REPO_NAME", file.github_repo_name),
            github_repo_owner: self.string("GITHUB_REPO_OWNER", file.github_repo_owner),
            postmark_key: self.string("POSTMARK_KEY", file.postmark_key),
            user_cookie_key: self.string("USER_COOKIE_KEY", file.user_cookie_key),
            identity_server_url: self.string("IDENTITY_SERVER_URL", file.identity_server_url),
            email_notification_recipients: self.list(
                "EMAIL_NOTIFICATION_RECIPIENTS",
                file.email_notification_recipients,
            ),
        };

        require(&[
            ("POSTGRES_DB_URL", config.postgres_db_url.as_str()),
            ("GITHUB_REPO_OWNER", config.github_repo_owner.as_str()),
            ("GITHUB_REPO_NAME", config.github_repo_name.as_str()),
            ("IDENTITY_SERVER_URL", config.identity_server_url.as_str()),
        ])?;

        Ok(config)
    }

    /// `config.<mode>.json` if present, else `config.json` if present, else nothing.
    fn load_file(&self, mode: &str) -> Result<Option<ConfigFile>, ConfigError> {
        let candidates = [
            self.config_dir.join(format!("config.{}.json", mode)),
            self.config_dir.join("config.json"),
        ];
        let Some(path) = candidates.iter().find(|p| p.is_file()) else {
            debug!(dir = %self.config_dir.display(), mode, "No config file found");
            return Ok(None);
        };

        debug!(path = %path.display(), "Reading config file");
        read_config_file(path).map(Some)
    }

    fn env_var(&self, key: &str) -> Option<String> {
        let value = match &self.env {
            Some(vars) => vars.get(key).cloned(),
            None => std::env::var(key).ok(),
        };
        value.filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, file: Option<String>) -> String {
        self.env_var(key).or(file).unwrap_or_default()
    }

    fn bool(&self, key: &str, file: Option<bool>) -> bool {
        match self.env_var(key) {
            Some(v) => parse_bool(&v),
            None => file.unwrap_or(false),
        }
    }

    fn list(&self, key: &str, file: Option<Vec<String>>) -> Vec<String> {
        match self.env_var(key) {
            Some(v) => parse_list(&v),
            None => file.unwrap_or_default(),
        }
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let data = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// `true` / `t` in any case; anything else is false.
fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("t")
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn require(values: &[(&'static str, &str)]) -> Result<(), ConfigError> {
    match values.iter().find(|(_, value)| value.is_empty()) {
        Some((key, _)) => Err(ConfigError::Missing(*key)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to set env vars for a test and restore them after
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self { vars: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Every required key except PORT.
    fn required_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("POSTGRES_DB_URL", "postgres://localhost/tasks"),
            ("GITHUB_REPO_OWNER", "archivers-space"),
            ("GITHUB_REPO_NAME", "task-mgmt"),
            ("IDENTITY_SERVER_URL", "https://id.example.com"),
        ]
    }

    fn write(dir: &TempDir, name: &str, body: &str) {
        std::fs::write(dir.path().join(name), body).unwrap();
    }

    fn resolver(dir: &TempDir, pairs: &[(&str, &str)]) -> ConfigResolver {
        ConfigResolver::new(dir.path()).with_env(env_of(pairs))
    }

    #[test]
    fn test_mode_file_port_without_env() {
        let dir = TempDir::new().unwrap();
        write(&dir, "config.production.json", r#"{"PORT": "9090"}"#);

        let config = resolver(&dir, &required_env()).resolve("production").unwrap();

        assert_eq!(config.port, 9090);
    }

    #[test]
    fn test_env_port_overrides_mode_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "config.production.json", r#"{"PORT": "9090"}"#);
        let mut pairs = required_env();
        pairs.push(("PORT", "7000"));

        let config = resolver(&dir, &pairs).resolve("production").unwrap();

        assert_eq!(config.port, 7000);
    }

    #[test]
    fn test_empty_env_keeps_file_value() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "config.json",
            r#"{"PORT": "9090", "URL_ROOT": "https://tasks.example.com"}"#,
        );
        let mut pairs = required_env();
        pairs.push(("PORT", ""));
        pairs.push(("URL_ROOT", ""));

        let config = resolver(&dir, &pairs).resolve("develop").unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.url_root, "https://tasks.example.com");
    }

    #[test]
    fn test_default_port_when_unset_everywhere() {
        let dir = TempDir::new().unwrap();

        let config = resolver(&dir, &required_env()).resolve("develop").unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.listen_addr().port(), 8080);
    }

    #[test]
    fn test_missing_database_url_is_named() {
        let dir = TempDir::new().unwrap();
        let pairs: Vec<_> = required_env()
            .into_iter()
            .filter(|(k, _)| *k != "POSTGRES_DB_URL")
            .collect();

        let err = resolver(&dir, &pairs).resolve("develop").unwrap_err();

        assert!(matches!(err, ConfigError::Missing("POSTGRES_DB_URL")));
        assert_eq!(
            err.to_string(),
            "POSTGRES_DB_URL env variable or config key must be set"
        );
    }

    #[test]
    fn test_each_required_key_is_enforced() {
        let dir = TempDir::new().unwrap();
        for (missing, _) in required_env() {
            let pairs: Vec<_> = required_env()
                .into_iter()
                .filter(|(k, _)| *k != missing)
                .collect();

            let err = resolver(&dir, &pairs).resolve("develop").unwrap_err();

            match err {
                ConfigError::Missing(key) => assert_eq!(key, missing),
                other => panic!("expected Missing({}), got {:?}", missing, other),
            }
        }
    }

    #[test]
    fn test_mode_file_replaces_default_file() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "config.json",
            r#"{"URL_ROOT": "https://default.example.com", "PORT": "1111"}"#,
        );
        write(&dir, "config.test.json", r#"{"PORT": "2222"}"#);

        let config = resolver(&dir, &required_env()).resolve("test").unwrap();

        assert_eq!(config.port, 2222);
        assert_eq!(config.url_root, "", "default file is not merged in");
    }

    #[test]
    fn test_falls_back_to_default_file() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "config.json",
            r#"{
                "PORT": "3000",
                "POSTGRES_DB_URL": "postgres://db/tasks",
                "GITHUB_REPO_OWNER": "owner",
                "GITHUB_REPO_NAME": "repo",
                "IDENTITY_SERVER_URL": "https://id",
                "TLS": true,
                "ProxyForceHttps": true,
                "EMAIL_NOTIFICATION_RECIPIENTS": ["a@example.com", "b@example.com"],
                "TemplateData": {"title": "ignored"}
            }"#,
        );

        let config = resolver(&dir, &[]).resolve("production").unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.postgres_db_url, "postgres://db/tasks");
        assert!(config.tls);
        assert!(config.proxy_force_https);
        assert_eq!(
            config.email_notification_recipients,
            vec!["a@example.com", "b@example.com"]
        );
    }

    #[test]
    fn test_env_bool_parsing() {
        let dir = TempDir::new().unwrap();
        write(&dir, "config.json", r#"{"TLS": true}"#);

        for (raw, expected) in [
            ("true", true),
            ("TRUE", true),
            ("True", true),
            ("t", true),
            ("T", true),
            ("1", false),
            ("yes", false),
            ("false", false),
        ] {
            let mut pairs = required_env();
            pairs.push(("TLS", raw));
            let config = resolver(&dir, &pairs).resolve("develop").unwrap();
            assert_eq!(config.tls, expected, "TLS={}", raw);
        }
    }

    #[test]
    fn test_env_list_parsing() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "config.json",
            r#"{"EMAIL_NOTIFICATION_RECIPIENTS": ["file@example.com"]}"#,
        );
        let mut pairs = required_env();
        pairs.push((
            "EMAIL_NOTIFICATION_RECIPIENTS",
            "a@example.com, b@example.com,,",
        ));

        let config = resolver(&dir, &pairs).resolve("develop").unwrap();

        assert_eq!(
            config.email_notification_recipients,
            vec!["a@example.com", "b@example.com"]
        );
    }

    #[test]
    fn test_invalid_port() {
        let dir = TempDir::new().unwrap();
        let mut pairs = required_env();
        pairs.push(("PORT", "99999"));

        let err = resolver(&dir, &pairs).resolve("develop").unwrap_err();

        assert!(matches!(err, ConfigError::Invalid("PORT", _)));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "config.develop.json", "{ not json");

        let err = resolver(&dir, &required_env()).resolve("develop").unwrap_err();

        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.develop.json"));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let dir = TempDir::new().unwrap();
        write(&dir, "config.json", r#"{"PORT": "9090"}"#);
        let resolver = resolver(&dir, &required_env());

        assert_eq!(
            resolver.resolve("develop").unwrap(),
            resolver.resolve("develop").unwrap()
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let dir = TempDir::new().unwrap();
        let mut pairs = required_env();
        pairs.push(("POSTMARK_KEY", "super-secret"));
        pairs.push(("PUBLIC_KEY", "also-secret"));

        let config = resolver(&dir, &pairs).resolve("develop").unwrap();
        let debug_str = format!("{:?}", config);

        assert!(debug_str.contains("postmark_key"));
        assert!(!debug_str.contains("super-secret"));
        assert!(!debug_str.contains("also-secret"));
    }

    #[test]
    fn test_resolve_from_process_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        let dir = TempDir::new().unwrap();
        write(&dir, "config.production.json", r#"{"PORT": "9090"}"#);

        guard.set(CONFIG_DIR_ENV, dir.path().to_str().unwrap());
        for (key, value) in required_env() {
            guard.set(key, value);
        }
        guard.remove("PORT");

        let config = Config::resolve("production").unwrap();
        assert_eq!(config.port, 9090);

        guard.set("PORT", "7000");
        let config = Config::resolve("production").unwrap();
        assert_eq!(config.port, 7000);
    }

    #[test]
    fn test_resolve_from_process_env_missing_db_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        let dir = TempDir::new().unwrap();

        guard.set(CONFIG_DIR_ENV, dir.path().to_str().unwrap());
        for (key, value) in required_env() {
            guard.set(key, value);
        }
        guard.remove("POSTGRES_DB_URL");

        let err = Config::resolve("develop").unwrap_err();
        assert!(matches!(err, ConfigError::Missing("POSTGRES_DB_URL")));
    }

    #[test]
    fn test_config_error_display() {
        let missing = ConfigError::Missing("MY_VAR");
        assert_eq!(
            missing.to_string(),
            "MY_VAR env variable or config key must be set"
        );

        let invalid = ConfigError::Invalid("MY_VAR", "must be a number".to_string());
        assert_eq!(
            invalid.to_string(),
            "invalid value for MY_VAR: must be a number"
        );
    }
}
