use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::token::TOKEN_TTL_SECS;
use crate::auth::SigningKey;
use crate::store::DEFAULT_LOCK_WAIT;

/// Env var holding the token signing secret.
pub const SECRET_ENV: &str = "RECORDKEEP_JWT_SECRET";
/// Older name still honored when [`SECRET_ENV`] is unset.
pub const LEGACY_SECRET_ENV: &str = "JWT_SECRET";
pub const PORT_ENV: &str = "PORT";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the collection files.
    pub data_dir: PathBuf,
    pub gateway: GatewayConfig,
    pub auth: AuthConfig,
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            gateway: GatewayConfig::default(),
            auth: AuthConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret. Usually supplied through the environment instead.
    pub jwt_secret: Option<String>,
    pub token_ttl_secs: u64,
    /// Require an admin bearer token for `POST /api/users/admin`.
    pub guard_admin_creation: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_secs: TOKEN_TTL_SECS,
            guard_admin_creation: false,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("guard_admin_creation", &self.guard_admin_creation)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub users_file: String,
    pub items_file: String,
    /// Bounded wait for a collection's write lock before reporting busy.
    pub lock_wait_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            users_file: "users.json".into(),
            items_file: "items.json".into(),
            lock_wait_ms: DEFAULT_LOCK_WAIT.as_millis() as u64,
        }
    }
}

impl Config {
    /// Apply environment overrides; env wins over the file.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let secret = lookup(SECRET_ENV)
            .filter(|s| !s.trim().is_empty())
            .or_else(|| lookup(LEGACY_SECRET_ENV).filter(|s| !s.trim().is_empty()));
        if let Some(secret) = secret {
            self.auth.jwt_secret = Some(secret);
        }

        if let Some(raw) = lookup(PORT_ENV) {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!(value = %raw, "Ignoring unparseable {PORT_ENV}"),
            }
        }
    }

    /// The configured signing key. Missing or blank is a startup error.
    pub fn signing_key(&self) -> anyhow::Result<SigningKey> {
        let secret = self.auth.jwt_secret.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "No token signing secret configured.\n\
                 Fix: set {SECRET_ENV} or [auth] jwt_secret in config.toml."
            )
        })?;
        SigningKey::new(secret)
    }

    pub fn users_path(&self) -> PathBuf {
        resolve(&self.data_dir, &self.store.users_file)
    }

    pub fn items_path(&self) -> PathBuf {
        resolve(&self.data_dir, &self.store.items_file)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.store.lock_wait_ms)
    }
}

fn resolve(data_dir: &Path, file: &str) -> PathBuf {
    let file = Path::new(file);
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        data_dir.join(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.gateway.port, 3000);
        assert_eq!(config.auth.token_ttl_secs, 3600);
        assert!(!config.auth.guard_admin_creation);
        assert_eq!(config.lock_wait(), Duration::from_millis(2000));
        assert_eq!(config.users_path(), PathBuf::from("./data/users.json"));
        assert_eq!(config.items_path(), PathBuf::from("./data/items.json"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
data_dir = "/srv/records"

[gateway]
port = 8080

[store]
lock_wait_ms = 500
"#,
        )
        .unwrap();
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.lock_wait(), Duration::from_millis(500));
        assert_eq!(config.users_path(), PathBuf::from("/srv/records/users.json"));
        assert!(config.auth.jwt_secret.is_none());
    }

    #[test]
    fn env_secret_wins_over_file() {
        let mut config = Config::default();
        config.auth.jwt_secret = Some("from-file".into());
        config.apply_env_overrides(env(&[(SECRET_ENV, "from-env")]));
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("from-env"));
    }

    #[test]
    fn legacy_secret_used_when_primary_unset() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[(LEGACY_SECRET_ENV, "legacy")]));
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("legacy"));

        let mut config = Config::default();
        config.apply_env_overrides(env(&[(SECRET_ENV, "  "), (LEGACY_SECRET_ENV, "legacy")]));
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("legacy"));
    }

    #[test]
    fn port_override_and_garbage_port() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[(PORT_ENV, "4100")]));
        assert_eq!(config.gateway.port, 4100);

        config.apply_env_overrides(env(&[(PORT_ENV, "not-a-port")]));
        assert_eq!(config.gateway.port, 4100);
    }

    #[test]
    fn missing_or_blank_secret_is_an_error() {
        let config = Config::default();
        assert!(config.signing_key().is_err());

        let mut blank = Config::default();
        blank.auth.jwt_secret = Some("   ".into());
        assert!(blank.signing_key().is_err());

        let mut set = Config::default();
        set.auth.jwt_secret = Some("s3cret".into());
        assert!(set.signing_key().is_ok());
    }

    #[test]
    fn debug_redacts_secret() {
        let mut config = Config::default();
        config.auth.jwt_secret = Some("super-secret-value".into());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret-value"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn absolute_file_names_ignore_data_dir() {
        let mut config = Config::default();
        config.store.items_file = "/var/lib/items.json".into();
        assert_eq!(config.items_path(), PathBuf::from("/var/lib/items.json"));
    }
}
