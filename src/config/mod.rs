//! Configuration loading.
//!
//! Precedence, lowest first: built-in defaults, the TOML file, then
//! environment variables (`PORT`, `HOST`, `JWT_SECRET`, `DATABASE_PATH`,
//! `UPLOAD_DIR`, `TOKEN_TTL_SECS`).

pub mod schema;

pub use schema::{AuthConfig, Config, GatewayConfig, StorageConfig};

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "CARGODESK_CONFIG";

impl Config {
    /// Load from the default locations and the process environment.
    pub fn load() -> Result<Self> {
        let config = Self::resolve()?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`] but skips validation. Used by commands that
    /// never sign tokens.
    pub fn resolve() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .map(PathBuf::from)
            .or_else(default_config_path);

        let mut config = match path {
            Some(ref p) if p.exists() => Self::from_file(p)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.expand_paths();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Overlay values from an environment lookup. Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key).and_then(|v| {
                let v = v.trim();
                (!v.is_empty()).then(|| v.to_owned())
            })
        };

        if let Some(port) = get("PORT") {
            self.gateway.port = port
                .parse()
                .with_context(|| format!("PORT must be a port number, got '{port}'"))?;
        }
        if let Some(host) = get("HOST") {
            self.gateway.host = host;
        }
        if let Some(secret) = get("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(ttl) = get("TOKEN_TTL_SECS") {
            self.auth.token_ttl_secs = Some(
                ttl.parse()
                    .with_context(|| format!("TOKEN_TTL_SECS must be an integer, got '{ttl}'"))?,
            );
        }
        if let Some(path) = get("DATABASE_PATH") {
            self.storage.database_path = PathBuf::from(path);
        }
        if let Some(dir) = get("UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    fn expand_paths(&mut self) {
        self.storage.database_path = expand(&self.storage.database_path);
        self.storage.upload_dir = expand(&self.storage.upload_dir);
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.trim().is_empty() {
            bail!("auth.jwt_secret is empty. Set JWT_SECRET or [auth] jwt_secret in config.toml.");
        }
        if self.auth.token_ttl_secs == Some(0) {
            bail!("auth.token_ttl_secs must be positive when set");
        }
        if self.gateway.max_body_bytes == 0 {
            bail!("gateway.max_body_bytes must be positive");
        }
        Ok(())
    }
}

/// `<platform config dir>/cargodesk/config.toml`, if a home directory exists.
fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "cargodesk")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn expand(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}
