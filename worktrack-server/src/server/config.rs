use serde::Deserialize;
use std::{env, fs, net::IpAddr, path::Path};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub listen_port: Option<u16>,
    pub dev_cors_origin: Option<String>,
    /// Admin accounts created at startup when their email is not yet taken.
    #[serde(default)]
    pub admins: Vec<AdminConfig>,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    /// Reverse proxies whose `x-forwarded-for` header is believed.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub name: String,
    pub email: String,
    pub password_hash: String, // bcrypt hash
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Log every notification (development mode).
    #[serde(default = "default_true")]
    pub log: bool,
    /// Persist notifications for polling.
    #[serde(default = "default_true")]
    pub inbox: bool,
    pub email: Option<EmailConfig>,
    pub push: Option<PushConfig>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            log: true,
            inbox: true,
            email: None,
            push: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sender mailbox, e.g. `WorkTrack <noreply@example.com>`.
    pub from: String,
    #[serde(default = "default_true")]
    pub starttls: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    #[serde(default)]
    pub enabled: bool,
    pub vapid_public: Option<String>,
    pub vapid_private: Option<String>,
    pub contact_email: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        Self::load_from_path(path)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(&path)?;
        let mut cfg: AppConfig = serde_yaml::from_str(&text)?;
        if let Ok(secret) = env::var("JWT_SECRET")
            && !secret.is_empty()
        {
            cfg.jwt_secret = secret;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("jwt_secret must not be empty".into()));
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::Invalid(format!(
                "bcrypt_cost must be between 4 and 31, got {}",
                self.bcrypt_cost
            )));
        }
        Ok(())
    }
}
