use std::{fs, net::SocketAddr, path::Path};

use serde::Deserialize;

/// Minimum length of a cookie signing secret.
pub const MIN_SECRET_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] toml::de::Error),

    #[error("session secret must be at least 64 bytes, got {0}")]
    ShortSecret(usize),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Cookie signing secret. A random key is used when absent, which signs
    /// everyone out on restart.
    #[serde(default)]
    pub secret: Option<String>,

    #[serde(default = "default_inactivity_minutes")]
    pub inactivity_minutes: i64,

    #[serde(default)]
    pub secure_cookie: bool,
}

fn default_inactivity_minutes() -> i64 {
    24 * 60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: None,
            inactivity_minutes: default_inactivity_minutes(),
            secure_cookie: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
}

fn default_redirect_uri() -> String {
    "http://localhost:3000/auth/callback".to_string()
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: default_redirect_uri(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub oauth: OAuthConfig,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_database_url() -> String {
    "sqlite://todos.db".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            database_url: default_database_url(),
            session: SessionConfig::default(),
            oauth: OAuthConfig::default(),
        }
    }
}

impl Config {
    /// Reads the TOML file if given, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_toml(&contents)?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// `KAKAO_CLIENT_ID`, `KAKAO_CLIENT_SECRET` and `SESSION_SECRET` win over
    /// the file.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(client_id) = lookup("KAKAO_CLIENT_ID") {
            self.oauth.client_id = client_id;
        }
        if let Some(client_secret) = lookup("KAKAO_CLIENT_SECRET") {
            self.oauth.client_secret = client_secret;
        }
        if let Some(secret) = lookup("SESSION_SECRET") {
            self.session.secret = Some(secret);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.session.secret {
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                Err(ConfigError::ShortSecret(secret.len()))
            }
            _ => Ok(()),
        }
    }
}
