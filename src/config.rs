use sqlx::mysql::MySqlConnectOptions;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "Missing required database configuration: {0}. \
         MYSQL_USER, MYSQL_PASSWORD and MYSQL_DATABASE must be set"
    )]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidVar(&'static str, String),
}

/// Process-wide configuration, resolved once at startup and immutable
/// afterwards. Components receive it explicitly; nothing reads the
/// environment per call.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub export_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

impl Config {
    /// Resolves configuration from the environment. Absence of user,
    /// password or database name is a startup-fatal error, raised here
    /// before any query processing.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database = DatabaseConfig {
            host: env_or("MYSQL_HOST", "127.0.0.1"),
            port: parse_var("MYSQL_PORT", 3306)?,
            user: required("MYSQL_USER")?,
            password: required("MYSQL_PASSWORD")?,
            database: required("MYSQL_DATABASE")?,
        };

        let server = ServerConfig {
            host: env_or("MYSQLGATE_HOST", "127.0.0.1"),
            port: parse_var("MYSQLGATE_PORT", 3000)?,
        };

        let export_dir = PathBuf::from(env_or("MYSQLGATE_EXPORT_DIR", "temp_data"));

        Ok(Self {
            server,
            database,
            export_dir,
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingVar(name))
}

fn parse_var(name: &'static str, default: u16) -> Result<u16, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.is_empty() => raw.parse().map_err(|_| ConfigError::InvalidVar(name, raw)),
        _ => Ok(default),
    }
}
