use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            database: DatabaseConfig { url: database_url },
            storage: StorageConfig::from_env(),
            mail: MailConfig::from_env(),
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Connection settings for the listing record store.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Object storage settings for listing images.
///
/// `public_base_url` is the externally served prefix under which stored
/// images appear; it is what lets the cleanup engine recognize which image
/// URLs it owns. The bucket section is only present when the full set of
/// credentials is configured, so a partially configured environment degrades
/// to "no deletable assets" instead of failing at startup.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub public_base_url: Option<String>,
    pub bucket: Option<S3BucketConfig>,
}

impl StorageConfig {
    fn from_env() -> Self {
        let public_base_url = env::var("STORAGE_PUBLIC_BASE")
            .ok()
            .map(|raw| raw.trim().trim_end_matches('/').to_string())
            .filter(|base| !base.is_empty());

        let bucket = match (
            env::var("STORAGE_BUCKET"),
            env::var("STORAGE_ACCESS_KEY"),
            env::var("STORAGE_SECRET_KEY"),
        ) {
            (Ok(name), Ok(access_key), Ok(secret_key)) => Some(S3BucketConfig {
                name,
                region: env::var("STORAGE_REGION").unwrap_or_else(|_| "auto".to_string()),
                endpoint: env::var("STORAGE_ENDPOINT").ok(),
                access_key,
                secret_key,
            }),
            _ => None,
        };

        Self {
            public_base_url,
            bucket,
        }
    }
}

/// Credentials and addressing for one S3-compatible bucket.
#[derive(Debug, Clone)]
pub struct S3BucketConfig {
    pub name: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
}

/// Outbound mail settings.
///
/// `api` is absent when any of the transport variables are missing; the
/// mail gateway then records notices to the spool file instead of sending.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api: Option<MailApiConfig>,
    pub spool_path: PathBuf,
}

/// Transactional-mail HTTP endpoint credentials.
#[derive(Debug, Clone)]
pub struct MailApiConfig {
    pub url: String,
    pub token: String,
    pub from: String,
}

impl MailConfig {
    fn from_env() -> Self {
        let api = match (
            env::var("MAIL_API_URL"),
            env::var("MAIL_API_TOKEN"),
            env::var("MAIL_FROM"),
        ) {
            (Ok(url), Ok(token), Ok(from)) => Some(MailApiConfig { url, token, from }),
            _ => None,
        };

        let spool_path = env::var("MAIL_SPOOL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("undelivered-mail.jsonl"));

        Self { api, spool_path }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    MissingDatabaseUrl,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::MissingDatabaseUrl => write!(f, "DATABASE_URL must be set"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::MissingDatabaseUrl => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
