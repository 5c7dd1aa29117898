// Centralized configuration for the referral service
// Loaded once in main and passed down through AppState

use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

/// Cost bounds accepted by bcrypt
const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

/// Longest accepted access token lifetime: 30 days
const MAX_ACCESS_EXPIRY_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage_backend: StorageBackend,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
    pub referral: ReferralConfig,
    pub features: FeatureConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub environment: Environment,
    pub rust_log: String,
}

/// Environment type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "test" => Environment::Test,
            "staging" | "stage" => Environment::Staging,
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Which persistence implementation backs the service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::InvalidValue(
                "STORAGE_BACKEND".to_string(),
                format!("unknown backend '{}', expected postgres or memory", other),
            )),
        }
    }
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Postgres => write!(f, "postgres"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

/// Database configuration (all timeouts in seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: u64,
    pub idle_timeout: u64,
    pub max_lifetime: u64,
    pub query_timeout: u64,
}

/// JWT configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    /// Access token lifetime in seconds
    pub access_expiry: u64,
    pub audience: String,
    pub issuer: String,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("access_expiry", &self.access_expiry)
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .finish()
    }
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub bcrypt_cost: u32,
    pub rate_limit_per_minute: u32,
    pub cors_allowed_origins: Vec<String>,
}

/// Referral code lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralConfig {
    pub default_expiration_days: i64,
    pub max_code_attempts: usize,
}

/// Feature flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub enable_rate_limiting: bool,
    pub enable_swagger_ui: bool,
    pub disable_embedded_migrations: bool,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let get_required = |key: &str| -> Result<String, ConfigError> {
            env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
        };

        let get_or_default = |key: &str, default: &str| -> String {
            env::var(key).unwrap_or_else(|_| default.to_string())
        };

        let parse_or_default = |key: &str, default: &str| -> Result<u32, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u32".to_string())
            })
        };

        let parse_u64_or_default = |key: &str, default: &str| -> Result<u64, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u64".to_string())
            })
        };

        let parse_bool_or_default = |key: &str, default: &str| -> bool {
            get_or_default(key, default).to_lowercase() == "true"
        };

        let bind_address = get_or_default("BIND_ADDRESS", "0.0.0.0:8080");
        let port = bind_address
            .rsplit(':')
            .next()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let environment = Environment::from(get_or_default("ENVIRONMENT", "development"));
        let rust_log = get_or_default("RUST_LOG", "info");

        let storage_backend: StorageBackend =
            get_or_default("STORAGE_BACKEND", "postgres").parse()?;

        let database_url = match storage_backend {
            StorageBackend::Postgres => get_required("DATABASE_URL")?,
            StorageBackend::Memory => get_or_default("DATABASE_URL", ""),
        };

        let database_max_connections = parse_or_default("DATABASE_MAX_CONNECTIONS", "20")?;
        let database_min_connections = parse_or_default("DATABASE_MIN_CONNECTIONS", "2")?;
        if database_max_connections == 0 || database_max_connections < database_min_connections {
            return Err(ConfigError::InvalidValue(
                "DATABASE_MAX_CONNECTIONS".to_string(),
                "must be > 0 and >= DATABASE_MIN_CONNECTIONS".to_string(),
            ));
        }

        let database = DatabaseConfig {
            url: database_url,
            max_connections: database_max_connections,
            min_connections: database_min_connections,
            connect_timeout: parse_u64_or_default("DATABASE_CONNECT_TIMEOUT", "30")?,
            idle_timeout: parse_u64_or_default("DATABASE_IDLE_TIMEOUT", "600")?,
            max_lifetime: parse_u64_or_default("DATABASE_MAX_LIFETIME", "1800")?,
            query_timeout: parse_u64_or_default("DATABASE_QUERY_TIMEOUT", "5")?,
        };

        let jwt_secret = get_required("JWT_SECRET_KEY")?;
        if jwt_secret.len() < 32 {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET_KEY".to_string(),
                "Secret must be at least 32 characters long".to_string(),
            ));
        }

        let access_expiry = parse_u64_or_default("JWT_ACCESS_EXPIRY", "14400")?;
        if !(1..=MAX_ACCESS_EXPIRY_SECS).contains(&access_expiry) {
            return Err(ConfigError::InvalidValue(
                "JWT_ACCESS_EXPIRY".to_string(),
                format!("must be between 1 and {} seconds", MAX_ACCESS_EXPIRY_SECS),
            ));
        }

        let jwt = JwtConfig {
            secret: jwt_secret,
            access_expiry,
            audience: get_or_default("JWT_AUDIENCE", "referral-service"),
            issuer: get_or_default("JWT_ISSUER", "referral-service"),
        };

        let bcrypt_cost = parse_or_default("BCRYPT_COST", "12")?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidValue(
                "BCRYPT_COST".to_string(),
                format!(
                    "must be between {} and {}",
                    MIN_BCRYPT_COST, MAX_BCRYPT_COST
                ),
            ));
        }

        let rate_limit_per_minute = parse_or_default("RATE_LIMIT_PER_MINUTE", "30")?;
        if rate_limit_per_minute == 0 {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_PER_MINUTE".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let security = SecurityConfig {
            bcrypt_cost,
            rate_limit_per_minute,
            cors_allowed_origins: get_or_default("CORS_ALLOWED_ORIGINS", "*")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        };

        let default_expiration_days: i64 = get_or_default("REFERRAL_CODE_EXPIRATION_DAYS", "30")
            .parse()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "REFERRAL_CODE_EXPIRATION_DAYS".to_string(),
                    "not a valid integer".to_string(),
                )
            })?;
        if default_expiration_days < 1 {
            return Err(ConfigError::InvalidValue(
                "REFERRAL_CODE_EXPIRATION_DAYS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let max_code_attempts = parse_or_default("REFERRAL_CODE_MAX_ATTEMPTS", "5")? as usize;
        if max_code_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "REFERRAL_CODE_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let referral = ReferralConfig {
            default_expiration_days,
            max_code_attempts,
        };

        let features = FeatureConfig {
            enable_rate_limiting: parse_bool_or_default("ENABLE_RATE_LIMITING", "true"),
            enable_swagger_ui: parse_bool_or_default("ENABLE_SWAGGER_UI", "false"),
            disable_embedded_migrations: parse_bool_or_default(
                "DISABLE_EMBEDDED_MIGRATIONS",
                "false",
            ),
        };

        Ok(Self {
            server: ServerConfig {
                bind_address,
                port,
                environment,
                rust_log,
            },
            storage_backend,
            database,
            jwt,
            security,
            referral,
            features,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.server.environment == Environment::Production
    }
}
