//! Environment-driven configuration.
//!
//! Everything is optional with defaults except production credentials; the
//! registries for the two upstream surfaces live in their own modules.

mod scenarios;
mod standards;

pub use scenarios::{ApiType, ScenarioApp, ScenarioRegistry, DEFAULT_SCENARIO};
pub use standards::{StandardApp, StandardTypeRegistry};

use std::net::SocketAddr;

use normgate_error::ConfigError;

/// Read an environment variable, falling back to a default.
pub(crate) fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidVar {
            name: name.to_string(),
            reason: format!("cannot parse {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(default)
}

/// Deployment environment, selected by `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Local development: verbose logging by default.
    #[default]
    Development,
    /// Test runs.
    Testing,
    /// Production: info-level logging, stdout off by default.
    Production,
}

impl Environment {
    fn from_env() -> Self {
        match env_or("APP_ENV", "development").to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Human-readable name, used in the startup banner.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Production => "production",
        }
    }

    const fn default_log_level(self) -> &'static str {
        match self {
            Self::Development | Self::Testing => "DEBUG",
            Self::Production => "INFO",
        }
    }

    const fn default_log_to_stdout(self) -> bool {
        matches!(self, Self::Development | Self::Testing)
    }
}

/// Logging configuration (rotating file plus optional stdout).
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Log level filter (trace/debug/info/warn/error).
    pub level: String,
    /// Mirror log lines to stdout.
    pub to_stdout: bool,
    /// Write log lines to a rotating file.
    pub to_file: bool,
    /// Path of the active log file.
    pub file_path: String,
    /// Rotation threshold in bytes.
    pub max_bytes: u64,
    /// Number of rotated files kept.
    pub backup_count: u32,
}

/// Neo4j connection settings.
#[derive(Debug, Clone)]
pub struct Neo4jSettings {
    /// Bolt URI.
    pub uri: String,
    /// Username.
    pub user: String,
    /// Password.
    pub password: String,
}

/// Process-wide settings resolved once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Deployment environment.
    pub environment: Environment,
    /// MySQL connection URL (utf8mb4).
    pub database_url: String,
    /// HTTP bind address.
    pub bind_addr: SocketAddr,
    /// Application secret.
    pub secret_key: String,
    /// JWT signing secret.
    pub jwt_secret_key: String,
    /// Access-token lifetime in seconds (default 12 h).
    pub jwt_access_token_expires: u64,
    /// Data root directory (raw, resolved by [`crate::Storage`]).
    pub data_root_dir: String,
    /// Upload directory (raw).
    pub upload_files_dir: String,
    /// Export directory (raw).
    pub export_files_dir: String,
    /// Temp directory (raw).
    pub temp_files_dir: String,
    /// Logging configuration.
    pub log: LogSettings,
    /// Shared Dify file-upload endpoint.
    pub dify_file_upload_url: String,
    /// Graph database connection.
    pub neo4j: Neo4jSettings,
}

impl Settings {
    /// Load settings from the process environment (reading `.env` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = Environment::from_env();
        let database_url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                let host = env_or("DB_HOST", "localhost");
                let port = env_or("DB_PORT", "3306");
                let username = env_or("DB_USERNAME", "root");
                let password = env_or("DB_PASSWORD", "");
                let name = env_or("DB_NAME", "user_system");
                format!("mysql://{username}:{password}@{host}:{port}/{name}?charset=utf8mb4")
            }
        };

        let bind_addr: SocketAddr = env_or("BIND_ADDR", "0.0.0.0:5000")
            .parse()
            .map_err(|e| ConfigError::InvalidVar {
                name: "BIND_ADDR".to_string(),
                reason: format!("{e}"),
            })?;

        let data_root_dir = env_or("DATA_ROOT_DIR", "data");
        let upload_default = format!("{data_root_dir}/uploads");
        let export_default = format!("{data_root_dir}/exports");
        let temp_default = format!("{data_root_dir}/temp");

        Ok(Self {
            database_url,
            bind_addr,
            secret_key: env_or("SECRET_KEY", "dev-secret-key-change-in-production"),
            jwt_secret_key: env_or("JWT_SECRET_KEY", "jwt-secret-string-change-in-production"),
            jwt_access_token_expires: env_parse("JWT_ACCESS_TOKEN_EXPIRES", 43_200)?,
            upload_files_dir: env_or("UPLOAD_FILES_DIR", &upload_default),
            export_files_dir: env_or("EXPORT_FILES_DIR", &export_default),
            temp_files_dir: env_or("TEMP_FILES_DIR", &temp_default),
            data_root_dir,
            log: LogSettings {
                level: env_or("LOG_LEVEL", environment.default_log_level()),
                to_stdout: env_bool("LOG_TO_STDOUT", environment.default_log_to_stdout()),
                to_file: env_bool("LOG_TO_FILE", true),
                file_path: env_or("LOG_FILE_PATH", "logs/app.log"),
                max_bytes: env_parse("LOG_MAX_BYTES", 10_485_760)?,
                backup_count: env_parse("LOG_BACKUP_COUNT", 10)?,
            },
            environment,
            dify_file_upload_url: env_or(
                "DIFY_FILE_UPLOAD_URL",
                "http://localhost/v1/files/upload",
            ),
            neo4j: Neo4jSettings {
                uri: env_or("NEO4J_URI", "bolt://localhost:7687"),
                user: env_or("NEO4J_USER", "neo4j"),
                password: env_or("NEO4J_PASSWORD", "neo4j"),
            },
        })
    }
}

/// Mask a credential for status endpoints and logs: `abcd1234...wxyz`.
pub fn mask_key(key: &str) -> String {
    if key.len() > 12 {
        format!("{}...{}", &key[..8], &key[key.len() - 4..])
    } else {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key_long() {
        assert_eq!(mask_key("app-0123456789abcdef"), "app-0123...cdef");
    }

    #[test]
    fn test_mask_key_short_left_alone() {
        assert_eq!(mask_key("short-key"), "short-key");
    }

    #[test]
    fn test_environment_selection() {
        std::env::set_var("APP_ENV", "production");
        assert_eq!(Environment::from_env(), Environment::Production);
        std::env::set_var("APP_ENV", "test");
        assert_eq!(Environment::from_env(), Environment::Testing);
        std::env::remove_var("APP_ENV");
        assert_eq!(Environment::from_env(), Environment::Development);
    }

    #[test]
    fn test_environment_log_defaults() {
        assert_eq!(Environment::Production.default_log_level(), "INFO");
        assert_eq!(Environment::Development.default_log_level(), "DEBUG");
        assert!(!Environment::Production.default_log_to_stdout());
        assert!(Environment::Development.default_log_to_stdout());
    }

    #[test]
    fn test_env_bool_parsing() {
        std::env::set_var("NORMGATE_TEST_BOOL", "True");
        assert!(env_bool("NORMGATE_TEST_BOOL", false));
        std::env::set_var("NORMGATE_TEST_BOOL", "0");
        assert!(!env_bool("NORMGATE_TEST_BOOL", true));
        std::env::remove_var("NORMGATE_TEST_BOOL");
        assert!(env_bool("NORMGATE_TEST_BOOL", true));
    }
}
