// daily-focus-backend/src/config.rs
use thiserror::Error;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_POOL_SIZE: u32 = 10;
const DEFAULT_FRONTEND_URL_PROD: &str = "https://daily-focus.vercel.app";
const DEFAULT_FRONTEND_URL_DEV: &str = "http://localhost:3000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in environment variables or .env file")]
    Missing(&'static str),
    #[error("{name} must be a valid number, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub pool_size: u32,
    pub frontend_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_number(&lookup, "PORT")?.unwrap_or(DEFAULT_PORT);
        let pool_size = parse_number(&lookup, "DB_POOL_SIZE")?.unwrap_or(DEFAULT_POOL_SIZE);
        // bb8 refuses an empty pool.
        if pool_size == 0 {
            return Err(ConfigError::InvalidNumber {
                name: "DB_POOL_SIZE",
                value: "0".to_string(),
            });
        }

        let frontend_origins = vec![
            lookup("FRONTEND_URL_PROD").unwrap_or_else(|| DEFAULT_FRONTEND_URL_PROD.to_string()),
            lookup("FRONTEND_URL_DEV").unwrap_or_else(|| DEFAULT_FRONTEND_URL_DEV.to_string()),
        ];

        Ok(AppConfig {
            database_url,
            host,
            port,
            pool_size,
            frontend_origins,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
    }
}
