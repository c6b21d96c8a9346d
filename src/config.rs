use crate::stream::engine::StreamSettings;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind address (0.0.0.0 for LAN, 127.0.0.1 for localhost)
    pub bind_addr: String,
    /// Recording to stream; sessions cannot start without one
    pub recording: Option<PathBuf>,
    /// Start the stream when the first viewer connects
    pub auto_start: bool,
    /// Tick rate, detector windows and frame shape
    pub stream: StreamSettings,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = StreamSettings::default();
        let tick_interval = millis_var("NEUROHOME_TICK_MS", defaults.tick_interval)?;
        if tick_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "NEUROHOME_TICK_MS must be at least 1".to_string(),
            ));
        }

        let stream = StreamSettings {
            tick_interval,
            tolerance: millis_var("NEUROHOME_TOLERANCE_MS", defaults.tolerance)?,
            cooldown: millis_var("NEUROHOME_COOLDOWN_MS", defaults.cooldown)?,
            channel_limit: parse_var("NEUROHOME_CHANNEL_LIMIT", defaults.channel_limit)?,
            start_sample: optional_var("NEUROHOME_START_SAMPLE")?,
        };

        Ok(Self {
            port: env::var("NEUROHOME_PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            bind_addr: env::var("NEUROHOME_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            recording: env::var("NEUROHOME_RECORDING").ok().map(PathBuf::from),
            auto_start: env::var("NEUROHOME_AUTO_START")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(true),
            stream,
        })
    }

    /// Get the full bind address (addr:port)
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn millis_var(name: &str, default: Duration) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| invalid(name, &raw)),
        Err(_) => Ok(default),
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| invalid(name, &raw)),
        Err(_) => Ok(default),
    }
}

fn optional_var<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map(Some).map_err(|_| invalid(name, &raw)),
        Err(_) => Ok(None),
    }
}

fn invalid(name: &str, raw: &str) -> ConfigError {
    ConfigError::InvalidValue(format!("{} must be an unsigned integer, got {:?}", name, raw))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
