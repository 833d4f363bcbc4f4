use callbridge_core::{signed_url::ElevenLabsClient, telephony::TwilioClient};
use std::net::{IpAddr, SocketAddr};
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    /// Public host name used in callback and stream URLs instead of the request's `Host`.
    pub public_host: Option<String>,
    pub elevenlabs_api_base: String,
    pub twilio_api_base: String,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let host_str = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let host = host_str
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidValue("HOST".to_string(), e.to_string()))?;

        let port_str = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
        let port = port_str
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), e.to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let public_host = std::env::var("PUBLIC_HOST")
            .ok()
            .filter(|h| !h.trim().is_empty());

        let elevenlabs_api_base = api_base("ELEVENLABS_API_BASE", ElevenLabsClient::DEFAULT_API_BASE)?;
        let twilio_api_base = api_base("TWILIO_API_BASE", TwilioClient::DEFAULT_API_BASE)?;

        Ok(Self {
            bind_address: SocketAddr::new(host, port),
            log_level,
            public_host,
            elevenlabs_api_base,
            twilio_api_base,
        })
    }
}

fn api_base(var: &str, default: &str) -> Result<String, ConfigError> {
    let value = std::env::var(var).unwrap_or_else(|_| default.to_string());
    url::Url::parse(&value).map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string()))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("HOST");
            env::remove_var("PORT");
            env::remove_var("RUST_LOG");
            env::remove_var("PUBLIC_HOST");
            env::remove_var("ELEVENLABS_API_BASE");
            env::remove_var("TWILIO_API_BASE");
        }
    }

    #[test]
    fn test_config_error_display() {
        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env_vars();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:8080");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.public_host, None);
        assert_eq!(config.elevenlabs_api_base, "https://api.elevenlabs.io");
        assert_eq!(config.twilio_api_base, "https://api.twilio.com");
    }

    #[test]
    #[serial]
    fn test_config_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("HOST", "127.0.0.1");
            env::set_var("PORT", "3000");
            env::set_var("RUST_LOG", "debug");
            env::set_var("PUBLIC_HOST", "calls.example.com");
            env::set_var("ELEVENLABS_API_BASE", "http://localhost:9001");
            env::set_var("TWILIO_API_BASE", "http://localhost:9002");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:3000");
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.public_host.as_deref(), Some("calls.example.com"));
        assert_eq!(config.elevenlabs_api_base, "http://localhost:9001");
        assert_eq!(config.twilio_api_base, "http://localhost:9002");
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_config_blank_public_host_is_ignored() {
        clear_env_vars();
        unsafe {
            env::set_var("PUBLIC_HOST", "  ");
        }

        let config = Config::from_env().expect("Config should load successfully");
        assert_eq!(config.public_host, None);
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_config_invalid_port() {
        clear_env_vars();
        unsafe {
            env::set_var("PORT", "eighty");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "PORT"),
        }
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_config_invalid_host() {
        clear_env_vars();
        unsafe {
            env::set_var("HOST", "not-an-ip");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "HOST"),
        }
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
        }
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_config_invalid_api_base() {
        clear_env_vars();
        unsafe {
            env::set_var("TWILIO_API_BASE", "not a url");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "TWILIO_API_BASE"),
        }
        clear_env_vars();
    }
}
