//! Configuration settings for trustline.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::TrustError;
use crate::tokens::SequenceSpace;

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub authority: AuthorityConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Authority configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorityConfig {
    /// Identity the authority presents to entities.
    #[serde(default = "default_authority_identity")]
    pub identity: String,
    /// Path to the authority secret file used to protect issued tokens.
    pub secret_path: Option<PathBuf>,
}

/// Token validity and renewal policy.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Seconds from issue until a master token becomes renewable.
    #[serde(default = "default_renewal_offset")]
    pub renewal_offset_seconds: u64,
    /// Seconds from issue until a master token expires.
    #[serde(default = "default_expiration_offset")]
    pub expiration_offset_seconds: u64,
    /// Seconds from issue until a user ID token becomes renewable.
    #[serde(default = "default_renewal_offset")]
    pub user_id_token_renewal_offset_seconds: u64,
    /// Seconds from issue until a user ID token expires.
    #[serde(default = "default_expiration_offset")]
    pub user_id_token_expiration_offset_seconds: u64,
    /// Maximum distance between a presented sequence number and the newest
    /// issued one before the entity must re-authenticate.
    #[serde(default = "default_max_sequence_drift")]
    pub max_sequence_drift: u64,
}

/// Replay guard configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayConfig {
    /// Minimum time an observed message nonce is remembered, in seconds.
    /// Nonces are also kept until the master token they arrived under expires.
    #[serde(default = "default_nonce_ttl")]
    pub nonce_ttl_seconds: u64,
    /// Interval of the background cleanup task, in seconds.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_authority_identity() -> String {
    "trustline-authority".to_string()
}

fn default_renewal_offset() -> u64 {
    600
}

fn default_expiration_offset() -> u64 {
    1200
}

fn default_max_sequence_drift() -> u64 {
    32
}

fn default_nonce_ttl() -> u64 {
    300
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Upper bound on any configured offset (about 68 years).
const MAX_OFFSET_SECONDS: u64 = i32::MAX as u64;

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            identity: default_authority_identity(),
            secret_path: None,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            renewal_offset_seconds: default_renewal_offset(),
            expiration_offset_seconds: default_expiration_offset(),
            user_id_token_renewal_offset_seconds: default_renewal_offset(),
            user_id_token_expiration_offset_seconds: default_expiration_offset(),
            max_sequence_drift: default_max_sequence_drift(),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            nonce_ttl_seconds: default_nonce_ttl(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl TokenConfig {
    fn validate(&self) -> Result<(), TrustError> {
        validate_window(
            "tokens.renewal_offset_seconds",
            self.renewal_offset_seconds,
            self.expiration_offset_seconds,
        )?;
        validate_window(
            "tokens.user_id_token_renewal_offset_seconds",
            self.user_id_token_renewal_offset_seconds,
            self.user_id_token_expiration_offset_seconds,
        )?;

        if self.max_sequence_drift >= SequenceSpace::HALF_MODULUS {
            return Err(TrustError::Config {
                message: format!(
                    "max_sequence_drift {} must be below {}",
                    self.max_sequence_drift,
                    SequenceSpace::HALF_MODULUS
                ),
            });
        }

        Ok(())
    }
}

fn validate_window(name: &str, renewal: u64, expiration: u64) -> Result<(), TrustError> {
    if renewal == 0 {
        return Err(TrustError::Config {
            message: format!("{} must be greater than zero", name),
        });
    }
    if expiration <= renewal {
        return Err(TrustError::Config {
            message: format!(
                "{}: expiration offset {} must be greater than renewal offset {}",
                name, expiration, renewal
            ),
        });
    }
    if expiration > MAX_OFFSET_SECONDS {
        return Err(TrustError::Config {
            message: format!(
                "{}: expiration offset {} exceeds maximum of {}",
                name, expiration, MAX_OFFSET_SECONDS
            ),
        });
    }
    Ok(())
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TrustError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| TrustError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        let settings = Self::from_toml(&content).map_err(|e| TrustError::Config {
            message: format!("Invalid config file '{}': {}", path.display(), e),
        })?;

        Ok(settings)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, TrustError> {
        let settings: Settings = toml::from_str(content).map_err(|e| TrustError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), TrustError> {
        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(TrustError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        // Validate log format
        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(TrustError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        if self.authority.identity.is_empty() {
            return Err(TrustError::Config {
                message: "authority.identity must not be empty".to_string(),
            });
        }

        if self.replay.nonce_ttl_seconds == 0 {
            return Err(TrustError::Config {
                message: "replay.nonce_ttl_seconds must be greater than zero".to_string(),
            });
        }

        if self.replay.cleanup_interval_seconds == 0 {
            return Err(TrustError::Config {
                message: "replay.cleanup_interval_seconds must be greater than zero".to_string(),
            });
        }

        self.tokens.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_values() {
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_log_format(), "pretty");
        assert_eq!(default_max_sequence_drift(), 32);

        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert!(settings.tokens.expiration_offset_seconds > settings.tokens.renewal_offset_seconds);
    }

    #[test]
    fn test_parse_partial_config() {
        let settings = Settings::from_toml(
            r#"
            [authority]
            identity = "auth.example"
            secret_path = "/etc/trustline/authority.key"

            [tokens]
            renewal_offset_seconds = 10
            expiration_offset_seconds = 20
            max_sequence_drift = 4
            "#,
        )
        .unwrap();

        assert_eq!(settings.authority.identity, "auth.example");
        assert_eq!(settings.tokens.renewal_offset_seconds, 10);
        assert_eq!(settings.tokens.max_sequence_drift, 4);
        assert_eq!(settings.replay.nonce_ttl_seconds, 300);
        assert_eq!(settings.logging.format, "pretty");
    }

    #[test]
    fn test_expiration_must_follow_renewal() {
        let result = Settings::from_toml(
            r#"
            [tokens]
            renewal_offset_seconds = 20
            expiration_offset_seconds = 20
            "#,
        );
        assert!(matches!(result, Err(TrustError::Config { .. })));
    }

    #[test]
    fn test_drift_bound_enforced() {
        let mut settings = Settings::default();
        settings.tokens.max_sequence_drift = SequenceSpace::HALF_MODULUS;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_invalid_log_format() {
        let result = Settings::from_toml(
            r#"
            [logging]
            format = "xml"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[replay]\nnonce_ttl_seconds = 30").unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.replay.nonce_ttl_seconds, 30);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Settings::load("/nonexistent/trustline.toml");
        assert!(matches!(result, Err(TrustError::Config { .. })));
    }
}
