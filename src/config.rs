//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration for the annotator, supporting TOML files and
//! environment variable overrides with validation and typed access.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration files (TOML), environment variables, CLI arguments
//! - **Output**: Validated configuration structs with defaults and overrides
//! - **Validation**: Type checking, range validation, dependency verification
//!
//! ## Configuration Sources (in order of precedence)
//! 1. Command line arguments (highest priority)
//! 2. Environment variables (`ANNOTATOR_*`)
//! 3. Configuration files
//! 4. Default values (lowest priority)

use crate::errors::{AnnotateError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure containing all system settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server and API configuration
    pub server: ServerConfig,
    /// Definition provider settings
    pub provider: ProviderConfig,
    /// Sentence context extraction settings
    pub context: ContextConfig,
    /// Selection and footnote behavior
    pub annotation: AnnotationConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server and API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Number of HTTP worker threads
    pub workers: usize,
    /// Enable CORS (the annotator UI runs in a browser)
    pub enable_cors: bool,
    /// Maximum uploaded document size in MB
    pub max_upload_size_mb: usize,
}

/// Definition provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Chat-completions endpoint base URL
    pub base_url: String,
    /// API key for authentication
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum response tokens
    pub max_tokens: u32,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

/// Sentence context extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Sentences taken on each side of the target sentence
    pub window_sentences: usize,
    /// Sentences returned when the target sentence cannot be located
    pub fallback_sentences: usize,
}

/// Selection and footnote behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationConfig {
    /// Maximum selectable term length in characters
    pub max_selection_chars: usize,
    /// What clearing all selections does to already-footnoted words
    pub clear_behavior: ClearBehavior,
}

/// Behavior of the clear-all operation for words that already carry a footnote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClearBehavior {
    /// Leave footnoted words untouched; only selection markers are restored.
    /// A cleared word may therefore still have a live footnote.
    KeepFootnotes,
    /// Remove every footnote as well, restoring all words to plain text
    RestoreFootnotes,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable structured JSON logging
    pub json_format: bool,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::from_file("config.toml")
    }

    /// Load configuration from a specific file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!("Configuration file not found: {:?}, using defaults", path);
            let mut config = Self::default();
            config.apply_env_overrides()?;
            config.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| AnnotateError::Config {
            message: format!("Failed to read config file {:?}: {}", path, e),
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| AnnotateError::Config {
            message: format!("Failed to parse config file {:?}: {}", path, e),
        })?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("ANNOTATOR_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("ANNOTATOR_PORT") {
            self.server.port = port.parse().map_err(|_| AnnotateError::Config {
                message: "Invalid port number in ANNOTATOR_PORT".to_string(),
            })?;
        }
        if let Ok(api_key) = std::env::var("ANNOTATOR_OPENAI_API_KEY") {
            self.provider.api_key = Some(api_key);
        }
        if let Ok(base_url) = std::env::var("ANNOTATOR_PROVIDER_URL") {
            self.provider.base_url = base_url;
        }
        if let Ok(level) = std::env::var("ANNOTATOR_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AnnotateError::validation(
                "server.port",
                "Port cannot be zero",
            ));
        }

        if self.provider.base_url.is_empty() {
            return Err(AnnotateError::validation(
                "provider.base_url",
                "Provider base URL cannot be empty",
            ));
        }

        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(AnnotateError::validation(
                "provider.temperature",
                "Temperature must be between 0.0 and 2.0",
            ));
        }

        if self.context.window_sentences == 0 {
            return Err(AnnotateError::validation(
                "context.window_sentences",
                "Context window must include at least one sentence",
            ));
        }

        if self.annotation.max_selection_chars == 0 {
            return Err(AnnotateError::validation(
                "annotation.max_selection_chars",
                "Maximum selection length must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Get configuration as TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AnnotateError::Config {
            message: format!("Failed to serialize config to TOML: {}", e),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                workers: num_cpus::get(),
                enable_cors: true,
                max_upload_size_mb: 10,
            },
            provider: ProviderConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: None,
                model: "gpt-4.1".to_string(),
                temperature: 0.3,
                max_tokens: 1000,
                timeout_seconds: 30,
            },
            context: ContextConfig {
                window_sentences: 3,
                fallback_sentences: 7,
            },
            annotation: AnnotationConfig {
                max_selection_chars: 50,
                clear_behavior: ClearBehavior::KeepFootnotes,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.annotation.max_selection_chars, 50);
        assert_eq!(config.context.window_sentences, 3);
        assert_eq!(
            config.annotation.clear_behavior,
            ClearBehavior::KeepFootnotes
        );
    }

    #[test]
    fn test_from_file_round_trip() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        let loaded = Config::from_file(file.path()).unwrap();
        assert_eq!(loaded.server.port, config.server.port);
        assert_eq!(loaded.provider.model, config.provider.model);
    }

    #[test]
    fn test_clear_behavior_parses_kebab_case() {
        let toml = r#"
            [server]
            host = "127.0.0.1"
            port = 9090
            workers = 2
            enable_cors = false
            max_upload_size_mb = 5

            [provider]
            base_url = "http://localhost:9999/v1"
            model = "test-model"
            temperature = 0.0
            max_tokens = 100
            timeout_seconds = 5

            [context]
            window_sentences = 3
            fallback_sentences = 7

            [annotation]
            max_selection_chars = 50
            clear_behavior = "restore-footnotes"

            [logging]
            level = "debug"
            json_format = false
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.annotation.clear_behavior,
            ClearBehavior::RestoreFootnotes
        );
    }

    #[test]
    fn test_validation_rejects_zero_window() {
        let mut config = Config::default();
        config.context.window_sentences = 0;
        assert!(config.validate().is_err());
    }
}
