//! Runtime configuration for the compliance pipeline and its server.
//!
//! Values come from defaults, then environment variables, then CLI flags
//! (applied by the caller through the `with_*` builders).

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for the completion function, the store and the HTTP server.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // Completion function
    /// Base URL of the OpenAI-compatible API.
    pub llm_api_base: String,
    /// Bearer token for the API, if it needs one.
    pub llm_api_key: Option<String>,
    /// Model used for every stage.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Upper bound on completion length.
    pub max_tokens: u32,
    /// Deadline for one completion call.
    pub completion_timeout: Duration,

    // Store
    /// PostgreSQL URL. `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Deadline for one best-effort store write.
    pub store_timeout: Duration,

    // Server
    /// Socket address the HTTP server binds to.
    pub bind_addr: String,
    /// Origin allowed by CORS.
    pub cors_origin: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            llm_api_base: "https://api.openai.com/v1".to_string(),
            llm_api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_tokens: 2000,
            completion_timeout: Duration::from_secs(120),

            database_url: None,
            store_timeout: Duration::from_secs(10),

            bind_addr: "0.0.0.0:8000".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `COMPLIANCE_LLM_API_BASE`: API base URL (default: https://api.openai.com/v1)
    /// - `OPENAI_API_KEY`: API key (optional)
    /// - `COMPLIANCE_MODEL`: Model name (default: gpt-4o-mini)
    /// - `COMPLIANCE_TEMPERATURE`: Temperature (default: 0.2)
    /// - `COMPLIANCE_MAX_TOKENS`: Max completion tokens (default: 2000)
    /// - `COMPLIANCE_COMPLETION_TIMEOUT_SECS`: Completion deadline (default: 120)
    /// - `COMPLIANCE_STORE_TIMEOUT_SECS`: Store write deadline (default: 10)
    /// - `DATABASE_URL`: PostgreSQL URL (optional; unset uses the in-memory store)
    /// - `COMPLIANCE_BIND_ADDR`: Server address (default: 0.0.0.0:8000)
    /// - `COMPLIANCE_CORS_ORIGIN`: Allowed CORS origin (default: http://localhost:3000)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable cannot be parsed or the result is
    /// invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(val) = var("COMPLIANCE_LLM_API_BASE") {
            config.llm_api_base = val;
        }

        config.llm_api_key = var("OPENAI_API_KEY");

        if let Some(val) = var("COMPLIANCE_MODEL") {
            config.model = val;
        }

        if let Some(val) = var("COMPLIANCE_TEMPERATURE") {
            config.temperature = parse_env_value(&val, "COMPLIANCE_TEMPERATURE")?;
        }

        if let Some(val) = var("COMPLIANCE_MAX_TOKENS") {
            config.max_tokens = parse_env_value(&val, "COMPLIANCE_MAX_TOKENS")?;
        }

        if let Some(val) = var("COMPLIANCE_COMPLETION_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "COMPLIANCE_COMPLETION_TIMEOUT_SECS")?;
            config.completion_timeout = Duration::from_secs(secs);
        }

        config.database_url = var("DATABASE_URL");

        if let Some(val) = var("COMPLIANCE_STORE_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "COMPLIANCE_STORE_TIMEOUT_SECS")?;
            config.store_timeout = Duration::from_secs(secs);
        }

        if let Some(val) = var("COMPLIANCE_BIND_ADDR") {
            config.bind_addr = val;
        }

        if let Some(val) = var("COMPLIANCE_CORS_ORIGIN") {
            config.cors_origin = val;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm_api_base.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "llm_api_base cannot be empty".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model cannot be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.completion_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "completion_timeout must be greater than 0".to_string(),
            ));
        }

        if self.store_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "store_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_llm_api_base(mut self, base: impl Into<String>) -> Self {
        self.llm_api_base = base.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = timeout;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origin = origin.into();
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.llm_api_base, "https://api.openai.com/v1");
        assert_eq!(config.model, "gpt-4o-mini");
        assert!((config.temperature - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.max_tokens, 2000);
        assert_eq!(config.completion_timeout, Duration::from_secs(120));
        assert_eq!(config.store_timeout, Duration::from_secs(10));
        assert!(config.database_url.is_none());
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.cors_origin, "http://localhost:3000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_reads_variables() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("COMPLIANCE_MODEL", "gpt-4o"),
            ("COMPLIANCE_TEMPERATURE", "0.5"),
            ("COMPLIANCE_COMPLETION_TIMEOUT_SECS", "30"),
            ("DATABASE_URL", "postgres://localhost/compliance"),
            ("OPENAI_API_KEY", "sk-test"),
        ]))
        .expect("valid config");

        assert_eq!(config.model, "gpt-4o");
        assert!((config.temperature - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.completion_timeout, Duration::from_secs(30));
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/compliance")
        );
        assert_eq!(config.llm_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_blank_database_url_means_memory_store() {
        let config =
            PipelineConfig::from_lookup(lookup(&[("DATABASE_URL", "  ")])).expect("valid config");
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_unparseable_value() {
        let err = PipelineConfig::from_lookup(lookup(&[("COMPLIANCE_MAX_TOKENS", "lots")]))
            .expect_err("invalid number");
        assert!(err.to_string().contains("COMPLIANCE_MAX_TOKENS"));
    }

    #[test]
    fn test_validation_invalid_temperature() {
        let result = PipelineConfig::default().with_temperature(3.0).validate();
        assert!(result.unwrap_err().to_string().contains("temperature"));
    }

    #[test]
    fn test_validation_zero_timeouts() {
        let result = PipelineConfig::default()
            .with_completion_timeout(Duration::ZERO)
            .validate();
        assert!(result.unwrap_err().to_string().contains("completion_timeout"));

        let result = PipelineConfig::default()
            .with_store_timeout(Duration::ZERO)
            .validate();
        assert!(result.unwrap_err().to_string().contains("store_timeout"));
    }

    #[test]
    fn test_validation_empty_model() {
        let result = PipelineConfig::default().with_model("").validate();
        assert!(result.unwrap_err().to_string().contains("model"));
    }
}
