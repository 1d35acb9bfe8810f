//! Environment-driven service configuration.

use std::time::Duration;

use crate::env::{EnvReader, EnvSource};
use crate::logging::{LogOutput, LoggingConfig};
use crate::retry::{RetryConfig, RetryPolicy};
use crate::{Result, ServiceError};

/// Settings every service reads at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Service name used in logs
    pub service_name: String,
    /// Raw log level name, see [`crate::logging::LogLevel`]
    pub log_level: String,
    /// Log destination
    pub log_output: LogOutput,
    /// Whether logs are emitted as JSON
    pub log_json: bool,
    /// Time allowed for closers during shutdown (must be > 0)
    pub shutdown_timeout: Duration,
    /// Retries when waiting for a dependency to become ready
    pub ready_max_retries: u32,
}

impl ServiceConfig {
    /// Loads configuration from environment variables with validation.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidEnv`] for unparsable values and
    /// [`ServiceError::InvalidConfig`] when validation fails.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_reader(&EnvReader::process())
    }

    /// Loads configuration from an arbitrary source.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_reader<S: EnvSource>(env: &EnvReader<S>) -> Result<Self> {
        let config = Self {
            service_name: env.or_default("SERVICE_NAME", "service"),
            log_level: env.or_default("LOG_LEVEL", "INFO"),
            log_output: LogOutput::parse(&env.or_default("LOG_OUTPUT", "stdout")),
            log_json: env.parse("LOG_JSON", false)?,
            shutdown_timeout: Duration::from_secs(env.parse("SHUTDOWN_TIMEOUT", 30)?),
            ready_max_retries: env.parse("READY_MAX_RETRIES", 5)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(ServiceError::invalid_config("service name must not be empty"));
        }
        if self.shutdown_timeout.is_zero() {
            return Err(ServiceError::invalid_config(
                "shutdown timeout must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Logging settings derived from this config.
    #[must_use]
    pub fn logging(&self) -> LoggingConfig {
        let config = LoggingConfig::default()
            .with_service_name(self.service_name.clone())
            .with_level_name(&self.log_level)
            .with_output(self.log_output.clone());
        if self.log_json {
            config.with_json_output()
        } else {
            config
        }
    }

    /// Readiness polling policy for startup dependency checks.
    #[must_use]
    pub const fn readiness_policy(&self) -> RetryPolicy {
        RetryPolicy::new(RetryConfig::readiness(self.ready_max_retries))
    }
}
