#![allow(clippy::result_large_err)]

use super::MultiMenuConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration rules
    pub fn validate(config: &MultiMenuConfig) -> Result<(), AppError> {
        if config.dispatch.tick_ms == 0 {
            return Err(AppError::new(
                ErrorCategory::ConfigError,
                "dispatch.tick_ms must be greater than zero",
            ));
        }

        if config.dispatch.cpu_threads == 0 {
            return Err(AppError::new(
                ErrorCategory::ConfigError,
                "dispatch.cpu_threads must be greater than zero",
            ));
        }

        if config.inputs.allowed_extensions.is_empty() {
            return Err(AppError::new(
                ErrorCategory::ConfigError,
                "inputs.allowed_extensions cannot be empty",
            ));
        }

        if let Err(e) = config.dispatch.stall_timeout() {
            return Err(AppError::new(
                ErrorCategory::ConfigError,
                format!("dispatch.stall_timeout is not a duration: {}", e),
            )
            .with_suggestion("Use a humantime duration such as \"90s\" or \"10m\""));
        }

        Ok(())
    }
}
