//! Configuration validation.

use url::Url;

use crate::error::ConfigError;
use crate::schema::{Config, KNOWN_STRATEGIES};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Collapse the first error into a [`ConfigError`].
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(ConfigError::InvalidValue {
                field: error.path,
                message: error.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_browser(config, &mut result);
        Self::validate_jobs(config, &mut result);
        Self::validate_vendors(config, &mut result);

        result
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }
    }

    fn validate_browser(config: &Config, result: &mut ValidationResult) {
        let browser = &config.browser;

        if browser.strategies.is_empty() {
            result.add_error(ValidationError::new(
                "browser.strategies",
                "At least one launch strategy is required",
            ));
        }

        for strategy in &browser.strategies {
            if !KNOWN_STRATEGIES.contains(&strategy.as_str()) {
                result.add_error(ValidationError::new(
                    "browser.strategies",
                    format!(
                        "Unknown launch strategy '{}', valid values: {:?}",
                        strategy, KNOWN_STRATEGIES
                    ),
                ));
            }
        }

        if !browser.cdp_endpoint.starts_with("http://") && !browser.cdp_endpoint.starts_with("https://") {
            result.add_error(ValidationError::new(
                "browser.cdp_endpoint",
                "cdp_endpoint must start with http:// or https://",
            ));
        }

        if browser.launch_timeout_seconds == 0 {
            result.add_error(ValidationError::new(
                "browser.launch_timeout_seconds",
                "launch_timeout_seconds must be greater than 0",
            ));
        }

        if let Some(ref path) = browser.chrome_path {
            if !std::path::Path::new(path).exists() {
                result.add_warning(ValidationWarning::new(
                    "browser.chrome_path",
                    format!("Chrome executable does not exist: {}", path),
                ));
            }
        }
    }

    fn validate_jobs(config: &Config, result: &mut ValidationResult) {
        if config.jobs.default_limit == 0 {
            result.add_error(ValidationError::new(
                "jobs.default_limit",
                "default_limit must be greater than 0",
            ));
        }

        if config.jobs.scan_timeout_seconds == 0 {
            result.add_error(ValidationError::new(
                "jobs.scan_timeout_seconds",
                "scan_timeout_seconds must be greater than 0",
            ));
        }

        if config.jobs.poll_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "jobs.poll_interval_ms",
                "poll_interval_ms must be greater than 0",
            ));
        }
    }

    fn validate_vendors(config: &Config, result: &mut ValidationResult) {
        for (id, vendor) in &config.vendors {
            if !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                result.add_error(ValidationError::new(
                    format!("vendors.{}", id),
                    "Vendor id may only contain letters, digits, '-' and '_'",
                ));
            }

            for (field, value) in [
                ("login_url", &vendor.login_url),
                ("invoice_list_url", &vendor.invoice_list_url),
            ] {
                if let Some(url) = value {
                    if let Err(e) = Url::parse(url) {
                        result.add_error(ValidationError::new(
                            format!("vendors.{}.{}", id, field),
                            format!("Invalid URL '{}': {}", url, e),
                        ));
                    }
                }
            }

            for (field, value) in [
                ("auth_timeout_seconds", vendor.auth_timeout_seconds),
                ("download_timeout_seconds", vendor.download_timeout_seconds),
            ] {
                if value == Some(0) {
                    result.add_error(ValidationError::new(
                        format!("vendors.{}.{}", id, field),
                        format!("{} must be greater than 0", field),
                    ));
                }
            }

            if let Some(auth) = vendor.auth_timeout_seconds {
                if auth > 600 {
                    result.add_warning(ValidationWarning::new(
                        format!("vendors.{}.auth_timeout_seconds", id),
                        "auth timeout above 10 minutes keeps a browser open for a long time",
                    ));
                }
            }

            if let Some(ref sep) = vendor.decimal_separator {
                if !["comma", "dot", "auto"].contains(&sep.as_str()) {
                    result.add_error(ValidationError::new(
                        format!("vendors.{}.decimal_separator", id),
                        "decimal_separator must be one of comma, dot, auto",
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
