use std::net::SocketAddr;

use eyre::Result;

use crate::config::models::GatewayConfig;

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Gateway configuration validator
pub struct GatewayConfigValidator;

impl GatewayConfigValidator {
    /// Validate the entire gateway configuration
    pub fn validate(config: &GatewayConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        if config.routes.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "routes".to_string(),
            });
        } else {
            for (path, route) in &config.routes {
                if !path.starts_with('/') {
                    errors.push(ValidationError::InvalidField {
                        field: format!("route path: {path}"),
                        message: "Route paths must start with '/'".to_string(),
                    });
                }

                if route.service.trim().is_empty() {
                    errors.push(ValidationError::MissingField {
                        field: format!("route '{path}' service"),
                    });
                } else if !config.services.contains_key(&route.service) {
                    errors.push(ValidationError::InvalidField {
                        field: format!("route '{path}' service"),
                        message: format!(
                            "Service '{}' is not declared under 'services'",
                            route.service
                        ),
                    });
                }
            }
        }

        if config.services.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "services".to_string(),
            });
        } else {
            for (id, service) in &config.services {
                if let Err(e) = Self::validate_url(&service.url, &format!("service '{id}' url")) {
                    errors.push(e);
                }
            }
        }

        if let Err(e) = Self::validate_cors(config) {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Validate URL format
    fn validate_url(url_str: &str, context: &str) -> ValidationResult<()> {
        match url::Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: format!(
                            "URL scheme must be 'http' or 'https', got '{}'",
                            url.scheme()
                        ),
                    });
                }

                if url.host().is_none() {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: "URL must have a valid host".to_string(),
                    });
                }

                Ok(())
            }
            Err(e) => Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: format!("Invalid URL format: {e}"),
            }),
        }
    }

    fn validate_cors(config: &GatewayConfig) -> ValidationResult<()> {
        if config.cors.allow_origin.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "cors.allow_origin".to_string(),
            });
        }

        for name in &config.cors.log_headers {
            if name.parse::<http::HeaderName>().is_err() {
                return Err(ValidationError::InvalidField {
                    field: "cors.log_headers".to_string(),
                    message: format!("'{name}' is not a valid header name"),
                });
            }
        }

        Ok(())
    }

    /// Format multiple validation errors into a single message
    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.is_empty() {
            return "No errors".to_string();
        }

        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}
