//! Error types shared by every component of the core.

use thiserror::Error;

/// Failure of a provider call, a resolver run or a store fetch.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Missing or unusable configuration, most often the API key.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A by-name lookup came back as not found.
    #[error("Place not found: {0}")]
    PlaceNotFound(String),

    /// Blank place query, rejected before any request is issued.
    #[error("Invalid place: {0}")]
    InvalidPlace(String),

    /// Non-success status or transport failure from an external service.
    #[error("{service} unavailable: {reason}")]
    ProviderUnavailable { service: &'static str, reason: String },

    /// Every location source was tried and none produced a place.
    #[error("Could not resolve a location from any source")]
    LocationUnresolved,

    /// A payload was missing fields or failed validation.
    #[error("Malformed {service} response: {reason}")]
    MalformedResponse { service: &'static str, reason: String },
}

impl WeatherError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    pub fn unavailable<S: Into<String>>(service: &'static str, reason: S) -> Self {
        Self::ProviderUnavailable {
            service,
            reason: reason.into(),
        }
    }

    pub fn malformed<S: Into<String>>(service: &'static str, reason: S) -> Self {
        Self::MalformedResponse {
            service,
            reason: reason.into(),
        }
    }

    /// Whether the user can fix this by entering a different place.
    pub fn needs_manual_input(&self) -> bool {
        matches!(
            self,
            Self::PlaceNotFound(_) | Self::InvalidPlace(_) | Self::LocationUnresolved
        )
    }
}

/// Errors from the device positioning service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    Unavailable,
    #[error("Location request timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, WeatherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_unavailable_names_the_service() {
        let err = WeatherError::unavailable("OpenWeather", "status 503");
        assert_eq!(err.to_string(), "OpenWeather unavailable: status 503");
    }

    #[test]
    fn manual_input_errors() {
        assert!(WeatherError::PlaceNotFound("x".into()).needs_manual_input());
        assert!(WeatherError::LocationUnresolved.needs_manual_input());
        assert!(!WeatherError::configuration("no key").needs_manual_input());
        assert!(!WeatherError::malformed("OpenWeather", "bad").needs_manual_input());
    }
}
