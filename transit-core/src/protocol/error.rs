//! Provider failure causes.

use super::Capability;

/// Why a provider operation ended in `Failure`.
///
/// Every variant carries enough text to log or show to a user. Clone so a
/// failure can sit inside cached or replayed results.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Network error, timeout, connection refused
    #[error("transport error: {0}")]
    Transport(String),

    /// Upstream payload could not be understood
    #[error("parse error: {0}")]
    Parse(String),

    /// Backend answered with an error status
    #[error("service error {status}: {message}")]
    Service { status: u16, message: String },

    #[error("rate limited by backend")]
    RateLimited,

    #[error("unauthorized (invalid or missing credentials)")]
    Unauthorized,

    /// Context was malformed, expired, or issued by another provider
    #[error("invalid context: {0}")]
    InvalidContext(String),

    #[error("operation not supported: {0:?}")]
    Unsupported(Capability),

    /// Refresh could not find the trip it was asked for
    #[error("trip not found: {id}")]
    TripNotFound { id: String },

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProviderError::Service {
            status: 503,
            message: "Service Unavailable".into(),
        };
        assert_eq!(err.to_string(), "service error 503: Service Unavailable");

        let err = ProviderError::Unsupported(Capability::Refresh);
        assert_eq!(err.to_string(), "operation not supported: Refresh");

        let err = ProviderError::TripNotFound { id: "T1".into() };
        assert_eq!(err.to_string(), "trip not found: T1");

        let err = ProviderError::Other("upstream said no".into());
        assert_eq!(err.to_string(), "upstream said no");
    }
}
