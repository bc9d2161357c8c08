use depthscale_cache::CacheError;
use depthscale_metrics::ChannelError;
use thiserror::Error;

/// Everything that can go wrong while handling one invocation.
///
/// The validation variants render as the exact error text returned to the
/// caller.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("You must provide required property 'params' for this function to execute.")]
    MissingParams,

    #[error("Event of type {0} not supported. Only 'set' and 'get' event types are supported.")]
    UnsupportedType(String),

    #[error("Missing 'key' and 'value' properties for event of type 'set'")]
    MissingKeyOrValue,

    #[error("Missing 'key' property for event of type 'get'")]
    MissingKey,

    #[error("cache unavailable: {0}")]
    CacheConnection(#[from] CacheError),

    #[error("failed to publish metric: {0}")]
    MetricPublish(#[from] ChannelError),

    /// The read succeeded but its value cannot be a queue depth.
    #[error("cache value for key '{key}' is not numeric: '{value}'")]
    NonNumericMetricValue { key: String, value: String },
}

impl ProxyError {
    /// HTTP-style status code for the response carrying this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ProxyError::MissingParams
            | ProxyError::UnsupportedType(_)
            | ProxyError::MissingKeyOrValue
            | ProxyError::MissingKey => 401,
            ProxyError::CacheConnection(_) => 503,
            ProxyError::MetricPublish(_) => 502,
            ProxyError::NonNumericMetricValue { .. } => 422,
        }
    }

    /// Whether the request itself was at fault.
    pub fn is_validation(&self) -> bool {
        self.status_code() == 401
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_401() {
        for err in [
            ProxyError::MissingParams,
            ProxyError::UnsupportedType("delete".into()),
            ProxyError::MissingKeyOrValue,
            ProxyError::MissingKey,
        ] {
            assert_eq!(err.status_code(), 401);
            assert!(err.is_validation());
        }
    }

    #[test]
    fn infrastructure_errors_are_5xx() {
        let cache = ProxyError::from(CacheError::Closed);
        assert_eq!(cache.status_code(), 503);
        assert!(!cache.is_validation());

        let publish = ProxyError::from(ChannelError::EmptyNamespace);
        assert_eq!(publish.status_code(), 502);
    }

    #[test]
    fn non_numeric_value_is_not_a_success() {
        let err = ProxyError::NonNumericMetricValue {
            key: "queue".into(),
            value: "lots".into(),
        };
        assert_eq!(err.status_code(), 422);
        assert!(!err.is_validation());
        assert_eq!(err.to_string(), "cache value for key 'queue' is not numeric: 'lots'");
    }

    #[test]
    fn unsupported_type_names_the_type() {
        assert_eq!(
            ProxyError::UnsupportedType("delete".into()).to_string(),
            "Event of type delete not supported. Only 'set' and 'get' event types are supported."
        );
    }
}
