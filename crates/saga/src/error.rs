//! Saga error types.

use domain::VipBundleError;
use messaging::HandlerError;
use store::StoreError;
use thiserror::Error;

/// Failure reported by an external service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service refused the request; asking again will not help.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The service could not be reached or timed out.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The aggregate refused a change.
    #[error("VIP bundle error: {0}")]
    VipBundle(#[from] VipBundleError),

    /// Saga state store or outbox error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// External service error.
    #[error("{service} service {source}")]
    Service {
        service: &'static str,
        #[source]
        source: ServiceError,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SagaError {
    /// Wraps a failure reported by `service`.
    pub fn service(service: &'static str, source: ServiceError) -> Self {
        SagaError::Service { service, source }
    }

    /// Returns true if the operation may succeed when retried.
    pub fn is_transient(&self) -> bool {
        match self {
            SagaError::VipBundle(e) => e.is_eventually_consistent(),
            SagaError::Store(e) => e.is_transient(),
            SagaError::Service { source, .. } => {
                matches!(source, ServiceError::Unavailable(_))
            }
            SagaError::Serialization(_) => false,
        }
    }
}

impl From<SagaError> for HandlerError {
    fn from(err: SagaError) -> Self {
        if err.is_transient() {
            HandlerError::transient(err)
        } else {
            HandlerError::fatal(err)
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use common::{FlightId, VipBundleId};

    use super::*;

    #[test]
    fn test_unconfirmed_tickets_are_retried() {
        let err = SagaError::from(VipBundleError::TicketsNotConfirmed {
            vip_bundle_id: VipBundleId::new(),
            expected: 2,
            actual: 1,
        });
        assert!(HandlerError::from(err).is_transient());
    }

    #[test]
    fn test_unknown_flight_is_fatal() {
        let err = SagaError::from(VipBundleError::UnknownFlight {
            vip_bundle_id: VipBundleId::new(),
            flight_id: FlightId::new(),
        });
        assert!(!HandlerError::from(err).is_transient());
    }

    #[test]
    fn test_service_errors_split_on_availability() {
        let down = SagaError::service("flights", ServiceError::Unavailable("timeout".into()));
        let refused = SagaError::service("flights", ServiceError::Rejected("sold out".into()));
        assert!(down.is_transient());
        assert!(!refused.is_transient());
        assert_eq!(down.to_string(), "flights service unavailable: timeout");
    }
}
