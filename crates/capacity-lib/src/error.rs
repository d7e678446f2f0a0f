//! Errors surfaced by a reporting cycle

use crate::quantity::{QuantityError, ResourceKind};
use thiserror::Error;

/// Failure to obtain the snapshots a reporting cycle needs.
///
/// Each variant names the fetch that failed so callers can map it to a
/// distinct process exit status.
#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("error connecting to Kubernetes: {0}")]
    Connect(String),

    #[error("error listing nodes")]
    ListNodes(#[source] kube::Error),

    #[error("error listing pods")]
    ListPods(#[source] kube::Error),

    #[error("metrics API is not available")]
    MetricsUnavailable(#[source] kube::Error),

    #[error("error getting node metrics")]
    NodeMetrics(#[source] kube::Error),

    #[error("error getting pod metrics")]
    PodMetrics(#[source] kube::Error),

    #[error("invalid {resource} quantity on {object}")]
    InvalidQuantity {
        object: String,
        resource: ResourceKind,
        #[source]
        source: QuantityError,
    },
}

impl CapacityError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Connect(_) => 1,
            Self::ListNodes(_) => 2,
            Self::ListPods(_) => 3,
            Self::MetricsUnavailable(_) => 4,
            Self::NodeMetrics(_) => 5,
            Self::PodMetrics(_) => 6,
            Self::InvalidQuantity { .. } => 7,
        }
    }

    /// Whether the failure came from the metrics API
    pub fn is_metrics_error(&self) -> bool {
        matches!(
            self,
            Self::MetricsUnavailable(_) | Self::NodeMetrics(_) | Self::PodMetrics(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::error::ErrorResponse;

    fn api_error() -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: "boom".into(),
            reason: "InternalError".into(),
            code: 500,
        })
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            CapacityError::Connect("no kubeconfig".into()),
            CapacityError::ListNodes(api_error()),
            CapacityError::ListPods(api_error()),
            CapacityError::MetricsUnavailable(api_error()),
            CapacityError::NodeMetrics(api_error()),
            CapacityError::PodMetrics(api_error()),
            CapacityError::InvalidQuantity {
                object: "node/n1".into(),
                resource: ResourceKind::Cpu,
                source: QuantityError::Empty,
            },
        ];

        let codes: Vec<u8> = errors.iter().map(CapacityError::exit_code).collect();
        assert_eq!(codes, vec![1, 2, 3, 4, 5, 6, 7]);

        let metrics: Vec<bool> = errors.iter().map(CapacityError::is_metrics_error).collect();
        assert_eq!(metrics, vec![false, false, false, true, true, true, false]);
    }

    #[test]
    fn test_invalid_quantity_message() {
        let err = CapacityError::InvalidQuantity {
            object: "pod/default/web".into(),
            resource: ResourceKind::Memory,
            source: QuantityError::InvalidNumber("1.2.3Mi".into()),
        };
        assert_eq!(err.to_string(), "invalid memory quantity on pod/default/web");
        assert!(std::error::Error::source(&err).is_some());
    }
}
