//! Cluster capacity aggregation for Kubernetes
//!
//! This crate provides:
//! - Exact Kubernetes quantity arithmetic
//! - A cluster → node → pod rollup of requests, limits and utilization
//! - Data sources backed by the Kubernetes and metrics APIs
//! - Sorted, serializable reports of the rollup

pub mod error;
pub mod metrics;
pub mod models;
pub mod observability;
pub mod quantity;
pub mod report;
pub mod source;

pub use error::CapacityError;
pub use metrics::{ClusterMetric, NodeMetric, PodMetric, ResourceMetric, UNASSIGNED_NODE};
pub use models::*;
pub use observability::StructuredLogger;
pub use quantity::{Quantity, QuantityError, ResourceKind};
pub use report::{CapacityReport, ReportOptions, SortBy};
pub use source::{collect, ConnectOptions, Filters, KubeSource};
