//! Structured logging for reporting cycles
//!
//! One event per cycle phase, with consistent field names so log lines can be
//! filtered by `event` when running with JSON output.

use crate::metrics::BuildStats;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Structured logger for capacity reporting events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    cluster: String,
}

impl StructuredLogger {
    /// `cluster` identifies the target, usually the kubeconfig context
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
        }
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Log a completed inventory fetch
    pub fn log_inventory_fetched(&self, nodes: usize, pods: usize, elapsed: Duration) {
        info!(
            event = "inventory_fetched",
            cluster = %self.cluster,
            nodes = nodes,
            pods = pods,
            elapsed_ms = elapsed.as_millis() as u64,
            "Fetched node and pod inventory"
        );
    }

    /// Log a completed utilization fetch
    pub fn log_utilization_fetched(
        &self,
        node_samples: usize,
        pod_samples: usize,
        elapsed: Duration,
    ) {
        info!(
            event = "utilization_fetched",
            cluster = %self.cluster,
            node_samples = node_samples,
            pod_samples = pod_samples,
            elapsed_ms = elapsed.as_millis() as u64,
            "Fetched usage samples from metrics API"
        );
    }

    /// Log the outcome of building the capacity graph
    pub fn log_cluster_built(&self, nodes: usize, pods: usize, stats: &BuildStats) {
        info!(
            event = "cluster_built",
            cluster = %self.cluster,
            nodes = nodes,
            pods = pods,
            terminal_pods = stats.terminal_pods,
            node_samples = stats.node_samples,
            pod_samples = stats.pod_samples,
            "Built cluster capacity graph"
        );

        if stats.orphaned_pods > 0 {
            warn!(
                event = "orphan_attached",
                cluster = %self.cluster,
                orphaned_pods = stats.orphaned_pods,
                "Pods without a known node were attached to the unassigned node"
            );
        }

        if stats.duplicate_nodes > 0 || stats.duplicate_pods > 0 {
            warn!(
                event = "duplicate_records",
                cluster = %self.cluster,
                duplicate_nodes = stats.duplicate_nodes,
                duplicate_pods = stats.duplicate_pods,
                "Ignored duplicate inventory records"
            );
        }

        if stats.dropped_node_samples > 0 || stats.dropped_pod_samples > 0 {
            debug!(
                event = "sample_dropped",
                cluster = %self.cluster,
                dropped_node_samples = stats.dropped_node_samples,
                dropped_pod_samples = stats.dropped_pod_samples,
                "Dropped usage samples with no matching node or pod"
            );
        }
    }
}
