//! Data sources for a reporting cycle
//!
//! An `InventorySource` lists nodes and pods; a `UtilizationSource` lists
//! usage samples. `collect` drives one full cycle: both fetches complete
//! before the capacity graph is built, and any fetch failure aborts it.

mod kubernetes;
mod metrics_api;
mod snapshot;

pub use kubernetes::{ConnectOptions, KubeSource};
pub use metrics_api::{NodeMetrics, PodMetrics, PodMetricsContainer};
pub use snapshot::StaticSource;

use crate::error::CapacityError;
use crate::metrics::ClusterMetric;
use crate::models::{Inventory, UtilizationSnapshot};
use crate::observability::StructuredLogger;
use async_trait::async_trait;
use std::time::Instant;

/// Scope restrictions applied by data sources
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    /// Only pods in this namespace
    pub namespace: Option<String>,
    /// Label selector applied to pods
    pub pod_labels: Option<String>,
    /// Label selector applied to nodes; pods on other nodes are out of scope
    pub node_labels: Option<String>,
}

/// Lists nodes and pods
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn fetch_inventory(&self, filters: &Filters) -> Result<Inventory, CapacityError>;
}

/// Lists node and pod usage samples
#[async_trait]
pub trait UtilizationSource: Send + Sync {
    async fn fetch_utilization(&self, filters: &Filters)
        -> Result<UtilizationSnapshot, CapacityError>;
}

/// Run one reporting cycle and return the finalized graph.
///
/// The inventory and utilization fetches run concurrently. Utilization is
/// fetched only when a source is given.
pub async fn collect(
    inventory: &dyn InventorySource,
    utilization: Option<&dyn UtilizationSource>,
    filters: &Filters,
    logger: &StructuredLogger,
) -> Result<ClusterMetric, CapacityError> {
    let started = Instant::now();

    let inventory_fetch = async {
        let inventory = inventory.fetch_inventory(filters).await?;
        logger.log_inventory_fetched(
            inventory.nodes.len(),
            inventory.pods.len(),
            started.elapsed(),
        );
        Ok::<_, CapacityError>(inventory)
    };

    let (inventory, snapshot) = match utilization {
        Some(source) => {
            let utilization_fetch = async {
                let snapshot = source.fetch_utilization(filters).await?;
                logger.log_utilization_fetched(
                    snapshot.nodes.len(),
                    snapshot.pods.len(),
                    started.elapsed(),
                );
                Ok::<_, CapacityError>(snapshot)
            };
            let (inventory, snapshot) = tokio::try_join!(inventory_fetch, utilization_fetch)?;
            (inventory, Some(snapshot))
        }
        None => (inventory_fetch.await?, None),
    };

    let cluster = ClusterMetric::build(&inventory, snapshot.as_ref());
    logger.log_cluster_built(cluster.node_count(), cluster.pod_count(), cluster.stats());

    Ok(cluster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ContainerRecord, ContainerUsage, NodeRecord, NodeUsageSample, PodKey, PodPhase, PodRecord,
        PodUsageSample, ResourceList,
    };
    use crate::quantity::Quantity;

    struct FailingSource;

    #[async_trait]
    impl InventorySource for FailingSource {
        async fn fetch_inventory(&self, _filters: &Filters) -> Result<Inventory, CapacityError> {
            Err(CapacityError::Connect("unreachable".into()))
        }
    }

    #[async_trait]
    impl UtilizationSource for FailingSource {
        async fn fetch_utilization(
            &self,
            _filters: &Filters,
        ) -> Result<UtilizationSnapshot, CapacityError> {
            Err(CapacityError::Connect("metrics unreachable".into()))
        }
    }

    fn pod(namespace: &str, name: &str, node: &str, cpu_m: i64) -> PodRecord {
        PodRecord {
            key: PodKey::new(namespace, name),
            node_name: Some(node.into()),
            phase: PodPhase::Running,
            containers: vec![ContainerRecord {
                name: "app".into(),
                requests: ResourceList::new().with(Quantity::millicores(cpu_m)),
                limits: ResourceList::new(),
            }],
        }
    }

    fn source() -> StaticSource {
        let inventory = Inventory {
            nodes: vec![NodeRecord::new(
                "n1",
                ResourceList::new().with(Quantity::cores(2)),
            )],
            pods: vec![pod("default", "web", "n1", 500), pod("kube-system", "dns", "n1", 100)],
        };
        let utilization = UtilizationSnapshot {
            nodes: vec![NodeUsageSample {
                node_name: "n1".into(),
                usage: ResourceList::new().with(Quantity::millicores(800)),
            }],
            pods: vec![PodUsageSample {
                key: PodKey::new("default", "web"),
                containers: vec![ContainerUsage {
                    name: "app".into(),
                    usage: ResourceList::new().with(Quantity::millicores(300)),
                }],
            }],
        };
        StaticSource::new(inventory).with_utilization(utilization)
    }

    #[tokio::test]
    async fn test_collect_with_utilization() {
        let source = source();
        let logger = StructuredLogger::new("test");

        let cluster = collect(&source, Some(&source), &Filters::default(), &logger)
            .await
            .unwrap();

        assert!(cluster.has_utilization());
        assert_eq!(cluster.cpu().request(), Quantity::millicores(600));
        assert_eq!(cluster.cpu().utilization(), Quantity::millicores(800));
        let web = cluster.pod(&PodKey::new("default", "web")).unwrap();
        assert_eq!(web.cpu().utilization(), Quantity::millicores(300));
    }

    #[tokio::test]
    async fn test_collect_without_utilization() {
        let source = source();
        let logger = StructuredLogger::new("test");

        let cluster = collect(&source, None, &Filters::default(), &logger).await.unwrap();

        assert!(!cluster.has_utilization());
        assert!(cluster.cpu().utilization().is_zero());
    }

    #[tokio::test]
    async fn test_collect_applies_namespace_filter() {
        let source = source();
        let logger = StructuredLogger::new("test");
        let filters = Filters {
            namespace: Some("kube-system".into()),
            ..Default::default()
        };

        let cluster = collect(&source, Some(&source), &filters, &logger).await.unwrap();

        assert_eq!(cluster.pod_count(), 1);
        assert_eq!(cluster.cpu().request(), Quantity::millicores(100));
    }

    #[tokio::test]
    async fn test_inventory_failure_aborts_cycle() {
        let logger = StructuredLogger::new("test");
        let result = collect(&FailingSource, None, &Filters::default(), &logger).await;

        assert!(matches!(result, Err(CapacityError::Connect(_))));
    }

    #[tokio::test]
    async fn test_utilization_failure_aborts_cycle() {
        let source = source();
        let logger = StructuredLogger::new("test");
        let result = collect(&source, Some(&FailingSource), &Filters::default(), &logger).await;

        assert!(result.is_err());
    }
}
