//! Kubernetes API backed data source

use super::{Filters, InventorySource, NodeMetrics, PodMetrics, UtilizationSource};
use crate::error::CapacityError;
use crate::models::{
    ContainerRecord, ContainerUsage, Inventory, NodeRecord, NodeUsageSample, PodKey, PodPhase,
    PodRecord, PodUsageSample, ResourceList, UtilizationSnapshot,
};
use crate::quantity::{Quantity, ResourceKind};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity as KubeQuantity;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config, Resource, ResourceExt};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, info};

/// How to reach the cluster
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Explicit kubeconfig file; otherwise the usual inference applies
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context to use instead of the current one
    pub context: Option<String>,
}

/// Lists nodes, pods and metrics through the Kubernetes API
#[derive(Clone)]
pub struct KubeSource {
    client: Client,
}

impl KubeSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from kubeconfig or in-cluster configuration
    pub async fn connect(options: &ConnectOptions) -> Result<Self, CapacityError> {
        let kube_options = KubeConfigOptions {
            context: options.context.clone(),
            ..Default::default()
        };

        let config = match (&options.kubeconfig, &options.context) {
            (Some(path), _) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(connect_error)?;
                Config::from_custom_kubeconfig(kubeconfig, &kube_options)
                    .await
                    .map_err(connect_error)?
            }
            (None, Some(_)) => Config::from_kubeconfig(&kube_options)
                .await
                .map_err(connect_error)?,
            (None, None) => Config::infer().await.map_err(connect_error)?,
        };

        info!(cluster_url = %config.cluster_url, "Connecting to Kubernetes API");
        let client = Client::try_from(config).map_err(connect_error)?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl InventorySource for KubeSource {
    async fn fetch_inventory(&self, filters: &Filters) -> Result<Inventory, CapacityError> {
        let nodes_api: Api<Node> = Api::all(self.client.clone());
        let pods_api: Api<Pod> =
            namespaced_or_all(self.client.clone(), filters.namespace.as_deref());
        let node_params = list_params(filters.node_labels.as_deref());
        let pod_params = list_params(filters.pod_labels.as_deref());

        let (node_list, pod_list) = tokio::try_join!(
            async { nodes_api.list(&node_params).await.map_err(CapacityError::ListNodes) },
            async { pods_api.list(&pod_params).await.map_err(CapacityError::ListPods) },
        )?;

        let nodes = node_list
            .items
            .iter()
            .map(node_record)
            .collect::<Result<Vec<_>, _>>()?;
        let mut pods = pod_list
            .items
            .iter()
            .map(pod_record)
            .collect::<Result<Vec<_>, _>>()?;

        if filters.node_labels.is_some() {
            scope_to_nodes(&nodes, &mut pods);
        }

        Ok(Inventory { nodes, pods })
    }
}

#[async_trait]
impl UtilizationSource for KubeSource {
    async fn fetch_utilization(
        &self,
        filters: &Filters,
    ) -> Result<UtilizationSnapshot, CapacityError> {
        let nodes_api: Api<NodeMetrics> = Api::all(self.client.clone());
        let pods_api: Api<PodMetrics> =
            namespaced_or_all(self.client.clone(), filters.namespace.as_deref());
        let node_params = list_params(filters.node_labels.as_deref());
        let pod_params = list_params(filters.pod_labels.as_deref());

        let (node_list, pod_list) = tokio::try_join!(
            async {
                nodes_api
                    .list(&node_params)
                    .await
                    .map_err(|err| metrics_error(err, CapacityError::NodeMetrics))
            },
            async {
                pods_api
                    .list(&pod_params)
                    .await
                    .map_err(|err| metrics_error(err, CapacityError::PodMetrics))
            },
        )?;

        let nodes = node_list
            .items
            .iter()
            .map(node_sample)
            .collect::<Result<Vec<_>, _>>()?;
        let pods = pod_list
            .items
            .iter()
            .map(pod_sample)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(UtilizationSnapshot { nodes, pods })
    }
}

fn connect_error(err: impl std::fmt::Display) -> CapacityError {
    CapacityError::Connect(err.to_string())
}

/// A 404 means metrics-server is not serving `metrics.k8s.io` at all
fn metrics_error(err: kube::Error, wrap: fn(kube::Error) -> CapacityError) -> CapacityError {
    let unavailable = matches!(&err, kube::Error::Api(response) if response.code == 404);
    if unavailable {
        CapacityError::MetricsUnavailable(err)
    } else {
        wrap(err)
    }
}

/// Keep only pods scheduled onto one of `nodes`; unscheduled pods are dropped too
fn scope_to_nodes(nodes: &[NodeRecord], pods: &mut Vec<PodRecord>) {
    let selected: HashSet<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
    let listed = pods.len();
    pods.retain(|pod| {
        pod.node_name
            .as_deref()
            .is_some_and(|name| selected.contains(name))
    });
    debug!(
        removed = listed - pods.len(),
        "Removed pods outside the selected nodes"
    );
}

fn list_params(selector: Option<&str>) -> ListParams {
    match selector {
        Some(selector) => ListParams::default().labels(selector),
        None => ListParams::default(),
    }
}

fn namespaced_or_all<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    match namespace {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    }
}

/// Parse the `cpu` and `memory` entries of a Kubernetes resource list
fn resource_list(
    list: Option<&BTreeMap<String, KubeQuantity>>,
    object: impl Fn() -> String,
) -> Result<ResourceList, CapacityError> {
    let mut resources = ResourceList::new();
    let Some(list) = list else {
        return Ok(resources);
    };

    for kind in ResourceKind::ALL {
        let Some(raw) = list.get(kind.as_str()) else {
            continue;
        };
        let quantity =
            Quantity::parse(kind, &raw.0).map_err(|source| CapacityError::InvalidQuantity {
                object: object(),
                resource: kind,
                source,
            })?;
        resources.set(quantity);
    }

    Ok(resources)
}

fn node_record(node: &Node) -> Result<NodeRecord, CapacityError> {
    let name = node.name_any();
    let allocatable = node
        .status
        .as_ref()
        .and_then(|status| status.allocatable.as_ref());
    let allocatable = resource_list(allocatable, || format!("node/{name}"))?;
    Ok(NodeRecord::new(name, allocatable))
}

fn pod_record(pod: &Pod) -> Result<PodRecord, CapacityError> {
    let key = PodKey::new(pod.namespace().unwrap_or_default(), pod.name_any());
    let object = || format!("pod/{key}");
    let spec = pod.spec.as_ref();

    let containers = spec
        .map(|spec| spec.containers.as_slice())
        .unwrap_or_default()
        .iter()
        .map(|container| {
            let resources = container.resources.as_ref();
            Ok(ContainerRecord {
                name: container.name.clone(),
                requests: resource_list(resources.and_then(|r| r.requests.as_ref()), object)?,
                limits: resource_list(resources.and_then(|r| r.limits.as_ref()), object)?,
            })
        })
        .collect::<Result<Vec<_>, CapacityError>>()?;

    let node_name = spec
        .and_then(|spec| spec.node_name.clone())
        .filter(|name| !name.is_empty());
    let phase = PodPhase::from_status(pod.status.as_ref().and_then(|s| s.phase.as_deref()));

    Ok(PodRecord {
        key,
        node_name,
        phase,
        containers,
    })
}

fn node_sample(metrics: &NodeMetrics) -> Result<NodeUsageSample, CapacityError> {
    let node_name = metrics.name_any();
    let usage = resource_list(Some(&metrics.usage), || format!("nodemetrics/{node_name}"))?;
    Ok(NodeUsageSample { node_name, usage })
}

fn pod_sample(metrics: &PodMetrics) -> Result<PodUsageSample, CapacityError> {
    let key = PodKey::new(metrics.namespace().unwrap_or_default(), metrics.name_any());
    let object = || format!("podmetrics/{key}");

    let containers = metrics
        .containers
        .iter()
        .map(|container| {
            Ok(ContainerUsage {
                name: container.name.clone(),
                usage: resource_list(Some(&container.usage), object)?,
            })
        })
        .collect::<Result<Vec<_>, CapacityError>>()?;

    Ok(PodUsageSample { key, containers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::error::ErrorResponse;

    fn node_from_json(value: serde_json::Value) -> Node {
        serde_json::from_value(value).unwrap()
    }

    fn pod_from_json(value: serde_json::Value) -> Pod {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_node_record_reads_allocatable() {
        let node = node_from_json(serde_json::json!({
            "metadata": {"name": "worker-1"},
            "status": {
                "allocatable": {"cpu": "3920m", "memory": "15Gi", "pods": "110"},
                "capacity": {"cpu": "4", "memory": "16Gi"}
            }
        }));

        let record = node_record(&node).unwrap();
        assert_eq!(record.name, "worker-1");
        assert_eq!(
            record.allocatable.get(ResourceKind::Cpu),
            Some(Quantity::millicores(3920))
        );
        assert_eq!(
            record.allocatable.get(ResourceKind::Memory),
            Some(Quantity::mebibytes(15 * 1024))
        );
    }

    #[test]
    fn test_node_without_status_has_empty_allocatable() {
        let node = node_from_json(serde_json::json!({"metadata": {"name": "bare"}}));
        let record = node_record(&node).unwrap();
        assert!(record.allocatable.is_empty());
    }

    #[test]
    fn test_pod_record_reads_containers() {
        let pod = pod_from_json(serde_json::json!({
            "metadata": {"name": "web-0", "namespace": "shop"},
            "spec": {
                "nodeName": "worker-1",
                "containers": [
                    {
                        "name": "app",
                        "resources": {
                            "requests": {"cpu": "250m", "memory": "128Mi"},
                            "limits": {"cpu": "1", "memory": "256Mi"}
                        }
                    },
                    {"name": "sidecar"}
                ]
            },
            "status": {"phase": "Running"}
        }));

        let record = pod_record(&pod).unwrap();
        assert_eq!(record.key, PodKey::new("shop", "web-0"));
        assert_eq!(record.node_name.as_deref(), Some("worker-1"));
        assert_eq!(record.phase, PodPhase::Running);
        assert_eq!(record.containers.len(), 2);
        assert_eq!(
            record.containers[0].limits.get(ResourceKind::Cpu),
            Some(Quantity::cores(1))
        );
        assert!(record.containers[1].requests.is_empty());
    }

    #[test]
    fn test_pending_pod_has_no_node() {
        let pod = pod_from_json(serde_json::json!({
            "metadata": {"name": "queued", "namespace": "default"},
            "spec": {"containers": [{"name": "app"}]}
        }));

        let record = pod_record(&pod).unwrap();
        assert_eq!(record.node_name, None);
        assert_eq!(record.phase, PodPhase::Pending);
    }

    #[test]
    fn test_invalid_quantity_names_object() {
        let pod = pod_from_json(serde_json::json!({
            "metadata": {"name": "broken", "namespace": "default"},
            "spec": {
                "containers": [{"name": "app", "resources": {"requests": {"cpu": "lots"}}}]
            }
        }));

        match pod_record(&pod) {
            Err(CapacityError::InvalidQuantity { object, resource, .. }) => {
                assert_eq!(object, "pod/default/broken");
                assert_eq!(resource, ResourceKind::Cpu);
            }
            other => panic!("expected invalid quantity error, got {other:?}"),
        }
    }

    #[test]
    fn test_pod_sample_conversion() {
        let metrics: PodMetrics = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "web-0", "namespace": "shop"},
            "containers": [
                {"name": "app", "usage": {"cpu": "120m", "memory": "64Mi"}},
                {"name": "sidecar", "usage": {"cpu": "5m", "memory": "8Mi"}}
            ]
        }))
        .unwrap();

        let sample = pod_sample(&metrics).unwrap();
        assert_eq!(sample.key, PodKey::new("shop", "web-0"));
        assert_eq!(sample.total(ResourceKind::Cpu), Quantity::millicores(125));
        assert_eq!(sample.total(ResourceKind::Memory), Quantity::mebibytes(72));
    }

    fn scheduled(name: &str, node: Option<&str>) -> PodRecord {
        PodRecord {
            key: PodKey::new("default", name),
            node_name: node.map(String::from),
            phase: PodPhase::Running,
            containers: vec![],
        }
    }

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: "request failed".into(),
            reason: "Failed".into(),
            code,
        })
    }

    #[test]
    fn test_scope_to_selected_nodes() {
        let nodes = vec![NodeRecord::new("spot-1", ResourceList::new())];
        let mut pods = vec![
            scheduled("on-spot", Some("spot-1")),
            scheduled("on-ondemand", Some("ondemand-1")),
            scheduled("queued", None),
        ];

        scope_to_nodes(&nodes, &mut pods);

        let names: Vec<&str> = pods.iter().map(|p| p.key.name.as_str()).collect();
        assert_eq!(names, vec!["on-spot"]);
    }

    #[test]
    fn test_scope_to_no_nodes_removes_everything() {
        let mut pods = vec![scheduled("web", Some("n1"))];
        scope_to_nodes(&[], &mut pods);
        assert!(pods.is_empty());
    }

    #[test]
    fn test_metrics_not_found_is_unavailable() {
        let err = metrics_error(api_error(404), CapacityError::NodeMetrics);
        assert!(matches!(err, CapacityError::MetricsUnavailable(_)));
        assert_eq!(err.exit_code(), 4);

        let err = metrics_error(api_error(404), CapacityError::PodMetrics);
        assert!(matches!(err, CapacityError::MetricsUnavailable(_)));
    }

    #[test]
    fn test_other_metrics_failures_keep_their_kind() {
        let err = metrics_error(api_error(500), CapacityError::NodeMetrics);
        assert!(matches!(err, CapacityError::NodeMetrics(_)));
        assert_eq!(err.exit_code(), 5);

        let err = metrics_error(api_error(403), CapacityError::PodMetrics);
        assert!(matches!(err, CapacityError::PodMetrics(_)));
        assert_eq!(err.exit_code(), 6);
        assert!(err.is_metrics_error());
    }

    #[test]
    fn test_list_params_selector() {
        assert_eq!(
            list_params(Some("role=worker")).label_selector.as_deref(),
            Some("role=worker")
        );
        assert!(list_params(None).label_selector.is_none());
    }
}
