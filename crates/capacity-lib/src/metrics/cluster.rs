//! Cluster-wide aggregate and the phased builder that produces it

use super::{NodeMetric, PodMetric, ResourceMetric, UNASSIGNED_NODE};
use crate::models::{Inventory, NodeRecord, PodKey, PodRecord, ResourceList, UtilizationSnapshot};
use crate::quantity::{sum_of, ResourceKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use tracing::{debug, warn};

/// Counters describing how the input snapshot was folded into the graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    /// Node records ignored because the name was already seen
    pub duplicate_nodes: usize,
    /// Pods skipped for being Succeeded or Failed
    pub terminal_pods: usize,
    /// Pod records ignored because the key was already seen
    pub duplicate_pods: usize,
    /// Pods attached to the unassigned placeholder node
    pub orphaned_pods: usize,
    pub node_samples: usize,
    pub pod_samples: usize,
    pub dropped_node_samples: usize,
    pub dropped_pod_samples: usize,
}

/// Read-only capacity graph for one reporting cycle.
///
/// The cluster owns every `PodMetric`; each `NodeMetric` only records the
/// keys of the pods attached to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterMetric {
    cpu: ResourceMetric,
    memory: ResourceMetric,
    nodes: BTreeMap<String, NodeMetric>,
    pods: BTreeMap<PodKey, PodMetric>,
    utilization_merged: bool,
    stats: BuildStats,
}

impl ClusterMetric {
    /// Start a build from the node inventory
    pub fn builder(nodes: &[NodeRecord]) -> ClusterMetricBuilder<Skeleton> {
        let mut stats = BuildStats::default();
        let mut node_metrics = BTreeMap::new();

        for record in nodes {
            if node_metrics.contains_key(&record.name) {
                warn!(node = %record.name, "Ignoring duplicate node record");
                stats.duplicate_nodes += 1;
                continue;
            }
            node_metrics.insert(record.name.clone(), NodeMetric::from_record(record));
        }

        let cpu_allocatable = sum_of(
            ResourceKind::Cpu,
            node_metrics.values().map(|n| n.cpu().allocatable()),
        );
        let memory_allocatable = sum_of(
            ResourceKind::Memory,
            node_metrics.values().map(|n| n.memory().allocatable()),
        );

        let metric = ClusterMetric {
            cpu: ResourceMetric::with_allocatable(cpu_allocatable),
            memory: ResourceMetric::with_allocatable(memory_allocatable),
            nodes: node_metrics,
            pods: BTreeMap::new(),
            utilization_merged: false,
            stats,
        };

        ClusterMetricBuilder {
            metric,
            _phase: PhantomData,
        }
    }

    /// Run every build phase over complete snapshots.
    ///
    /// Utilization is merged only when a snapshot is supplied; otherwise every
    /// utilization value stays zero.
    pub fn build(
        inventory: &Inventory,
        utilization: Option<&UtilizationSnapshot>,
    ) -> ClusterMetric {
        let structural = Self::builder(&inventory.nodes).ingest_pods(&inventory.pods);
        match utilization {
            Some(snapshot) => structural.merge_utilization(snapshot).finalize(),
            None => structural.finalize(),
        }
    }

    pub fn cpu(&self) -> &ResourceMetric {
        &self.cpu
    }

    pub fn memory(&self) -> &ResourceMetric {
        &self.memory
    }

    pub fn resource(&self, kind: ResourceKind) -> &ResourceMetric {
        match kind {
            ResourceKind::Cpu => &self.cpu,
            ResourceKind::Memory => &self.memory,
        }
    }

    /// Nodes in name order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeMetric> {
        self.nodes.values()
    }

    pub fn node(&self, name: &str) -> Option<&NodeMetric> {
        self.nodes.get(name)
    }

    /// Every ingested pod in key order
    pub fn pods(&self) -> impl Iterator<Item = &PodMetric> {
        self.pods.values()
    }

    pub fn pod(&self, key: &PodKey) -> Option<&PodMetric> {
        self.pods.get(key)
    }

    /// Pods attached to `node_name`; empty for an unknown node
    pub fn pods_on_node<'a>(&'a self, node_name: &str) -> impl Iterator<Item = &'a PodMetric> + 'a {
        self.nodes
            .get(node_name)
            .into_iter()
            .flat_map(move |node| node.pod_keys().filter_map(move |key| self.pods.get(key)))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn pod_count(&self) -> usize {
        self.pods.len()
    }

    /// Whether a utilization snapshot was merged into this graph
    pub fn has_utilization(&self) -> bool {
        self.utilization_merged
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    fn resource_mut(&mut self, kind: ResourceKind) -> &mut ResourceMetric {
        match kind {
            ResourceKind::Cpu => &mut self.cpu,
            ResourceKind::Memory => &mut self.memory,
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Marker for a build phase
pub trait BuildPhase: sealed::Sealed {}

/// Phases from which a graph may be finalized
pub trait Complete: BuildPhase {}

/// Nodes are known, no pods ingested yet
pub struct Skeleton;

/// Requests and limits rolled up from pods
pub struct Structural;

/// Utilization samples merged
pub struct Merged;

impl sealed::Sealed for Skeleton {}
impl sealed::Sealed for Structural {}
impl sealed::Sealed for Merged {}
impl BuildPhase for Skeleton {}
impl BuildPhase for Structural {}
impl BuildPhase for Merged {}
impl Complete for Structural {}
impl Complete for Merged {}

/// Owns the graph while it is mutable; each phase consumes the previous one
pub struct ClusterMetricBuilder<P: BuildPhase> {
    metric: ClusterMetric,
    _phase: PhantomData<P>,
}

impl<P: BuildPhase> ClusterMetricBuilder<P> {
    fn advance<Q: BuildPhase>(self) -> ClusterMetricBuilder<Q> {
        ClusterMetricBuilder {
            metric: self.metric,
            _phase: PhantomData,
        }
    }
}

impl ClusterMetricBuilder<Skeleton> {
    /// Attach every non-terminal pod to exactly one node and roll its
    /// requests and limits up into that node and the cluster.
    ///
    /// Pods without a node, or naming a node outside the inventory, go to the
    /// `<unassigned>` placeholder so cluster totals still include them.
    pub fn ingest_pods(mut self, pods: &[PodRecord]) -> ClusterMetricBuilder<Structural> {
        let metric = &mut self.metric;

        for record in pods {
            if record.phase.is_terminal() {
                metric.stats.terminal_pods += 1;
                continue;
            }
            if metric.pods.contains_key(&record.key) {
                warn!(pod = %record.key, "Ignoring duplicate pod record");
                metric.stats.duplicate_pods += 1;
                continue;
            }

            let node_name = match record.node_name.as_deref() {
                Some(name) if metric.nodes.contains_key(name) => name.to_string(),
                requested => {
                    debug!(
                        pod = %record.key,
                        node = ?requested,
                        "Attaching pod to unassigned node"
                    );
                    metric.stats.orphaned_pods += 1;
                    metric
                        .nodes
                        .entry(UNASSIGNED_NODE.to_string())
                        .or_insert_with(NodeMetric::unassigned);
                    UNASSIGNED_NODE.to_string()
                }
            };

            let pod = PodMetric::from_record(record, &node_name);
            if let Some(node) = metric.nodes.get_mut(&node_name) {
                node.attach(&pod);
            }
            metric.cpu.accumulate(pod.cpu());
            metric.memory.accumulate(pod.memory());
            metric.pods.insert(record.key.clone(), pod);
        }

        self.advance()
    }
}

impl ClusterMetricBuilder<Structural> {
    /// Merge usage samples by identity.
    ///
    /// A node sample sets that node's utilization; the cluster's utilization
    /// is then the sum over nodes, so a repeated sample counts once. A pod
    /// sample sets the pod's utilization to the sum of its containers. Pod
    /// usage never flows up into nodes or the cluster. Samples that match
    /// nothing are dropped.
    pub fn merge_utilization(
        mut self,
        snapshot: &UtilizationSnapshot,
    ) -> ClusterMetricBuilder<Merged> {
        let metric = &mut self.metric;

        for sample in &snapshot.nodes {
            match metric.nodes.get_mut(&sample.node_name) {
                Some(node) if !node.is_placeholder() => {
                    node.set_utilization(&sample.usage);
                    metric.stats.node_samples += 1;
                }
                _ => {
                    debug!(node = %sample.node_name, "Dropping usage sample for unknown node");
                    metric.stats.dropped_node_samples += 1;
                }
            }
        }

        for kind in ResourceKind::ALL {
            let total = sum_of(kind, metric.nodes.values().map(|n| n.utilization(kind)));
            metric.resource_mut(kind).set_utilization(total);
        }

        for sample in &snapshot.pods {
            match metric.pods.get_mut(&sample.key) {
                Some(pod) => {
                    let usage = ResourceList::new()
                        .with(sample.total(ResourceKind::Cpu))
                        .with(sample.total(ResourceKind::Memory));
                    pod.set_utilization(usage);
                    metric.stats.pod_samples += 1;
                }
                None => {
                    debug!(pod = %sample.key, "Dropping usage sample for unknown pod");
                    metric.stats.dropped_pod_samples += 1;
                }
            }
        }

        metric.utilization_merged = true;
        self.advance()
    }
}

impl<P: Complete> ClusterMetricBuilder<P> {
    /// Hand out the read-only graph
    pub fn finalize(self) -> ClusterMetric {
        self.metric
    }
}
