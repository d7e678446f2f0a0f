//! Per-node rollup

use super::{PodMetric, ResourceMetric};
use crate::models::{NodeRecord, PodKey, ResourceList};
use crate::quantity::{Quantity, ResourceKind};
use std::collections::BTreeSet;

/// Name of the synthesized node that holds pods with no known node.
///
/// Angle brackets cannot appear in a Kubernetes node name, so it never
/// collides with a real node.
pub const UNASSIGNED_NODE: &str = "<unassigned>";

/// One node's CPU and memory accounting plus the pods scheduled on it
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMetric {
    name: String,
    placeholder: bool,
    cpu: ResourceMetric,
    memory: ResourceMetric,
    pods: BTreeSet<PodKey>,
}

impl NodeMetric {
    pub(crate) fn from_record(record: &NodeRecord) -> Self {
        Self::seeded(record.name.clone(), &record.allocatable, false)
    }

    /// Placeholder node with nothing allocatable
    pub(crate) fn unassigned() -> Self {
        Self::seeded(UNASSIGNED_NODE.to_string(), &ResourceList::new(), true)
    }

    fn seeded(name: String, allocatable: &ResourceList, placeholder: bool) -> Self {
        Self {
            name,
            placeholder,
            cpu: ResourceMetric::with_allocatable(allocatable.quantity(ResourceKind::Cpu)),
            memory: ResourceMetric::with_allocatable(allocatable.quantity(ResourceKind::Memory)),
            pods: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True for the `<unassigned>` node that collects orphaned pods
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
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

    /// Keys of the pods attached to this node, in key order
    pub fn pod_keys(&self) -> impl Iterator<Item = &PodKey> {
        self.pods.iter()
    }

    pub fn pod_count(&self) -> usize {
        self.pods.len()
    }

    pub fn has_pod(&self, key: &PodKey) -> bool {
        self.pods.contains(key)
    }

    /// Register `pod` and add its declared amounts to this node
    pub(crate) fn attach(&mut self, pod: &PodMetric) {
        if self.pods.insert(pod.key().clone()) {
            self.cpu.accumulate(pod.cpu());
            self.memory.accumulate(pod.memory());
        }
    }

    pub(crate) fn set_utilization(&mut self, usage: &ResourceList) {
        self.cpu.set_utilization(usage.quantity(ResourceKind::Cpu));
        self.memory.set_utilization(usage.quantity(ResourceKind::Memory));
    }

    pub(crate) fn utilization(&self, kind: ResourceKind) -> Quantity {
        self.resource(kind).utilization()
    }
}
