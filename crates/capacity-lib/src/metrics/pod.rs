//! Per-pod rollup of container requests and limits

use super::ResourceMetric;
use crate::models::{PodKey, PodRecord, ResourceList};
use crate::quantity::ResourceKind;

/// One pod's CPU and memory accounting
#[derive(Debug, Clone, PartialEq)]
pub struct PodMetric {
    key: PodKey,
    node_name: String,
    container_count: usize,
    cpu: ResourceMetric,
    memory: ResourceMetric,
}

impl PodMetric {
    /// Sum every container's declared requests and limits.
    ///
    /// Containers that declare nothing contribute zero but are still counted.
    pub(crate) fn from_record(record: &PodRecord, node_name: &str) -> Self {
        let mut cpu = ResourceMetric::new(ResourceKind::Cpu);
        let mut memory = ResourceMetric::new(ResourceKind::Memory);

        for container in &record.containers {
            cpu.add_declared(
                container.requests.quantity(ResourceKind::Cpu),
                container.limits.quantity(ResourceKind::Cpu),
            );
            memory.add_declared(
                container.requests.quantity(ResourceKind::Memory),
                container.limits.quantity(ResourceKind::Memory),
            );
        }

        Self {
            key: record.key.clone(),
            node_name: node_name.to_string(),
            container_count: record.containers.len(),
            cpu,
            memory,
        }
    }

    pub fn key(&self) -> &PodKey {
        &self.key
    }

    pub fn namespace(&self) -> &str {
        &self.key.namespace
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    /// Node this pod was attached to, including the unassigned placeholder
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn container_count(&self) -> usize {
        self.container_count
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

    /// Replace observed usage with the totals of one metrics sample
    pub(crate) fn set_utilization(&mut self, usage: ResourceList) {
        self.cpu.set_utilization(usage.quantity(ResourceKind::Cpu));
        self.memory.set_utilization(usage.quantity(ResourceKind::Memory));
    }
}
