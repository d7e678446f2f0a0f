//! Input snapshots consumed by the aggregation engine
//!
//! These are plain records, already normalised to the two tracked resource
//! kinds. Data sources produce them; `metrics::ClusterMetric` consumes them.

use crate::quantity::{Quantity, ResourceKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a pod within one cluster snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PodKey {
    pub namespace: String,
    pub name: String,
}

impl PodKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Pod lifecycle phase as reported in `status.phase`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    /// Pods that have run to completion no longer hold resources
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn from_status(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") | None => Self::Pending,
            Some("Running") => Self::Running,
            Some("Succeeded") => Self::Succeeded,
            Some("Failed") => Self::Failed,
            Some(_) => Self::Unknown,
        }
    }
}

/// Optional CPU and memory amounts, one slot per resource kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceList {
    cpu: Option<Quantity>,
    memory: Option<Quantity>,
}

impl ResourceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `quantity` in the slot matching its kind
    pub fn with(mut self, quantity: Quantity) -> Self {
        self.set(quantity);
        self
    }

    pub fn set(&mut self, quantity: Quantity) {
        match quantity.kind() {
            ResourceKind::Cpu => self.cpu = Some(quantity),
            ResourceKind::Memory => self.memory = Some(quantity),
        }
    }

    pub fn get(&self, kind: ResourceKind) -> Option<Quantity> {
        match kind {
            ResourceKind::Cpu => self.cpu,
            ResourceKind::Memory => self.memory,
        }
    }

    /// Declared amount, or zero when the slot is empty
    pub fn quantity(&self, kind: ResourceKind) -> Quantity {
        self.get(kind).unwrap_or(Quantity::zero(kind))
    }

    pub fn is_empty(&self) -> bool {
        self.cpu.is_none() && self.memory.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub name: String,
    pub allocatable: ResourceList,
}

impl NodeRecord {
    pub fn new(name: impl Into<String>, allocatable: ResourceList) -> Self {
        Self {
            name: name.into(),
            allocatable,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerRecord {
    pub name: String,
    pub requests: ResourceList,
    pub limits: ResourceList,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PodRecord {
    pub key: PodKey,
    /// `spec.nodeName`; `None` while the pod is unscheduled
    pub node_name: Option<String>,
    pub phase: PodPhase,
    pub containers: Vec<ContainerRecord>,
}

/// Nodes and pods listed from one consistent snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    pub nodes: Vec<NodeRecord>,
    pub pods: Vec<PodRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeUsageSample {
    pub node_name: String,
    pub usage: ResourceList,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerUsage {
    pub name: String,
    pub usage: ResourceList,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PodUsageSample {
    pub key: PodKey,
    pub containers: Vec<ContainerUsage>,
}

impl PodUsageSample {
    /// Sum of all container usages for `kind`
    pub fn total(&self, kind: ResourceKind) -> Quantity {
        crate::quantity::sum_of(kind, self.containers.iter().map(|c| c.usage.quantity(kind)))
    }
}

/// Usage samples from the metrics API
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UtilizationSnapshot {
    pub nodes: Vec<NodeUsageSample>,
    pub pods: Vec<PodUsageSample>,
}
