//! Four-facet accounting for one resource kind

use crate::quantity::{ratio_percent, Quantity, ResourceKind};

/// Allocatable, requested, limited and observed amounts of one resource.
///
/// All four quantities share `kind`. Request and limit only grow while a
/// cluster snapshot is being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceMetric {
    kind: ResourceKind,
    allocatable: Quantity,
    request: Quantity,
    limit: Quantity,
    utilization: Quantity,
}

impl ResourceMetric {
    pub fn new(kind: ResourceKind) -> Self {
        Self::with_allocatable(Quantity::zero(kind))
    }

    pub fn with_allocatable(allocatable: Quantity) -> Self {
        let kind = allocatable.kind();
        Self {
            kind,
            allocatable,
            request: Quantity::zero(kind),
            limit: Quantity::zero(kind),
            utilization: Quantity::zero(kind),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn allocatable(&self) -> Quantity {
        self.allocatable
    }

    pub fn request(&self) -> Quantity {
        self.request
    }

    pub fn limit(&self) -> Quantity {
        self.limit
    }

    pub fn utilization(&self) -> Quantity {
        self.utilization
    }

    pub fn request_percent(&self) -> f64 {
        ratio_percent(&self.request, &self.allocatable)
    }

    pub fn limit_percent(&self) -> f64 {
        ratio_percent(&self.limit, &self.allocatable)
    }

    pub fn utilization_percent(&self) -> f64 {
        ratio_percent(&self.utilization, &self.allocatable)
    }

    /// Allocatable minus requested; negative when a node is overcommitted
    pub fn available(&self) -> Quantity {
        Quantity::from_nanos(self.kind, self.allocatable.nanos() - self.request.nanos())
    }

    pub(crate) fn add_declared(&mut self, request: Quantity, limit: Quantity) {
        self.request += request;
        self.limit += limit;
    }

    /// Fold another metric's request and limit into this one
    pub(crate) fn accumulate(&mut self, other: &ResourceMetric) {
        self.add_declared(other.request, other.limit);
    }

    pub(crate) fn set_utilization(&mut self, utilization: Quantity) {
        debug_assert_eq!(self.kind, utilization.kind());
        self.utilization = utilization;
    }
}
