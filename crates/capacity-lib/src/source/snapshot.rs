//! In-memory snapshots as a data source

use super::{Filters, InventorySource, UtilizationSource};
use crate::error::CapacityError;
use crate::models::{Inventory, UtilizationSnapshot};
use async_trait::async_trait;

/// Serves fixed snapshots, for tests and for embedding the engine
/// behind another inventory provider.
///
/// Only the namespace filter is honoured; records carry no labels.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    inventory: Inventory,
    utilization: UtilizationSnapshot,
}

impl StaticSource {
    pub fn new(inventory: Inventory) -> Self {
        Self {
            inventory,
            utilization: UtilizationSnapshot::default(),
        }
    }

    pub fn with_utilization(mut self, utilization: UtilizationSnapshot) -> Self {
        self.utilization = utilization;
        self
    }
}

fn in_namespace(filters: &Filters, namespace: &str) -> bool {
    filters
        .namespace
        .as_deref()
        .map_or(true, |wanted| wanted == namespace)
}

#[async_trait]
impl InventorySource for StaticSource {
    async fn fetch_inventory(&self, filters: &Filters) -> Result<Inventory, CapacityError> {
        let mut inventory = self.inventory.clone();
        inventory.pods.retain(|pod| in_namespace(filters, &pod.key.namespace));
        Ok(inventory)
    }
}

#[async_trait]
impl UtilizationSource for StaticSource {
    async fn fetch_utilization(
        &self,
        filters: &Filters,
    ) -> Result<UtilizationSnapshot, CapacityError> {
        let mut snapshot = self.utilization.clone();
        snapshot.pods.retain(|pod| in_namespace(filters, &pod.key.namespace));
        Ok(snapshot)
    }
}
