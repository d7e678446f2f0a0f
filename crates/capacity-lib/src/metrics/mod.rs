//! Three-level capacity rollup: cluster → node → pod
//!
//! The graph is built once per reporting cycle by `ClusterMetricBuilder`,
//! whose phases (skeleton, structural, merged) are separate types, and is
//! read-only once finalized.

mod cluster;
mod node;
mod pod;
mod resource;


pub use cluster::{
    BuildPhase, BuildStats, ClusterMetric, ClusterMetricBuilder, Complete, Merged, Skeleton,
    Structural,
};
pub use node::{NodeMetric, UNASSIGNED_NODE};
pub use pod::PodMetric;
pub use resource::ResourceMetric;
