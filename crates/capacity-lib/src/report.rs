//! Presentation-ready view of a finalized capacity graph
//!
//! `CapacityReport` flattens a `ClusterMetric` into sorted rows of formatted
//! quantities and integer percentages. Renderers only read from it.

use crate::metrics::{ClusterMetric, NodeMetric, PodMetric, ResourceMetric};
use crate::quantity::{ratio_percent, Quantity, ResourceKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which facet of a resource to order by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Request,
    Limit,
    Util,
}

impl SortField {
    fn as_str(&self) -> &'static str {
        match self {
            SortField::Request => "request",
            SortField::Limit => "limit",
            SortField::Util => "util",
        }
    }

    fn amount(&self, metric: &ResourceMetric) -> i128 {
        match self {
            SortField::Request => metric.request().nanos(),
            SortField::Limit => metric.limit().nanos(),
            SortField::Util => metric.utilization().nanos(),
        }
    }

    fn percent(&self, metric: &ResourceMetric) -> f64 {
        match self {
            SortField::Request => metric.request_percent(),
            SortField::Limit => metric.limit_percent(),
            SortField::Util => metric.utilization_percent(),
        }
    }
}

/// Row ordering for nodes and for pods within a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    /// Ascending by name
    #[default]
    Name,
    /// Descending by absolute amount
    Amount(ResourceKind, SortField),
    /// Descending by percentage of allocatable
    Percentage(ResourceKind, SortField),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown sort key '{0}', expected 'name' or '<cpu|mem>.<request|limit|util>[.percentage]'")]
pub struct ParseSortError(String);

impl FromStr for SortBy {
    type Err = ParseSortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        if normalized == "name" {
            return Ok(SortBy::Name);
        }

        let invalid = || ParseSortError(s.to_string());
        let mut parts = normalized.split('.');

        let kind = match parts.next() {
            Some("cpu") => ResourceKind::Cpu,
            Some("mem") | Some("memory") => ResourceKind::Memory,
            _ => return Err(invalid()),
        };
        let field = match parts.next() {
            Some("request") | Some("requests") => SortField::Request,
            Some("limit") | Some("limits") => SortField::Limit,
            Some("util") | Some("utilization") => SortField::Util,
            _ => return Err(invalid()),
        };

        match (parts.next(), parts.next()) {
            (None, _) => Ok(SortBy::Amount(kind, field)),
            (Some("percentage"), None) => Ok(SortBy::Percentage(kind, field)),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = |kind: &ResourceKind| match kind {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Memory => "mem",
        };
        match self {
            SortBy::Name => write!(f, "name"),
            SortBy::Amount(kind, field) => write!(f, "{}.{}", prefix(kind), field.as_str()),
            SortBy::Percentage(kind, field) => {
                write!(f, "{}.{}.percentage", prefix(kind), field.as_str())
            }
        }
    }
}

/// Something that can be placed in a sorted report section
trait Ranked {
    fn rank_name(&self) -> (&str, &str);
    fn rank_resource(&self, kind: ResourceKind) -> &ResourceMetric;
}

impl Ranked for NodeMetric {
    fn rank_name(&self) -> (&str, &str) {
        (self.name(), "")
    }

    fn rank_resource(&self, kind: ResourceKind) -> &ResourceMetric {
        self.resource(kind)
    }
}

impl Ranked for PodMetric {
    fn rank_name(&self) -> (&str, &str) {
        (self.name(), self.namespace())
    }

    fn rank_resource(&self, kind: ResourceKind) -> &ResourceMetric {
        self.resource(kind)
    }
}

impl SortBy {
    fn compare<T: Ranked>(&self, a: &T, b: &T) -> Ordering {
        let by_name = || a.rank_name().cmp(&b.rank_name());
        match *self {
            SortBy::Name => by_name(),
            SortBy::Amount(kind, field) => field
                .amount(b.rank_resource(kind))
                .cmp(&field.amount(a.rank_resource(kind)))
                .then_with(by_name),
            SortBy::Percentage(kind, field) => field
                .percent(b.rank_resource(kind))
                .total_cmp(&field.percent(a.rank_resource(kind)))
                .then_with(by_name),
        }
    }

    /// Pods on one node share a denominator, so percentages order like amounts
    fn for_pods(self) -> SortBy {
        match self {
            SortBy::Percentage(kind, field) => SortBy::Amount(kind, field),
            other => other,
        }
    }
}

/// What to include in a report and how to order it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportOptions {
    pub show_pods: bool,
    pub show_util: bool,
    pub sort: SortBy,
}

/// One resource facet set, formatted for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceReport {
    pub allocatable: String,
    pub request: String,
    pub request_percent: i64,
    pub limit: String,
    pub limit_percent: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utilization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utilization_percent: Option<i64>,
}

impl ResourceReport {
    /// Format `metric` with percentages taken against `basis`
    fn new(metric: &ResourceMetric, basis: Quantity, show_util: bool) -> Self {
        let percent = |q: Quantity| ratio_percent(&q, &basis).trunc() as i64;
        Self {
            allocatable: basis.to_string(),
            request: metric.request().to_string(),
            request_percent: percent(metric.request()),
            limit: metric.limit().to_string(),
            limit_percent: percent(metric.limit()),
            utilization: show_util.then(|| metric.utilization().to_string()),
            utilization_percent: show_util.then(|| percent(metric.utilization())),
        }
    }

    fn own(metric: &ResourceMetric, show_util: bool) -> Self {
        Self::new(metric, metric.allocatable(), show_util)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterReport {
    pub node_count: usize,
    pub pod_count: usize,
    pub cpu: ResourceReport,
    pub memory: ResourceReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeReport {
    pub name: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
    pub pod_count: usize,
    pub cpu: ResourceReport,
    pub memory: ResourceReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pods: Vec<PodReport>,
}

/// Pod percentages are relative to the hosting node's allocatable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodReport {
    pub namespace: String,
    pub name: String,
    pub node: String,
    pub cpu: ResourceReport,
    pub memory: ResourceReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct CapacityReport {
    pub generated_at: DateTime<Utc>,
    pub show_pods: bool,
    pub show_util: bool,
    pub sort: String,
    pub cluster: ClusterReport,
    pub nodes: Vec<NodeReport>,
}

impl CapacityReport {
    /// Build a report from a finalized graph.
    ///
    /// Utilization columns are only populated when asked for and the graph
    /// actually carries merged samples.
    pub fn new(cluster: &ClusterMetric, options: &ReportOptions) -> Self {
        let show_util = options.show_util && cluster.has_utilization();

        let mut nodes: Vec<&NodeMetric> = cluster.nodes().collect();
        nodes.sort_by(|a, b| {
            a.is_placeholder()
                .cmp(&b.is_placeholder())
                .then_with(|| options.sort.compare(*a, *b))
        });

        let nodes = nodes
            .into_iter()
            .map(|node| node_report(cluster, node, options, show_util))
            .collect();

        Self {
            generated_at: Utc::now(),
            show_pods: options.show_pods,
            show_util,
            sort: options.sort.to_string(),
            cluster: ClusterReport {
                node_count: cluster.nodes().filter(|n| !n.is_placeholder()).count(),
                pod_count: cluster.pod_count(),
                cpu: ResourceReport::own(cluster.cpu(), show_util),
                memory: ResourceReport::own(cluster.memory(), show_util),
            },
            nodes,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn node_report(
    cluster: &ClusterMetric,
    node: &NodeMetric,
    options: &ReportOptions,
    show_util: bool,
) -> NodeReport {
    let pods = if options.show_pods {
        let mut pods: Vec<&PodMetric> = cluster.pods_on_node(node.name()).collect();
        let sort = options.sort.for_pods();
        pods.sort_by(|a, b| sort.compare(*a, *b));
        pods.into_iter()
            .map(|pod| PodReport {
                namespace: pod.namespace().to_string(),
                name: pod.name().to_string(),
                node: node.name().to_string(),
                cpu: ResourceReport::new(pod.cpu(), node.cpu().allocatable(), show_util),
                memory: ResourceReport::new(pod.memory(), node.memory().allocatable(), show_util),
            })
            .collect()
    } else {
        Vec::new()
    };

    NodeReport {
        name: node.name().to_string(),
        placeholder: node.is_placeholder(),
        pod_count: node.pod_count(),
        cpu: ResourceReport::own(node.cpu(), show_util),
        memory: ResourceReport::own(node.memory(), show_util),
        pods,
    }
}
