//! Output formatting utilities

use anyhow::{Context, Result};
use capacity_lib::report::{CapacityReport, NodeReport, PodReport, ResourceReport};
use clap::ValueEnum;
use colored::Colorize;
use tabled::{builder::Builder, settings::Style};

/// Output format for the capacity report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns (default)
    #[default]
    Table,
    /// Full report as JSON
    Json,
    /// Tab separated values
    Tsv,
    /// Comma separated values
    Csv,
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Render a report in the requested format
pub fn render(report: &CapacityReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => report.to_json().context("Failed to serialize report"),
        OutputFormat::Table => Ok(render_table(report)),
        OutputFormat::Tsv => Ok(render_delimited(report, '\t')),
        OutputFormat::Csv => Ok(render_delimited(report, ',')),
    }
}

/// Which optional columns a report carries
#[derive(Debug, Clone, Copy)]
struct Columns {
    pods: bool,
    util: bool,
}

impl Columns {
    fn of(report: &CapacityReport) -> Self {
        Self {
            pods: report.show_pods,
            util: report.show_util,
        }
    }

    fn headers(&self, split_percent: bool) -> Vec<String> {
        let mut headers = vec!["NODE".to_string()];
        if self.pods {
            headers.extend(["NAMESPACE".to_string(), "POD".to_string()]);
        }
        for resource in ["CPU", "MEMORY"] {
            let mut facets = vec!["REQUESTS", "LIMITS"];
            if self.util {
                facets.push("UTIL");
            }
            for facet in facets {
                headers.push(format!("{resource} {facet}"));
                if split_percent {
                    headers.push(format!("{resource} {facet} %"));
                }
            }
        }
        headers
    }

    fn cells(&self, resource: &ResourceReport, split_percent: bool) -> Vec<String> {
        let mut facets = vec![
            (resource.request.as_str(), resource.request_percent),
            (resource.limit.as_str(), resource.limit_percent),
        ];
        if self.util {
            if let (Some(value), Some(percent)) =
                (resource.utilization.as_deref(), resource.utilization_percent)
            {
                facets.push((value, percent));
            }
        }

        facets
            .into_iter()
            .flat_map(|(value, percent)| {
                if split_percent {
                    vec![value.to_string(), format!("{percent}%")]
                } else {
                    vec![format!("{value} ({percent}%)")]
                }
            })
            .collect()
    }

    fn row(
        &self,
        location: [&str; 3],
        cpu: &ResourceReport,
        memory: &ResourceReport,
        split_percent: bool,
    ) -> Vec<String> {
        let [node, namespace, pod] = location;
        let mut row = vec![node.to_string()];
        if self.pods {
            row.extend([namespace.to_string(), pod.to_string()]);
        }
        row.extend(self.cells(cpu, split_percent));
        row.extend(self.cells(memory, split_percent));
        row
    }
}

/// Cluster row first, then each node followed by its pods
fn rows(report: &CapacityReport, split_percent: bool) -> Vec<Vec<String>> {
    let columns = Columns::of(report);
    let mut rows = vec![columns.headers(split_percent)];

    rows.push(columns.row(
        ["*", "*", "*"],
        &report.cluster.cpu,
        &report.cluster.memory,
        split_percent,
    ));

    for node in &report.nodes {
        rows.push(node_row(&columns, node, split_percent));
        if columns.pods {
            rows.extend(
                node.pods
                    .iter()
                    .map(|pod| pod_row(&columns, pod, split_percent)),
            );
        }
    }

    rows
}

fn node_row(columns: &Columns, node: &NodeReport, split_percent: bool) -> Vec<String> {
    columns.row(
        [node.name.as_str(), "*", "*"],
        &node.cpu,
        &node.memory,
        split_percent,
    )
}

fn pod_row(columns: &Columns, pod: &PodReport, split_percent: bool) -> Vec<String> {
    columns.row(
        [pod.node.as_str(), pod.namespace.as_str(), pod.name.as_str()],
        &pod.cpu,
        &pod.memory,
        split_percent,
    )
}

fn render_table(report: &CapacityReport) -> String {
    let mut builder = Builder::default();
    for row in rows(report, false) {
        builder.push_record(row);
    }
    let mut table = builder.build();
    table.with(Style::blank());
    table.to_string()
}

fn render_delimited(report: &CapacityReport, delimiter: char) -> String {
    let mut out = String::new();
    for row in rows(report, true) {
        let line: Vec<String> = row
            .iter()
            .map(|field| escape_field(field, delimiter))
            .collect();
        out.push_str(&line.join(&delimiter.to_string()));
        out.push('\n');
    }
    out
}

/// Quote a field that contains the delimiter, a quote or a line break
fn escape_field(field: &str, delimiter: char) -> String {
    if field.contains(delimiter) || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
