//! The capacity report command

use anyhow::{Context, Result};
use capacity_lib::source::UtilizationSource;
use capacity_lib::{
    collect, CapacityReport, ConnectOptions, Filters, KubeSource, ReportOptions, SortBy,
    StructuredLogger,
};
use clap::ValueEnum;
use tracing::debug;

use crate::config::Config;
use crate::output::{self, print_warning, OutputFormat};
use crate::Cli;

/// Everything one run needs, after flags are layered over configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub connect: ConnectOptions,
    pub filters: Filters,
    pub report: ReportOptions,
    pub output: OutputFormat,
}

impl Settings {
    /// Flags win over configuration; configuration wins over built-in defaults
    pub fn resolve(cli: &Cli, config: &Config) -> Result<Self> {
        let output = match (cli.output, config.default_output.as_deref()) {
            (Some(format), _) => format,
            (None, Some(name)) => OutputFormat::from_str(name, true)
                .map_err(|err| anyhow::anyhow!(err))
                .context("Invalid default_output in configuration")?,
            (None, None) => OutputFormat::default(),
        };

        let sort = match cli.sort.as_deref().or(config.default_sort.as_deref()) {
            Some(key) => key.parse::<SortBy>()?,
            None => SortBy::default(),
        };

        Ok(Self {
            connect: ConnectOptions {
                kubeconfig: cli.kubeconfig.clone(),
                context: cli.context.clone().or_else(|| config.context.clone()),
            },
            filters: Filters {
                namespace: cli.namespace.clone().or_else(|| config.namespace.clone()),
                pod_labels: cli.pod_labels.clone(),
                node_labels: cli.node_labels.clone(),
            },
            report: ReportOptions {
                show_pods: cli.pods || config.show_pods,
                show_util: cli.util || config.show_util,
                sort,
            },
            output,
        })
    }
}

/// Connect, run one reporting cycle and print the report
pub async fn show_capacity(settings: &Settings) -> Result<()> {
    let logger = StructuredLogger::new(
        settings
            .connect
            .context
            .as_deref()
            .unwrap_or("current-context"),
    );
    debug!(?settings, "Resolved settings");

    let source = KubeSource::connect(&settings.connect).await?;
    let utilization = settings
        .report
        .show_util
        .then_some(&source as &dyn UtilizationSource);

    let cluster = collect(&source, utilization, &settings.filters, &logger).await?;
    let report = CapacityReport::new(&cluster, &settings.report);

    if report.nodes.is_empty() && settings.output == OutputFormat::Table {
        print_warning("No nodes found");
    }

    let rendered = output::render(&report, settings.output)?;
    println!("{}", rendered.trim_end());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use capacity_lib::report::SortField;
    use capacity_lib::ResourceKind;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("kube-capacity").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_without_flags_or_config() {
        let settings = Settings::resolve(&cli(&[]), &Config::default()).unwrap();

        assert_eq!(settings.output, OutputFormat::Table);
        assert_eq!(settings.report, ReportOptions::default());
        assert_eq!(settings.filters, Filters::default());
        assert_eq!(settings.connect.context, None);
    }

    #[test]
    fn test_config_supplies_defaults() {
        let config = Config {
            default_output: Some("CSV".into()),
            default_sort: Some("mem.limit".into()),
            show_pods: true,
            show_util: true,
            namespace: Some("apps".into()),
            context: Some("staging".into()),
        };

        let settings = Settings::resolve(&cli(&[]), &config).unwrap();

        assert_eq!(settings.output, OutputFormat::Csv);
        assert_eq!(
            settings.report.sort,
            SortBy::Amount(ResourceKind::Memory, SortField::Limit)
        );
        assert!(settings.report.show_pods);
        assert!(settings.report.show_util);
        assert_eq!(settings.filters.namespace.as_deref(), Some("apps"));
        assert_eq!(settings.connect.context.as_deref(), Some("staging"));
    }

    #[test]
    fn test_flags_override_config() {
        let config = Config {
            default_output: Some("csv".into()),
            default_sort: Some("mem.limit".into()),
            namespace: Some("apps".into()),
            ..Default::default()
        };

        let settings = Settings::resolve(
            &cli(&[
                "-o", "json", "--sort", "cpu.util", "-n", "web", "-l", "tier=frontend",
                "--node-labels", "pool=spot",
            ]),
            &config,
        )
        .unwrap();

        assert_eq!(settings.output, OutputFormat::Json);
        assert_eq!(
            settings.report.sort,
            SortBy::Amount(ResourceKind::Cpu, SortField::Util)
        );
        assert_eq!(settings.filters.namespace.as_deref(), Some("web"));
        assert_eq!(settings.filters.pod_labels.as_deref(), Some("tier=frontend"));
        assert_eq!(settings.filters.node_labels.as_deref(), Some("pool=spot"));
    }

    #[test]
    fn test_invalid_sort_is_rejected() {
        assert!(Settings::resolve(&cli(&["--sort", "disk.request"]), &Config::default()).is_err());
    }

    #[test]
    fn test_invalid_config_output_is_rejected() {
        let config = Config {
            default_output: Some("yaml".into()),
            ..Default::default()
        };
        assert!(Settings::resolve(&cli(&[]), &config).is_err());
    }
}
