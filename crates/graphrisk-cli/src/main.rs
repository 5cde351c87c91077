//! GraphRisk CLI tool.
//!
//! Runs the analysis suite over graph snapshots and manages configuration.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use graphrisk::catalog::{analyses, domains, total_analysis_count};
use graphrisk::compliance::seeds::ExternalSources;
use graphrisk::core::config::{DateWindow, EngineConfig};
use graphrisk::core::domain::Domain;
use graphrisk::core::logging::LogLevel;
use graphrisk::core::registry::AnalysisRegistry;
use graphrisk::graph::graph::RiskGraph;
use graphrisk::graph::similarity::SimilarityMap;
use graphrisk::graph::source::{GraphLoader, QueryScope, SnapshotSource};
use graphrisk::graph::subgraph::ContractSubgraph;
use graphrisk::suite::{AnalysisSuite, Outcome, SuiteReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "graphrisk")]
#[command(version, about = "Graph risk analytics engine", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (TOML); falls back to GRAPHRISK_* environment variables
    #[arg(short, long, global = true, env = "GRAPHRISK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every analysis over a graph snapshot
    Analyze {
        /// Graph snapshot (JSON)
        #[arg(short, long)]
        graph: PathBuf,

        /// Edge similarity cache (JSON)
        #[arg(short, long)]
        similarity: Option<PathBuf>,

        /// Records seeding the external risk rank
        #[arg(long, value_enum, default_value_t = SourcesArg::All)]
        sources: SourcesArg,

        /// Only load edges dated on or after this day (YYYY-MM-DD)
        #[arg(long)]
        from: Option<chrono::NaiveDate>,

        /// Only load edges dated on or before this day (YYYY-MM-DD)
        #[arg(long)]
        to: Option<chrono::NaiveDate>,

        /// Reference day for overdue checks (YYYY-MM-DD, default today)
        #[arg(long)]
        as_of: Option<chrono::NaiveDate>,

        /// Write the full JSON report here instead of printing a summary
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract the risk subgraph around a contract
    Subgraph {
        /// Graph snapshot (JSON)
        #[arg(short, long)]
        graph: PathBuf,

        /// Root contract id
        contract_id: String,

        /// Contract hops to follow
        #[arg(short, long, default_value = "2")]
        depth: usize,
    },

    /// List available analyses
    List {
        /// Filter by domain (e.g., collusion, circular-trade)
        #[arg(short, long)]
        domain: Option<String>,
    },

    /// Show analysis registry statistics
    Stats,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show {
        /// Start from a preset instead of the file or environment
        #[arg(long, value_enum)]
        preset: Option<Preset>,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file (TOML)
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Development,
    Production,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourcesArg {
    All,
    Penalties,
    Abnormal,
}

impl From<SourcesArg> for ExternalSources {
    fn from(arg: SourcesArg) -> Self {
        match arg {
            SourcesArg::All => ExternalSources::All,
            SourcesArg::Penalties => ExternalSources::Penalties,
            SourcesArg::Abnormal => ExternalSources::Abnormal,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging = logging.with_level(LogLevel::Debug);
    }
    logging.init()?;

    match cli.command {
        Commands::Analyze {
            graph,
            similarity,
            sources,
            from,
            to,
            as_of,
            output,
        } => {
            let window = match (from, to) {
                (None, None) => None,
                (start, end) => Some(DateWindow { start, end }),
            };
            cmd_analyze(
                config,
                &graph,
                similarity.as_deref(),
                sources,
                window,
                as_of,
                output.as_deref(),
            )
            .await?;
        }

        Commands::Subgraph {
            graph,
            contract_id,
            depth,
        } => {
            cmd_subgraph(&graph, &contract_id, depth)?;
        }

        Commands::List { domain } => {
            cmd_list(domain.as_deref())?;
        }

        Commands::Stats => {
            cmd_stats()?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show { preset } => cmd_config_show(config, preset)?,
            ConfigAction::Validate { path } => cmd_config_validate(&path)?,
        },
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => EngineConfig::from_env().context("invalid GRAPHRISK_* environment override"),
    }
}

fn load_graph(path: &Path, scope: QueryScope) -> anyhow::Result<RiskGraph> {
    let source = SnapshotSource::from_path(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let graph = GraphLoader::new()
        .with_scope(scope)
        .load(&source)
        .context("failed to build graph")?;
    Ok(graph)
}

async fn cmd_analyze(
    config: EngineConfig,
    graph_path: &Path,
    similarity: Option<&Path>,
    sources: SourcesArg,
    window: Option<DateWindow>,
    as_of: Option<chrono::NaiveDate>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let mut scope = QueryScope::all();
    if let Some(window) = window {
        scope = scope.with_window(window);
    }
    let graph = Arc::new(load_graph(graph_path, scope)?);

    let mut suite = AnalysisSuite::new(config).with_external_sources(sources.into());
    if let Some(path) = similarity {
        let map = SimilarityMap::from_path(path)
            .with_context(|| format!("failed to read similarity cache {}", path.display()))?;
        info!(entries = map.len(), "similarity cache loaded");
        suite = suite.with_similarity(Arc::new(map));
    }
    if let Some(window) = window {
        suite = suite.with_external_window(window);
    }
    if let Some(as_of) = as_of {
        suite = suite.with_as_of(as_of);
    }

    let report = suite.run(graph).await?;

    match output {
        Some(path) => {
            let json = serde_json::to_string_pretty(&report)?;
            std::fs::write(path, json)
                .with_context(|| format!("failed to write report {}", path.display()))?;
            println!("Report written to {}", path.display());
        }
        None => print_summary(&report),
    }

    if report.failure_count() > 0 {
        anyhow::bail!("{} analyses failed", report.failure_count());
    }
    Ok(())
}

fn print_summary(report: &SuiteReport) {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                    GraphRisk Analysis Report                     ║");
    println!("╚══════════════════════════════════════════════════════════════════╝\n");

    println!("Run:    {}", report.run_id);
    println!("Graph:  {} nodes, {} edges", report.node_count, report.edge_count);
    println!("Time:   {} ms\n", report.elapsed_ms);

    print_outcome("Fraud rank", &report.fraud_rank, |r| {
        format!(
            "{} seeded, top: {}",
            r.report.seeded_nodes,
            r.report
                .companies
                .first()
                .map_or("-".to_string(), |c| format!("{} ({:.3})", c.company_id, c.score))
        )
    });
    print_outcome("External risk", &report.external_risk, |r| {
        format!(
            "{} seeded, {} companies ranked",
            r.report.seeded_nodes,
            r.report.companies.len()
        )
    });
    print_outcome("Trade cycles", &report.cycles, |r| {
        format!(
            "{} found, {} suspicious{}",
            r.cycles.len(),
            r.suspicious().count(),
            if r.truncated { " (truncated)" } else { "" }
        )
    });
    print_outcome("Fan patterns", &report.fan_patterns, |p| {
        format!("{} patterns", p.len())
    });
    print_outcome("Shell clusters", &report.shell_clusters, |c| {
        format!(
            "{} clusters, {} high risk",
            c.len(),
            c.iter()
                .filter(|c| c.risk_level == graphrisk::core::domain::RiskLevel::High)
                .count()
        )
    });
    print_outcome("Shell companies", &report.shell_companies, |r| {
        format!(
            "{} high risk, {} networks",
            r.high_risk().count(),
            r.networks.len()
        )
    });
    print_outcome("Collusion", &report.collusion, |c| {
        format!(
            "{} communities, {} flagged",
            c.len(),
            c.iter().filter(|c| c.flagged).count()
        )
    });
    print_outcome("Perform risk", &report.perform_risk, |r| {
        format!(
            "{} overdue as of {}, top: {}",
            r.overdue.len(),
            r.as_of,
            r.companies
                .first()
                .map_or("-".to_string(), |c| format!("{} ({:.3})", c.company_id, c.score))
        )
    });
}

fn print_outcome<T>(label: &str, outcome: &Outcome<T>, summarize: impl Fn(&T) -> String) {
    match outcome {
        Outcome::Completed(value) => println!("  ✓ {:<16} {}", label, summarize(value)),
        Outcome::Failed(error) => println!("  ✗ {:<16} {}", label, error),
    }
}

fn cmd_subgraph(graph_path: &Path, contract_id: &str, depth: usize) -> anyhow::Result<()> {
    let graph = load_graph(graph_path, QueryScope::all())?;
    let subgraph = ContractSubgraph::compute(&graph, contract_id, depth)?;
    if subgraph.is_empty() {
        anyhow::bail!("contract '{}' not found", contract_id);
    }
    println!("{}", serde_json::to_string_pretty(&subgraph)?);
    Ok(())
}

fn cmd_list(domain_filter: Option<&str>) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                  GraphRisk Analysis Catalogue                    ║");
    println!("╚══════════════════════════════════════════════════════════════════╝\n");

    let filter = match domain_filter {
        Some(name) => match Domain::parse(name) {
            Some(domain) => Some(domain),
            None => {
                println!("Unknown domain. Available domains:");
                for d in Domain::ALL {
                    println!("  - {}", d);
                }
                return Ok(());
            }
        },
        None => None,
    };

    let all = analyses();
    for info in domains() {
        if filter.is_some_and(|d| d != info.domain) {
            continue;
        }
        println!("┌─────────────────────────────────────────────────────────────────┐");
        println!("│ {} ({} analyses)", info.name, info.analysis_count);
        println!("│ {}", info.description);
        println!("├─────────────────────────────────────────────────────────────────┤");
        for metadata in all.iter().filter(|m| m.domain == info.domain) {
            let mut flags = Vec::new();
            if metadata.iterative {
                flags.push("iterative");
            }
            if metadata.cancellable {
                flags.push("cancellable");
            }
            println!(
                "│  {:<30} v{:<3} {:<24} {}",
                metadata.id,
                metadata.version,
                flags.join(","),
                metadata.description
            );
        }
        println!("└─────────────────────────────────────────────────────────────────┘\n");
    }

    println!("Total: {} analyses across {} domains", total_analysis_count(), Domain::ALL.len());
    Ok(())
}

fn cmd_stats() -> anyhow::Result<()> {
    let registry = AnalysisRegistry::new();
    graphrisk::register_all(&registry)?;
    let stats = registry.stats();

    println!("Total analyses:        {}", stats.total);
    println!("Iterative analyses:    {}", stats.iterative);
    println!("Cancellable analyses:  {}", stats.cancellable);
    println!();

    println!("Analyses by domain:");
    println!("──────────────────────────────────────────────────────────────────");
    for domain in Domain::ALL {
        let count = stats.by_domain.get(domain).copied().unwrap_or(0);
        println!("  {:<25} {:>3} {}", domain, count, "█".repeat(count));
    }
    Ok(())
}

fn cmd_config_show(config: EngineConfig, preset: Option<Preset>) -> anyhow::Result<()> {
    let config = match preset {
        Some(Preset::Development) => EngineConfig::development(),
        Some(Preset::Production) => EngineConfig::production(),
        None => config,
    };
    print!("{}", config.to_toml_string()?);
    Ok(())
}

fn cmd_config_validate(path: &Path) -> anyhow::Result<()> {
    println!("Validating configuration: {}", path.display());
    let config = EngineConfig::from_file(path)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    println!("✓ Parsed");

    match config.validate() {
        Ok(()) => {
            println!("✓ Valid ({} environment)", config.environment);
            Ok(())
        }
        Err(e) => {
            println!("✗ {}", e);
            anyhow::bail!("configuration is invalid")
        }
    }
}
