//! charts - inspect a structural tension workspace snapshot
//!
//! Loads a JSON snapshot into the in-memory store and prints dashboard
//! analytics or hierarchy reports as JSON on stdout.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tension_orchestrator::analytics::{DashboardFilter, DateRange};
use tension_orchestrator::{AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "charts")]
#[command(about = "Structural tension chart analytics")]
struct Cli {
    /// JSON snapshot {charts, tensions, actions, dependencies, profiles}
    #[arg(short, long, global = true, env = "CHARTS_SNAPSHOT", default_value = "snapshot.json")]
    snapshot: PathBuf,

    /// YAML config file (defaults to ./config.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Scope {
    /// Workspace to analyze
    #[arg(short, long)]
    workspace: Uuid,

    /// Restrict to this chart and its descendants
    #[arg(short, long)]
    chart: Option<Uuid>,

    /// Only count deadlines due at or after this instant (RFC 3339)
    #[arg(long)]
    due_from: Option<DateTime<Utc>>,

    /// Only count deadlines due at or before this instant (RFC 3339)
    #[arg(long)]
    due_until: Option<DateTime<Utc>>,
}

impl Scope {
    fn filter(&self) -> DashboardFilter {
        let mut filter = DashboardFilter::workspace(self.workspace);
        if let Some(chart) = self.chart {
            filter = filter.with_chart(chart);
        }
        if self.due_from.is_some() || self.due_until.is_some() {
            filter = filter.with_due_range(DateRange {
                start: self.due_from,
                end: self.due_until,
            });
        }
        filter
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Delay cascades, deadlines, stale charts and recommendations
    Insights(Scope),

    /// Headline dashboard numbers
    Stats(Scope),

    /// Depth and descendants of one chart
    Hierarchy {
        #[arg(short, long)]
        chart: Uuid,
    },

    /// Master charts with their telescoped layers
    Groups {
        #[arg(short, long)]
        workspace: Uuid,
    },

    /// Report broken parent/child references
    Check {
        #[arg(short, long)]
        workspace: Uuid,
    },
}

#[derive(Serialize)]
struct HierarchyReport {
    chart_id: Uuid,
    depth: usize,
    descendants: Vec<Uuid>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Logs go to stderr, reports to stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tension_orchestrator=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_yaml_and_env(cli.config.as_deref())?;
    let state = AppState::from_snapshot(&cli.snapshot, config)?;
    let now = Utc::now();

    match cli.command {
        Commands::Insights(scope) => print(&state.dashboard().insights(&scope.filter(), now).await?),
        Commands::Stats(scope) => print(&state.dashboard().stats(&scope.filter(), now).await?),
        Commands::Hierarchy { chart } => {
            let resolver = state.resolver();
            let (depth, descendants) =
                tokio::try_join!(resolver.depth(chart), resolver.descendants(chart))?;
            print(&HierarchyReport {
                chart_id: chart,
                depth,
                descendants,
            })
        }
        Commands::Groups { workspace } => {
            print(&state.resolver().project_groups(workspace).await?)
        }
        Commands::Check { workspace } => {
            let report = state.resolver().check_consistency(workspace).await?;
            if !report.is_consistent() {
                tracing::warn!(
                    issues = report.issues.len(),
                    "Workspace has inconsistent references"
                );
            }
            print(&report)
        }
    }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
