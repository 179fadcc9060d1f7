//! fleet-orchestrator
//!
//! Bootstraps a cluster from its manifest: instance profile, key pair,
//! subnets and security group, then the monitoring agent, dashboard and
//! alarms on every node.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fleet_command::BackoffPolicy;
use fleet_monitoring::{
    dashboard_body, render_agent_config, render_alarms, render_dashboard, MonitoringTemplates,
};
use fleet_orchestrator::{BootstrapSettings, Bootstrapper, ClusterConfig, Config};
use fleet_provider::http::DEFAULT_TIMEOUT;
use fleet_provider::HttpProvider;
use fleet_reconcile::FsKeyStore;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Converge a fleet cluster and its monitoring.
#[derive(Debug, Parser)]
#[command(name = "fleet-orchestrator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Cluster manifest. Overrides FLEET_CLUSTER_FILE.
    #[arg(long, global = true)]
    cluster: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Converge resources and install monitoring (default).
    Bootstrap {
        /// Converge resources only.
        #[arg(long)]
        skip_monitoring: bool,
    },

    /// Print the rendered agent config, dashboard and alarms without
    /// calling the provider.
    Render,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let cluster_file = cli.cluster.clone().unwrap_or_else(|| config.cluster_file.clone());
    let cluster = ClusterConfig::load(&cluster_file)
        .with_context(|| format!("loading cluster manifest {}", cluster_file.display()))?;

    match cli.command.unwrap_or(Commands::Bootstrap {
        skip_monitoring: false,
    }) {
        Commands::Bootstrap { skip_monitoring } => {
            bootstrap(&config, &cluster, skip_monitoring).await
        }
        Commands::Render => render(&cluster),
    }
}

async fn bootstrap(config: &Config, cluster: &ClusterConfig, skip_monitoring: bool) -> Result<()> {
    info!(
        cluster = %cluster.cluster_name,
        provider_url = %config.provider_url,
        nodes = cluster.node_ids.len(),
        "Starting bootstrap"
    );

    let templates = match cluster.template_paths() {
        Some(paths) if !skip_monitoring => Some(MonitoringTemplates::load(&paths)?),
        _ => None,
    };

    let provider = Arc::new(HttpProvider::new(config.provider_url.clone(), DEFAULT_TIMEOUT)?);
    let keys = Arc::new(FsKeyStore::new(config.key_dir.clone()));
    let settings = BootstrapSettings {
        command_timeout: config.command_timeout,
        backoff: BackoffPolicy::starting_at(config.poll_interval),
    };
    let bootstrapper = Bootstrapper::new(provider, keys, settings);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping");
            let _ = shutdown_tx.send(true);
        }
    });

    match bootstrapper
        .run(cluster, templates.as_ref(), &mut shutdown_rx)
        .await
    {
        Ok(report) => {
            for (kind, action) in &report.actions {
                info!(resource = %kind, action = ?action, "Resource converged");
            }
            info!(
                security_group_id = %report.resources.security_group_id,
                key_name = %report.resources.key_name,
                mutating_calls = report.mutating_calls,
                noop = report.is_noop(),
                "Cluster ready"
            );
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            info!("Bootstrap cancelled");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Bootstrap failed");
            Err(e.into())
        }
    }
}

fn render(cluster: &ClusterConfig) -> Result<()> {
    let paths = cluster
        .template_paths()
        .context("the cluster manifest has no [monitoring] section")?;
    let templates = MonitoringTemplates::load(&paths)?;
    let (name, region) = (&cluster.cluster_name, &cluster.region);

    let widgets = render_dashboard(&templates.dashboard, &cluster.node_ids, name, region);
    let dashboard: serde_json::Value = serde_json::from_str(&dashboard_body(&widgets))?;
    let alarms: Vec<serde_json::Value> =
        render_alarms(&templates.alarms, &cluster.node_ids, name, region)
            .into_iter()
            .map(|alarm| alarm.value)
            .collect();

    let rendered = serde_json::json!({
        "agent_config": render_agent_config(&templates.agent_config, name, region),
        "dashboard": dashboard,
        "alarms": alarms,
    });
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}
