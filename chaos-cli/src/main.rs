//! # db-chaos
//!
//! Runs a balance-transfer workload against a database while Chaos Mesh
//! injects failures into its pods, then reports which experiments caused
//! errors and how much downtime each one cost.
//!
//! ## Example
//!
//! ```bash
//! # Against CockroachDB through `kubectl proxy`, reseeding first
//! db-chaos --database cockroach \
//!     --url postgres://root@localhost:26257/defaultdb?sslmode=disable \
//!     --reseed --accounts 1000
//!
//! # Everything from a config file, results written as JSON
//! db-chaos --config db-chaos.toml --results-file results.json
//! ```

use anyhow::{bail, Context, Result};
use chaos_core::{Harness, Orchestrator, Repo, RunOutcome, TracingReporter};
use chaos_kube::{KubeClient, KubeConfig};
use chaos_repo::{CockroachRepo, PostgresRepo};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

mod config;
mod summary;

use config::{Config, DatabaseKind};

/// Measure database availability under Chaos Mesh experiments.
#[derive(Parser, Debug)]
#[command(name = "db-chaos")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML config file; flags override its values
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Database adapter
    #[arg(long, value_enum)]
    database: Option<DatabaseKind>,

    /// Database connection URL
    #[arg(long)]
    url: Option<String>,

    /// Drop and recreate the account table before the run
    #[arg(long)]
    reseed: bool,

    /// Number of accounts to seed and sample
    #[arg(long)]
    accounts: Option<usize>,

    /// Starting balance of each seeded account
    #[arg(long)]
    balance: Option<f64>,

    /// Namespace the database pods run in
    #[arg(long)]
    namespace: Option<String>,

    /// Namespace experiments are created in
    #[arg(long)]
    chaos_namespace: Option<String>,

    /// Seconds each experiment stays applied
    #[arg(long)]
    hold_secs: Option<u64>,

    /// Seconds to wait for the database to recover between experiments
    #[arg(long)]
    ready_timeout_secs: Option<u64>,

    /// Seconds between readiness checks
    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// Seconds of workload before the first experiment
    #[arg(long)]
    warmup_secs: Option<u64>,

    /// Kubernetes API server URL (default: in-cluster, kubeconfig, then kubectl proxy)
    #[arg(long)]
    kube_api: Option<String>,

    /// Kubernetes bearer token
    #[arg(long)]
    kube_token: Option<String>,

    /// Write the final summary as JSON to this file
    #[arg(long)]
    results_file: Option<PathBuf>,

    /// Seed for the transfer RNG
    #[arg(long)]
    seed: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Load the config file, if any, and apply flag overrides.
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(kind) = self.database {
            config.database.kind = kind;
        }
        if let Some(url) = &self.url {
            config.database.url = Some(url.clone());
        }
        if self.reseed {
            config.workload.reseed = true;
        }
        if let Some(accounts) = self.accounts {
            config.workload.accounts = accounts;
        }
        if let Some(balance) = self.balance {
            config.workload.initial_balance = balance;
        }
        if let Some(warmup) = self.warmup_secs {
            config.workload.warmup_secs = warmup;
        }
        if let Some(seed) = self.seed {
            config.workload.seed = Some(seed);
        }
        if let Some(namespace) = &self.namespace {
            config.chaos.namespace = namespace.clone();
        }
        if let Some(namespace) = &self.chaos_namespace {
            config.chaos.chaos_namespace = namespace.clone();
        }
        if let Some(hold) = self.hold_secs {
            config.chaos.hold_secs = hold;
        }
        if let Some(timeout) = self.ready_timeout_secs {
            config.chaos.ready_timeout_secs = timeout;
        }
        if let Some(interval) = self.poll_interval_secs {
            config.chaos.poll_interval_secs = interval;
        }
        if let Some(api) = &self.kube_api {
            config.kube.api_server = Some(api.clone());
        }
        if let Some(token) = &self.kube_token {
            config.kube.token = Some(token.clone());
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, rust_log.as_deref()))
        .init();

    let config = cli.load_config()?;
    let repo = connect(&config).await?;

    let kube = KubeConfig::discover(config.kube.api_server.clone(), config.kube.token.clone())
        .context("Failed to resolve Kubernetes settings")?;
    let orchestrator: Arc<dyn Orchestrator> =
        Arc::new(KubeClient::new(kube).context("Failed to create Kubernetes client")?);

    let harness = Harness::new(
        repo,
        orchestrator,
        config.harness_config(),
        Arc::new(TracingReporter),
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
        info!("interrupted, cleaning up");
    };

    let run = harness.run(shutdown).await.context("Chaos run failed")?;

    print!("{}", summary::render(&run));
    if let Some(path) = &cli.results_file {
        summary::write_json(&run, path)?;
        info!("results written to {}", path.display());
    }

    if let RunOutcome::Failed(reason) = &run.outcome {
        bail!("chaos sequence stopped early: {reason}");
    }
    Ok(())
}

/// INFO, or DEBUG with `--verbose`, unless `RUST_LOG` says otherwise.
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy(rust_log.unwrap_or_default())
}

/// Connect the configured datastore adapter.
async fn connect(config: &Config) -> Result<Arc<dyn Repo>> {
    let url = config
        .database
        .url
        .as_deref()
        .context("No database url; pass --url or set [database] url")?;
    let store = config.store_config();

    let repo: Arc<dyn Repo> = match config.database.kind {
        DatabaseKind::Postgres => Arc::new(
            PostgresRepo::connect(url, store)
                .await
                .context("Failed to connect to postgres")?,
        ),
        DatabaseKind::Cockroach => Arc::new(
            CockroachRepo::connect(url, store, config.database.min_replicas)
                .await
                .context("Failed to connect to cockroachdb")?,
        ),
    };
    Ok(repo)
}
