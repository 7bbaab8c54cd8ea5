//! packsmith - publish a modpack directory to an object store.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Json};
use packsmith_core::PublishConfig;
use packsmith_publisher::{ProgressObserver, ProgressSnapshot, PublishReport, Publisher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const ENV_PREFIX: &str = "PACKSMITH_";
const CONFIG_ENV: &str = "PACKSMITH_CONFIG";

/// Publish a modpack as content-addressed blobs plus version manifests
#[derive(Parser, Debug)]
#[command(name = "packsmith")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "PACKSMITH_CONFIG", default_value = "packsmith.json")]
    config: PathBuf,

    /// Version name to publish (overrides the config file)
    #[arg(long)]
    version_name: Option<String>,

    /// Source directory to publish (overrides the config file)
    #[arg(long)]
    source_dir: Option<PathBuf>,

    /// Write a template configuration file and exit
    #[arg(long)]
    init: bool,

    /// Do not log upload progress
    #[arg(short, long)]
    quiet: bool,
}

/// Logs progress snapshots through tracing.
struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        let mut active = snapshot.active_sample.join(", ");
        if snapshot.active_more > 0 {
            active.push_str(&format!(" (+{} more)", snapshot.active_more));
        }
        tracing::info!(
            completed = snapshot.completed,
            total = snapshot.total,
            percent = %format!("{:.1}", snapshot.percent()),
            active = %active,
            "upload progress"
        );
    }

    fn on_complete(&self, total: usize) {
        tracing::info!(total, "all uploads finished");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.init {
        return write_template(&cli.config);
    }

    let mut config = load_config(&cli.config)?;
    apply_overrides(&mut config, &cli);

    tracing::info!(
        "packsmith v{} publishing {} version {}",
        env!("CARGO_PKG_VERSION"),
        config.project_id,
        config.version_name
    );

    let publisher = Publisher::start(&config)
        .await
        .context("failed to start publisher")?;

    let observer: Option<Arc<dyn ProgressObserver>> = if cli.quiet {
        None
    } else {
        Some(Arc::new(LogProgress))
    };
    let result = publisher.publish(observer).await;

    if let Err(e) = publisher.shutdown().await {
        tracing::warn!(error = %e, "failed to shut down storage backend cleanly");
    }

    let report = result.with_context(|| {
        format!(
            "failed to publish {} version {}",
            config.project_id, config.version_name
        )
    })?;
    print_report(&report);
    Ok(())
}

/// Load configuration from the JSON file (if present) merged with
/// `PACKSMITH_`-prefixed environment variables.
fn load_config(config_path: &Path) -> Result<PublishConfig> {
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::debug!(config_path = %config_path.display(), "loading configuration from file");
        figment = figment.merge(Json::file(config_path));
    } else {
        tracing::debug!("no config file found at {}", config_path.display());
    }

    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with(ENV_PREFIX) && key != CONFIG_ENV);

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: packsmith --config /path/to/packsmith.json\n  \
             2. Environment variables: PACKSMITH_PROJECT_ID=my-pack \
             PACKSMITH_STORAGE__TYPE=s3 PACKSMITH_STORAGE__BUCKET=my-bucket ...\n\n\
             Run `packsmith --init` to write a template config file."
        );
    }

    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("failed to load configuration")
}

fn apply_overrides(config: &mut PublishConfig, cli: &Cli) {
    if let Some(version) = &cli.version_name {
        config.version_name = version.clone();
    }
    if let Some(dir) = &cli.source_dir {
        config.source_dir = dir.clone();
    }
}

fn write_template(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!(
            "refusing to overwrite existing config file {}",
            path.display()
        );
    }
    let json = serde_json::to_string_pretty(&PublishConfig::template())
        .context("failed to serialize template config")?;
    std::fs::write(path, json + "\n")
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote template configuration to {}", path.display());
    Ok(())
}

fn print_report(report: &PublishReport) {
    println!(
        "Published {} version {}: {} files ({} uploaded, {} already stored) in {:.1}s",
        report.project,
        report.version,
        report.files,
        report.uploaded,
        report.deduplicated,
        report.elapsed.as_secs_f64()
    );
    println!("  modpack:  {}", report.modpack_url);
    println!("  versions: {}", report.versions_url);
    println!("  meta:     {}", report.meta_url);
}
