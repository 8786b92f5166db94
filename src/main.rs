//! Terminal entry: loads config and credential, resolves the event, waits for
//! the sale to open and runs one acquisition.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ticket_sniper::config::Config;
use ticket_sniper::credential_store::{CredentialStore, FileCredentialStore};
use ticket_sniper::engine::{AcquisitionEngine, AcquisitionReport, ScheduledRun};
use ticket_sniper::metrics::metrics;
use ticket_sniper::types::{Credential, SearchTag};

#[derive(Debug, Parser)]
#[command(name = "ticket_sniper", about = "Reserve tickets the moment sales open")]
struct Cli {
    /// Event page URL, e.g. https://kide.app/events/<id>
    #[arg(long)]
    event_url: String,

    /// Prefer variants whose name contains this text
    #[arg(long)]
    tag: Option<String>,

    /// Bearer credential ("Bearer ..."); stored for later runs once validated
    #[arg(long)]
    token: Option<String>,

    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Start polling right away instead of waiting for the sale start
    #[arg(long)]
    now: bool,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = Config::load_from(&cli.config).context("invalid configuration")?;
    info!("Loaded config: {:?}", cfg);

    let store = FileCredentialStore::new(&cfg.credential_path);
    let supplied = cli.token.as_deref().map(Credential::new);
    let credential = supplied
        .clone()
        .or_else(|| store.load())
        .with_context(|| format!("no credential given and none stored in {}", store.path().display()))?;

    let engine = AcquisitionEngine::new(cfg.clone()).context("failed to start engine")?;
    let result = run(&engine, &cli, &store, supplied.is_some(), credential).await;
    engine.shutdown();

    info!(metrics = ?metrics().export_metrics(), "Final metrics");
    result
}

async fn run(
    engine: &AcquisitionEngine,
    cli: &Cli,
    store: &FileCredentialStore,
    save_credential: bool,
    credential: Credential,
) -> anyhow::Result<()> {
    let Some(user) = engine.authorize(&credential).await else {
        bail!("credential was rejected; expected the full \"Bearer ...\" string");
    };
    println!(
        "Found user '{}'",
        user.full_name.as_deref().unwrap_or("???")
    );
    if save_credential {
        store.save(&credential)?;
    }

    let event = engine
        .resolve_event(&cli.event_url)
        .await
        .with_context(|| format!("event not found for {}", cli.event_url))?;
    info!(name = %event.name, sale_start_at = %event.sale_start_at, "Event found");

    let tag = cli.tag.as_deref().and_then(SearchTag::new);
    match &tag {
        Some(t) => info!(tag = %t, "Preferring matching variants"),
        None => info!("No tag set, reserving from every variant"),
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received");
            on_signal.cancel();
        }
    });

    let report = if cli.now {
        engine
            .run_acquisition_report(
                &credential,
                &event.id,
                tag.as_ref(),
                engine.config().overall_timeout(),
            )
            .await?
    } else {
        match engine
            .run_scheduled(&credential, &event, tag.as_ref(), &cancel)
            .await?
        {
            ScheduledRun::Cancelled => {
                println!("Cancelled before sales opened.");
                return Ok(());
            }
            ScheduledRun::Finished(report) => report,
        }
    };

    print_report(&report);
    if !report.reserved() {
        bail!("no tickets reserved");
    }
    Ok(())
}

fn print_report(report: &AcquisitionReport) {
    match &report.variants {
        None => println!("Timed out: no tickets appeared."),
        Some(variants) => {
            println!("Found {} ticket variant(s):", variants.len());
            for v in variants {
                println!("  {} (max {})", v.name, v.max_reservable_quantity);
            }
            for a in report.outcome.successful() {
                println!("  reserved {} x {} [{}]", a.quantity, a.inventory_id, a.tier.label());
            }
        }
    }
    println!(
        "{} in {:.2}s",
        if report.reserved() { "Success" } else { "Failed" },
        report.elapsed.as_secs_f64()
    );
}
