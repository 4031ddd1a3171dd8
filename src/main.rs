// src/main.rs
use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use signal_post_bot::{
    clients::build_collaborators,
    clock::SystemClock,
    config::load_config,
    generation::load_examples_or_empty,
    utils::setup_logging,
    BotError, Engine,
};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "signal-post-bot", about = "Harvests market signals and publishes generated posts")]
struct Cli {
    /// Scheduler tick in seconds (overrides SCHEDULER_TICK_SECS)
    #[arg(long)]
    tick_secs: Option<u64>,

    /// Log level (overrides LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,

    /// Do not run background refresh jobs
    #[arg(long)]
    no_schedule: bool,

    /// Trigger one generation after the first refresh round
    #[arg(long)]
    generate_once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = (*load_config().context("invalid configuration")?).clone();
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(tick) = cli.tick_secs {
        config.scheduler_tick_secs = tick.max(1);
    }
    setup_logging(&config.log_level).context("failed to initialize logging")?;
    info!("Signal post bot starting...");

    let config = Arc::new(config);
    let collaborators = build_collaborators(&config).context("failed to build API clients")?;
    let examples = load_examples_or_empty(&config.example_tweets_path);
    let engine = Arc::new(Engine::new(
        config.clone(),
        collaborators,
        examples,
        Arc::new(SystemClock),
    )?);

    if cli.no_schedule {
        engine.start_without_scheduler();
    } else {
        engine.start().await;
    }

    if cli.generate_once {
        // Every job is due at startup; run the first round to completion before generating.
        engine.tick();
        engine.wait_for_jobs().await;
        match engine.trigger_generation().await {
            Ok(result) => info!(
                "Published {} (post id: {})",
                result.id,
                result.post_id.as_deref().unwrap_or("unconfirmed")
            ),
            Err(BotError::DuplicateContent(reason)) => warn!("Nothing published: {}", reason),
            Err(e) => error!("Generation failed: {}", e),
        }
    }

    info!("{}", engine.health_status().await.summary);
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("Received ctrl-c");

    engine.shutdown().await;
    Ok(())
}
