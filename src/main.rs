//! High/Low draw prediction bot
//!
//! Periodically predicts the binary outcome of a draw-based game and sizes
//! wagers against the prediction.

use clap::{Parser, Subcommand};
use highlow_bot::{
    bankroll::{AccountStore, BankrollController},
    client::HttpHistoryClient,
    config::Config,
    engine::Engine,
    error::BotError,
    executor::DryRunExecutor,
    notify::Notifier,
    store::VerificationLog,
};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "highlow-bot")]
#[command(about = "Prediction and wagering engine for a High/Low draw game")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the prediction loop
    Run,
    /// Run a single prediction cycle and exit
    Predict,
    /// Show account and log status
    Status,
    /// Test Telegram notification
    TestNotify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run => run_loop(config).await,
        Commands::Predict => run_once(config).await,
        Commands::Status => show_status(config).await,
        Commands::TestNotify => test_notify(config).await,
    }
}

fn build_notifier(config: &Config) -> Notifier {
    match &config.telegram {
        Some(tg) => Notifier::new(tg.bot_token.clone(), tg.chat_id.clone()),
        None => {
            tracing::warn!("Telegram not configured, notifications disabled");
            Notifier::disabled()
        }
    }
}

async fn build_engine(config: Config) -> anyhow::Result<Engine> {
    let notifier = build_notifier(&config);
    let history = HttpHistoryClient::new(&config.history)?;
    let engine = Engine::new(
        config,
        Box::new(history),
        Box::new(DryRunExecutor),
        notifier,
    )
    .await?;
    Ok(engine)
}

async fn run_loop(config: Config) -> anyhow::Result<()> {
    tracing::info!("starting High/Low prediction bot");

    let interval_secs = config.engine.cycle_interval_secs;
    let notifier = build_notifier(&config);
    if let Err(e) = notifier.startup().await {
        tracing::warn!("startup notification failed: {}", e);
    }

    let mut engine = build_engine(config).await?;
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        ticker.tick().await;

        // one cycle at a time; every failure degrades to retrying next tick
        match engine.cycle().await {
            Ok(report) => {
                if let Some(reason) = report.skipped {
                    tracing::info!("cycle skipped: {}", reason);
                }
            }
            Err(BotError::DataUnavailable(reason)) => {
                tracing::warn!("no usable history ({}), retrying next tick", reason);
            }
            Err(e) => {
                tracing::error!("cycle failed: {}", e);
            }
        }
    }
}

async fn run_once(config: Config) -> anyhow::Result<()> {
    let mut engine = build_engine(config).await?;
    let report = engine.cycle().await?;

    match report.prediction {
        Some(prediction) => {
            println!(
                "Draw {}: {} via {} (score {:.2}{})",
                prediction.draw_id,
                prediction.outcome,
                prediction.kind,
                prediction.combined_score,
                prediction
                    .stake
                    .map(|s| format!(", stake {}", s))
                    .unwrap_or_default()
            );
        }
        None => {
            println!(
                "No prediction this cycle{}",
                report
                    .skipped
                    .map(|r| format!(": {}", r))
                    .unwrap_or_default()
            );
        }
    }
    Ok(())
}

async fn show_status(config: Config) -> anyhow::Result<()> {
    let store = AccountStore::new(config.stores.account_file());
    let controller = BankrollController::open(
        config.wagering.clone(),
        config.difficult_period.clone(),
        store,
    )
    .await?;
    let state = controller.state();

    println!("\n💰 Account Status\n");
    println!("Enabled: {}", state.enabled);
    println!("Demo mode: {}", state.demo_mode);
    println!("Session balance: {}", state.current_balance);
    println!("Consecutive losses: {}", state.consecutive_losses);
    println!(
        "Stop loss: {}  Take profit: {}",
        state.stop_loss, state.take_profit
    );
    if let Some(reason) = &state.disabled_reason {
        println!("Disabled reason: {}", reason);
    }

    let log = VerificationLog::open(config.stores.verification_log()).await?;
    println!("\n📊 Verification Log\n");
    println!("Resolved predictions: {}", log.len());
    if !log.is_empty() {
        println!(
            "Recent accuracy (20): {:.0}%",
            log.recent_accuracy(20) * 100.0
        );
        println!("Current loss streak: {}", log.consecutive_losses());
    }

    Ok(())
}

async fn test_notify(config: Config) -> anyhow::Result<()> {
    let tg = config
        .telegram
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Telegram not configured in config.toml"))?;

    let notifier = Notifier::new(tg.bot_token.clone(), tg.chat_id.clone());
    notifier
        .send("🧪 <b>Test notification</b>\n\nTelegram integration is working.")
        .await?;

    println!("✅ Test notification sent");
    Ok(())
}
