use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use daybreak::clock::Clock;
use daybreak::config::AppConfig;
use daybreak::mailer::{ApiMailer, CaptureMailer, EmailComposer, Mailer, MailerConfig};
use daybreak::scheduler::{BatchRequest, DeliveryScheduler};
use daybreak::selector::HighlightSelector;
use daybreak::server::DeliveryServer;
use daybreak::store::{
    RestAttemptLog, RestHighlightStore, RestUserDirectory, StoreClient, StoreConfig,
};

#[derive(Parser)]
#[command(
    name = "daybreak",
    version,
    about = "Daily book-highlight email delivery service",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP trigger server
    Serve {
        /// Override the bind address
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Run one delivery batch from the command line
    Send {
        /// Window override, "HH:MM" (defaults to the current time)
        #[arg(short, long)]
        time: Option<String>,

        /// Process every candidate regardless of send time
        #[arg(long, default_value = "false")]
        force_all: bool,

        /// Only process random-mode users
        #[arg(long, default_value = "false")]
        only_random: bool,

        /// Only process specific-mode users
        #[arg(long, default_value = "false")]
        only_specific: bool,

        /// Capture outgoing mail instead of calling the provider
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },

    /// Send a single test email
    TestEmail {
        /// Recipient (defaults to DAYBREAK_TEST_RECIPIENT)
        #[arg(short, long)]
        to: Option<String>,

        /// Send this highlight instead of the connectivity-test body
        #[arg(long)]
        highlight: Option<String>,
    },

    /// Report which required environment variables are missing
    CheckEnv,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = AppConfig::from_env()?;
    config.validate()?;

    match cli.command {
        Commands::Serve { bind } => {
            let mut config = config;
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }

            let daily_send_time = config.delivery.daily_send_time.clone();
            let clock = Clock::new(config.delivery.utc_offset_hours);

            let server = DeliveryServer::new(config)?;
            println!("{}", server.info().display());

            if let Some(next) = clock.next_occurrence(&daily_send_time, clock.now()) {
                tracing::info!(next_daily_run = %next.to_rfc3339(), "daily trigger projection");
            }

            server
                .start_with_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("shutdown signal received");
                })
                .await?;
        }

        Commands::Send {
            time,
            force_all,
            only_random,
            only_specific,
            dry_run,
        } => {
            let capture = if dry_run {
                Some(Arc::new(CaptureMailer::new()))
            } else {
                require_env()?;
                None
            };

            let scheduler = build_scheduler(&config, capture.clone().map(|c| c as Arc<dyn Mailer>))?;

            let request = BatchRequest {
                target_time: time,
                force_all,
                only_random,
                only_specific,
            };

            let report = scheduler.run(&request).await?;

            println!("Delivery batch {}", report.batch_id);
            println!("  Window: {}", report.window_time);
            println!("  Total: {}", report.total);
            println!("  Sent: {}", report.sent);
            println!("  Skipped: {}", report.skipped);
            println!("  Failed: {}", report.failed);
            for error in &report.errors {
                println!("  Error: {error}");
            }

            if let Some(capture) = capture {
                println!("Dry run: {} email(s) captured", capture.count());
                for email in capture.sent() {
                    println!("  -> {} ({})", email.to, email.subject);
                }
            }
        }

        Commands::TestEmail { to, highlight } => {
            require_env()?;

            let recipient = to
                .or_else(|| config.delivery.test_recipient.clone())
                .ok_or_else(|| {
                    anyhow::anyhow!("no recipient: pass --to or set DAYBREAK_TEST_RECIPIENT")
                })?;

            let scheduler = build_scheduler(&config, None)?;

            let report = match highlight {
                Some(id) => scheduler.run_test_send(&recipient, Some(&id)).await?,
                None => scheduler.run_connectivity_test(&recipient).await?,
            };

            println!("Test email sent to {}", report.to);
            println!("  Message id: {}", report.message_id);
            if let Some(highlight_id) = report.highlight_id {
                println!("  Highlight: {highlight_id}");
            }
        }

        Commands::CheckEnv => {
            let clock = Clock::new(config.delivery.utc_offset_hours);
            println!("Delivery-zone time: {}", clock.current_time_string());

            let report = AppConfig::env_report();

            for name in &report.present {
                println!("  ok      {name}");
            }
            for name in &report.missing {
                println!("  MISSING {name}");
            }

            if report.is_valid() {
                println!("Environment is complete");
            } else {
                anyhow::bail!("{} required variable(s) missing", report.missing.len());
            }
        }
    }

    Ok(())
}

/// Refuse to touch external services while required variables are missing
fn require_env() -> Result<()> {
    let report = AppConfig::env_report();
    if !report.is_valid() {
        anyhow::bail!(
            "missing required environment variables: {}",
            report.missing.join(", ")
        );
    }
    Ok(())
}

/// Wire a scheduler against the configured store, optionally swapping in a
/// capturing mailer for dry runs
fn build_scheduler(
    config: &AppConfig,
    mailer_override: Option<Arc<dyn Mailer>>,
) -> Result<DeliveryScheduler> {
    let store_client = Arc::new(StoreClient::new(StoreConfig::from(&config.store))?);

    let mailer: Arc<dyn Mailer> = match mailer_override {
        Some(mailer) => mailer,
        None => Arc::new(ApiMailer::new(MailerConfig::from(&config.mail))?),
    };

    Ok(DeliveryScheduler::new(
        Clock::new(config.delivery.utc_offset_hours),
        Arc::new(RestUserDirectory::new(store_client.clone())),
        HighlightSelector::new(Arc::new(RestHighlightStore::new(store_client.clone()))),
        mailer,
        Arc::new(RestAttemptLog::new(store_client)),
        EmailComposer::new(config.delivery.site_url.clone()),
    )
    .with_tolerance(config.delivery.tolerance_minutes))
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("daybreak=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("daybreak=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
