//! Paced cold-outreach mailer.
//!
//! - `send` works through the contact file, pausing between batches
//! - `bounces` flags contacts whose messages bounced

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use outreach::{bounces, send, startup};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "outreach")]
#[command(about = "Send paced outreach emails and track bounces", long_about = None)]
#[command(version)]
struct Cli {
    /// Dotenv file to load before reading the environment
    #[arg(short, long)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send to every contact not yet marked as sent
    Send,
    /// Mark contacts whose messages bounced
    Bounces {
        /// Directory holding the bounce notices (overrides BOUNCE_MAILDIR)
        #[arg(short, long)]
        maildir: Option<PathBuf>,

        /// How many days back to look (overrides BOUNCE_LOOKBACK_DAYS)
        #[arg(short, long)]
        lookback_days: Option<u32>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_file = match cli.command {
        Commands::Send => "send.log",
        Commands::Bounces { .. } => "bounce.log",
    };
    let (config, _guard) = startup::start(cli.env_file.as_deref(), log_file)?;

    match cli.command {
        Commands::Send => {
            let summary = send::run(&config).await.inspect_err(|err| {
                error!("Send run aborted: {err}");
            })?;

            info!(
                "Sent {}, failed {}, skipped (no MX / no email) {}, already sent {}, pauses {}{}",
                summary.sent,
                summary.failed,
                summary.precheck_failed,
                summary.skipped,
                summary.pauses,
                if summary.halted { ", nightly limit reached" } else { "" }
            );
        }
        Commands::Bounces {
            maildir,
            lookback_days,
        } => {
            let report = bounces::run(
                &config,
                bounces::Overrides {
                    maildir,
                    lookback_days,
                },
            )
            .await
            .inspect_err(|err| error!("Bounce scan aborted: {err}"))?;

            info!(
                "Scanned {} message(s), {} bounce notice(s), marked {} contact(s)",
                report.scanned,
                report.candidates,
                report.marked.len()
            );
        }
    }

    Ok(())
}
