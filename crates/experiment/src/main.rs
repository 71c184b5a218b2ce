use std::io::BufRead;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use erp_experiment::{generate_subjects, run_subject_with_resume, verify, ExperimentConfig, RunOutcome};

#[derive(Parser)]
#[command(name = "erp_experiment", about = "Auditory ERP experiment: trial orders, presentation and recording")]
struct Cli {
    /// YAML configuration file; defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate SUBJECT_<n>.json trial orders and their reports
    Generate {
        /// Number of participants
        participants: usize,
        /// Override the generation seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Present a subject's trial order while recording the mock source
    Run {
        subject: u32,
    },
    /// Count target and non-target trials in a subject file
    Verify {
        subject: u32,
        /// Recorded data file to tally as well
        #[arg(long)]
        data: Option<PathBuf>,
    },
}

/// Forwards each line typed on stdin as a resume request. The thread is left
/// detached since a blocking stdin read cannot be interrupted.
fn spawn_resume_reader() -> anyhow::Result<tokio::sync::mpsc::UnboundedReceiver<()>> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("erp_resume_input".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                if line.is_err() || tx.send(()).is_err() {
                    break;
                }
            }
        })
        .context("spawning the resume input thread")?;
    tracing::info!("Press Enter to resume after each break");
    Ok(rx)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "erp_experiment=info,presenter=info,recording=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = ExperimentConfig::load(cli.config.as_deref())
        .with_context(|| format!("loading configuration {:?}", cli.config))?;

    match cli.command {
        Commands::Generate { participants, seed } => {
            if let Some(seed) = seed {
                config.generation.seed = seed;
            }
            let written = generate_subjects(
                &config.generation,
                participants,
                &config.export.subject_directory,
                &config.export.report_directory,
            )?;
            for subject in written {
                println!("{}", subject.order_file.display());
            }
        }
        Commands::Run { subject } => {
            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Shutdown signal received. Stopping presentation...");
                    ctrl_c.cancel();
                }
            });

            let resume = if config.run.auto_resume {
                None
            } else {
                Some(spawn_resume_reader()?)
            };

            match run_subject_with_resume(&config, subject, cancel, resume).await? {
                RunOutcome::Finished => tracing::info!("Subject {} finished", subject),
                RunOutcome::Cancelled => tracing::info!("Subject {} stopped early", subject),
            }
        }
        Commands::Verify { subject, data } => {
            let report = verify(&config.export.subject_directory, subject, data.as_deref())?;
            print!("{}", report);
        }
    }
    Ok(())
}
