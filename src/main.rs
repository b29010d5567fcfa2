use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::cli::{CommonArgs, CommonCommands, utils};
use common::config::Configuration;
use killer::SegmentKiller;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deepstore")]
#[command(about = "Remove unused segment files from deep storage")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: DeepStoreCommands,
}

#[derive(Subcommand)]
enum DeepStoreCommands {
    /// Kill the segments listed in a JSON file (array or single object)
    Kill {
        /// Path to the segments file, `-` for stdin
        segments: PathBuf,
    },
    /// Delete every file under the configured bucket and base key
    KillAll,
    #[command(flatten)]
    Common(CommonCommands),
}

fn read_segments(path: &PathBuf) -> Result<Vec<killer::Segment>> {
    let json = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read segments from stdin")?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read segments file {}", path.display()))?
    };
    killer::parse_segments(&json).context("Failed to parse segments")
}

/// The object store client behind the killer is only built once a command
/// touches storage.
fn build_killer(config: &Configuration) -> Result<SegmentKiller> {
    config
        .deep_storage
        .validate()
        .context("Invalid deep storage configuration")?;
    Ok(SegmentKiller::from_dsn(
        config.storage.dsn.clone(),
        config.deep_storage.clone(),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    utils::init_logging(&cli.common);

    let config = utils::load_config(cli.common.config.as_ref())?;

    match cli.command {
        DeepStoreCommands::Common(command) => utils::handle_common_command(&command, &config)?,
        DeepStoreCommands::Kill { segments } => {
            let killer = build_killer(&config)?;
            let segments = read_segments(&segments)?;
            log::info!("Killing {} segments", segments.len());
            killer
                .kill_segments(&segments)
                .await
                .context("Failed to kill segments")?;
            log::info!("Killed {} segments", segments.len());
        }
        DeepStoreCommands::KillAll => {
            let summary = build_killer(&config)?
                .kill_all()
                .await
                .context("Failed to delete all segment files")?;
            log::info!(
                "Deleted {} of {} listed files in {} pages",
                summary.matched,
                summary.listed,
                summary.pages
            );
        }
    }

    Ok(())
}
