use std::path::PathBuf;

use anyhow::ensure;
use clap::Parser;
use scratch_archiver_rs::parse_target;
use scratch_archiver_rs::Downloader;
use tracing_subscriber::EnvFilter;

/// Archives Scratch projects, users and studios
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// URL of a user, project or studio on scratch.mit.edu, or a project id
    url: String,

    /// Base directory to download into
    #[arg(short, long, default_value = ".")]
    path: PathBuf,

    /// Only download project metadata and thumbnails
    #[arg(long)]
    metadata_only: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    ensure!(
        args.path.is_dir(),
        "Destination directory must exist: {}",
        args.path.to_string_lossy()
    );

    let target = parse_target(&args.url)?;

    let downloader = Downloader::builder()
        .dest(args.path)
        .metadata_only(args.metadata_only)
        .build();
    downloader.download(&target)?;
    Ok(())
}
