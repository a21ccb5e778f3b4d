use anyhow::{Context, Result};
use clap::Parser;
use speech_augment::domain::config::Config;
use speech_augment::infrastructure::bucket::HttpBucket;
use speech_augment::preprocessing::noise_sync::{download_files, list_remote_files};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "download-noise")]
#[command(about = "Mirror the background-noise bucket into the local noise directory")]
struct Args {
    /// Optional TOML file overriding the bucket URL or local directory
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("Failed to load config")?;
    let noise = &config.noise;

    let bucket = HttpBucket::new(&noise.bucket_url);
    println!("Listing all files in the bucket...");
    let files = list_remote_files(&bucket)
        .with_context(|| format!("Failed to list {}", noise.bucket_url))?;
    println!("Found {} files.", files.len());

    let report = download_files(&bucket, &files, &noise.local_dir, noise.chunk_size)?;
    println!(
        "Download completed. {} saved, {} already present, {} failed.",
        report.saved(),
        report.skipped(),
        report.failed()
    );
    Ok(())
}
