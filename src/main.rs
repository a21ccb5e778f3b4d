use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use speech_augment::domain::config::Config;
use speech_augment::infrastructure::augmentation::{Catalog, NoisePool};
use speech_augment::preprocessing::augment_runner::{Augmenter, list_clips, output_dir_for};
use speech_augment::preprocessing::selection::WeightedSelection;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "speech-augment")]
#[command(about = "Audio augmentation for speech-synthesis fine-tuning")]
struct Args {
    /// Directory containing `<name>.wav` / `<name>.lab` pairs
    input_dir: PathBuf,

    /// Seed the random source for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Optional TOML file overriding the built-in augmentation settings
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("Failed to load config")?;
    let noise = NoisePool::discover(&config.noise.local_dir, &config.noise.extension)?;
    log::info!(
        "Found {} noise files in {}",
        noise.len(),
        config.noise.local_dir.display()
    );
    let catalog = Catalog::new(&config.augmentation, noise);
    let policy = WeightedSelection::new(&config.augmentation.count_weights)?;

    let output_dir = output_dir_for(&args.input_dir)
        .with_context(|| format!("Cannot resolve input directory {}", args.input_dir.display()))?;
    let augmenter = Augmenter::new(&catalog, &policy, config.augmentation.sample_rate, &output_dir);
    augmenter.setup_output_dir()?;

    let mut rng: Box<dyn RngCore> = match args.seed {
        Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
        None => Box::new(rand::rng()),
    };

    let clips = list_clips(&args.input_dir)?;
    let pb = ProgressBar::new(clips.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    pb.set_message("Augmenting audio files");

    let mut augmented = 0;
    for clip in &clips {
        let processed = augmenter
            .process_clip(clip, rng.as_mut())
            .with_context(|| format!("Failed to process {}", clip.display()))?;
        if !processed.applied.is_empty() {
            augmented += 1;
        }
        pb.inc(1);
    }
    pb.finish_with_message("Augmentation completed!");

    log::info!("{augmented} of {} clips received an augmented variant", clips.len());
    println!("Augmentation complete. Files saved in: {}", output_dir.display());
    Ok(())
}
