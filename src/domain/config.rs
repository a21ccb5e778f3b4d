use crate::domain::errors::AppError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SAMPLE_RATE: u32 = 48_000;
/// Relative weights for applying 0, 1 or 2 augmentations to a clip.
pub const COUNT_WEIGHTS: [f64; 3] = [0.3, 0.5, 0.2];
pub const PITCH_SEMITONES: (f32, f32) = (-0.5, 0.5);
pub const GAIN_DB: (f32, f32) = (-3.0, 3.0);
pub const SNR_DB: (f32, f32) = (15.0, 30.0);
pub const NOISE_DIR: &str = "audio_augmentation/noise";
pub const NOISE_EXTENSION: &str = "wav";
pub const BUCKET_URL: &str = "https://whispyr-noise-files.s3.amazonaws.com/";
pub const DOWNLOAD_CHUNK_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f32,
    pub max: f32,
}

impl From<(f32, f32)> for Bounds {
    fn from((min, max): (f32, f32)) -> Self {
        Bounds { min, max }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Always the built-in constants; a config file cannot change them.
    #[serde(skip)]
    pub augmentation: AugmentationConfig,
    pub noise: NoiseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    pub sample_rate: u32,
    pub count_weights: [f64; 3],
    pub pitch_semitones: Bounds,
    pub gain_db: Bounds,
    pub snr_db: Bounds,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        AugmentationConfig {
            sample_rate: SAMPLE_RATE,
            count_weights: COUNT_WEIGHTS,
            pitch_semitones: PITCH_SEMITONES.into(),
            gain_db: GAIN_DB.into(),
            snr_db: SNR_DB.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub local_dir: PathBuf,
    pub extension: String,
    pub bucket_url: String,
    pub chunk_size: usize,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        NoiseConfig {
            local_dir: PathBuf::from(NOISE_DIR),
            extension: NOISE_EXTENSION.to_string(),
            bucket_url: BUCKET_URL.to_string(),
            chunk_size: DOWNLOAD_CHUNK_SIZE,
        }
    }
}

impl Config {
    /// Reads the `[noise]` table from a TOML file when given one, otherwise
    /// returns the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let config = match path {
            Some(path) => {
                let config_str = fs::read_to_string(path)?;
                toml::from_str(&config_str)?
            }
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let aug = &self.augmentation;
        if aug.sample_rate == 0 {
            return Err(AppError::InvalidConfig("sample_rate must be positive".into()));
        }
        if aug.count_weights.iter().any(|w| !w.is_finite() || *w < 0.0)
            || aug.count_weights.iter().sum::<f64>() <= 0.0
        {
            return Err(AppError::InvalidConfig(format!(
                "count_weights must be non-negative and not all zero, got {:?}",
                aug.count_weights
            )));
        }
        for (name, bounds) in [
            ("pitch_semitones", aug.pitch_semitones),
            ("gain_db", aug.gain_db),
            ("snr_db", aug.snr_db),
        ] {
            if !(bounds.min <= bounds.max) {
                return Err(AppError::InvalidConfig(format!(
                    "{name}: min {} exceeds max {}",
                    bounds.min, bounds.max
                )));
            }
        }
        if self.noise.chunk_size == 0 {
            return Err(AppError::InvalidConfig("chunk_size must be positive".into()));
        }
        Ok(())
    }
}
