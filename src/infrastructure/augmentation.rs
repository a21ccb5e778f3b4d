use crate::domain::config::{AugmentationConfig, Bounds};
use crate::domain::entities::AudioClip;
use crate::domain::errors::AppError;
use crate::infrastructure::audio::{load_wav, resample_linear};
use num_complex::Complex;
use rand::{Rng, RngCore};
use rustfft::FftPlanner;
use std::f32::consts::PI;
use std::path::{Path, PathBuf};

pub trait Augmentation {
    /// Draws this transform's parameters from `rng` and applies it to the whole clip.
    fn apply(&self, clip: &AudioClip, rng: &mut dyn RngCore) -> Result<AudioClip, AppError>;
    fn name(&self) -> &'static str;
}

/// Augmentations available for one run. Built once; never resized afterwards.
pub struct Catalog {
    entries: Vec<Box<dyn Augmentation>>,
}

impl Catalog {
    /// `pitch` and `gain` always; `noise` only when the pool has at least one file.
    pub fn new(config: &AugmentationConfig, noise: NoisePool) -> Self {
        let mut entries: Vec<Box<dyn Augmentation>> = vec![
            Box::new(PitchShift { semitones: config.pitch_semitones }),
            Box::new(Gain { db: config.gain_db }),
        ];
        if !noise.is_empty() {
            entries.push(Box::new(BackgroundNoise { pool: noise, snr_db: config.snr_db }));
        }
        Catalog { entries }
    }

    pub fn from_entries(entries: Vec<Box<dyn Augmentation>>) -> Self {
        Catalog { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|a| a.name()).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|a| a.name() == name)
    }

    pub fn get(&self, index: usize) -> Option<&dyn Augmentation> {
        self.entries.get(index).map(|a| a.as_ref())
    }

    /// Applies the entries at `selected` in order, each one feeding the next.
    pub fn apply_chain(
        &self,
        clip: &AudioClip,
        selected: &[usize],
        rng: &mut dyn RngCore,
    ) -> Result<AudioClip, AppError> {
        let mut current = clip.clone();
        for &index in selected {
            let aug = self.get(index).ok_or(AppError::CatalogTooSmall {
                requested: index + 1,
                available: self.len(),
            })?;
            current = aug.apply(&current, rng)?;
        }
        Ok(current)
    }
}

/// Noise files found under a local directory; fixed for the duration of a run.
#[derive(Debug, Clone, Default)]
pub struct NoisePool {
    paths: Vec<PathBuf>,
}

impl NoisePool {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        NoisePool { paths }
    }

    /// Recursively collects `*.<extension>` files under `dir`. A missing
    /// directory yields an empty pool.
    pub fn discover(dir: &Path, extension: &str) -> Result<Self, AppError> {
        let pattern = format!(
            "{}/**/*.{}",
            glob::Pattern::escape(&dir.to_string_lossy()),
            extension
        );
        let entries = glob::glob(&pattern)
            .map_err(|e| AppError::InvalidConfig(format!("bad noise pattern {pattern}: {e}")))?;

        let mut paths = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => paths.push(path),
                Ok(_) => {}
                Err(e) => log::warn!("Skipping unreadable noise entry: {e}"),
            }
        }
        paths.sort();
        Ok(NoisePool { paths })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn draw(bounds: Bounds, rng: &mut dyn RngCore) -> f32 {
    if bounds.min >= bounds.max {
        bounds.min
    } else {
        rng.random_range(bounds.min..=bounds.max)
    }
}

pub struct PitchShift {
    pub semitones: Bounds,
}

impl Augmentation for PitchShift {
    fn apply(&self, clip: &AudioClip, rng: &mut dyn RngCore) -> Result<AudioClip, AppError> {
        let factor = 2.0_f32.powf(draw(self.semitones, rng) / 12.0);
        let channels = clip
            .channels
            .iter()
            .map(|channel| {
                let stretched = time_stretch(channel, factor);
                resample_linear(&stretched, channel.len())
            })
            .collect();
        Ok(AudioClip::new(channels, clip.sample_rate))
    }

    fn name(&self) -> &'static str {
        "pitch"
    }
}

const WINDOW_SIZE: usize = 1024;
const HOP_SIZE: usize = WINDOW_SIZE / 4;

fn wrap_phase(phase: f32) -> f32 {
    (phase + PI).rem_euclid(2.0 * PI) - PI
}

/// Phase-vocoder time stretch: the result is about `stretch` times as long at the same pitch.
/// The effective ratio is `synth_hop / HOP_SIZE`, since the synthesis hop is whole samples.
fn time_stretch(samples: &[f32], stretch: f32) -> Vec<f32> {
    if samples.len() < WINDOW_SIZE {
        let out_len = (samples.len() as f32 * stretch).round() as usize;
        return resample_linear(samples, out_len);
    }

    // Zero padding on both sides so every input sample is covered by full overlap.
    let mut padded = vec![0.0; WINDOW_SIZE];
    padded.extend_from_slice(samples);
    padded.extend(std::iter::repeat_n(0.0, 2 * WINDOW_SIZE));

    let synth_hop = ((HOP_SIZE as f32) * stretch).round().max(1.0) as usize;
    let hop_ratio = synth_hop as f32 / HOP_SIZE as f32;
    let out_len = (samples.len() as f32 * hop_ratio).round() as usize;
    let window: Vec<f32> = (0..WINDOW_SIZE)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / WINDOW_SIZE as f32).cos()))
        .collect();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(WINDOW_SIZE);
    let ifft = planner.plan_fft_inverse(WINDOW_SIZE);

    let frames = (padded.len() - WINDOW_SIZE) / HOP_SIZE + 1;
    let total = (frames - 1) * synth_hop + WINDOW_SIZE;
    let mut output = vec![0.0f32; total];
    let mut norm = vec![0.0f32; total];

    let half = WINDOW_SIZE / 2;
    let mut prev_phase = vec![0.0f32; half + 1];
    let mut acc_phase = vec![0.0f32; half + 1];
    let mut buffer = vec![Complex::new(0.0f32, 0.0); WINDOW_SIZE];

    for m in 0..frames {
        let start = m * HOP_SIZE;
        for (i, b) in buffer.iter_mut().enumerate() {
            *b = Complex::new(padded[start + i] * window[i], 0.0);
        }
        fft.process(&mut buffer);

        for k in 0..=half {
            let (mag, phase) = buffer[k].to_polar();
            if m == 0 {
                acc_phase[k] = phase;
            } else {
                let expected = 2.0 * PI * k as f32 * HOP_SIZE as f32 / WINDOW_SIZE as f32;
                let deviation = wrap_phase(phase - prev_phase[k] - expected);
                acc_phase[k] = wrap_phase(acc_phase[k] + (expected + deviation) * hop_ratio);
            }
            prev_phase[k] = phase;
            buffer[k] = Complex::from_polar(mag, acc_phase[k]);
        }
        for k in 1..half {
            buffer[WINDOW_SIZE - k] = buffer[k].conj();
        }
        ifft.process(&mut buffer);

        let out_start = m * synth_hop;
        for (i, c) in buffer.iter().enumerate() {
            output[out_start + i] += c.re / WINDOW_SIZE as f32 * window[i];
            norm[out_start + i] += window[i] * window[i];
        }
    }

    for (o, n) in output.iter_mut().zip(&norm) {
        if *n > 1e-3 {
            *o /= *n;
        }
    }

    // The leading pad is exactly four analysis hops, so it maps to four synthesis hops.
    let offset = (WINDOW_SIZE / HOP_SIZE) * synth_hop;
    let mut stretched: Vec<f32> = output.into_iter().skip(offset).take(out_len).collect();
    stretched.resize(out_len, 0.0);
    stretched
}

pub struct Gain {
    pub db: Bounds,
}

impl Augmentation for Gain {
    fn apply(&self, clip: &AudioClip, rng: &mut dyn RngCore) -> Result<AudioClip, AppError> {
        let factor = 10.0_f32.powf(draw(self.db, rng) / 20.0);
        let channels = clip
            .channels
            .iter()
            .map(|c| c.iter().map(|&s| s * factor).collect())
            .collect();
        Ok(AudioClip::new(channels, clip.sample_rate))
    }

    fn name(&self) -> &'static str {
        "gain"
    }
}

pub struct BackgroundNoise {
    pub pool: NoisePool,
    pub snr_db: Bounds,
}

impl BackgroundNoise {
    fn load_noise(
        &self,
        target_rate: u32,
        target_len: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<f32>, AppError> {
        let path = &self.pool.paths()[rng.random_range(0..self.pool.len())];
        let noise = load_wav(path)?;
        let mut mono = noise.downmix();
        if noise.sample_rate != target_rate && noise.sample_rate > 0 {
            let len = (mono.len() as u64 * u64::from(target_rate)
                / u64::from(noise.sample_rate)) as usize;
            mono = resample_linear(&mono, len);
        }
        Ok(fit_length(&mono, target_len, rng))
    }
}

/// Crops from a random offset when too long, tiles when too short.
fn fit_length(noise: &[f32], target_len: usize, rng: &mut dyn RngCore) -> Vec<f32> {
    if noise.is_empty() {
        return vec![0.0; target_len];
    }
    if noise.len() >= target_len {
        let offset = rng.random_range(0..=noise.len() - target_len);
        return noise[offset..offset + target_len].to_vec();
    }
    noise.iter().copied().cycle().take(target_len).collect()
}

impl Augmentation for BackgroundNoise {
    fn apply(&self, clip: &AudioClip, rng: &mut dyn RngCore) -> Result<AudioClip, AppError> {
        if self.pool.is_empty() {
            return Ok(clip.clone());
        }
        let noise = self.load_noise(clip.sample_rate, clip.len(), rng)?;
        let snr = draw(self.snr_db, rng);

        let signal_rms = clip.rms();
        let noise_rms = AudioClip::mono(noise.clone(), clip.sample_rate).rms();
        if signal_rms == 0.0 || noise_rms == 0.0 {
            return Ok(clip.clone());
        }
        let scale = signal_rms / (noise_rms * 10.0_f32.powf(snr / 20.0));

        let channels = clip
            .channels
            .iter()
            .map(|c| c.iter().zip(&noise).map(|(&s, &n)| s + n * scale).collect())
            .collect();
        Ok(AudioClip::new(channels, clip.sample_rate))
    }

    fn name(&self) -> &'static str {
        "noise"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::audio::save_wav;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::tempdir;

    fn sine(freq: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    fn zero_crossings(samples: &[f32]) -> usize {
        samples.windows(2).filter(|w| (w[0] < 0.0) != (w[1] < 0.0)).count()
    }

    #[test]
    fn catalog_includes_noise_only_with_files() {
        let config = AugmentationConfig::default();
        let catalog = Catalog::new(&config, NoisePool::default());
        assert_eq!(catalog.names(), vec!["pitch", "gain"]);

        let catalog = Catalog::new(&config, NoisePool::new(vec![PathBuf::from("n.wav")]));
        assert_eq!(catalog.names(), vec!["pitch", "gain", "noise"]);
        assert_eq!(catalog.position("noise"), Some(2));
    }

    #[test]
    fn discover_walks_subdirectories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("rain").join("heavy");
        std::fs::create_dir_all(&nested).unwrap();
        let clip = AudioClip::mono(vec![0.1; 16], 48_000);
        save_wav(&dir.path().join("wind.wav"), &clip).unwrap();
        save_wav(&nested.join("storm.wav"), &clip).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not audio").unwrap();

        let pool = NoisePool::discover(dir.path(), "wav").unwrap();
        assert_eq!(pool.len(), 2);
        assert!(pool.paths().iter().all(|p| p.extension().unwrap() == "wav"));

        let missing = NoisePool::discover(&dir.path().join("absent"), "wav").unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn gain_scales_by_decibels() {
        let gain = Gain { db: Bounds { min: 6.0, max: 6.0 } };
        let clip = AudioClip::mono(vec![0.1, -0.2], 48_000);
        let mut rng = StdRng::seed_from_u64(1);
        let out = gain.apply(&clip, &mut rng).unwrap();
        let factor = 10.0_f32.powf(6.0 / 20.0);
        assert!((out.channels[0][0] - 0.1 * factor).abs() < 1e-6);
        assert!((out.channels[0][1] + 0.2 * factor).abs() < 1e-6);
    }

    #[test]
    fn unit_stretch_reconstructs_signal() {
        let input = sine(440.0, 48_000, 24_000);
        let out = time_stretch(&input, 1.0);
        assert_eq!(out.len(), input.len());
        let max_err = input[2048..22_000]
            .iter()
            .zip(&out[2048..22_000])
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err < 1e-2, "max error {max_err}");
    }

    #[test]
    fn pitch_shift_keeps_shape_and_moves_frequency() {
        let rate = 48_000;
        let input = sine(440.0, rate, 24_000);
        let clip = AudioClip::new(vec![input.clone(), input.clone()], rate);
        let octave_up = PitchShift { semitones: Bounds { min: 12.0, max: 12.0 } };
        let mut rng = StdRng::seed_from_u64(7);
        let out = octave_up.apply(&clip, &mut rng).unwrap();

        assert_eq!(out.num_channels(), 2);
        assert_eq!(out.len(), clip.len());
        let before = zero_crossings(&input[4096..20_000]) as f32;
        let after = zero_crossings(&out.channels[0][4096..20_000]) as f32;
        let ratio = after / before;
        assert!((1.7..2.3).contains(&ratio), "crossing ratio {ratio}");
    }

    #[test]
    fn noise_is_mixed_at_requested_snr() {
        let dir = tempdir().unwrap();
        let noise_path = dir.path().join("hiss.wav");
        let noise: Vec<f32> = (0..1000).map(|i| if i % 2 == 0 { 0.3 } else { -0.3 }).collect();
        save_wav(&noise_path, &AudioClip::mono(noise, 48_000)).unwrap();

        let aug = BackgroundNoise {
            pool: NoisePool::new(vec![noise_path]),
            snr_db: Bounds { min: 20.0, max: 20.0 },
        };
        let clip = AudioClip::mono(sine(200.0, 48_000, 4800), 48_000);
        let mut rng = StdRng::seed_from_u64(3);
        let out = aug.apply(&clip, &mut rng).unwrap();
        assert_eq!(out.len(), clip.len());

        let residual: Vec<f32> = out.channels[0]
            .iter()
            .zip(&clip.channels[0])
            .map(|(o, s)| o - s)
            .collect();
        let noise_rms = AudioClip::mono(residual, 48_000).rms();
        let snr = 20.0 * (clip.rms() / noise_rms).log10();
        assert!((snr - 20.0).abs() < 0.1, "snr {snr}");
    }

    #[test]
    fn silent_clip_is_left_unchanged_by_noise() {
        let dir = tempdir().unwrap();
        let noise_path = dir.path().join("hiss.wav");
        save_wav(&noise_path, &AudioClip::mono(vec![0.5, -0.5, 0.5], 48_000)).unwrap();
        let aug = BackgroundNoise {
            pool: NoisePool::new(vec![noise_path]),
            snr_db: Bounds { min: 15.0, max: 30.0 },
        };
        let clip = AudioClip::mono(vec![0.0; 10], 48_000);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(aug.apply(&clip, &mut rng).unwrap(), clip);
    }

    #[test]
    fn fit_length_tiles_and_crops() {
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(fit_length(&[1.0, 2.0], 5, &mut rng), vec![1.0, 2.0, 1.0, 2.0, 1.0]);
        let cropped = fit_length(&[1.0, 2.0, 3.0, 4.0], 2, &mut rng);
        assert_eq!(cropped.len(), 2);
        assert_eq!(cropped[1] - cropped[0], 1.0);
    }

    #[test]
    fn chain_applies_in_order() {
        struct Offset(f32);

        impl Augmentation for Offset {
            fn apply(
                &self,
                clip: &AudioClip,
                _rng: &mut dyn RngCore,
            ) -> Result<AudioClip, AppError> {
                let channels = clip
                    .channels
                    .iter()
                    .map(|c| c.iter().map(|&s| s + self.0).collect())
                    .collect();
                Ok(AudioClip::new(channels, clip.sample_rate))
            }

            fn name(&self) -> &'static str {
                "offset"
            }
        }

        let entries: Vec<Box<dyn Augmentation>> = vec![
            Box::new(Gain { db: Bounds { min: 20.0, max: 20.0 } }),
            Box::new(Offset(1.0)),
        ];
        let catalog = Catalog::from_entries(entries);
        let clip = AudioClip::mono(vec![1.0], 48_000);
        let mut rng = StdRng::seed_from_u64(9);

        let gain_then_offset = catalog.apply_chain(&clip, &[0, 1], &mut rng).unwrap();
        assert!((gain_then_offset.channels[0][0] - 11.0).abs() < 1e-4);
        let offset_then_gain = catalog.apply_chain(&clip, &[1, 0], &mut rng).unwrap();
        assert!((offset_then_gain.channels[0][0] - 20.0).abs() < 1e-4);
        assert!(catalog.apply_chain(&clip, &[5], &mut rng).is_err());
    }

    #[test]
    fn stretch_length_follows_rounded_hop() {
        let input = sine(440.0, 48_000, 24_000);
        let factor = 2.0_f32.powf(0.5 / 12.0);
        // 256 * 1.0293 rounds to a 264-sample synthesis hop.
        assert_eq!(time_stretch(&input, factor).len(), 24_000 * 264 / 256);
    }
}
