use crate::domain::entities::{ProcessedClip, augmented_base_name};
use crate::domain::errors::AppError;
use crate::infrastructure::audio::{load_wav, save_wav};
use crate::infrastructure::augmentation::Catalog;
use crate::preprocessing::selection::SelectionPolicy;
use rand::RngCore;
use std::fs;
use std::path::{Path, PathBuf};

const OUTPUT_DIR_NAME: &str = "augmented";

/// `augmented` directory next to the (resolved) input directory.
pub fn output_dir_for(input_dir: &Path) -> Result<PathBuf, AppError> {
    let resolved = fs::canonicalize(input_dir)?;
    let parent = resolved.parent().unwrap_or(&resolved);
    Ok(parent.join(OUTPUT_DIR_NAME))
}

/// Flat listing of `*.wav` files, sorted so seeded runs are reproducible.
pub fn list_clips(input_dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut clips = Vec::new();
    for entry in fs::read_dir(input_dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "wav") {
            clips.push(path);
        }
    }
    clips.sort();
    Ok(clips)
}

pub struct Augmenter<'a> {
    catalog: &'a Catalog,
    policy: &'a dyn SelectionPolicy,
    sample_rate: u32,
    output_dir: PathBuf,
}

impl<'a> Augmenter<'a> {
    pub fn new(
        catalog: &'a Catalog,
        policy: &'a dyn SelectionPolicy,
        sample_rate: u32,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Augmenter {
            catalog,
            policy,
            sample_rate,
            output_dir: output_dir.into(),
        }
    }

    pub fn setup_output_dir(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    pub fn process_directory(
        &self,
        input_dir: &Path,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<ProcessedClip>, AppError> {
        self.setup_output_dir()?;
        let mut processed = Vec::new();
        for clip in list_clips(input_dir)? {
            processed.push(self.process_clip(&clip, rng)?);
        }
        Ok(processed)
    }

    /// Copies one pair unmodified, then writes at most one augmented sibling.
    pub fn process_clip(
        &self,
        clip_path: &Path,
        rng: &mut dyn RngCore,
    ) -> Result<ProcessedClip, AppError> {
        let base = clip_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                AppError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("Invalid filename: {}", clip_path.display()),
                ))
            })?
            .to_string();

        let label_path = clip_path.with_extension("lab");
        if !label_path.is_file() {
            return Err(AppError::MissingLabel {
                clip: clip_path.to_path_buf(),
                label: label_path,
            });
        }
        let label = fs::read(&label_path)?;

        let audio = load_wav(clip_path)?;
        if audio.sample_rate != self.sample_rate {
            return Err(AppError::SampleRateMismatch {
                path: clip_path.to_path_buf(),
                found: audio.sample_rate,
                expected: self.sample_rate,
            });
        }

        fs::copy(clip_path, self.output_dir.join(format!("{base}.wav")))?;
        fs::write(self.output_dir.join(format!("{base}.lab")), &label)?;

        let selected = self.policy.select(self.catalog, rng)?;
        let applied: Vec<&'static str> = selected
            .iter()
            .filter_map(|&i| self.catalog.get(i).map(|a| a.name()))
            .collect();

        if let Some(aug_base) = augmented_base_name(&base, &applied) {
            log::info!("{base}: {}", applied.join("_"));
            let augmented = self.catalog.apply_chain(&audio, &selected, rng)?;
            save_wav(&self.output_dir.join(format!("{aug_base}.wav")), &augmented)?;
            fs::write(self.output_dir.join(format!("{aug_base}.lab")), &label)?;
        } else {
            log::debug!("{base}: no augmentation");
        }

        Ok(ProcessedClip { base, applied })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn output_dir_is_sibling_of_input() {
        let root = tempdir().unwrap();
        let input = root.path().join("data").join("chunks");
        fs::create_dir_all(&input).unwrap();
        let out = output_dir_for(&input).unwrap();
        assert_eq!(out, fs::canonicalize(root.path().join("data")).unwrap().join("augmented"));
    }

    #[test]
    fn listing_is_flat_and_filtered() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.wav"), b"").unwrap();
        fs::write(dir.path().join("a.wav"), b"").unwrap();
        fs::write(dir.path().join("a.lab"), b"").unwrap();
        fs::write(dir.path().join("c.WAV.txt"), b"").unwrap();
        fs::create_dir(dir.path().join("nested.wav")).unwrap();

        let names: Vec<_> = list_clips(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.wav", "b.wav"]);
    }
}
