/// Planar waveform: one sample vector per channel, normalized to [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        AudioClip { channels, sample_rate }
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        AudioClip::new(vec![samples], sample_rate)
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Frames per channel.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Root-mean-square over every sample of every channel.
    pub fn rms(&self) -> f32 {
        let count: usize = self.channels.iter().map(Vec::len).sum();
        if count == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .channels
            .iter()
            .flatten()
            .map(|&s| f64::from(s) * f64::from(s))
            .sum();
        (sum / count as f64).sqrt() as f32
    }

    /// Averages all channels into a single one.
    pub fn downmix(&self) -> Vec<f32> {
        let n = self.num_channels().max(1) as f32;
        (0..self.len())
            .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() / n)
            .collect()
    }
}

/// What happened to one input pair during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedClip {
    pub base: String,
    pub applied: Vec<&'static str>,
}

impl ProcessedClip {
    /// Base name of the augmented sibling, if one was written.
    pub fn augmented_base(&self) -> Option<String> {
        augmented_base_name(&self.base, &self.applied)
    }
}

/// `<base>_<aug1>_<aug2>...`, or `None` when nothing was applied.
pub fn augmented_base_name(base: &str, applied: &[&str]) -> Option<String> {
    if applied.is_empty() {
        None
    } else {
        Some(format!("{}_{}", base, applied.join("_")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn augmented_name_keeps_selection_order() {
        assert_eq!(augmented_base_name("a", &["noise", "pitch"]).as_deref(), Some("a_noise_pitch"));
        assert_eq!(augmented_base_name("a", &["gain"]).as_deref(), Some("a_gain"));
        assert_eq!(augmented_base_name("a", &[]), None);
    }

    #[test]
    fn rms_and_downmix() {
        let clip = AudioClip::new(vec![vec![1.0, -1.0], vec![0.0, 0.0]], 48000);
        assert!((clip.rms() - 0.5f32.sqrt()).abs() < 1e-6);
        assert_eq!(clip.downmix(), vec![0.5, -0.5]);
        assert_eq!(AudioClip::mono(vec![], 48000).rms(), 0.0);
    }
}
