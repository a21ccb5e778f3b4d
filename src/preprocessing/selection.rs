use crate::domain::errors::AppError;
use crate::infrastructure::augmentation::Catalog;
use rand::distr::weighted::WeightedIndex;
use rand::{Rng, RngCore};

/// Decides which catalog entries to apply to one clip, and in what order.
pub trait SelectionPolicy {
    fn select(&self, catalog: &Catalog, rng: &mut dyn RngCore) -> Result<Vec<usize>, AppError>;
}

/// Weighted draw of how many augmentations to apply, then a uniform draw
/// of that many distinct entries without replacement.
pub struct WeightedSelection {
    counts: WeightedIndex<f64>,
}

impl WeightedSelection {
    /// `weights[n]` is the relative chance of applying `n` augmentations.
    pub fn new(weights: &[f64]) -> Result<Self, AppError> {
        let counts = WeightedIndex::new(weights.iter().copied())
            .map_err(|e| AppError::InvalidConfig(format!("count weights {weights:?}: {e}")))?;
        Ok(WeightedSelection { counts })
    }

    pub fn draw_count(&self, rng: &mut dyn RngCore) -> usize {
        rng.sample(&self.counts)
    }
}

impl SelectionPolicy for WeightedSelection {
    fn select(&self, catalog: &Catalog, rng: &mut dyn RngCore) -> Result<Vec<usize>, AppError> {
        let count = self.draw_count(rng);
        if count > catalog.len() {
            return Err(AppError::CatalogTooSmall {
                requested: count,
                available: catalog.len(),
            });
        }
        Ok(rand::seq::index::sample(rng, catalog.len(), count).into_vec())
    }
}
