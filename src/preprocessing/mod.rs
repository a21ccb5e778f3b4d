pub mod augment_runner;
pub mod noise_sync;
pub mod selection;
