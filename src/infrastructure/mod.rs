pub mod audio;
pub mod augmentation;
pub mod bucket;
