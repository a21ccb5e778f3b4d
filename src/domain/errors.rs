use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Audio processing error: {0}")]
    Audio(#[from] hound::Error),
    #[error("missing label file {} for clip {}", .label.display(), .clip.display())]
    MissingLabel { clip: PathBuf, label: PathBuf },
    #[error("{} is {found} Hz, expected {expected} Hz", .path.display())]
    SampleRateMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
    #[error("cannot select {requested} augmentations from a catalog of {available}")]
    CatalogTooSmall { requested: usize, available: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("HTTP request failed: {0}")]
    Http(#[from] Box<ureq::Error>),
    #[error("listing prefix {prefix:?} returned status {status}")]
    ListingStatus { prefix: String, status: u16 },
    #[error("malformed listing XML: {0}")]
    Xml(#[from] roxmltree::Error),
}
