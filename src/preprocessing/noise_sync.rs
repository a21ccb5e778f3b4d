use crate::domain::errors::AppError;
use crate::infrastructure::bucket::{Fetched, ObjectStore, parse_listing};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

/// Every downloadable key in the store, depth-first in listing order.
pub fn list_remote_files(store: &dyn ObjectStore) -> Result<Vec<String>, AppError> {
    let mut files = Vec::new();
    fetch_keys(store, "", &mut files)?;
    Ok(files)
}

fn fetch_keys(
    store: &dyn ObjectStore,
    prefix: &str,
    files: &mut Vec<String>,
) -> Result<(), AppError> {
    let mut marker: Option<String> = None;
    loop {
        let page = parse_listing(&store.list(prefix, marker.as_deref())?)?;
        log::debug!(
            "prefix {prefix:?}: {} keys, {} sub-prefixes",
            page.keys.len(),
            page.prefixes.len()
        );
        files.extend(page.keys);

        for sub_prefix in page.prefixes {
            // Only strictly deeper prefixes, so a misbehaving server cannot loop us.
            if sub_prefix.len() > prefix.len() && sub_prefix.starts_with(prefix) {
                fetch_keys(store, &sub_prefix, files)?;
            } else {
                log::warn!("Ignoring prefix {sub_prefix:?} returned under {prefix:?}");
            }
        }

        match page.next_marker {
            Some(next) if marker.as_deref() != Some(next.as_str()) => marker = Some(next),
            _ => return Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Already present locally; nothing fetched.
    Skipped,
    Saved { bytes: u64 },
    Failed { status: u16 },
    /// Key would resolve outside the local mirror.
    Unsafe,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub outcomes: Vec<(String, DownloadOutcome)>,
}

impl SyncReport {
    fn count(&self, pred: impl Fn(&DownloadOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }

    pub fn saved(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Saved { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Failed { .. } | DownloadOutcome::Unsafe))
    }
}

/// Maps `a/b/c.wav` onto `local_dir/a/b/c.wav`; `None` for keys that would escape it.
pub fn local_path_for(local_dir: &Path, key: &str) -> Option<PathBuf> {
    let relative = Path::new(key);
    if relative.components().next().is_none()
        || !relative.components().all(|c| matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(local_dir.join(relative))
}

/// Downloads every key that is not already on disk, creating its parent
/// directories before the request. Non-200 responses are recorded and
/// skipped; transport and filesystem errors abort the batch.
pub fn download_files(
    store: &dyn ObjectStore,
    keys: &[String],
    local_dir: &Path,
    chunk_size: usize,
) -> Result<SyncReport, AppError> {
    let mut report = SyncReport::default();
    for key in keys {
        let outcome = download_one(store, key, local_dir, chunk_size)?;
        match &outcome {
            DownloadOutcome::Skipped => log::info!("{key} already exists, skipping."),
            DownloadOutcome::Saved { bytes } => log::info!("Saved {key} ({bytes} bytes)"),
            DownloadOutcome::Failed { status } => log::warn!("Failed to download {key}: {status}"),
            DownloadOutcome::Unsafe => {
                log::warn!("Refusing to write {key} outside {}", local_dir.display())
            }
        }
        report.outcomes.push((key.clone(), outcome));
    }
    Ok(report)
}

fn download_one(
    store: &dyn ObjectStore,
    key: &str,
    local_dir: &Path,
    chunk_size: usize,
) -> Result<DownloadOutcome, AppError> {
    let Some(local_file) = local_path_for(local_dir, key) else {
        return Ok(DownloadOutcome::Unsafe);
    };
    if local_file.exists() {
        return Ok(DownloadOutcome::Skipped);
    }

    if let Some(parent) = local_file.parent() {
        fs::create_dir_all(parent)?;
    }

    log::info!("Downloading {key}...");
    let mut body = match store.fetch(key)? {
        Fetched::Body(body) => body,
        Fetched::Status(status) => return Ok(DownloadOutcome::Failed { status }),
    };

    let mut partial_name = local_file.file_name().unwrap_or_default().to_os_string();
    partial_name.push(".part");
    let partial = local_file.with_file_name(partial_name);

    let mut file = File::create(&partial)?;
    let mut chunk = vec![0u8; chunk_size.max(1)];
    let mut bytes = 0u64;
    loop {
        let n = body.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        file.write_all(&chunk[..n])?;
        bytes += n as u64;
    }
    file.sync_all()?;
    drop(file);
    fs::rename(&partial, &local_file)?;

    Ok(DownloadOutcome::Saved { bytes })
}
