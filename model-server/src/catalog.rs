//! Checkpoint catalog
//!
//! Read-only reflection of the on-disk hierarchy
//! `<experiment root>/checkpoints/<date>/<epoch>/<step>` as three
//! independent lookups. Nothing is cached; every call reads the directory.
//!
//! ```text
//! checkpoints/
//! └── 2018_05_24/            list_dates()       (lexicographic)
//!     ├── 2/                 list_epochs(date)  (numeric)
//!     └── 300/
//!         └── 2018_05_24_23_11_33_S5400/
//!                            list_steps(date, epoch) (lexicographic)
//! ```

use std::cmp::Ordering;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::selector::{checkpoints_dir, validate_label, InvalidLabel};

/// Catalog lookup failures
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The checkpoints directory itself is missing or unreadable
    #[error("checkpoint storage unavailable at {path}: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A date or epoch segment does not exist on disk
    #[error("{0} not found")]
    NotFound(String),

    /// A caller-supplied label is not a plain path component
    #[error(transparent)]
    InvalidLabel(#[from] InvalidLabel),

    /// An epoch directory name that does not parse as an integer
    #[error("epoch label {label:?} under date {date:?} is not numeric")]
    NonNumericEpoch { date: String, label: String },
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Enumerates checkpoints below a fixed experiment root
#[derive(Debug, Clone)]
pub struct CheckpointCatalog {
    root: Arc<PathBuf>,
}

impl CheckpointCatalog {
    pub fn new(root: Arc<PathBuf>) -> Self {
        Self { root }
    }

    /// Training run dates, sorted lexicographically
    pub fn list_dates(&self) -> Result<Vec<String>> {
        let dir = checkpoints_dir(&self.root);
        let mut dates = read_subdirs(&dir).map_err(|source| {
            warn!(path = %dir.display(), error = %source, "Checkpoint storage unavailable");
            CatalogError::StorageUnavailable {
                path: dir.clone(),
                source,
            }
        })?;
        dates.sort();

        debug!(count = dates.len(), "Listed checkpoint dates");
        Ok(dates)
    }

    /// Epochs recorded for `date`, sorted by numeric value
    pub fn list_epochs(&self, date: &str) -> Result<Vec<String>> {
        validate_label("date", date)?;
        self.ensure_storage()?;

        let dir = checkpoints_dir(&self.root).join(date);
        let labels = read_subdirs(&dir).map_err(|e| segment_error(&dir, e, || {
            format!("date '{}'", date)
        }))?;

        let mut epochs = Vec::with_capacity(labels.len());
        for label in labels {
            match EpochNumber::parse(&label) {
                Some(value) => epochs.push((value, label)),
                None => {
                    warn!(date = %date, label = %label, "Non-numeric epoch directory");
                    return Err(CatalogError::NonNumericEpoch {
                        date: date.to_string(),
                        label,
                    });
                }
            }
        }
        // Ties ("2" vs "02") fall back to the label so the order is total.
        epochs.sort();

        debug!(date = %date, count = epochs.len(), "Listed epochs");
        Ok(epochs.into_iter().map(|(_, label)| label).collect())
    }

    /// Steps saved for `date`/`epoch`, sorted lexicographically
    pub fn list_steps(&self, date: &str, epoch: &str) -> Result<Vec<String>> {
        validate_label("date", date)?;
        validate_label("epoch", epoch)?;
        self.ensure_storage()?;

        let dir = checkpoints_dir(&self.root).join(date).join(epoch);
        let mut steps = read_subdirs(&dir).map_err(|e| segment_error(&dir, e, || {
            format!("epoch '{}' of date '{}'", epoch, date)
        }))?;
        steps.sort();

        debug!(date = %date, epoch = %epoch, count = steps.len(), "Listed steps");
        Ok(steps)
    }

    /// Distinguish "server misconfigured" from "no such date" before
    /// descending into a segment.
    fn ensure_storage(&self) -> Result<()> {
        let dir = checkpoints_dir(&self.root);
        match std::fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(CatalogError::StorageUnavailable {
                path: dir,
                source: io::Error::new(io::ErrorKind::Other, "not a directory"),
            }),
            Err(source) => Err(CatalogError::StorageUnavailable { path: dir, source }),
        }
    }
}

/// A missing segment is the caller's problem; any other read failure is
/// an operational one.
fn segment_error(dir: &Path, err: io::Error, what: impl FnOnce() -> String) -> CatalogError {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => CatalogError::NotFound(what()),
        _ => {
            warn!(path = %dir.display(), error = %err, "Failed to read checkpoint directory");
            CatalogError::StorageUnavailable {
                path: dir.to_path_buf(),
                source: err,
            }
        }
    }
}

/// Integer value of an epoch label.
///
/// Kept as digits rather than a machine integer so labels of any length
/// order by value, the way an arbitrary precision `int` would.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EpochNumber {
    negative: bool,
    /// Magnitude without leading zeros; empty for zero
    digits: String,
}

impl EpochNumber {
    /// Accepts an optional `+`/`-` sign followed by ASCII digits
    fn parse(label: &str) -> Option<Self> {
        let (negative, magnitude) = match label.as_bytes().first()? {
            b'-' => (true, &label[1..]),
            b'+' => (false, &label[1..]),
            _ => (false, label),
        };
        if magnitude.is_empty() || !magnitude.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let digits = magnitude.trim_start_matches('0').to_string();
        Some(Self {
            // -0 is 0
            negative: negative && !digits.is_empty(),
            digits,
        })
    }

    fn cmp_magnitude(&self, other: &Self) -> Ordering {
        self.digits
            .len()
            .cmp(&other.digits.len())
            .then_with(|| self.digits.cmp(&other.digits))
    }
}

impl Ord for EpochNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.cmp_magnitude(other),
            (true, true) => other.cmp_magnitude(self),
        }
    }
}

impl PartialOrd for EpochNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Names of the immediate subdirectories of `dir`. Plain files and names
/// that are not valid UTF-8 are skipped.
fn read_subdirs(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        // Follow symlinks: a linked checkpoint directory is still a checkpoint.
        let is_dir = std::fs::metadata(entry.path())
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => {
                warn!(dir = %dir.display(), name = ?raw, "Skipping non UTF-8 directory name");
            }
        }
    }
    Ok(names)
}
