//! Checkpoint addressing
//!
//! Checkpoints live at `<experiment root>/checkpoints/<date>/<epoch>/<step>`.
//! A [`CheckpointSelector`] is the (date, epoch, step) triple naming one of
//! them. Selectors are only checked syntactically: the predictor is the
//! authority on whether the address resolves to a loadable checkpoint.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Name of the directory under the experiment root that holds checkpoints
pub const CHECKPOINT_DIR_NAME: &str = "checkpoints";

/// The (date, epoch, step) triple identifying a checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointSelector {
    /// Training run date label (e.g. `2018_05_24`)
    pub date: String,
    /// Epoch label, a decimal integer string
    pub epoch: String,
    /// Step label within the epoch
    pub step: String,
}

impl CheckpointSelector {
    pub fn new(
        date: impl Into<String>,
        epoch: impl Into<String>,
        step: impl Into<String>,
    ) -> Self {
        Self {
            date: date.into(),
            epoch: epoch.into(),
            step: step.into(),
        }
    }

    /// Check that every segment is a single, plain path component
    pub fn validate(&self) -> Result<(), InvalidLabel> {
        validate_label("date", &self.date)?;
        validate_label("epoch", &self.epoch)?;
        validate_label("step", &self.step)?;
        Ok(())
    }

    /// Filesystem location of this checkpoint under `root`
    pub fn locate(&self, root: &Path) -> PathBuf {
        checkpoints_dir(root)
            .join(&self.date)
            .join(&self.epoch)
            .join(&self.step)
    }
}

impl fmt::Display for CheckpointSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.date, self.epoch, self.step)
    }
}

/// `<root>/checkpoints`
pub fn checkpoints_dir(root: &Path) -> PathBuf {
    root.join(CHECKPOINT_DIR_NAME)
}

/// A selector segment that cannot name a directory entry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field} label: {label:?}")]
pub struct InvalidLabel {
    pub field: &'static str,
    pub label: String,
}

/// Reject labels that are empty, relative-navigation, or contain separators.
///
/// Labels are joined onto the checkpoints directory, so anything that is
/// not exactly one normal path component could escape it.
pub fn validate_label(field: &'static str, label: &str) -> Result<(), InvalidLabel> {
    let bad = label.is_empty()
        || label == "."
        || label == ".."
        || label.contains(['/', '\\', '\0']);

    if bad {
        return Err(InvalidLabel {
            field,
            label: label.to_string(),
        });
    }
    Ok(())
}
