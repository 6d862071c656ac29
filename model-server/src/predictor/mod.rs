//! External predictor boundary
//!
//! The inference engine (weight loading, decoding, beam search) lives
//! outside this crate. The gateway only sees [`Predictor::predict`], which
//! returns up to `n` candidate token sequences, best first.
//!
//! Failures carry a [`PredictorFailureKind`] so the gateway can log what
//! actually went wrong while still answering the client generically.

pub mod command;

pub use command::CommandPredictor;

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::selector::CheckpointSelector;

/// One prediction call
#[derive(Debug, Clone)]
pub struct PredictRequest {
    /// Experiment root the selector is resolved against
    pub experiment_root: PathBuf,
    /// Checkpoint to predict with
    pub selector: CheckpointSelector,
    /// Decoded input sequence
    pub input: Vec<u8>,
    /// Maximum number of candidates to return
    pub n: usize,
}

impl PredictRequest {
    /// `<root>/checkpoints/<date>/<epoch>/<step>`
    pub fn locator(&self) -> PathBuf {
        self.selector.locate(&self.experiment_root)
    }
}

/// Candidate output sequences, best first; each is a sequence of tokens
pub type Candidates = Vec<Vec<String>>;

/// Where inside the predictor call a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorFailureKind {
    /// The predictor could not be started
    Spawn,
    /// The predictor ran and reported failure (bad checkpoint, model error)
    Exited,
    /// The predictor answered with something that is not a candidate list
    MalformedOutput,
    /// Pipe or other I/O failure while talking to the predictor
    Io,
    /// The predictor did not answer in time
    Timeout,
}

impl fmt::Display for PredictorFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PredictorFailureKind::Spawn => "spawn",
            PredictorFailureKind::Exited => "exited",
            PredictorFailureKind::MalformedOutput => "malformed_output",
            PredictorFailureKind::Io => "io",
            PredictorFailureKind::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// A failed prediction, tagged with its kind
#[derive(Error, Debug)]
#[error("predictor failure ({kind}): {message}")]
pub struct PredictorError {
    pub kind: PredictorFailureKind,
    pub message: String,
}

impl PredictorError {
    pub fn new(kind: PredictorFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == PredictorFailureKind::Timeout
    }
}

/// Runs inference against a checkpoint
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Predict up to `request.n` candidate sequences for `request.input`
    async fn predict(&self, request: PredictRequest) -> Result<Candidates, PredictorError>;
}
