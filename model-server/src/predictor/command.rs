//! Predictor backed by an external program
//!
//! Each call spawns the configured program as
//!
//! ```text
//! <program> <args..> --expt-dir <root> --checkpoint <locator> \
//!     --date <date> --epoch <epoch> --step <step> --n <n>
//! ```
//!
//! writes the decoded input to its stdin and reads a JSON array of token
//! arrays (`[["a","b"],["c"]]`) from its stdout. The child is killed if the
//! call is dropped, so an outer timeout never leaves a stray process.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{Candidates, PredictRequest, Predictor, PredictorError, PredictorFailureKind};

/// Longest stderr excerpt carried into an error message
const STDERR_EXCERPT: usize = 512;

/// Runs one predictor process per request
#[derive(Debug, Clone)]
pub struct CommandPredictor {
    program: String,
    args: Vec<String>,
}

impl CommandPredictor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn command(&self, request: &PredictRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--expt-dir")
            .arg(&request.experiment_root)
            .arg("--checkpoint")
            .arg(request.locator())
            .arg("--date")
            .arg(&request.selector.date)
            .arg("--epoch")
            .arg(&request.selector.epoch)
            .arg("--step")
            .arg(&request.selector.step)
            .arg("--n")
            .arg(request.n.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Predictor for CommandPredictor {
    async fn predict(&self, request: PredictRequest) -> Result<Candidates, PredictorError> {
        debug!(
            program = %self.program,
            selector = %request.selector,
            input_len = request.input.len(),
            "Spawning predictor"
        );

        let mut child = self.command(&request).spawn().map_err(|e| {
            PredictorError::new(
                PredictorFailureKind::Spawn,
                format!("failed to start '{}': {}", self.program, e),
            )
        })?;

        // Feed stdin concurrently with draining stdout so neither pipe can
        // fill up and stall the child.
        let stdin = child.stdin.take();
        let input = request.input;
        let writer = tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&input).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        });

        let output = child.wait_with_output().await.map_err(|e| {
            PredictorError::new(PredictorFailureKind::Io, format!("waiting for predictor: {}", e))
        })?;

        match writer.await {
            Ok(Ok(())) => {}
            // The child may legitimately exit without reading all of stdin.
            Ok(Err(e)) => debug!(error = %e, "Predictor closed stdin early"),
            Err(e) => warn!(error = %e, "Predictor stdin writer panicked"),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT).collect();
            return Err(PredictorError::new(
                PredictorFailureKind::Exited,
                format!("predictor exited with {}: {}", output.status, excerpt),
            ));
        }

        let mut candidates: Candidates = serde_json::from_slice(&output.stdout).map_err(|e| {
            PredictorError::new(
                PredictorFailureKind::MalformedOutput,
                format!("expected a JSON array of token arrays: {}", e),
            )
        })?;
        candidates.truncate(request.n);

        Ok(candidates)
    }
}
