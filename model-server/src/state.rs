use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::CheckpointCatalog;
use crate::config::Config;
use crate::errors::Result;
use crate::predictor::Predictor;
use crate::selector::CheckpointSelector;

/// Prediction settings fixed at startup
#[derive(Debug, Clone)]
pub struct PredictSettings {
    /// Candidates requested per prediction
    pub top_n: usize,
    /// Upper bound on one predictor call
    pub timeout: Duration,
    /// Fallback for predict requests that omit selector fields
    pub default_selector: Option<CheckpointSelector>,
}

impl Default for PredictSettings {
    fn default() -> Self {
        Self {
            top_n: 3,
            timeout: Duration::from_secs(120),
            default_selector: None,
        }
    }
}

/// Axum application state shared across all request handlers.
///
/// Everything here is immutable after construction; handlers only read it.
#[derive(Clone)]
pub struct AppState {
    /// Experiment root every selector is resolved against
    pub experiment_root: Arc<PathBuf>,
    /// Read-only view of the checkpoint hierarchy
    pub catalog: CheckpointCatalog,
    /// External inference engine
    pub predictor: Arc<dyn Predictor>,
    pub settings: Arc<PredictSettings>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        experiment_root: PathBuf,
        predictor: Arc<dyn Predictor>,
        settings: PredictSettings,
    ) -> Self {
        let experiment_root = Arc::new(experiment_root);
        Self {
            catalog: CheckpointCatalog::new(experiment_root.clone()),
            experiment_root,
            predictor,
            settings: Arc::new(settings),
        }
    }

    /// Build state from validated configuration; fails if the experiment
    /// root is unusable.
    pub fn from_config(config: &Config, predictor: Arc<dyn Predictor>) -> Result<Self> {
        let root = config.experiment_root()?;
        let settings = PredictSettings {
            top_n: config.predictor.top_n,
            timeout: config.predict_timeout(),
            default_selector: config.predictor.default_selector.clone(),
        };
        Ok(Self::new(root, predictor, settings))
    }
}
