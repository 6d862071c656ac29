//! Serves trained seq2seq checkpoints over HTTP.
//!
//! The [`catalog`] reflects the `checkpoints/<date>/<epoch>/<step>`
//! hierarchy under an experiment root; the [`api`] gateway validates
//! prediction requests and hands them to an external [`predictor`].

pub mod api;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod observability;
pub mod predictor;
pub mod selector;
pub mod state;

pub use catalog::{CatalogError, CheckpointCatalog};
pub use config::Config;
pub use errors::{Result, ServerError};
pub use observability::{init_production_logging, init_simple_logging};
pub use predictor::{CommandPredictor, Predictor, PredictorError, PredictorFailureKind};
pub use selector::CheckpointSelector;
pub use state::{AppState, PredictSettings};
