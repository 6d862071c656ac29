use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{debug, info, instrument, warn};

use crate::api::args::RequestArgs;
use crate::api::error::{ApiError, ApiResult};
use crate::api::types::{
    DatesResponse, EpochsQuery, EpochsResponse, PredictData, PredictQuery, PredictResponse,
    StepsQuery, StepsResponse,
};
use crate::catalog::CheckpointCatalog;
use crate::predictor::{Candidates, PredictRequest};
use crate::selector::CheckpointSelector;
use crate::state::AppState;

/// Longest prefix of the encoded input written to logs
const INPUT_PREVIEW_CHARS: usize = 64;

/// Health check endpoint
#[instrument]
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "healthy")
}

/// Index page listing available training runs
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> ApiResult<Html<String>> {
    let dates = run_catalog(&state, |catalog| catalog.list_dates()).await?;

    let items: String = dates
        .iter()
        .map(|date| format!("      <li>{}</li>\n", escape_html(date)))
        .collect();

    Ok(Html(format!(
        "<!DOCTYPE html>\n<html>\n  <head><title>Model checkpoints</title></head>\n  <body>\n    <h1>Training runs</h1>\n    <ul>\n{}    </ul>\n  </body>\n</html>\n",
        items
    )))
}

/// List training run dates
///
/// GET|POST /_get_dates
/// Response: { dates: [..] } sorted ascending
#[instrument(skip(state))]
pub async fn get_dates(State(state): State<AppState>) -> ApiResult<Json<DatesResponse>> {
    let dates = run_catalog(&state, |catalog| catalog.list_dates()).await?;
    Ok(Json(DatesResponse { dates }))
}

/// List epochs of a training run
///
/// GET|POST /_get_epochs
/// Request: { date }
/// Response: { epoches: [..] } sorted by numeric value
#[instrument(skip(state))]
pub async fn get_epochs(
    State(state): State<AppState>,
    RequestArgs(query): RequestArgs<EpochsQuery>,
) -> ApiResult<Json<EpochsResponse>> {
    let date = required("date", query.date)?;
    let epoches = run_catalog(&state, move |catalog| catalog.list_epochs(&date)).await?;
    Ok(Json(EpochsResponse { epoches }))
}

/// List steps saved within an epoch
///
/// GET|POST /_get_steps
/// Request: { date, epoch }
/// Response: { steps: [..] } sorted lexicographically
#[instrument(skip(state))]
pub async fn get_steps(
    State(state): State<AppState>,
    RequestArgs(query): RequestArgs<StepsQuery>,
) -> ApiResult<Json<StepsResponse>> {
    let date = required("date", query.date)?;
    let epoch = required("epoch", query.epoch)?;
    let steps = run_catalog(&state, move |catalog| catalog.list_steps(&date, &epoch)).await?;
    Ok(Json(StepsResponse { steps }))
}

/// Predict the top-N output sequences for an input
///
/// GET|POST /_predict
/// Request: { seq_str (base64), date?, epoch?, step? }
/// Response: { data: { results: [..] } }
#[instrument(skip(state, query))]
pub async fn predict(
    State(state): State<AppState>,
    RequestArgs(query): RequestArgs<PredictQuery>,
) -> ApiResult<Json<PredictResponse>> {
    handle_predict(&state, query).await.map(Json)
}

/// Validate, decode, dispatch to the predictor and format the candidates.
///
/// Predictor failures other than a timeout are reported to the client as
/// one generic `BadRequest`; the tagged cause only goes to the log.
pub async fn handle_predict(state: &AppState, query: PredictQuery) -> ApiResult<PredictResponse> {
    let Some(encoded) = query.seq_str else {
        warn!("Predict request without input");
        return Err(ApiError::BadRequest("missing input".to_string()));
    };
    let preview = input_preview(&encoded);

    // MIME-wrapped input carries line breaks; anything else outside the
    // alphabet is still rejected.
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let input = STANDARD.decode(&compact).map_err(|e| {
        warn!(input = %preview, error = %e, "Input is not valid base64");
        ApiError::BadRequest("invalid encoding: expected Base64 encoded data".to_string())
    })?;

    let selector = resolve_selector(state, query.date, query.epoch, query.step)?;

    info!(
        selector = %selector,
        input = %preview,
        input_len = input.len(),
        "Received prediction request"
    );

    let request = PredictRequest {
        experiment_root: (*state.experiment_root).clone(),
        selector: selector.clone(),
        input,
        n: state.settings.top_n,
    };

    let candidates = match tokio::time::timeout(
        state.settings.timeout,
        state.predictor.predict(request),
    )
    .await
    {
        Ok(Ok(candidates)) => candidates,
        Ok(Err(e)) if e.is_timeout() => {
            warn!(selector = %selector, input = %preview, error = %e, "Predictor timed out");
            return Err(ApiError::ServiceUnavailable(e.to_string()));
        }
        Ok(Err(e)) => {
            warn!(
                selector = %selector,
                input = %preview,
                kind = %e.kind,
                error = %e.message,
                "Prediction failed"
            );
            return Err(ApiError::BadRequest("invalid input".to_string()));
        }
        Err(_) => {
            warn!(
                selector = %selector,
                input = %preview,
                timeout_secs = state.settings.timeout.as_secs_f64(),
                "Predictor timed out"
            );
            return Err(ApiError::ServiceUnavailable(format!(
                "predictor did not answer within {:?}",
                state.settings.timeout
            )));
        }
    };

    debug!(selector = %selector, count = candidates.len(), "Prediction complete");

    Ok(PredictResponse {
        data: PredictData {
            results: format_candidates(candidates),
        },
    })
}

/// Fill omitted selector fields from the configured default, or reject.
fn resolve_selector(
    state: &AppState,
    date: Option<String>,
    epoch: Option<String>,
    step: Option<String>,
) -> ApiResult<CheckpointSelector> {
    let fallback = state.settings.default_selector.as_ref();
    let missing = |field: &str| ApiError::BadRequest(format!("missing {}", field));

    let date = date
        .or_else(|| fallback.map(|s| s.date.clone()))
        .ok_or_else(|| missing("date"))?;
    let epoch = epoch
        .or_else(|| fallback.map(|s| s.epoch.clone()))
        .ok_or_else(|| missing("epoch"))?;
    let step = step
        .or_else(|| fallback.map(|s| s.step.clone()))
        .ok_or_else(|| missing("step"))?;

    let selector = CheckpointSelector { date, epoch, step };
    selector.validate()?;
    Ok(selector)
}

/// Join each candidate's tokens with a single space
pub fn format_candidates(candidates: Candidates) -> Vec<String> {
    candidates
        .into_iter()
        .map(|tokens| tokens.join(" ").trim().to_string())
        .collect()
}

/// Run a catalog lookup on the blocking pool
async fn run_catalog<T, F>(state: &AppState, lookup: F) -> ApiResult<T>
where
    F: FnOnce(&CheckpointCatalog) -> crate::catalog::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let catalog = state.catalog.clone();
    let result = tokio::task::spawn_blocking(move || lookup(&catalog))
        .await
        .map_err(|e| ApiError::Internal(format!("Task join error: {}", e)))?;
    Ok(result?)
}

fn required(field: &str, value: Option<String>) -> ApiResult<String> {
    value.ok_or_else(|| ApiError::BadRequest(format!("missing {}", field)))
}

fn input_preview(encoded: &str) -> String {
    let mut chars = encoded.chars();
    let mut preview: String = chars.by_ref().take(INPUT_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        preview.push_str("...");
    }
    preview
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::{Predictor, PredictorError, PredictorFailureKind};
    use crate::state::PredictSettings;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Records calls and answers with a fixed outcome
    struct StubPredictor {
        outcome: Result<Candidates, PredictorFailureKind>,
        delay: Duration,
        calls: AtomicUsize,
        last: Mutex<Option<PredictRequest>>,
    }

    impl StubPredictor {
        fn ok(candidates: Candidates) -> Arc<Self> {
            Arc::new(Self {
                outcome: Ok(candidates),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            })
        }

        fn failing(kind: PredictorFailureKind) -> Arc<Self> {
            Arc::new(Self {
                outcome: Err(kind),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                outcome: Ok(vec![]),
                delay,
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Predictor for StubPredictor {
        async fn predict(&self, request: PredictRequest) -> Result<Candidates, PredictorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(request);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.outcome {
                Ok(candidates) => Ok(candidates.clone()),
                Err(kind) => Err(PredictorError::new(*kind, "stub failure")),
            }
        }
    }

    fn state_with(predictor: Arc<StubPredictor>, settings: PredictSettings) -> (TempDir, AppState) {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("checkpoints/2018_05_24/300")).unwrap();
        let state = AppState::new(temp.path().to_path_buf(), predictor, settings);
        (temp, state)
    }

    fn full_query(seq_str: &str) -> PredictQuery {
        PredictQuery {
            seq_str: Some(seq_str.to_string()),
            date: Some("2018_05_24".to_string()),
            epoch: Some("300".to_string()),
            step: Some("2018_05_24_23_11_33_S5400".to_string()),
        }
    }

    fn tokens(groups: &[&[&str]]) -> Candidates {
        groups
            .iter()
            .map(|g| g.iter().map(|t| t.to_string()).collect())
            .collect()
    }

    #[tokio::test]
    async fn test_predict_formats_candidates() {
        let stub = StubPredictor::ok(tokens(&[&["a", "b"], &["c"], &[]]));
        let (_temp, state) = state_with(stub.clone(), PredictSettings::default());

        let response = handle_predict(&state, full_query(&STANDARD.encode("hello")))
            .await
            .unwrap();
        assert_eq!(response.data.results, vec!["a b", "c", ""]);

        let request = stub.last.lock().unwrap().clone().unwrap();
        assert_eq!(request.input, b"hello");
        assert_eq!(request.n, 3);
        assert_eq!(request.selector.epoch, "300");
        assert_eq!(request.experiment_root, (*state.experiment_root).clone());
    }

    #[tokio::test]
    async fn test_missing_input_skips_predictor() {
        let stub = StubPredictor::ok(vec![]);
        let (_temp, state) = state_with(stub.clone(), PredictSettings::default());

        let mut query = full_query("");
        query.seq_str = None;
        let err = handle_predict(&state, query).await.unwrap_err();

        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "missing input"));
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_base64_skips_predictor() {
        let stub = StubPredictor::ok(vec![]);
        let (_temp, state) = state_with(stub.clone(), PredictSettings::default());

        let err = handle_predict(&state, full_query("!!!")).await.unwrap_err();

        assert!(matches!(err, ApiError::BadRequest(ref m) if m.starts_with("invalid encoding")));
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_line_wrapped_base64_accepted() {
        let stub = StubPredictor::ok(tokens(&[&["ok"]]));
        let (_temp, state) = state_with(stub.clone(), PredictSettings::default());

        let response = handle_predict(&state, full_query(" aGVs\r\nbG8=\n")).await.unwrap();
        assert_eq!(response.data.results, vec!["ok"]);

        let request = stub.last.lock().unwrap().clone().unwrap();
        assert_eq!(request.input, b"hello");
    }

    #[tokio::test]
    async fn test_predictor_failure_collapses_to_bad_request() {
        for kind in [
            PredictorFailureKind::Spawn,
            PredictorFailureKind::Exited,
            PredictorFailureKind::MalformedOutput,
            PredictorFailureKind::Io,
        ] {
            let (_temp, state) = state_with(StubPredictor::failing(kind), PredictSettings::default());
            let err = handle_predict(&state, full_query("aGVsbG8=")).await.unwrap_err();
            assert!(matches!(err, ApiError::BadRequest(ref m) if m == "invalid input"));
        }
    }

    #[tokio::test]
    async fn test_predictor_timeout_kind_is_service_unavailable() {
        let (_temp, state) = state_with(
            StubPredictor::failing(PredictorFailureKind::Timeout),
            PredictSettings::default(),
        );
        let err = handle_predict(&state, full_query("aGVsbG8=")).await.unwrap_err();
        assert!(matches!(err, ApiError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_slow_predictor_times_out() {
        let settings = PredictSettings {
            timeout: Duration::from_millis(20),
            ..PredictSettings::default()
        };
        let (_temp, state) = state_with(StubPredictor::slow(Duration::from_secs(5)), settings);

        let err = handle_predict(&state, full_query("aGVsbG8=")).await.unwrap_err();
        assert!(matches!(err, ApiError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_missing_selector_rejected_without_default() {
        let stub = StubPredictor::ok(vec![]);
        let (_temp, state) = state_with(stub.clone(), PredictSettings::default());

        let mut query = full_query("aGVsbG8=");
        query.epoch = None;
        let err = handle_predict(&state, query).await.unwrap_err();

        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "missing epoch"));
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_selector_uses_configured_default() {
        let stub = StubPredictor::ok(tokens(&[&["x"]]));
        let settings = PredictSettings {
            default_selector: Some(CheckpointSelector::new("2018_05_24", "300", "S1")),
            ..PredictSettings::default()
        };
        let (_temp, state) = state_with(stub.clone(), settings);

        let query = PredictQuery {
            seq_str: Some("aGVsbG8=".to_string()),
            step: Some("S2".to_string()),
            ..PredictQuery::default()
        };
        handle_predict(&state, query).await.unwrap();

        let request = stub.last.lock().unwrap().clone().unwrap();
        assert_eq!(request.selector, CheckpointSelector::new("2018_05_24", "300", "S2"));
    }

    #[tokio::test]
    async fn test_traversal_selector_rejected() {
        let stub = StubPredictor::ok(vec![]);
        let (_temp, state) = state_with(stub.clone(), PredictSettings::default());

        let mut query = full_query("aGVsbG8=");
        query.date = Some("../../etc".to_string());
        let err = handle_predict(&state, query).await.unwrap_err();

        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(stub.calls(), 0);
    }

    #[test]
    fn test_base64_roundtrip() {
        for text in ["hello", "", "a b c", "ünïcødé tokens", "x\ny\tz"] {
            let encoded = STANDARD.encode(text);
            let decoded = STANDARD.decode(&encoded).unwrap();
            assert_eq!(STANDARD.encode(decoded), encoded);
        }
    }

    #[test]
    fn test_format_candidates_trims() {
        let formatted = format_candidates(tokens(&[&["", "a"], &["b", ""], &[" c "]]));
        assert_eq!(formatted, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_input_preview_truncates() {
        assert_eq!(input_preview("short"), "short");
        let long = "A".repeat(100);
        let preview = input_preview(&long);
        assert_eq!(preview.len(), INPUT_PREVIEW_CHARS + 3);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a&b>"), "&lt;a&amp;b&gt;");
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = health_check().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
