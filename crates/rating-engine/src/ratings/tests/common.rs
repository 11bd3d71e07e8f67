use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::ratings::{
    CriteriaSchedule, DeterminationResult, EvidenceMetrics, MetricValue, RatingEngine,
};

pub(super) fn engine() -> RatingEngine {
    RatingEngine::embedded().expect("embedded schedules load")
}

pub(super) fn shared_engine() -> Arc<RatingEngine> {
    Arc::new(engine())
}

pub(super) fn schedule(code: &str) -> CriteriaSchedule {
    engine()
        .registry()
        .get(code)
        .expect("schedule registered")
        .clone()
}

pub(super) fn metrics<const N: usize>(pairs: [(&str, MetricValue); N]) -> EvidenceMetrics {
    pairs.into_iter().collect()
}

pub(super) fn determine(code: &str, metrics: &EvidenceMetrics) -> DeterminationResult {
    engine().determine(code, metrics).expect("known diagnostic code")
}

pub(super) fn ckd(lowest_egfr: f64) -> EvidenceMetrics {
    EvidenceMetrics::new().with("lowestEgfr", lowest_egfr)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
