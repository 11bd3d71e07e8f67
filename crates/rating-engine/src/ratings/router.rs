use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::batch::{BatchOutcome, DeterminationRequest};
use super::metrics::EvidenceMetrics;
use super::normalizer::RawRating;
use super::schedule::{CriteriaSchedule, ScheduleKind};
use super::{DeterminationResult, RatingEngine};

/// Body of a single determination request.
#[derive(Debug, Clone, Deserialize)]
pub struct DetermineRequest {
    pub diagnostic_code: String,
    #[serde(default)]
    pub metrics: EvidenceMetrics,
    #[serde(default)]
    pub current_rating: Option<RawRating>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetermineResponse {
    #[serde(flatten)]
    pub result: DeterminationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_rating_supported: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub requests: Vec<DeterminationRequest>,
}

/// Listing entry for a registered schedule.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleSummary {
    pub diagnostic_code: String,
    pub title: String,
    pub cfr_reference: String,
    pub kind: &'static str,
    pub tiers: Vec<String>,
}

impl From<&CriteriaSchedule> for ScheduleSummary {
    fn from(schedule: &CriteriaSchedule) -> Self {
        let kind = match schedule.kind {
            ScheduleKind::Graduated => "graduated",
            ScheduleKind::Banded { .. } => "banded",
            ScheduleKind::Flat => "flat",
            ScheduleKind::ZeroPercent => "zero_percent",
        };

        Self {
            diagnostic_code: schedule.diagnostic_code.clone(),
            title: schedule.title.clone(),
            cfr_reference: schedule.cfr_reference.clone(),
            kind,
            tiers: schedule
                .tiers
                .iter()
                .map(|tier| match tier.extremity {
                    Some(extremity) => format!("{} ({})", tier.percent.label(), extremity.label()),
                    None => tier.percent.label(),
                })
                .collect(),
        }
    }
}

/// Router exposing schedule listing and rating determinations.
pub fn ratings_router(engine: Arc<RatingEngine>) -> Router {
    Router::new()
        .route("/api/v1/ratings/schedules", get(list_schedules_handler))
        .route(
            "/api/v1/ratings/schedules/:diagnostic_code",
            get(schedule_handler),
        )
        .route("/api/v1/ratings/determine", post(determine_handler))
        .route("/api/v1/ratings/batch", post(batch_handler))
        .with_state(engine)
}

pub(crate) async fn list_schedules_handler(State(engine): State<Arc<RatingEngine>>) -> Response {
    let summaries: Vec<ScheduleSummary> = engine
        .registry()
        .schedules()
        .map(ScheduleSummary::from)
        .collect();
    (StatusCode::OK, axum::Json(summaries)).into_response()
}

pub(crate) async fn schedule_handler(
    State(engine): State<Arc<RatingEngine>>,
    Path(diagnostic_code): Path<String>,
) -> Response {
    match engine.registry().get(&diagnostic_code) {
        Ok(schedule) => (StatusCode::OK, axum::Json(schedule.clone())).into_response(),
        Err(error) => unknown_condition(&error.diagnostic_code, &error.to_string()),
    }
}

pub(crate) async fn determine_handler(
    State(engine): State<Arc<RatingEngine>>,
    axum::Json(request): axum::Json<DetermineRequest>,
) -> Response {
    match engine.determine(&request.diagnostic_code, &request.metrics) {
        Ok(result) => {
            let current_rating_supported = request
                .current_rating
                .as_ref()
                .map(|current| result.supports(Some(current)));
            let body = DetermineResponse {
                result,
                current_rating_supported,
            };
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(error) => unknown_condition(&error.diagnostic_code, &error.to_string()),
    }
}

pub(crate) async fn batch_handler(
    State(engine): State<Arc<RatingEngine>>,
    axum::Json(request): axum::Json<BatchRequest>,
) -> Response {
    let outcomes: Vec<BatchOutcome> = engine.determine_batch(&request.requests);
    (StatusCode::OK, axum::Json(outcomes)).into_response()
}

fn unknown_condition(diagnostic_code: &str, message: &str) -> Response {
    let payload = json!({
        "error": message,
        "diagnostic_code": diagnostic_code,
    });
    (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
}
