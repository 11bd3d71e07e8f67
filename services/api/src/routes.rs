use crate::infra::{deserialize_optional_date, with_as_of, AppState};
use crate::report::{reference_card, ReferenceCard};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::NaiveDate;
use rating_engine::error::AppError;
use rating_engine::ratings::{ratings_router, EvidenceMetrics, RatingEngine, RawRating};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct ReferenceCardRequest {
    pub(crate) diagnostic_code: String,
    #[serde(default)]
    pub(crate) metrics: EvidenceMetrics,
    #[serde(default)]
    pub(crate) current_rating: Option<RawRating>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) as_of: Option<NaiveDate>,
}

pub(crate) fn with_rating_routes(engine: Arc<RatingEngine>) -> axum::Router {
    ratings_router(engine)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/ratings/card",
            axum::routing::post(reference_card_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready", "schedules": state.engine.registry().len() })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn reference_card_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<ReferenceCardRequest>,
) -> Result<Json<ReferenceCard>, AppError> {
    let ReferenceCardRequest {
        diagnostic_code,
        metrics,
        current_rating,
        as_of,
    } = payload;

    let metrics = with_as_of(metrics, as_of);
    let card = reference_card(
        &state.engine,
        &diagnostic_code,
        &metrics,
        current_rating.as_ref(),
    )?;
    Ok(Json(card))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::SeverityBucket;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app_state(ready: bool) -> AppState {
        let recorder = PrometheusBuilder::new().build_recorder();
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(recorder.handle()),
            engine: Arc::new(RatingEngine::embedded().expect("embedded schedules load")),
        }
    }

    fn card_request(diagnostic_code: &str, metrics: EvidenceMetrics) -> ReferenceCardRequest {
        ReferenceCardRequest {
            diagnostic_code: diagnostic_code.to_string(),
            metrics,
            current_rating: None,
            as_of: None,
        }
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;

        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_reports_initializing_until_bound() {
        let response = readiness_endpoint(Extension(app_state(false)))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn reference_card_endpoint_buckets_the_supported_rating() {
        let request = card_request(
            "6845",
            EvidenceMetrics::new().with("fvcPercentPredicted", 60.0),
        );

        let Json(card) = reference_card_endpoint(Extension(app_state(true)), Json(request))
            .await
            .expect("card builds");

        assert_eq!(card.rating_label, "60%");
        assert_eq!(card.severity, SeverityBucket::Moderate);
    }

    #[tokio::test]
    async fn reference_card_endpoint_rejects_unknown_codes() {
        let request = card_request("9999", EvidenceMetrics::new());

        let error = reference_card_endpoint(Extension(app_state(true)), Json(request))
            .await
            .expect_err("unknown code");

        assert_eq!(error.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn card_route_applies_the_as_of_date() {
        let state = app_state(true);
        let router = with_rating_routes(state.engine.clone()).layer(Extension(state));
        let payload = json!({
            "diagnostic_code": "9918",
            "metrics": { "treatmentEndDate": "2026-01-15" },
            "as_of": "2026-10-18"
        });

        let response = router
            .oneshot(
                Request::post("/api/v1/ratings/card")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::to_vec(&payload).expect("payload")))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        let card: serde_json::Value = serde_json::from_slice(&body).expect("json payload");
        assert_eq!(card["supported_rating"], "varies");
        assert_eq!(card["severity"], "none");
    }

    #[tokio::test]
    async fn ready_route_counts_loaded_schedules() {
        let state = app_state(true);
        let router = with_rating_routes(state.engine.clone()).layer(Extension(state));

        let response = router
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .expect("read body");
        let payload: serde_json::Value = serde_json::from_slice(&body).expect("json payload");
        assert_eq!(payload["schedules"], 13);
    }
}
