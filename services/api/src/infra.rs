use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use rating_engine::config::{AppConfig, RegistrySource};
use rating_engine::error::AppError;
use rating_engine::ratings::metrics::AS_OF;
use rating_engine::ratings::{CriteriaRegistry, EvidenceMetrics, RatingEngine};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) engine: Arc<RatingEngine>,
}

/// An explicit schedules file wins over `APP_SCHEDULES_PATH`.
pub(crate) fn registry_source(
    override_path: Option<PathBuf>,
    config: Option<&AppConfig>,
) -> RegistrySource {
    match (override_path, config) {
        (Some(path), _) => RegistrySource::File(path),
        (None, Some(config)) => config.registry.clone(),
        (None, None) => RegistrySource::Embedded,
    }
}

pub(crate) fn load_engine(source: &RegistrySource) -> Result<RatingEngine, AppError> {
    let registry = CriteriaRegistry::load(source)?;
    Ok(RatingEngine::new(registry))
}

/// Records the reference date unless the evidence already carries one.
pub(crate) fn with_as_of(
    mut metrics: EvidenceMetrics,
    as_of: Option<NaiveDate>,
) -> EvidenceMetrics {
    if let Some(date) = as_of {
        if metrics.get(AS_OF).is_none() {
            metrics.insert(AS_OF, date.format("%Y-%m-%d").to_string());
        }
    }
    metrics
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn deserialize_optional_date<'de, D>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.map(|value| parse_date(&value).map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rating_engine::ratings::Reading;

    #[test]
    fn explicit_path_overrides_configuration() {
        let source = registry_source(Some(PathBuf::from("custom.json")), None);

        assert_eq!(source, RegistrySource::File(PathBuf::from("custom.json")));
        assert_eq!(registry_source(None, None), RegistrySource::Embedded);
    }

    #[test]
    fn as_of_does_not_replace_recorded_dates() {
        let date = parse_date("2026-10-18").expect("valid date");
        let recorded = EvidenceMetrics::new().with(AS_OF, "2026-01-01");

        let filled = with_as_of(EvidenceMetrics::new(), Some(date));
        let kept = with_as_of(recorded, Some(date));

        assert_eq!(filled.date(AS_OF), Reading::Present(date));
        assert_eq!(
            kept.date(AS_OF),
            Reading::Present(NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date"))
        );
    }

    #[test]
    fn parse_date_reports_the_raw_value() {
        let error = parse_date("soon").expect_err("invalid date");

        assert!(error.contains("'soon'"));
    }
}
