use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upstream signal that any evidence at all was recorded for the condition.
pub const HAS_DATA: &str = "hasData";
/// Dominance of the evaluated limb for major/minor schedules (`major` or `minor`).
pub const EXTREMITY: &str = "extremity";
/// Date the determination refers to (YYYY-MM-DD).
pub const AS_OF: &str = "asOf";

const RESERVED: [&str; 3] = [HAS_DATA, EXTREMITY, AS_OF];

/// Single measured value as extracted from the evidence log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl MetricValue {
    /// Coerce a loosely typed CSV or form value.
    pub fn coerce(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "true" | "yes" => return Self::Bool(true),
            "false" | "no" => return Self::Bool(false),
            _ => {}
        }

        match trimmed.parse::<f64>() {
            Ok(number) if number.is_finite() => Self::Number(number),
            _ => Self::Text(trimmed.to_string()),
        }
    }

    fn describe(&self) -> String {
        match self {
            MetricValue::Bool(flag) => flag.to_string(),
            MetricValue::Number(number) => number.to_string(),
            MetricValue::Text(text) => text.clone(),
        }
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for MetricValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Outcome of looking up one metric with a specific expected type.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading<T> {
    Present(T),
    Missing,
    /// The metric exists but cannot be read as the expected type; holds the raw value.
    Unreadable(String),
}

/// Read-only bundle of metrics for one condition and one determination request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceMetrics {
    values: BTreeMap<String, MetricValue>,
}

impl EvidenceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<MetricValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Explicit `hasData` wins; otherwise any non-reserved metric counts as evidence.
    pub fn has_data(&self) -> bool {
        match self.flag(HAS_DATA) {
            Reading::Present(flag) => flag,
            Reading::Missing | Reading::Unreadable(_) => self
                .values
                .keys()
                .any(|name| !RESERVED.contains(&name.as_str())),
        }
    }

    pub fn number(&self, name: &str) -> Reading<f64> {
        match self.values.get(name) {
            None => Reading::Missing,
            Some(MetricValue::Number(number)) if number.is_finite() => Reading::Present(*number),
            Some(MetricValue::Text(text)) => match text.trim().parse::<f64>() {
                Ok(number) if number.is_finite() => Reading::Present(number),
                _ => Reading::Unreadable(text.clone()),
            },
            Some(other) => Reading::Unreadable(other.describe()),
        }
    }

    pub fn flag(&self, name: &str) -> Reading<bool> {
        match self.values.get(name) {
            None => Reading::Missing,
            Some(MetricValue::Bool(flag)) => Reading::Present(*flag),
            Some(MetricValue::Number(number)) if *number == 0.0 => Reading::Present(false),
            Some(MetricValue::Number(number)) if *number == 1.0 => Reading::Present(true),
            Some(MetricValue::Text(text)) => match MetricValue::coerce(text) {
                MetricValue::Bool(flag) => Reading::Present(flag),
                _ => Reading::Unreadable(text.clone()),
            },
            Some(other) => Reading::Unreadable(other.describe()),
        }
    }

    pub fn date(&self, name: &str) -> Reading<NaiveDate> {
        match self.values.get(name) {
            None => Reading::Missing,
            Some(MetricValue::Text(text)) => {
                match NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
                    Ok(date) => Reading::Present(date),
                    Err(_) => Reading::Unreadable(text.clone()),
                }
            }
            Some(other) => Reading::Unreadable(other.describe()),
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(MetricValue::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }
}

impl<K, V> FromIterator<(K, V)> for EvidenceMetrics
where
    K: Into<String>,
    V: Into<MetricValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metrics = Self::new();
        for (name, value) in iter {
            metrics.insert(name, value);
        }
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_reads_accept_numbers_and_numeric_text() {
        let metrics = EvidenceMetrics::new()
            .with("lowestEgfr", 25)
            .with("restingAbi", "0.45")
            .with("fvcPercentPredicted", "pending");

        assert_eq!(metrics.number("lowestEgfr"), Reading::Present(25.0));
        assert_eq!(metrics.number("restingAbi"), Reading::Present(0.45));
        assert_eq!(
            metrics.number("fvcPercentPredicted"),
            Reading::Unreadable("pending".to_string())
        );
        assert_eq!(metrics.number("dlcoPercentPredicted"), Reading::Missing);
    }

    #[test]
    fn flags_accept_booleans_and_yes_no_text() {
        let metrics = EvidenceMetrics::new()
            .with("activeTreatment", true)
            .with("requiresCpap", "Yes")
            .with("corPulmonale", 0)
            .with("tracheostomyRequired", "unknown");

        assert_eq!(metrics.flag("activeTreatment"), Reading::Present(true));
        assert_eq!(metrics.flag("requiresCpap"), Reading::Present(true));
        assert_eq!(metrics.flag("corPulmonale"), Reading::Present(false));
        assert!(matches!(
            metrics.flag("tracheostomyRequired"),
            Reading::Unreadable(_)
        ));
    }

    #[test]
    fn has_data_prefers_explicit_signal() {
        assert!(!EvidenceMetrics::new().has_data());
        assert!(!EvidenceMetrics::new().with(AS_OF, "2025-01-01").has_data());
        assert!(EvidenceMetrics::new().with("lowestEgfr", 40).has_data());
        assert!(EvidenceMetrics::new().with(HAS_DATA, true).has_data());
        assert!(!EvidenceMetrics::new()
            .with(HAS_DATA, false)
            .with("lowestEgfr", 40)
            .has_data());
    }

    #[test]
    fn deserializes_heterogeneous_json_map() {
        let metrics: EvidenceMetrics = serde_json::from_str(
            r#"{"hasData": true, "lowestEgfr": 28, "treatmentEndDate": "2025-03-01"}"#,
        )
        .expect("metrics parse");

        assert_eq!(metrics.number("lowestEgfr"), Reading::Present(28.0));
        assert_eq!(
            metrics.date("treatmentEndDate"),
            Reading::Present(NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date"))
        );
    }

    #[test]
    fn coerce_classifies_csv_cells() {
        assert_eq!(MetricValue::coerce(" TRUE "), MetricValue::Bool(true));
        assert_eq!(MetricValue::coerce("12.5"), MetricValue::Number(12.5));
        assert_eq!(
            MetricValue::coerce("2025-03-01"),
            MetricValue::Text("2025-03-01".to_string())
        );
        assert_eq!(MetricValue::coerce("NaN"), MetricValue::Text("NaN".to_string()));
    }
}
