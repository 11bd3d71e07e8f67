//! Rating determination: schedules, metric normalization, tier matching, and
//! rationale/gap generation for disability-rating reference cards.
//!
//! Every determination is a pure function of the schedule and the metrics bundle.
//! Schedules are validated once at registry load and never mutated afterwards.

pub mod batch;
pub mod explain;
pub mod matcher;
pub mod metrics;
pub mod normalizer;
pub mod registry;
pub mod router;
pub mod schedule;

#[cfg(test)]
mod tests;

pub use batch::{BatchImportError, BatchOutcome, DeterminationRequest, EvidenceCsvImporter};
pub use explain::{explain, Explanation};
pub use matcher::{match_tier, MatchBasis, TierMatch, TreatmentWindow, WindowGap};
pub use metrics::{EvidenceMetrics, MetricValue, Reading};
pub use normalizer::{
    normalize_rating, rating_satisfies_tier, NamedRating, ParseError, RawRating, Rating,
};
pub use registry::{CriteriaRegistry, RegistryError, UnknownConditionError};
pub use router::ratings_router;
pub use schedule::{
    AutomaticRating, Comparator, CriteriaSchedule, Criterion, Extremity, Pairing, Requirement,
    ScheduleError, ScheduleKind, Side, Tier,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Output of one determination; `supported_rating` is `Unrated` when evidence is insufficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeterminationResult {
    pub diagnostic_code: String,
    pub supported_rating: Rating,
    pub rationale: Vec<String>,
    pub evidence_gaps: Vec<String>,
    pub matched_tier: Option<Tier>,
    pub basis: MatchBasis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extremity: Option<Extremity>,
}

impl DeterminationResult {
    /// Whether a rating held by the caller is backed by this determination.
    /// Unparseable ratings are never supported.
    pub fn supports(&self, current: Option<&RawRating>) -> bool {
        let candidate = match normalize_rating(current) {
            Ok(candidate) => candidate,
            Err(error) => {
                debug!(%error, "current rating could not be normalized");
                return false;
            }
        };

        match (&self.supported_rating, &candidate) {
            (Rating::Exact(supported), _) => rating_satisfies_tier(&candidate, *supported),
            (Rating::Range { low, high }, Rating::Exact(percent)) => {
                (*low..=*high).contains(percent)
            }
            (Rating::Range { low, high }, Rating::Range { low: from, high: to }) => {
                from <= high && low <= to
            }
            _ => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeterminationError {
    #[error(transparent)]
    UnknownCondition(#[from] UnknownConditionError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("diagnostic code {0} is not evaluated per side")]
    NotSidePaired(String),
}

/// Determine a rating against one already-resolved schedule.
pub fn determine_schedule(
    schedule: &CriteriaSchedule,
    metrics: &EvidenceMetrics,
) -> DeterminationResult {
    let matched = match_tier(schedule, metrics);
    let Explanation { rationale, gaps } = explain(schedule, metrics, &matched);
    let matched_tier = matched.tier_index.map(|index| schedule.tiers[index].clone());
    let supported_rating = matched_tier
        .as_ref()
        .map(|tier| tier.percent.clone())
        .unwrap_or(Rating::Unrated);

    info!(
        diagnostic_code = %schedule.diagnostic_code,
        rating = %supported_rating,
        basis = ?matched.basis,
        gaps = gaps.len(),
        "rating determined"
    );

    DeterminationResult {
        diagnostic_code: schedule.diagnostic_code.clone(),
        supported_rating,
        rationale,
        evidence_gaps: gaps,
        matched_tier,
        basis: matched.basis,
        extremity: matched.extremity,
    }
}

/// Determine a rating against the embedded registry.
pub fn determine_rating(
    diagnostic_code: &str,
    metrics: &EvidenceMetrics,
) -> Result<DeterminationResult, DeterminationError> {
    let schedule = CriteriaRegistry::embedded()?.get(diagnostic_code)?;
    Ok(determine_schedule(schedule, metrics))
}

/// Stateless engine over a shared registry; safe to call from any thread.
#[derive(Debug, Clone)]
pub struct RatingEngine {
    registry: Arc<CriteriaRegistry>,
}

impl RatingEngine {
    pub fn new(registry: CriteriaRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn embedded() -> Result<Self, RegistryError> {
        Ok(Self::new(CriteriaRegistry::embedded()?.clone()))
    }

    pub fn registry(&self) -> &CriteriaRegistry {
        &self.registry
    }

    pub fn determine(
        &self,
        diagnostic_code: &str,
        metrics: &EvidenceMetrics,
    ) -> Result<DeterminationResult, UnknownConditionError> {
        let schedule = self.registry.get(diagnostic_code)?;
        Ok(determine_schedule(schedule, metrics))
    }

    /// Evaluate each side of a paired structure on its own. Combining the sides
    /// into one disability percentage is left to a combined-ratings calculator.
    /// Only schedules paired by side are accepted.
    pub fn determine_sides(
        &self,
        diagnostic_code: &str,
        sides: &BTreeMap<Side, EvidenceMetrics>,
    ) -> Result<BTreeMap<Side, DeterminationResult>, DeterminationError> {
        let schedule = self.registry.get(diagnostic_code)?;
        if schedule.pairing != Some(Pairing::Side) {
            return Err(DeterminationError::NotSidePaired(diagnostic_code.to_string()));
        }
        Ok(sides
            .iter()
            .map(|(side, metrics)| (*side, determine_schedule(schedule, metrics)))
            .collect())
    }

    pub fn determine_batch(&self, requests: &[DeterminationRequest]) -> Vec<BatchOutcome> {
        requests
            .iter()
            .map(|request| {
                let outcome = self.determine(&request.diagnostic_code, &request.metrics);
                let (result, error) = match outcome {
                    Ok(result) => (Some(result), None),
                    Err(error) => (None, Some(error.to_string())),
                };
                BatchOutcome {
                    request_id: request.request_id.clone(),
                    diagnostic_code: request.diagnostic_code.clone(),
                    result,
                    error,
                }
            })
            .collect()
    }
}
