use super::normalizer::Rating;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Comparison applied between a metric and a criterion threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    IsTrue,
    IsFalse,
}

impl Comparator {
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::IsTrue | Self::IsFalse)
    }

    /// Phrase used in gap text, e.g. "below 15".
    pub const fn phrase(self) -> &'static str {
        match self {
            Self::Lt => "below",
            Self::Lte => "at or below",
            Self::Gt => "above",
            Self::Gte => "at or above",
            Self::Eq => "equal to",
            Self::IsTrue => "present",
            Self::IsFalse => "absent",
        }
    }

    pub fn compare(self, observed: f64, threshold: f64) -> bool {
        match self {
            Self::Lt => observed < threshold,
            Self::Lte => observed <= threshold,
            Self::Gt => observed > threshold,
            Self::Gte => observed >= threshold,
            Self::Eq => (observed - threshold).abs() < f64::EPSILON,
            Self::IsTrue | Self::IsFalse => false,
        }
    }

    fn band_direction(self) -> Option<BandDirection> {
        match self {
            Self::Lt | Self::Lte => Some(BandDirection::LowerIsWorse),
            Self::Gt | Self::Gte => Some(BandDirection::HigherIsWorse),
            Self::Eq | Self::IsTrue | Self::IsFalse => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BandDirection {
    LowerIsWorse,
    HigherIsWorse,
}

/// One clause of a tier predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub metric: String,
    pub comparator: Comparator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Opaque clause text from the rating schedule.
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Criterion {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.metric)
    }
}

/// How many clauses of a tier must hold for the tier to qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    #[default]
    All,
    Any,
    AtLeast(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extremity {
    Major,
    Minor,
}

impl Extremity {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "major" | "dominant" => Some(Self::Major),
            "minor" | "non-dominant" | "nondominant" => Some(Self::Minor),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// Paired-structure conditions evaluated one limb or side at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pairing {
    Extremity,
    Side,
}

/// Discrete rating level within a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub percent: Rating,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub criteria: Vec<Criterion>,
    #[serde(default)]
    pub requirement: Requirement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extremity: Option<Extremity>,
}

/// Matching strategy for a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Boolean predicates over named metrics.
    Graduated,
    /// Continuous lab values mapped through ordered bands.
    Banded { metrics: Vec<String> },
    /// Single invariant rating.
    Flat,
    /// Always 0% while still service connected.
    ZeroPercent,
}

/// Fixed rating while a treatment window is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomaticRating {
    pub percent: u8,
    /// Boolean metric meaning treatment is ongoing.
    pub active_metric: String,
    /// Date metric marking the end of treatment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_metric: Option<String>,
    /// Numeric metric holding whole months elapsed since treatment ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_metric: Option<String>,
    #[serde(default)]
    pub months_after: u32,
    pub description: String,
}

/// Rating schedule for one diagnostic code. Tiers run from most to least severe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaSchedule {
    pub diagnostic_code: String,
    pub title: String,
    pub cfr_reference: String,
    pub kind: ScheduleKind,
    pub tiers: Vec<Tier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automatic: Option<AutomaticRating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairing: Option<Pairing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub definitions: BTreeMap<String, String>,
    /// Advice surfaced as gaps when no higher tier exists.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guidance: Vec<String>,
}

impl CriteriaSchedule {
    /// Indices of the tiers that apply to one extremity, in severity order.
    pub fn tier_view(&self, extremity: Option<Extremity>) -> Vec<usize> {
        self.tiers
            .iter()
            .enumerate()
            .filter(|(_, tier)| match (tier.extremity, extremity) {
                (None, _) => true,
                (Some(tagged), Some(wanted)) => tagged == wanted,
                (Some(_), None) => false,
            })
            .map(|(index, _)| index)
            .collect()
    }

    fn extremity_views(&self) -> Vec<Option<Extremity>> {
        match self.pairing {
            Some(Pairing::Extremity) => vec![Some(Extremity::Major), Some(Extremity::Minor)],
            _ => vec![None],
        }
    }

    /// Reject schedules the matcher cannot evaluate deterministically.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        let code = || self.diagnostic_code.clone();

        if self.diagnostic_code.trim().is_empty() {
            return Err(ScheduleError::MissingCode);
        }
        if self.tiers.is_empty() {
            return Err(ScheduleError::NoTiers(code()));
        }

        for tier in &self.tiers {
            if tier.percent.is_unrated() {
                return Err(ScheduleError::UnratedTier(code()));
            }
            if tier.extremity.is_some() && self.pairing != Some(Pairing::Extremity) {
                return Err(ScheduleError::UnexpectedExtremity(code()));
            }
            if let Requirement::AtLeast(0) = tier.requirement {
                return Err(ScheduleError::EmptyRequirement(code()));
            }
            for criterion in &tier.criteria {
                let threshold_ok = criterion.threshold.map(f64::is_finite).unwrap_or(false);
                if criterion.comparator.is_numeric() && !threshold_ok {
                    return Err(ScheduleError::MissingThreshold {
                        code: code(),
                        metric: criterion.metric.clone(),
                    });
                }
            }
        }

        for view in self.extremity_views() {
            self.validate_order(&self.tier_view(view))?;
        }

        match &self.kind {
            ScheduleKind::Flat | ScheduleKind::ZeroPercent if self.tiers.len() != 1 => {
                return Err(ScheduleError::SingleTierExpected(code()));
            }
            ScheduleKind::ZeroPercent if self.tiers[0].percent != Rating::Exact(0) => {
                return Err(ScheduleError::SingleTierExpected(code()));
            }
            ScheduleKind::Banded { metrics } => self.validate_bands(metrics)?,
            _ => {}
        }

        if let Some(automatic) = &self.automatic {
            let declared = self
                .tiers
                .iter()
                .any(|tier| tier.percent == Rating::Exact(automatic.percent));
            if automatic.percent > 100 || !declared {
                return Err(ScheduleError::UndeclaredAutomaticRating {
                    code: code(),
                    percent: automatic.percent,
                });
            }
        }

        Ok(())
    }

    fn validate_order(&self, view: &[usize]) -> Result<(), ScheduleError> {
        let mut previous: Option<u8> = None;
        let mut named_seen = false;

        for &index in view {
            match self.tiers[index].percent.upper_percent() {
                Some(percent) => {
                    let descending = previous.map(|prior| percent < prior).unwrap_or(true);
                    if named_seen || !descending {
                        return Err(ScheduleError::TierOrder {
                            code: self.diagnostic_code.clone(),
                            percent: self.tiers[index].percent.label(),
                        });
                    }
                    previous = Some(percent);
                }
                None => named_seen = true,
            }
        }

        Ok(())
    }

    fn validate_bands(&self, metrics: &[String]) -> Result<(), ScheduleError> {
        let code = || self.diagnostic_code.clone();
        if metrics.is_empty() {
            return Err(ScheduleError::NoBandMetrics(code()));
        }

        let mut last: BTreeMap<&str, (BandDirection, f64)> = BTreeMap::new();
        for tier in &self.tiers {
            if tier.criteria.len() > 1 && tier.requirement != Requirement::Any {
                return Err(ScheduleError::BandRequirement(code()));
            }

            for criterion in &tier.criteria {
                if !metrics.contains(&criterion.metric) {
                    return Err(ScheduleError::UnknownBandMetric {
                        code: code(),
                        metric: criterion.metric.clone(),
                    });
                }
                let direction = criterion.comparator.band_direction().ok_or_else(|| {
                    ScheduleError::BandThreshold {
                        code: code(),
                        metric: criterion.metric.clone(),
                    }
                })?;
                let threshold = criterion.threshold.unwrap_or_default();

                if let Some((prior_direction, prior)) = last.get(criterion.metric.as_str()) {
                    let monotone = match direction {
                        BandDirection::LowerIsWorse => threshold >= *prior,
                        BandDirection::HigherIsWorse => threshold <= *prior,
                    };
                    if *prior_direction != direction || !monotone {
                        return Err(ScheduleError::BandThreshold {
                            code: code(),
                            metric: criterion.metric.clone(),
                        });
                    }
                }
                last.insert(criterion.metric.as_str(), (direction, threshold));
            }
        }

        Ok(())
    }
}

/// Configuration defect in a schedule definition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScheduleError {
    #[error("schedule is missing a diagnostic code")]
    MissingCode,
    #[error("DC {0}: schedule declares no tiers")]
    NoTiers(String),
    #[error("DC {0}: tier percent must not be null")]
    UnratedTier(String),
    #[error("DC {0}: extremity tags require extremity pairing")]
    UnexpectedExtremity(String),
    #[error("DC {0}: at_least requirement must be positive")]
    EmptyRequirement(String),
    #[error("DC {code}: criterion on '{metric}' needs a finite threshold")]
    MissingThreshold { code: String, metric: String },
    #[error("DC {code}: tier {percent} is out of severity order")]
    TierOrder { code: String, percent: String },
    #[error("DC {0}: flat and zero-percent schedules declare exactly one tier (0% for zero-percent)")]
    SingleTierExpected(String),
    #[error("DC {0}: banded schedule lists no band metrics")]
    NoBandMetrics(String),
    #[error("DC {0}: banded tiers with several bounds must use the any requirement")]
    BandRequirement(String),
    #[error("DC {code}: band metric '{metric}' is not declared by the schedule")]
    UnknownBandMetric { code: String, metric: String },
    #[error("DC {code}: bands on '{metric}' are not a monotone partition")]
    BandThreshold { code: String, metric: String },
    #[error("DC {code}: automatic {percent}% rating has no matching tier")]
    UndeclaredAutomaticRating { code: String, percent: u8 },
}
