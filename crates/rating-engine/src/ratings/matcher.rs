use super::metrics::{EvidenceMetrics, Reading, AS_OF, EXTREMITY};
use super::normalizer::Rating;
use super::schedule::{
    AutomaticRating, Comparator, CriteriaSchedule, Criterion, Extremity, Pairing, Requirement,
    ScheduleKind, Tier,
};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Why a tier was (or was not) selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBasis {
    AutomaticWindow,
    FlatRating,
    ZeroPercent,
    Band,
    Criteria,
    MinimumEvidence,
    InsufficientEvidence,
}

/// Treatment window state that triggered an automatic rating.
#[derive(Debug, Clone, PartialEq)]
pub enum TreatmentWindow {
    Active,
    MonthsElapsed(f64),
    Ended {
        ended_on: NaiveDate,
        continues_through: NaiveDate,
    },
}

/// Tier selection for one schedule and one metrics bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct TierMatch {
    pub basis: MatchBasis,
    /// Index into `CriteriaSchedule::tiers`.
    pub tier_index: Option<usize>,
    /// Tiers considered, most severe first.
    pub view: Vec<usize>,
    pub extremity: Option<Extremity>,
    /// Set when the metrics did not say which extremity was evaluated.
    pub extremity_assumed: bool,
    pub window: Option<TreatmentWindow>,
    /// Set when an automatic window exists but the evidence cannot settle it.
    pub window_gap: Option<WindowGap>,
}

impl TierMatch {
    /// Tier immediately above the matched tier within the evaluated view.
    pub fn next_higher(&self) -> Option<usize> {
        let matched = self.tier_index?;
        let position = self.view.iter().position(|&index| index == matched)?;
        position.checked_sub(1).map(|above| self.view[above])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Observation {
    Number(f64),
    Flag(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ClauseOutcome {
    Met(Observation),
    Unmet(Observation),
    Missing,
    Unreadable(String),
}

pub(crate) fn evaluate_clause(criterion: &Criterion, metrics: &EvidenceMetrics) -> ClauseOutcome {
    if criterion.comparator.is_numeric() {
        let threshold = criterion.threshold.unwrap_or_default();
        return match metrics.number(&criterion.metric) {
            Reading::Present(value) if criterion.comparator.compare(value, threshold) => {
                ClauseOutcome::Met(Observation::Number(value))
            }
            Reading::Present(value) => ClauseOutcome::Unmet(Observation::Number(value)),
            Reading::Missing => ClauseOutcome::Missing,
            Reading::Unreadable(raw) => ClauseOutcome::Unreadable(raw),
        };
    }

    let wanted = criterion.comparator == Comparator::IsTrue;
    match metrics.flag(&criterion.metric) {
        Reading::Present(flag) if flag == wanted => ClauseOutcome::Met(Observation::Flag(flag)),
        Reading::Present(flag) => ClauseOutcome::Unmet(Observation::Flag(flag)),
        Reading::Missing => ClauseOutcome::Missing,
        Reading::Unreadable(raw) => ClauseOutcome::Unreadable(raw),
    }
}

/// A tier without criteria never qualifies on evidence; it can only be a fallback.
fn tier_qualifies(code: &str, tier: &Tier, metrics: &EvidenceMetrics) -> bool {
    if tier.criteria.is_empty() {
        return false;
    }

    let mut met = 0usize;
    for criterion in &tier.criteria {
        match evaluate_clause(criterion, metrics) {
            ClauseOutcome::Met(_) => met += 1,
            ClauseOutcome::Unreadable(raw) => warn!(
                diagnostic_code = code,
                metric = %criterion.metric,
                value = %raw,
                "unreadable metric treated as unmet"
            ),
            ClauseOutcome::Unmet(_) | ClauseOutcome::Missing => {}
        }
    }

    match tier.requirement {
        Requirement::All => met == tier.criteria.len(),
        Requirement::Any => met > 0,
        Requirement::AtLeast(needed) => met >= usize::from(needed),
    }
}

fn resolve_extremity(
    schedule: &CriteriaSchedule,
    metrics: &EvidenceMetrics,
) -> (Option<Extremity>, bool) {
    if schedule.pairing != Some(Pairing::Extremity) {
        return (None, false);
    }

    match metrics.text(EXTREMITY).and_then(Extremity::parse) {
        Some(extremity) => (Some(extremity), false),
        None => (Some(Extremity::Minor), true),
    }
}

/// Why an automatic treatment window could not be checked.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowGap {
    /// A treatment end date is recorded but no determination date is.
    MissingAsOf,
    Unreadable { metric: String, raw: String },
}

#[derive(Debug, Clone, PartialEq)]
enum WindowCheck {
    Open(TreatmentWindow),
    Closed,
    Undetermined(WindowGap),
}

fn unreadable_window_metric(code: &str, metric: &str, raw: String) -> WindowGap {
    warn!(
        diagnostic_code = code,
        metric,
        value = %raw,
        "unreadable treatment window metric"
    );
    WindowGap::Unreadable {
        metric: metric.to_string(),
        raw,
    }
}

fn treatment_window(
    code: &str,
    automatic: &AutomaticRating,
    metrics: &EvidenceMetrics,
) -> WindowCheck {
    if metrics.flag(&automatic.active_metric) == Reading::Present(true) {
        return WindowCheck::Open(TreatmentWindow::Active);
    }

    let mut gap = None;
    if let Some(name) = &automatic.elapsed_metric {
        let window = 0.0..=f64::from(automatic.months_after);
        match metrics.number(name) {
            Reading::Present(months) if window.contains(&months) => {
                return WindowCheck::Open(TreatmentWindow::MonthsElapsed(months));
            }
            Reading::Present(_) => return WindowCheck::Closed,
            Reading::Unreadable(raw) => gap = Some(unreadable_window_metric(code, name, raw)),
            Reading::Missing => {}
        }
    }

    let closed_or =
        |gap: Option<WindowGap>| gap.map_or(WindowCheck::Closed, WindowCheck::Undetermined);
    let Some(name) = &automatic.ended_metric else {
        return closed_or(gap);
    };

    match (metrics.date(name), metrics.date(AS_OF)) {
        (Reading::Present(ended_on), Reading::Present(as_of)) => {
            match ended_on.checked_add_months(Months::new(automatic.months_after)) {
                Some(continues_through) if as_of <= continues_through => {
                    WindowCheck::Open(TreatmentWindow::Ended {
                        ended_on,
                        continues_through,
                    })
                }
                _ => WindowCheck::Closed,
            }
        }
        (Reading::Present(_), Reading::Missing) => {
            WindowCheck::Undetermined(gap.unwrap_or(WindowGap::MissingAsOf))
        }
        (Reading::Present(_), Reading::Unreadable(raw)) => {
            WindowCheck::Undetermined(unreadable_window_metric(code, AS_OF, raw))
        }
        (Reading::Unreadable(raw), _) => {
            WindowCheck::Undetermined(unreadable_window_metric(code, name, raw))
        }
        (Reading::Missing, _) => closed_or(gap),
    }
}

/// Select at most one tier: overrides first, then the most severe qualifying tier,
/// then the lowest tier when any evidence exists.
pub fn match_tier(schedule: &CriteriaSchedule, metrics: &EvidenceMetrics) -> TierMatch {
    let code = schedule.diagnostic_code.as_str();
    let (extremity, extremity_assumed) = resolve_extremity(schedule, metrics);
    let view = schedule.tier_view(extremity);

    let check = schedule
        .automatic
        .as_ref()
        .map(|automatic| (automatic, treatment_window(code, automatic, metrics)));
    let window_gap = match &check {
        Some((_, WindowCheck::Undetermined(gap))) => Some(gap.clone()),
        _ => None,
    };

    let outcome = |basis: MatchBasis, tier_index: Option<usize>, window| TierMatch {
        basis,
        tier_index,
        view: view.clone(),
        extremity,
        extremity_assumed,
        window,
        window_gap: window_gap.clone(),
    };

    if let Some((automatic, WindowCheck::Open(window))) = check {
        let target = Rating::Exact(automatic.percent);
        let index = view
            .iter()
            .copied()
            .find(|&index| schedule.tiers[index].percent == target)
            .or_else(|| schedule.tiers.iter().position(|tier| tier.percent == target));
        debug!(diagnostic_code = code, ?window, "automatic rating window holds");
        return outcome(MatchBasis::AutomaticWindow, index, Some(window));
    }

    let basis = match schedule.kind {
        ScheduleKind::Flat => return outcome(MatchBasis::FlatRating, Some(0), None),
        ScheduleKind::ZeroPercent => return outcome(MatchBasis::ZeroPercent, Some(0), None),
        ScheduleKind::Banded { .. } => MatchBasis::Band,
        ScheduleKind::Graduated => MatchBasis::Criteria,
    };

    for &index in &view {
        let tier = &schedule.tiers[index];
        if tier_qualifies(code, tier, metrics) {
            debug!(diagnostic_code = code, percent = %tier.percent, "tier qualifies");
            return outcome(basis, Some(index), None);
        }
    }

    if metrics.has_data() {
        debug!(diagnostic_code = code, "no tier qualifies; falling back to lowest tier");
        outcome(MatchBasis::MinimumEvidence, view.last().copied(), None)
    } else {
        debug!(diagnostic_code = code, "no evidence documented");
        outcome(MatchBasis::InsufficientEvidence, None, None)
    }
}
