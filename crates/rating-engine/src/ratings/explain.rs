use super::matcher::{
    evaluate_clause, ClauseOutcome, MatchBasis, Observation, TierMatch, TreatmentWindow, WindowGap,
};
use super::metrics::EvidenceMetrics;
use super::schedule::{Comparator, CriteriaSchedule, Criterion, Tier};
use serde::{Deserialize, Serialize};

/// Rationale and evidence gaps for one determination, in clause declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    pub rationale: Vec<String>,
    pub gaps: Vec<String>,
}

/// Explain a tier selection. Output depends only on the arguments.
pub fn explain(
    schedule: &CriteriaSchedule,
    metrics: &EvidenceMetrics,
    matched: &TierMatch,
) -> Explanation {
    let matched_tier = matched.tier_index.map(|index| &schedule.tiers[index]);
    let mut explanation = Explanation::default();

    match (matched.basis, matched_tier) {
        (MatchBasis::AutomaticWindow, tier) => {
            let percent = tier
                .map(|tier| tier.percent.label())
                .or_else(|| schedule.automatic.as_ref().map(|auto| format!("{}%", auto.percent)))
                .unwrap_or_default();
            explanation
                .rationale
                .push(window_statement(schedule, matched.window.as_ref(), &percent));
            explanation.gaps.extend(schedule.guidance.iter().cloned());
        }
        (MatchBasis::FlatRating, Some(tier)) => {
            explanation.rationale.push(format!(
                "{} carries a flat {} evaluation under DC {}; severity measurements do not change it",
                schedule.title,
                tier.percent.label(),
                schedule.diagnostic_code
            ));
            explanation.rationale.extend(supporting_statements(tier, metrics));
            explanation.gaps.extend(schedule.guidance.iter().cloned());
        }
        (MatchBasis::ZeroPercent, Some(tier)) => {
            explanation.rationale.push(format!(
                "{} is evaluated at 0% under DC {}; service connection stands independent of the percentage",
                schedule.title, schedule.diagnostic_code
            ));
            explanation.rationale.extend(supporting_statements(tier, metrics));
            explanation.gaps.extend(schedule.guidance.iter().cloned());
        }
        (MatchBasis::Band | MatchBasis::Criteria, Some(tier)) => {
            explanation.rationale.extend(supporting_statements(tier, metrics));
            explanation.gaps = escalation_gaps(schedule, metrics, matched);
        }
        (MatchBasis::MinimumEvidence, Some(tier)) => {
            explanation.rationale.push(format!(
                "Evidence of {} is documented but no higher criterion is met; the {} evaluation applies",
                schedule.title,
                tier.percent.label()
            ));
            explanation.rationale.extend(supporting_statements(tier, metrics));
            explanation.gaps = escalation_gaps(schedule, metrics, matched);
        }
        (MatchBasis::InsufficientEvidence, _) | (_, None) => {
            explanation.gaps.push(format!(
                "No evidence is documented for {} (DC {}); no rating can be supported yet",
                schedule.title, schedule.diagnostic_code
            ));
            let entry_tier = matched
                .view
                .iter()
                .rev()
                .map(|&index| &schedule.tiers[index])
                .find(|tier| !tier.criteria.is_empty());
            if let Some(tier) = entry_tier {
                explanation
                    .gaps
                    .extend(tier_gaps(tier, metrics, &tier.percent.label()));
            }
        }
    }

    if let Some(gap) = &matched.window_gap {
        explanation.gaps.push(window_gap_statement(schedule, gap));
    }

    if matched.extremity_assumed {
        let mut gap = format!(
            "Document whether {} affects the major (dominant) or minor extremity",
            schedule.title
        );
        if matched.tier_index.is_some() {
            gap.push_str("; minor extremity ratings were applied");
        }
        explanation.gaps.push(gap);
    }

    explanation
}

fn window_statement(
    schedule: &CriteriaSchedule,
    window: Option<&TreatmentWindow>,
    percent: &str,
) -> String {
    let description = schedule
        .automatic
        .as_ref()
        .map(|automatic| automatic.description.as_str())
        .unwrap_or_default();
    let months = schedule
        .automatic
        .as_ref()
        .map(|automatic| automatic.months_after)
        .unwrap_or_default();

    match window {
        Some(TreatmentWindow::MonthsElapsed(elapsed)) => format!(
            "Treatment ended {elapsed} month(s) ago, within the {months}-month window; {percent} is assigned: {description}"
        ),
        Some(TreatmentWindow::Ended {
            ended_on,
            continues_through,
        }) => format!(
            "Treatment ended {ended_on}; the {percent} evaluation continues through {continues_through}: {description}"
        ),
        Some(TreatmentWindow::Active) | None => {
            format!("Active treatment is documented; {percent} is assigned: {description}")
        }
    }
}

fn window_gap_statement(schedule: &CriteriaSchedule, gap: &WindowGap) -> String {
    let (percent, months) = schedule
        .automatic
        .as_ref()
        .map(|automatic| (automatic.percent, automatic.months_after))
        .unwrap_or_default();
    let purpose = format!("to check the {months}-month post-treatment {percent}% window");

    match gap {
        WindowGap::MissingAsOf => format!("Document the determination date (asOf) {purpose}"),
        WindowGap::Unreadable { metric, raw } => format!(
            "Recorded {metric} value '{raw}' could not be read as a date; document it {purpose}"
        ),
    }
}

fn supporting_statements(tier: &Tier, metrics: &EvidenceMetrics) -> Vec<String> {
    let target = tier.percent.label();
    tier.criteria
        .iter()
        .filter_map(|criterion| match evaluate_clause(criterion, metrics) {
            ClauseOutcome::Met(Observation::Number(value)) => Some(format!(
                "{} of {} supports the {} criterion: {}",
                criterion.label(),
                measure(value, criterion.unit.as_deref()),
                target,
                criterion.description
            )),
            ClauseOutcome::Met(Observation::Flag(flag)) => Some(format!(
                "{} recorded as {}; supports the {} criterion: {}",
                criterion.label(),
                if flag { "present" } else { "absent" },
                target,
                criterion.description
            )),
            _ => None,
        })
        .collect()
}

fn escalation_gaps(
    schedule: &CriteriaSchedule,
    metrics: &EvidenceMetrics,
    matched: &TierMatch,
) -> Vec<String> {
    match matched.next_higher() {
        Some(index) => {
            let tier = &schedule.tiers[index];
            tier_gaps(tier, metrics, &tier.percent.label())
        }
        None => schedule.guidance.clone(),
    }
}

fn tier_gaps(tier: &Tier, metrics: &EvidenceMetrics, target: &str) -> Vec<String> {
    tier.criteria
        .iter()
        .filter_map(|criterion| {
            let outcome = evaluate_clause(criterion, metrics);
            gap_statement(criterion, &outcome, target)
        })
        .collect()
}

fn gap_statement(criterion: &Criterion, outcome: &ClauseOutcome, target: &str) -> Option<String> {
    let label = lower_first(criterion.label());
    let requirement = if criterion.comparator.is_numeric() {
        format!(
            "{} {} {}",
            label,
            criterion.comparator.phrase(),
            measure(
                criterion.threshold.unwrap_or_default(),
                criterion.unit.as_deref()
            )
        )
    } else if criterion.comparator == Comparator::IsFalse {
        format!("the absence of {}", lower_first(&criterion.description))
    } else {
        lower_first(&criterion.description)
    };

    match outcome {
        ClauseOutcome::Met(_) => None,
        ClauseOutcome::Missing => Some(format!(
            "Document {requirement} to support escalation to {target} (no {label} on record)"
        )),
        ClauseOutcome::Unmet(Observation::Number(value)) => Some(format!(
            "Document {requirement} to support escalation to {target} (currently {})",
            measure(*value, criterion.unit.as_deref())
        )),
        ClauseOutcome::Unmet(Observation::Flag(_)) => Some(format!(
            "Document {requirement} to support escalation to {target}"
        )),
        ClauseOutcome::Unreadable(raw) => Some(format!(
            "Recorded {label} value '{raw}' could not be read; document {requirement} to support escalation to {target}"
        )),
    }
}

fn measure(value: f64, unit: Option<&str>) -> String {
    match unit {
        None | Some("") => format!("{value}"),
        Some(unit) if unit.starts_with('%') => format!("{value}{unit}"),
        Some(unit) => format!("{value} {unit}"),
    }
}

/// Lowercase a leading capital unless it starts an acronym ("ABI", "eGFR").
fn lower_first(text: &str) -> String {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(first), Some(second)) if first.is_uppercase() && !second.is_uppercase() => {
            let mut lowered = first.to_lowercase().collect::<String>();
            lowered.push_str(&text[first.len_utf8()..]);
            lowered
        }
        _ => text.to_string(),
    }
}
