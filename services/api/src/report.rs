use crate::infra::{load_engine, parse_date, registry_source, with_as_of};
use crate::presentation::SeverityBucket;
use chrono::{Local, NaiveDate};
use clap::Args;
use rating_engine::config::AppConfig;
use rating_engine::error::AppError;
use rating_engine::ratings::{
    BatchOutcome, CriteriaSchedule, DeterminationResult, EvidenceCsvImporter, EvidenceMetrics,
    MatchBasis, RawRating, Rating, RatingEngine, ScheduleKind,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct DetermineArgs {
    /// Diagnostic code of the condition to rate
    #[arg(long)]
    pub(crate) code: String,
    /// JSON file holding the evidence metrics object
    #[arg(long)]
    pub(crate) metrics: PathBuf,
    /// Reference date for treatment windows (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
    /// Rating currently held, checked against the supported rating
    #[arg(long)]
    pub(crate) current_rating: Option<String>,
    /// Load rating schedules from a JSON file instead of the embedded set
    #[arg(long)]
    pub(crate) schedules: Option<PathBuf>,
    /// Print the reference card as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct BatchArgs {
    /// Evidence export with request_id,diagnostic_code,metric,value columns
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Reference date applied to requests without an asOf metric
    #[arg(long, value_parser = parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
    /// Load rating schedules from a JSON file instead of the embedded set
    #[arg(long)]
    pub(crate) schedules: Option<PathBuf>,
    /// Print the outcomes as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct SchedulesArgs {
    /// Load rating schedules from a JSON file instead of the embedded set
    #[arg(long)]
    pub(crate) schedules: Option<PathBuf>,
}

/// Reference card payload: the determination plus its display bucket.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ReferenceCard {
    pub(crate) diagnostic_code: String,
    pub(crate) title: String,
    pub(crate) cfr_reference: String,
    pub(crate) supported_rating: Rating,
    pub(crate) rating_label: String,
    pub(crate) severity: SeverityBucket,
    pub(crate) basis: MatchBasis,
    pub(crate) rationale: Vec<String>,
    pub(crate) evidence_gaps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) disclaimer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) current_rating_supported: Option<bool>,
}

impl ReferenceCard {
    pub(crate) fn build(
        schedule: &CriteriaSchedule,
        result: DeterminationResult,
        current_rating: Option<&RawRating>,
    ) -> Self {
        let current_rating_supported = current_rating.map(|current| result.supports(Some(current)));
        Self {
            diagnostic_code: result.diagnostic_code,
            title: schedule.title.clone(),
            cfr_reference: schedule.cfr_reference.clone(),
            rating_label: result.supported_rating.label(),
            severity: SeverityBucket::from_rating(&result.supported_rating),
            supported_rating: result.supported_rating,
            basis: result.basis,
            rationale: result.rationale,
            evidence_gaps: result.evidence_gaps,
            note: schedule.note.clone(),
            disclaimer: schedule.disclaimer.clone(),
            current_rating_supported,
        }
    }
}

/// Determine one condition and build its reference card.
pub(crate) fn reference_card(
    engine: &RatingEngine,
    diagnostic_code: &str,
    metrics: &EvidenceMetrics,
    current_rating: Option<&RawRating>,
) -> Result<ReferenceCard, AppError> {
    let schedule = engine.registry().get(diagnostic_code)?;
    let result = engine.determine(diagnostic_code, metrics)?;
    Ok(ReferenceCard::build(schedule, result, current_rating))
}

fn cli_engine(schedules: Option<PathBuf>) -> Result<RatingEngine, AppError> {
    let config = AppConfig::load()?;
    load_engine(&registry_source(schedules, Some(&config)))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub(crate) fn run_determine(args: DetermineArgs) -> Result<(), AppError> {
    let DetermineArgs {
        code,
        metrics,
        as_of,
        current_rating,
        schedules,
        json,
    } = args;

    let engine = cli_engine(schedules)?;
    let raw = std::fs::read_to_string(&metrics)?;
    let evidence: EvidenceMetrics = serde_json::from_str(&raw).map_err(|err| {
        AppError::InvalidInput(format!(
            "{} is not a JSON metrics object ({err})",
            metrics.display()
        ))
    })?;
    let evidence = with_as_of(evidence, Some(as_of.unwrap_or_else(today)));
    let current_rating = current_rating.map(RawRating::Text);

    let card = reference_card(&engine, &code, &evidence, current_rating.as_ref())?;
    if json {
        print_json(&card)?;
    } else {
        render_card(&card);
    }

    Ok(())
}

pub(crate) fn run_batch(args: BatchArgs) -> Result<(), AppError> {
    let BatchArgs {
        csv,
        as_of,
        schedules,
        json,
    } = args;

    let engine = cli_engine(schedules)?;
    let as_of = as_of.unwrap_or_else(today);
    let mut requests = EvidenceCsvImporter::from_path(&csv)?;
    for request in &mut requests {
        request.metrics = with_as_of(std::mem::take(&mut request.metrics), Some(as_of));
    }

    let outcomes = engine.determine_batch(&requests);
    if json {
        print_json(&outcomes)?;
    } else {
        render_batch(&outcomes);
    }

    Ok(())
}

pub(crate) fn run_schedules(args: SchedulesArgs) -> Result<(), AppError> {
    let engine = cli_engine(args.schedules)?;

    println!("Registered rating schedules ({})", engine.registry().len());
    for schedule in engine.registry().schedules() {
        let tiers: Vec<String> = schedule
            .tiers
            .iter()
            .map(|tier| match tier.extremity {
                Some(extremity) => format!("{} {}", tier.percent.label(), extremity.label()),
                None => tier.percent.label(),
            })
            .collect();
        println!(
            "- DC {} {} [{}] ({}): {}",
            schedule.diagnostic_code,
            schedule.title,
            kind_label(&schedule.kind),
            schedule.cfr_reference,
            tiers.join(" / ")
        );
    }

    Ok(())
}

fn kind_label(kind: &ScheduleKind) -> &'static str {
    match kind {
        ScheduleKind::Graduated => "graduated",
        ScheduleKind::Banded { .. } => "banded",
        ScheduleKind::Flat => "flat",
        ScheduleKind::ZeroPercent => "zero percent",
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::InvalidInput(format!("output could not be rendered ({err})")))?;
    println!("{rendered}");
    Ok(())
}

pub(crate) fn render_card(card: &ReferenceCard) {
    println!(
        "DC {} {} ({})",
        card.diagnostic_code, card.title, card.cfr_reference
    );
    println!(
        "Supported rating: {} | severity {}",
        card.rating_label, card.severity
    );
    if let Some(supported) = card.current_rating_supported {
        let verdict = if supported { "supported" } else { "not supported" };
        println!("Current rating: {verdict}");
    }

    if !card.rationale.is_empty() {
        println!("Rationale:");
        for line in &card.rationale {
            println!("  - {line}");
        }
    }
    if !card.evidence_gaps.is_empty() {
        println!("Evidence gaps:");
        for gap in &card.evidence_gaps {
            println!("  - {gap}");
        }
    }
    if let Some(note) = &card.note {
        println!("Note: {note}");
    }
    if let Some(disclaimer) = &card.disclaimer {
        println!("Disclaimer: {disclaimer}");
    }
}

fn render_batch(outcomes: &[BatchOutcome]) {
    println!("Batch determination ({} requests)", outcomes.len());
    for outcome in outcomes {
        match (&outcome.result, &outcome.error) {
            (Some(result), _) => println!(
                "- {} DC {}: {} ({} severity, {} gap(s))",
                outcome.request_id,
                outcome.diagnostic_code,
                result.supported_rating.label(),
                SeverityBucket::from_rating(&result.supported_rating),
                result.evidence_gaps.len()
            ),
            (None, Some(error)) => println!(
                "- {} DC {}: skipped ({error})",
                outcome.request_id, outcome.diagnostic_code
            ),
            (None, None) => println!(
                "- {} DC {}: no result",
                outcome.request_id, outcome.diagnostic_code
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedded() -> RatingEngine {
        RatingEngine::embedded().expect("embedded schedules load")
    }

    #[test]
    fn reference_card_carries_severity_and_schedule_text() {
        let metrics = EvidenceMetrics::new().with("lowestEgfr", 25);

        let card = reference_card(&embedded(), "7530", &metrics, Some(&"80".into()))
            .expect("known code");

        assert_eq!(card.rating_label, "80%");
        assert_eq!(card.severity, SeverityBucket::High);
        assert_eq!(card.title, "Chronic kidney disease");
        assert_eq!(card.current_rating_supported, Some(true));
        assert!(card.note.is_some());
    }

    #[test]
    fn reference_card_maps_unknown_codes_to_not_found() {
        let error = reference_card(&embedded(), "9999", &EvidenceMetrics::new(), None)
            .expect_err("unknown code");

        assert_eq!(error.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn as_of_reaches_the_treatment_window() {
        let date = parse_date("2026-05-01").expect("valid date");
        let metrics = with_as_of(
            EvidenceMetrics::new().with("treatmentEndDate", "2026-02-01"),
            Some(date),
        );

        let card = reference_card(&embedded(), "9918", &metrics, None).expect("known code");

        assert_eq!(card.supported_rating, Rating::Exact(100));
        assert_eq!(card.severity, SeverityBucket::Total);
        assert!(card.disclaimer.is_some());
    }
}
