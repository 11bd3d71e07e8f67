use rating_engine::ratings::{
    EvidenceCsvImporter, Extremity, MatchBasis, NamedRating, Rating, RatingEngine,
};

#[test]
fn claim_evidence_export_rates_every_request() {
    let data = include_bytes!("fixtures/claim_evidence.csv");
    let requests = EvidenceCsvImporter::from_reader(&data[..]).expect("evidence imports");
    let engine = RatingEngine::embedded().expect("embedded schedules load");

    let outcomes = engine.determine_batch(&requests);

    assert_eq!(outcomes.len(), 7);
    let rating = |id: &str| {
        outcomes
            .iter()
            .find(|outcome| outcome.request_id == id)
            .and_then(|outcome| outcome.result.as_ref())
            .map(|result| result.supported_rating.clone())
    };

    assert_eq!(rating("claim-101"), Some(Rating::Exact(80)));
    assert_eq!(rating("claim-102"), Some(Rating::Exact(50)));
    assert_eq!(rating("claim-103"), Some(Rating::Exact(100)));
    assert_eq!(rating("claim-104"), Some(Rating::Exact(0)));
    assert_eq!(rating("claim-105"), Some(Rating::Unrated));
    assert_eq!(rating("claim-107"), Some(Rating::Exact(10)));

    let unknown = outcomes
        .iter()
        .find(|outcome| outcome.request_id == "claim-106")
        .expect("unknown code outcome kept");
    assert!(unknown.result.is_none());
    assert!(unknown.error.as_deref().unwrap_or_default().contains("1234"));
}

#[test]
fn imported_rows_keep_their_request_grouping() {
    let data = include_bytes!("fixtures/claim_evidence.csv");

    let requests = EvidenceCsvImporter::from_reader(&data[..]).expect("evidence imports");

    let ids: Vec<&str> = requests.iter().map(|request| request.request_id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "claim-101",
            "claim-102",
            "claim-103",
            "claim-104",
            "claim-105",
            "claim-106",
            "claim-107"
        ]
    );
    assert_eq!(requests[1].metrics.len(), 2);
    assert!(requests[4].metrics.is_empty());
}

#[test]
fn major_extremity_rows_are_honored() {
    let csv = "request_id,diagnostic_code,metric,value\n\
r1,8515,extremity,major\n\
r1,8515,completeParalysis,true\n";
    let requests = EvidenceCsvImporter::from_reader(csv.as_bytes()).expect("imports");
    let engine = RatingEngine::embedded().expect("embedded schedules load");

    let outcome = &engine.determine_batch(&requests)[0];
    let result = outcome.result.as_ref().expect("rated");

    assert_eq!(result.extremity, Some(Extremity::Major));
    assert_eq!(result.supported_rating, Rating::Exact(70));
}

#[test]
fn residual_ratings_follow_an_expired_treatment_window() {
    let csv = "request_id,diagnostic_code,metric,value\n\
r1,9918,treatmentEndDate,2025-01-10\n\
r1,9918,asOf,2026-10-18\n";
    let requests = EvidenceCsvImporter::from_reader(csv.as_bytes()).expect("imports");
    let engine = RatingEngine::embedded().expect("embedded schedules load");

    let outcome = &engine.determine_batch(&requests)[0];
    let result = outcome.result.as_ref().expect("rated");

    assert_eq!(result.basis, MatchBasis::MinimumEvidence);
    assert_eq!(result.supported_rating, Rating::Named(NamedRating::Varies));
}
