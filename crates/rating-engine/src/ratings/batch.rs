use super::metrics::{EvidenceMetrics, MetricValue};
use super::DeterminationResult;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// One determination request: a diagnostic code plus its evidence bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeterminationRequest {
    pub request_id: String,
    pub diagnostic_code: String,
    #[serde(default)]
    pub metrics: EvidenceMetrics,
}

/// Per-request result of a batch run; unknown codes do not fail the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub request_id: String,
    pub diagnostic_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<DeterminationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BatchImportError {
    #[error("failed to read evidence export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid evidence CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("request {request_id} mixes diagnostic codes {first} and {second}")]
    ConflictingCode {
        request_id: String,
        first: String,
        second: String,
    },
}

/// Groups `request_id,diagnostic_code,metric,value` rows into determination requests.
pub struct EvidenceCsvImporter;

impl EvidenceCsvImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
    ) -> Result<Vec<DeterminationRequest>, BatchImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<DeterminationRequest>, BatchImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut requests: Vec<DeterminationRequest> = Vec::new();
        let mut positions: BTreeMap<String, usize> = BTreeMap::new();

        for record in csv_reader.deserialize::<EvidenceRow>() {
            let row = record?;
            let index = *positions.entry(row.request_id.clone()).or_insert_with(|| {
                requests.push(DeterminationRequest {
                    request_id: row.request_id.clone(),
                    diagnostic_code: row.diagnostic_code.clone(),
                    metrics: EvidenceMetrics::new(),
                });
                requests.len() - 1
            });
            let request = &mut requests[index];

            if request.diagnostic_code != row.diagnostic_code {
                return Err(BatchImportError::ConflictingCode {
                    request_id: row.request_id,
                    first: request.diagnostic_code.clone(),
                    second: row.diagnostic_code,
                });
            }

            if let (Some(metric), Some(value)) = (row.metric, row.value) {
                request.metrics.insert(metric, MetricValue::coerce(&value));
            }
        }

        Ok(requests)
    }
}

#[derive(Debug, Deserialize)]
struct EvidenceRow {
    request_id: String,
    diagnostic_code: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    metric: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    value: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratings::metrics::Reading;
    use std::io::Cursor;

    #[test]
    fn groups_rows_by_request_in_first_seen_order() {
        let csv = "request_id,diagnostic_code,metric,value\n\
claim-2,7530,lowestEgfr,25\n\
claim-1,7522,erectileDysfunctionDiagnosed,yes\n\
claim-2,7530,hasData,true\n";

        let requests = EvidenceCsvImporter::from_reader(Cursor::new(csv)).expect("import");

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].request_id, "claim-2");
        assert_eq!(requests[0].metrics.number("lowestEgfr"), Reading::Present(25.0));
        assert_eq!(requests[0].metrics.flag("hasData"), Reading::Present(true));
        assert_eq!(requests[1].diagnostic_code, "7522");
    }

    #[test]
    fn interleaved_rows_merge_into_their_requests() {
        let csv = "request_id,diagnostic_code,metric,value\n\
a,7101,diastolicPressure,112\n\
b,6845,fvcPercentPredicted,62\n\
c,8100,prostratingAttacksPerMonth,1\n\
a,7101,systolicPressure,165\n\
c,8100,prolongedAttacks,yes\n\
b,6845,dlcoPercentPredicted,70\n";

        let requests = EvidenceCsvImporter::from_reader(Cursor::new(csv)).expect("import");

        let ids: Vec<&str> = requests.iter().map(|r| r.request_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(requests.iter().all(|request| request.metrics.len() == 2));
        assert_eq!(requests[0].metrics.number("systolicPressure"), Reading::Present(165.0));
        assert_eq!(requests[2].metrics.flag("prolongedAttacks"), Reading::Present(true));
    }

    #[test]
    fn blank_metric_cells_declare_requests_without_evidence() {
        let csv = "request_id,diagnostic_code,metric,value\nclaim-9,8100,,\n";

        let requests = EvidenceCsvImporter::from_reader(Cursor::new(csv)).expect("import");

        assert_eq!(requests.len(), 1);
        assert!(requests[0].metrics.is_empty());
    }

    #[test]
    fn rejects_requests_that_mix_codes() {
        let csv = "request_id,diagnostic_code,metric,value\n\
claim-1,7530,lowestEgfr,25\n\
claim-1,7101,diastolicPressure,110\n";

        let error = EvidenceCsvImporter::from_reader(Cursor::new(csv)).expect_err("conflict");

        match error {
            BatchImportError::ConflictingCode { request_id, .. } => {
                assert_eq!(request_id, "claim-1")
            }
            other => panic!("expected conflicting code error, got {other:?}"),
        }
    }

    #[test]
    fn from_path_propagates_io_errors() {
        let error = EvidenceCsvImporter::from_path("./does-not-exist.csv").expect_err("io error");

        assert!(matches!(error, BatchImportError::Io(_)));
    }
}
