use super::schedule::{CriteriaSchedule, ScheduleError};
use crate::config::RegistrySource;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;
use tracing::info;

const EMBEDDED_SCHEDULES: &str = include_str!("../../data/schedules.json");

/// Raised when a diagnostic code has no registered schedule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no rating schedule is registered for diagnostic code '{diagnostic_code}'")]
pub struct UnknownConditionError {
    pub diagnostic_code: String,
}

/// Failure to build a registry from its configuration source.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read rating schedules: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid rating schedule document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed rating schedule: {0}")]
    Schedule(#[from] ScheduleError),
    #[error("diagnostic code {0} is declared more than once")]
    DuplicateCode(String),
}

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    schedules: Vec<CriteriaSchedule>,
}

/// Immutable set of rating schedules keyed by diagnostic code.
#[derive(Debug, Clone, Default)]
pub struct CriteriaRegistry {
    schedules: BTreeMap<String, CriteriaSchedule>,
}

impl CriteriaRegistry {
    pub fn from_schedules(schedules: Vec<CriteriaSchedule>) -> Result<Self, RegistryError> {
        let mut indexed = BTreeMap::new();
        for schedule in schedules {
            schedule.validate()?;
            let code = schedule.diagnostic_code.trim().to_string();
            if indexed.contains_key(&code) {
                return Err(RegistryError::DuplicateCode(code));
            }
            indexed.insert(code, schedule);
        }

        Ok(Self {
            schedules: indexed,
        })
    }

    pub fn from_json_str(document: &str) -> Result<Self, RegistryError> {
        let document: RegistryDocument = serde_json::from_str(document)?;
        Self::from_schedules(document.schedules)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RegistryError> {
        let document: RegistryDocument = serde_json::from_reader(reader)?;
        Self::from_schedules(document.schedules)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Schedules shipped with the crate, parsed once per process.
    pub fn embedded() -> Result<&'static CriteriaRegistry, RegistryError> {
        static EMBEDDED: OnceLock<CriteriaRegistry> = OnceLock::new();
        if let Some(registry) = EMBEDDED.get() {
            return Ok(registry);
        }

        let registry = Self::from_json_str(EMBEDDED_SCHEDULES)?;
        Ok(EMBEDDED.get_or_init(|| registry))
    }

    pub fn load(source: &RegistrySource) -> Result<Self, RegistryError> {
        let registry = match source {
            RegistrySource::Embedded => Self::embedded()?.clone(),
            RegistrySource::File(path) => Self::from_path(path)?,
        };
        info!(source = %source, schedules = registry.len(), "rating schedules loaded");
        Ok(registry)
    }

    pub fn get(&self, diagnostic_code: &str) -> Result<&CriteriaSchedule, UnknownConditionError> {
        self.schedules
            .get(diagnostic_code.trim())
            .ok_or_else(|| UnknownConditionError {
                diagnostic_code: diagnostic_code.to_string(),
            })
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.schedules.keys().map(String::as_str)
    }

    pub fn schedules(&self) -> impl Iterator<Item = &CriteriaSchedule> {
        self.schedules.values()
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }
}
