use crate::config::ConfigError;
use crate::ratings::{BatchImportError, DeterminationError, RegistryError};
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Registry(RegistryError),
    Import(BatchImportError),
    Determination(DeterminationError),
    InvalidInput(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Registry(err) => write!(f, "registry error: {}", err),
            AppError::Import(err) => write!(f, "import error: {}", err),
            AppError::Determination(err) => write!(f, "determination error: {}", err),
            AppError::InvalidInput(message) => write!(f, "invalid input: {}", message),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Registry(err) => Some(err),
            AppError::Import(err) => Some(err),
            AppError::Determination(err) => Some(err),
            AppError::InvalidInput(_) => None,
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Determination(DeterminationError::UnknownCondition(_)) => {
                StatusCode::NOT_FOUND
            }
            AppError::Import(_)
            | AppError::InvalidInput(_)
            | AppError::Determination(DeterminationError::NotSidePaired(_)) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Registry(_)
            | AppError::Determination(DeterminationError::Registry(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<RegistryError> for AppError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl From<BatchImportError> for AppError {
    fn from(value: BatchImportError) -> Self {
        Self::Import(value)
    }
}

impl From<DeterminationError> for AppError {
    fn from(value: DeterminationError) -> Self {
        Self::Determination(value)
    }
}

impl From<crate::ratings::UnknownConditionError> for AppError {
    fn from(value: crate::ratings::UnknownConditionError) -> Self {
        Self::Determination(DeterminationError::UnknownCondition(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratings::UnknownConditionError;

    #[test]
    fn unknown_condition_maps_to_not_found() {
        let error = AppError::from(UnknownConditionError {
            diagnostic_code: "9999".to_string(),
        });

        assert_eq!(error.status(), StatusCode::NOT_FOUND);
        assert!(error.to_string().contains("9999"));
    }

    #[test]
    fn invalid_input_maps_to_bad_request() {
        let response = AppError::InvalidInput("metrics must be a JSON object".to_string())
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn side_request_for_unpaired_schedule_maps_to_bad_request() {
        let error = AppError::from(DeterminationError::NotSidePaired("7530".to_string()));

        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert!(error.to_string().contains("not evaluated per side"));
    }
}
