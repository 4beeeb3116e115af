use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use beacon_ledger::LedgerError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Ledger(LedgerError::NoRecords) => StatusCode::NOT_FOUND,
            Self::Ledger(LedgerError::Closed) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ServerError::Ledger(LedgerError::NoRecords).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::BadRequest("id".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::Ledger(LedgerError::SigningFailure("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
