use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Json;
use beacon_ledger::Ledger;
use beacon_types::{Record, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
}

impl AppState {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }
}

/// Selects which record `GET /` returns. At most one field may be set;
/// none means the latest record. Times accept unix milliseconds or RFC 3339.
#[derive(Debug, Default, Deserialize)]
pub struct RecordQuery {
    pub id: Option<u64>,
    pub before: Option<String>,
    pub after: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordResponse {
    pub record: Record,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KeyResponse {
    pub key: String,
    pub algorithm: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

enum Lookup {
    Latest,
    Id(u64),
    Before(Timestamp),
    After(Timestamp),
}

impl TryFrom<RecordQuery> for Lookup {
    type Error = ServerError;

    fn try_from(q: RecordQuery) -> ServerResult<Self> {
        let parse = |name: &str, raw: String| {
            raw.parse::<Timestamp>()
                .map_err(|e| ServerError::BadRequest(format!("{name}: {e}")))
        };
        match (q.id, q.before, q.after) {
            (None, None, None) => Ok(Self::Latest),
            (Some(id), None, None) => Ok(Self::Id(id)),
            (None, Some(t), None) => Ok(Self::Before(parse("before", t)?)),
            (None, None, Some(t)) => Ok(Self::After(parse("after", t)?)),
            _ => Err(ServerError::BadRequest(
                "use at most one of id, before, after".into(),
            )),
        }
    }
}

/// `GET /`: latest record, or the one selected by `id`, `before`, `after`.
pub async fn record_handler(
    State(state): State<AppState>,
    query: Result<Query<RecordQuery>, QueryRejection>,
) -> ServerResult<Json<RecordResponse>> {
    let Query(query) = query.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let lookup = Lookup::try_from(query)?;

    let ledger = Arc::clone(&state.ledger);
    let record = tokio::task::spawn_blocking(move || match lookup {
        Lookup::Latest => ledger.latest(),
        Lookup::Id(id) => ledger.select(id),
        Lookup::Before(t) => ledger.before(t),
        Lookup::After(t) => ledger.after(t),
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))??;

    Ok(Json(RecordResponse { record }))
}

/// `GET /key`: the public key records are signed with.
pub async fn key_handler(State(state): State<AppState>) -> Json<KeyResponse> {
    Json(KeyResponse {
        key: hex::encode(state.ledger.public_key()),
        algorithm: "ed25519".into(),
    })
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}
