//! Liveness reporting for the stock ledger service

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub service: String,
    pub status: String,
    pub version: String,
    pub ledger_database: String,
    pub environment: String,
}

/// Report whether the ledger database is reachable alongside build info
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database_up = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();
    let (status, ledger_database) = summarize(database_up);

    Json(HealthResponse {
        service: "stockroom".to_string(),
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ledger_database: ledger_database.to_string(),
        environment: state.config.environment.clone(),
    })
}

/// A service that cannot reach its ledger still answers, but degraded
fn summarize(database_up: bool) -> (&'static str, &'static str) {
    if database_up {
        ("ok", "reachable")
    } else {
        ("degraded", "unreachable")
    }
}

#[cfg(test)]
mod tests {
    use super::summarize;

    #[test]
    fn health_degrades_when_ledger_is_unreachable() {
        assert_eq!(summarize(true), ("ok", "reachable"));
        assert_eq!(summarize(false), ("degraded", "unreachable"));
    }
}
