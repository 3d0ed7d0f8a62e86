//! Analysis API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use tracing::info;

use super::auth::ApiUser;
use crate::analysis::{self, AnalysisError};

#[derive(Deserialize)]
pub struct AnalyzeBody {
    note: String,
}

pub(crate) fn analysis_error_to_status(err: &AnalysisError) -> StatusCode {
    match err {
        AnalysisError::EmptyNote => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

/// `POST /api/analysis` — documentation suggestions for a clinical note.
pub async fn analyze_note(user: ApiUser, Json(body): Json<AnalyzeBody>) -> Response {
    match analysis::analyze(&body.note) {
        Ok(report) => {
            info!(uid = %user.identity.uid, words = report.word_count, "note analyzed");
            user.visitor.respond(Json(report))
        }
        Err(e) => {
            let status = analysis_error_to_status(&e);
            let body = Json(serde_json::json!({ "error": "E_EMPTY_NOTE", "message": e.to_string() }));
            user.visitor.respond((status, body).into_response())
        }
    }
}

#[cfg(test)]
#[path = "analysis_test.rs"]
mod tests;
