//! # Check-In API
//!
//! A scanning device posts the secret read from a student's code. The
//! ledger resolves the student, upgrades today's row to `present` and
//! reports whether the student had already been marked.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

/// Scanned credential.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CheckInRequest {
    /// Secret value rendered into the student's code.
    pub credential: String,
}

impl Validate for CheckInRequest {
    fn validate(&self) -> Result<(), String> {
        if self.credential.trim().is_empty() {
            return Err("credential must not be empty".into());
        }
        Ok(())
    }
}

/// Outcome of a check-in.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckInResponse {
    pub student_id: i64,
    /// `true` when the row was already `present`; nothing was written.
    pub already_present: bool,
}

#[utoipa::path(
    post,
    path = "/v1/check-in",
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Student marked present", body = CheckInResponse),
        (status = 400, description = "Missing credential", body = crate::error::ErrorBody),
        (status = 401, description = "Credential is not current", body = crate::error::ErrorBody),
        (status = 404, description = "Student no longer enrolled", body = crate::error::ErrorBody),
        (status = 503, description = "Store unavailable, retry later", body = crate::error::ErrorBody),
    ),
    tag = "attendance"
)]
pub async fn check_in(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CheckInRequest>, JsonRejection>,
) -> Result<Json<CheckInResponse>, AppError> {
    require_role(&caller, Role::Teacher)?;
    let req = extract_validated_json(body)?;
    let outcome = state.ledger.check_in().check_in(req.credential.trim()).await?;
    Ok(Json(CheckInResponse {
        student_id: outcome.student_id.get(),
        already_present: outcome.already_present,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/check-in", post(check_in))
}
