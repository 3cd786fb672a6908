//! # Credential Issuance API
//!
//! Issues a fresh credential for an enrolled student. Issuing again
//! replaces the previous secret, so an older printed code stops working.

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use rollcall_core::StudentId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::extract_path;
use crate::state::AppState;

/// A newly issued credential. The secret is shown once; render it into
/// the student's code.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialResponse {
    pub student_id: i64,
    pub secret_value: String,
}

#[utoipa::path(
    post,
    path = "/v1/students/{student_id}/credential",
    params(("student_id" = i64, Path, description = "Student identifier")),
    responses(
        (status = 201, description = "Credential issued, previous one revoked", body = CredentialResponse),
        (status = 404, description = "Student not enrolled", body = crate::error::ErrorBody),
    ),
    tag = "credentials"
)]
pub async fn issue_credential(
    State(state): State<AppState>,
    caller: CallerIdentity,
    student_id: Result<Path<i64>, PathRejection>,
) -> Result<(StatusCode, Json<CredentialResponse>), AppError> {
    require_role(&caller, Role::Admin)?;
    let student_id = StudentId::new(extract_path(student_id)?);
    let secret_value = state.ledger.credentials().issue(student_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(CredentialResponse {
            student_id: student_id.get(),
            secret_value,
        }),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/students/{student_id}/credential", post(issue_credential))
}
