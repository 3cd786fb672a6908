//! Credential persistence operations.
//!
//! All functions take a `&PgPool` and operate on the `credentials` table,
//! which holds at most one row per student.

use chrono::{DateTime, Utc};
use rollcall_core::StudentId;
use rollcall_ledger::Credential;
use sqlx::PgPool;

/// Store a credential, replacing the student's previous one.
pub async fn upsert(pool: &PgPool, credential: &Credential) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO credentials (student_id, secret_value, issued_at)
         VALUES ($1, $2, $3)
         ON CONFLICT (student_id) DO UPDATE
             SET secret_value = EXCLUDED.secret_value, issued_at = EXCLUDED.issued_at",
    )
    .bind(credential.student_id.get())
    .bind(&credential.secret_value)
    .bind(credential.issued_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch the current credential of a student.
pub async fn get(pool: &PgPool, student_id: StudentId) -> Result<Option<Credential>, sqlx::Error> {
    let row = sqlx::query_as::<_, CredentialRow>(
        "SELECT student_id, secret_value, issued_at FROM credentials WHERE student_id = $1",
    )
    .bind(student_id.get())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(CredentialRow::into_credential))
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    student_id: i64,
    secret_value: String,
    issued_at: DateTime<Utc>,
}

impl CredentialRow {
    fn into_credential(self) -> Credential {
        Credential {
            student_id: StudentId::new(self.student_id),
            secret_value: self.secret_value,
            issued_at: self.issued_at,
        }
    }
}
