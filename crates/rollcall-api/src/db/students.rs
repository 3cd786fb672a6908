//! Roster mirror persistence operations.
//!
//! The roster itself is owned elsewhere; this table mirrors the enrolled
//! students so the ledger can reference them. Withdrawn students keep their
//! row, since history still points at it, with `enrolled = FALSE`.

use rollcall_core::{ClassId, Student, StudentId};
use sqlx::PgPool;

/// Enroll a student, or move an enrolled student to a new class.
pub async fn upsert(pool: &PgPool, student: &Student) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO students (id, class_id, enrolled) VALUES ($1, $2, TRUE)
         ON CONFLICT (id) DO UPDATE SET class_id = EXCLUDED.class_id, enrolled = TRUE",
    )
    .bind(student.id.get())
    .bind(student.enrolled_class_id.get())
    .execute(pool)
    .await?;

    Ok(())
}

/// Every enrolled student, ordered by id.
pub async fn list_enrolled(pool: &PgPool) -> Result<Vec<Student>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StudentRow>(
        "SELECT id, class_id FROM students WHERE enrolled ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(StudentRow::into_student).collect())
}

/// One enrolled student.
pub async fn get_enrolled(pool: &PgPool, id: StudentId) -> Result<Option<Student>, sqlx::Error> {
    let row = sqlx::query_as::<_, StudentRow>(
        "SELECT id, class_id FROM students WHERE id = $1 AND enrolled",
    )
    .bind(id.get())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(StudentRow::into_student))
}

#[derive(sqlx::FromRow)]
struct StudentRow {
    id: i64,
    class_id: i64,
}

impl StudentRow {
    fn into_student(self) -> Student {
        Student::new(StudentId::new(self.id), ClassId::new(self.class_id))
    }
}
