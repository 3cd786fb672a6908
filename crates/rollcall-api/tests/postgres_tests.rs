//! Ledger scenarios against the PostgreSQL backend.
//!
//! These exercise the `ON CONFLICT` statements behind [`PgStore`] and need a
//! live database:
//!
//! ```text
//! DATABASE_URL=postgres://... cargo test -p rollcall-api --test postgres_tests -- --ignored
//! ```
//!
//! Each test migrates a fresh schema, so they can share one database and
//! run in parallel.

use std::sync::Arc;

use rollcall_api::db::{self, PgStore};
use rollcall_core::{AttendanceStatus, ClassId, DayClock, SchoolDay, Student, StudentId};
use rollcall_ledger::{
    AttendanceStore, ChangeBroadcaster, CredentialSigner, Ledger, LedgerParts, PresenceWrite,
    WeekdayCalendar,
};
use serde_json::json;
use sqlx::postgres::{PgPool, PgPoolOptions};

struct TestDb {
    pool: PgPool,
    schema: String,
}

impl TestDb {
    async fn new() -> Self {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let schema = format!("rollcall_test_{}", uuid::Uuid::new_v4().simple());

        let admin = PgPool::connect(&url).await.unwrap();
        sqlx::query(&format!("CREATE SCHEMA {schema}"))
            .execute(&admin)
            .await
            .unwrap();
        admin.close().await;

        let search_path = format!("SET search_path TO {schema}");
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .after_connect(move |conn, _meta| {
                let search_path = search_path.clone();
                Box::pin(async move {
                    sqlx::query(&search_path).execute(&mut *conn).await?;
                    Ok(())
                })
            })
            .connect(&url)
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        Self { pool, schema }
    }

    async fn enroll(&self, students: &[Student]) {
        for student in students {
            db::students::upsert(&self.pool, student).await.unwrap();
        }
    }

    fn store(&self) -> PgStore {
        PgStore::new(self.pool.clone())
    }

    fn ledger(&self, today: SchoolDay) -> Ledger {
        let store = self.store();
        Ledger::new(LedgerParts {
            store: Arc::new(store.clone()),
            roster: Arc::new(store.clone()),
            credentials: Arc::new(store),
            calendar: Arc::new(WeekdayCalendar::new()),
            signer: CredentialSigner::generate(),
            clock: DayClock::default().pinned(today),
            broadcaster: ChangeBroadcaster::default(),
        })
    }

    async fn drop_schema(self) {
        sqlx::query(&format!("DROP SCHEMA {} CASCADE", self.schema))
            .execute(&self.pool)
            .await
            .unwrap();
        self.pool.close().await;
    }
}

fn day(s: &str) -> SchoolDay {
    SchoolDay::parse(s).unwrap()
}

fn student(id: i64, class: i64) -> Student {
    Student::new(StudentId::new(id), ClassId::new(class))
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn replayed_check_in_transitions_once() {
    let db = TestDb::new().await;
    db.enroll(&[student(42, 7)]).await;
    let ledger = db.ledger(day("2025-03-10"));
    ledger.generator().ensure_day(day("2025-03-10")).await.unwrap();

    let secret = ledger.credentials().issue(StudentId::new(42)).await.unwrap();
    let first = ledger.check_in().check_in(&secret).await.unwrap();
    let replay = ledger.check_in().check_in(&secret).await.unwrap();
    assert!(!first.already_present);
    assert!(replay.already_present);

    let rows = ledger.list_day(day("2025-03-10"), None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, AttendanceStatus::Present);

    db.drop_schema().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_presence_writes_change_the_row_once() {
    let db = TestDb::new().await;
    let s = student(42, 7);
    db.enroll(&[s]).await;
    let store = db.store();
    assert!(store.insert_pending(&s, day("2025-03-10")).await.unwrap());

    let writes = race_presence_writes(&store, s, day("2025-03-10"), 8).await;
    let changed = writes.iter().filter(|w| w.changed()).count();
    assert_eq!(changed, 1, "{writes:?}");
    assert!(writes.contains(&PresenceWrite::Upgraded {
        from: AttendanceStatus::Pending
    }));

    db.drop_schema().await;
}

async fn race_presence_writes(
    store: &PgStore,
    s: Student,
    day: SchoolDay,
    n: usize,
) -> Vec<PresenceWrite> {
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.mark_present(&s, day).await })
        })
        .collect();
    let mut writes = Vec::with_capacity(n);
    for handle in handles {
        writes.push(handle.await.unwrap().unwrap());
    }
    writes
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn check_in_without_generated_row_creates_it() {
    let db = TestDb::new().await;
    let s = student(42, 7);
    db.enroll(&[s]).await;
    let store = db.store();

    assert_eq!(
        store.mark_present(&s, day("2025-03-10")).await.unwrap(),
        PresenceWrite::Created
    );
    // Generation afterwards must not reset the row.
    assert!(!store.insert_pending(&s, day("2025-03-10")).await.unwrap());
    let row = store
        .get(StudentId::new(42), day("2025-03-10"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, AttendanceStatus::Present);

    db.drop_schema().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn override_after_check_in_wins_and_check_in_upgrades_sick() {
    let db = TestDb::new().await;
    db.enroll(&[student(42, 7)]).await;
    let ledger = db.ledger(day("2025-03-10"));
    let store = db.store();
    let secret = ledger.credentials().issue(StudentId::new(42)).await.unwrap();

    ledger.check_in().check_in(&secret).await.unwrap();
    let batch = ledger
        .overrides()
        .apply_batch(&[json!({"studentId": 42, "day": "2025-03-10", "status": "sick"})])
        .await
        .unwrap();
    assert_eq!(batch.applied, 1);
    let row = store
        .get(StudentId::new(42), day("2025-03-10"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, AttendanceStatus::Sick);

    // Replaying the same override is an upsert, not a second row.
    ledger
        .overrides()
        .apply_batch(&[json!({"studentId": 42, "day": "2025-03-10", "status": "sick"})])
        .await
        .unwrap();
    assert_eq!(ledger.list_day(day("2025-03-10"), None).await.unwrap().len(), 1);

    assert_eq!(
        store.mark_present(&student(42, 7), day("2025-03-10")).await.unwrap(),
        PresenceWrite::Upgraded {
            from: AttendanceStatus::Sick
        }
    );

    db.drop_schema().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn override_keeps_the_class_of_an_existing_row() {
    let db = TestDb::new().await;
    db.enroll(&[student(42, 7)]).await;
    let store = db.store();
    store.insert_pending(&student(42, 7), day("2025-03-10")).await.unwrap();

    // Student moved to class 8 after the row was generated.
    db.enroll(&[student(42, 8)]).await;
    let record = store
        .upsert_status(&student(42, 8), day("2025-03-10"), AttendanceStatus::Excused)
        .await
        .unwrap();
    assert_eq!(record.class_id, ClassId::new(7));
    assert_eq!(record.status, AttendanceStatus::Excused);

    db.drop_schema().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn repeated_generation_creates_rows_once() {
    let db = TestDb::new().await;
    db.enroll(&[student(43, 7), student(42, 8), student(50, 7)]).await;
    let ledger = db.ledger(day("2025-03-10"));

    let (a, b) = tokio::join!(
        ledger.generator().ensure_day(day("2025-03-10")),
        ledger.generator().ensure_day(day("2025-03-10"))
    );
    assert_eq!(a.unwrap().created_count + b.unwrap().created_count, 3);
    let again = ledger.generator().ensure_day(day("2025-03-10")).await.unwrap();
    assert_eq!(again.created_count, 0);

    let rows = ledger.list_day(day("2025-03-10"), None).await.unwrap();
    // Ordered by student, not grouped by class.
    let ids: Vec<i64> = rows.iter().map(|r| r.student_id.get()).collect();
    assert_eq!(ids, vec![42, 43, 50]);
    assert!(rows.iter().all(|r| r.status == AttendanceStatus::Pending));

    let class_8 = ledger
        .list_day(day("2025-03-10"), Some(ClassId::new(8)))
        .await
        .unwrap();
    assert_eq!(class_8.len(), 1);

    db.drop_schema().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn unknown_student_is_a_foreign_key_rejection() {
    let db = TestDb::new().await;
    let store = db.store();

    let err = store
        .insert_pending(&student(99, 7), day("2025-03-10"))
        .await
        .unwrap_err();
    assert_eq!(err, rollcall_ledger::StoreError::UnknownStudent(StudentId::new(99)));

    db.drop_schema().await;
}
