//! # In-Memory Backend
//!
//! A single [`MemoryStore`] implements the roster, attendance and credential
//! seams for development and tests. State lives behind one
//! `parking_lot::RwLock`; each conditional write runs entirely under the
//! write guard, so check-then-write is never split across two lock
//! acquisitions. The lock is never held across an `.await`.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use rollcall_core::{
    AttendanceRecord, AttendanceStatus, ClassId, SchoolDay, Student, StudentId,
};

use crate::error::StoreError;
use crate::store::{AttendanceStore, Credential, CredentialRepository, PresenceWrite, Roster};

#[derive(Debug, Default)]
struct Inner {
    students: BTreeMap<StudentId, Student>,
    credentials: HashMap<StudentId, Credential>,
    // Keyed day-first so a day's ledger is one contiguous range.
    attendance: BTreeMap<(SchoolDay, StudentId), AttendanceRecord>,
}

/// Thread-safe, cloneable in-memory backend. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose roster contains `students`.
    pub fn with_roster(students: impl IntoIterator<Item = Student>) -> Self {
        let store = Self::new();
        for student in students {
            store.enroll(student);
        }
        store
    }

    /// Add or move a student in the roster.
    pub fn enroll(&self, student: Student) {
        self.inner.write().students.insert(student.id, student);
    }

    /// Remove a student from the roster. Existing ledger rows are kept.
    pub fn withdraw(&self, id: StudentId) -> Option<Student> {
        self.inner.write().students.remove(&id)
    }

    /// Number of ledger rows across all days.
    pub fn record_count(&self) -> usize {
        self.inner.read().attendance.len()
    }
}

#[async_trait]
impl Roster for MemoryStore {
    async fn enrolled_students(&self) -> Result<Vec<Student>, StoreError> {
        Ok(self.inner.read().students.values().copied().collect())
    }

    async fn student(&self, id: StudentId) -> Result<Option<Student>, StoreError> {
        Ok(self.inner.read().students.get(&id).copied())
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn insert_pending(&self, student: &Student, day: SchoolDay) -> Result<bool, StoreError> {
        let mut guard = self.inner.write();
        if !guard.students.contains_key(&student.id) {
            return Err(StoreError::UnknownStudent(student.id));
        }
        let key = (day, student.id);
        if guard.attendance.contains_key(&key) {
            return Ok(false);
        }
        guard
            .attendance
            .insert(key, AttendanceRecord::pending(student, day));
        Ok(true)
    }

    async fn mark_present(
        &self,
        student: &Student,
        day: SchoolDay,
    ) -> Result<PresenceWrite, StoreError> {
        let mut guard = self.inner.write();
        if !guard.students.contains_key(&student.id) {
            return Err(StoreError::UnknownStudent(student.id));
        }
        match guard.attendance.entry((day, student.id)) {
            Entry::Occupied(entry) if entry.get().status == AttendanceStatus::Present => {
                Ok(PresenceWrite::AlreadyPresent)
            }
            Entry::Occupied(mut entry) => {
                let from = entry.get().status;
                entry.get_mut().status = AttendanceStatus::Present;
                Ok(PresenceWrite::Upgraded { from })
            }
            Entry::Vacant(slot) => {
                let mut row = AttendanceRecord::pending(student, day);
                row.status = AttendanceStatus::Present;
                slot.insert(row);
                Ok(PresenceWrite::Created)
            }
        }
    }

    async fn upsert_status(
        &self,
        student: &Student,
        day: SchoolDay,
        status: AttendanceStatus,
    ) -> Result<AttendanceRecord, StoreError> {
        let mut guard = self.inner.write();
        if !guard.students.contains_key(&student.id) {
            return Err(StoreError::UnknownStudent(student.id));
        }
        let row = guard
            .attendance
            .entry((day, student.id))
            .or_insert_with(|| AttendanceRecord::pending(student, day));
        row.status = status;
        Ok(*row)
    }

    async fn get(
        &self,
        student_id: StudentId,
        day: SchoolDay,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        Ok(self.inner.read().attendance.get(&(day, student_id)).copied())
    }

    async fn list_day(
        &self,
        day: SchoolDay,
        class_id: Option<ClassId>,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let guard = self.inner.read();
        let lower = (day, StudentId::new(i64::MIN));
        let upper = (day, StudentId::new(i64::MAX));
        Ok(guard
            .attendance
            .range(lower..=upper)
            .map(|(_, row)| *row)
            .filter(|row| class_id.map_or(true, |c| row.class_id == c))
            .collect())
    }
}

#[async_trait]
impl CredentialRepository for MemoryStore {
    async fn put(&self, credential: Credential) -> Result<(), StoreError> {
        self.inner
            .write()
            .credentials
            .insert(credential.student_id, credential);
        Ok(())
    }

    async fn get(&self, student_id: StudentId) -> Result<Option<Credential>, StoreError> {
        Ok(self.inner.read().credentials.get(&student_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn student(id: i64, class: i64) -> Student {
        Student::new(StudentId::new(id), ClassId::new(class))
    }

    fn monday() -> SchoolDay {
        SchoolDay::parse("2025-03-10").unwrap()
    }

    #[tokio::test]
    async fn insert_pending_is_conditional() {
        let s = student(42, 1);
        let store = MemoryStore::with_roster([s]);
        assert!(store.insert_pending(&s, monday()).await.unwrap());
        assert!(!store.insert_pending(&s, monday()).await.unwrap());
        assert_eq!(store.record_count(), 1);
    }

    #[tokio::test]
    async fn insert_pending_rejects_unenrolled() {
        let store = MemoryStore::new();
        let err = store.insert_pending(&student(5, 1), monday()).await.unwrap_err();
        assert_eq!(err, StoreError::UnknownStudent(StudentId::new(5)));
    }

    #[tokio::test]
    async fn mark_present_transitions_once() {
        let s = student(42, 1);
        let store = MemoryStore::with_roster([s]);
        store.insert_pending(&s, monday()).await.unwrap();

        let first = store.mark_present(&s, monday()).await.unwrap();
        assert_eq!(
            first,
            PresenceWrite::Upgraded {
                from: AttendanceStatus::Pending
            }
        );
        let second = store.mark_present(&s, monday()).await.unwrap();
        assert_eq!(second, PresenceWrite::AlreadyPresent);
    }

    #[tokio::test]
    async fn mark_present_creates_missing_row() {
        let s = student(42, 1);
        let store = MemoryStore::with_roster([s]);
        assert_eq!(
            store.mark_present(&s, monday()).await.unwrap(),
            PresenceWrite::Created
        );
        let row = AttendanceStore::get(&store, s.id, monday()).await.unwrap().unwrap();
        assert_eq!(row.status, AttendanceStatus::Present);
    }

    #[tokio::test]
    async fn upsert_keeps_original_class() {
        let s = student(42, 1);
        let store = MemoryStore::with_roster([s]);
        store.insert_pending(&s, monday()).await.unwrap();
        // Student moves class after the row was created.
        let moved = student(42, 2);
        store.enroll(moved);
        let row = store
            .upsert_status(&moved, monday(), AttendanceStatus::Sick)
            .await
            .unwrap();
        assert_eq!(row.class_id, ClassId::new(1));
        assert_eq!(row.status, AttendanceStatus::Sick);
    }

    #[tokio::test]
    async fn list_day_filters_day_and_class() {
        let a = student(1, 10);
        let b = student(2, 20);
        let store = MemoryStore::with_roster([a, b]);
        let tuesday = monday().next();
        store.insert_pending(&a, monday()).await.unwrap();
        store.insert_pending(&b, monday()).await.unwrap();
        store.insert_pending(&a, tuesday).await.unwrap();

        assert_eq!(store.list_day(monday(), None).await.unwrap().len(), 2);
        let class_20 = store.list_day(monday(), Some(ClassId::new(20))).await.unwrap();
        assert_eq!(class_20.len(), 1);
        assert_eq!(class_20[0].student_id, b.id);
        assert_eq!(store.list_day(tuesday, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn credential_put_replaces() {
        let store = MemoryStore::new();
        let id = StudentId::new(42);
        for secret in ["first", "second"] {
            store
                .put(Credential {
                    student_id: id,
                    secret_value: secret.into(),
                    issued_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let current = CredentialRepository::get(&store, id).await.unwrap().unwrap();
        assert_eq!(current.secret_value, "second");
    }
}
