//! In-memory record backend.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::{resource_path, BackendError, RecordBackend, BASE_PATH, STATUS_CREATED, STATUS_OK};
use crate::directory::{NewRecord, Record, RecordId, RecordPatch};

/// A [`RecordBackend`] holding records in insertion order.
///
/// Clones share the same records and failure budget.
#[derive(Clone)]
pub struct MemoryBackend {
    records: Arc<Mutex<IndexMap<RecordId, Record>>>,
    next_id: Arc<AtomicU64>,
    /// Number of upcoming calls that fail with a server error.
    failures: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
    latency: Option<Duration>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// A backend seeded with `records`. New ids continue after the highest.
    pub fn with_records(records: Vec<Record>) -> Self {
        let next_id = records
            .iter()
            .map(|r| r.id.0)
            .max()
            .map_or(1, |highest| highest.saturating_add(1));
        let records = records.into_iter().map(|r| (r.id, r)).collect();
        Self {
            records: Arc::new(Mutex::new(records)),
            next_id: Arc::new(AtomicU64::new(next_id)),
            failures: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
            latency: None,
        }
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next `count` calls fail with a 500.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Number of calls served so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Current records, in insertion order.
    pub fn snapshot(&self) -> Vec<Record> {
        self.records.lock().values().cloned().collect()
    }

    async fn begin(&self, operation: &'static str) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            debug!(operation, status = 500, "injected failure");
            return Err(BackendError::Server(format!("{operation} failed")));
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("records", &self.records.lock().len())
            .field("calls", &self.call_count())
            .field("latency", &self.latency)
            .finish()
    }
}

#[async_trait]
impl RecordBackend for MemoryBackend {
    async fn list(&self) -> Result<Vec<Record>, BackendError> {
        self.begin("list").await?;
        let records = self.snapshot();
        debug!(path = BASE_PATH, status = STATUS_OK, count = records.len(), "listed records");
        Ok(records)
    }

    async fn get(&self, id: RecordId) -> Result<Record, BackendError> {
        self.begin("get").await?;
        self.records
            .lock()
            .get(&id)
            .cloned()
            .ok_or(BackendError::NotFound(id))
    }

    async fn create(&self, record: NewRecord) -> Result<Record, BackendError> {
        self.begin("create").await?;
        record
            .validate()
            .map_err(|e| BackendError::Invalid(e.to_string()))?;

        // The last id is never handed out, so a saturated seed cannot collide.
        let id = self
            .next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
            .map(RecordId)
            .map_err(|_| BackendError::Server("record ids exhausted".into()))?;
        let record = record.into_record(id);
        self.records.lock().insert(id, record.clone());

        info!(path = %resource_path(id), status = STATUS_CREATED, "record created");
        Ok(record)
    }

    async fn update(&self, id: RecordId, patch: RecordPatch) -> Result<Record, BackendError> {
        self.begin("update").await?;
        patch
            .validate()
            .map_err(|e| BackendError::Invalid(e.to_string()))?;

        let updated = {
            let mut records = self.records.lock();
            let current = records.get_mut(&id).ok_or(BackendError::NotFound(id))?;
            let updated = patch.apply(current);
            *current = updated.clone();
            updated
        };

        info!(path = %resource_path(id), status = STATUS_OK, "record updated");
        Ok(updated)
    }

    async fn delete(&self, id: RecordId) -> Result<(), BackendError> {
        self.begin("delete").await?;
        // shift_remove keeps the remaining records in order.
        self.records
            .lock()
            .shift_remove(&id)
            .ok_or(BackendError::NotFound(id))?;

        info!(path = %resource_path(id), status = STATUS_OK, "record deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryBackend {
        MemoryBackend::with_records(vec![
            NewRecord::new("Ada", "Engineer").into_record(RecordId(1)),
            NewRecord::new("Grace", "Admiral").into_record(RecordId(2)),
        ])
    }

    #[tokio::test]
    async fn crud_round() {
        let backend = seeded();

        let created = backend.create(NewRecord::new("Linus", "Maintainer")).await.unwrap();
        assert_eq!(created.id, RecordId(3));
        assert_eq!(backend.list().await.unwrap().len(), 3);

        let patch = RecordPatch {
            department: Some("Kernel".into()),
            ..RecordPatch::default()
        };
        let updated = backend.update(created.id, patch).await.unwrap();
        assert_eq!(updated.department, "Kernel");
        assert_eq!(backend.get(created.id).await.unwrap(), updated);

        backend.delete(RecordId(1)).await.unwrap();
        let names: Vec<_> = backend.snapshot().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Grace", "Linus"]);
    }

    #[tokio::test]
    async fn missing_record_is_404() {
        let backend = seeded();
        let err = backend.get(RecordId(42)).await.unwrap_err();
        assert_eq!(err, BackendError::NotFound(RecordId(42)));
        assert_eq!(err.status(), 404);
        assert_eq!(backend.delete(RecordId(42)).await.unwrap_err().status(), 404);
    }

    #[tokio::test]
    async fn invalid_create_is_400() {
        let err = seeded().create(NewRecord::new("", "Y")).await.unwrap_err();
        assert_eq!(err.status(), 400);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn injected_failures_are_500_and_run_out() {
        let backend = seeded();
        backend.fail_next(2);

        assert_eq!(backend.list().await.unwrap_err().status(), 500);
        assert!(backend.list().await.unwrap_err().is_retryable());
        assert!(backend.list().await.is_ok());
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let backend = MemoryBackend::new();
        let first = backend.create(NewRecord::new("A", "B")).await.unwrap();
        backend.delete(first.id).await.unwrap();
        let second = backend.create(NewRecord::new("C", "D")).await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn highest_possible_id_exhausts_numbering() {
        let backend = MemoryBackend::with_records(vec![
            NewRecord::new("Last", "Sentinel").into_record(RecordId(u64::MAX)),
        ]);

        let err = backend.create(NewRecord::new("A", "B")).await.unwrap_err();
        assert_eq!(err.status(), 500);
        assert_eq!(backend.snapshot().len(), 1);
        assert_eq!(backend.snapshot()[0].name, "Last");
    }

    #[tokio::test(start_paused = true)]
    async fn latency_delays_calls() {
        let backend = seeded().with_latency(Duration::from_secs(2));
        let started = tokio::time::Instant::now();
        backend.list().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
