//! Backend Collaborator
//!
//! The record service the directory talks to: a REST-shaped collection under
//! [`BASE_PATH`] supporting list, fetch-one, create, update and delete. The
//! rest of the crate sees it only through the [`RecordBackend`] trait.
//!
//! [`MemoryBackend`] keeps records in process memory and can inject latency
//! and failures, which makes it the backend for tests and demos.

mod error;
mod memory;

use async_trait::async_trait;

use crate::directory::{NewRecord, Record, RecordId, RecordPatch};

pub use error::BackendError;
pub use memory::MemoryBackend;

/// Path of the record collection.
pub const BASE_PATH: &str = "/api/records";

/// Status code of a successful read, update or delete.
pub const STATUS_OK: u16 = 200;

/// Status code of a successful create.
pub const STATUS_CREATED: u16 = 201;

/// Path of one record in the collection.
pub fn resource_path(id: RecordId) -> String {
    format!("{BASE_PATH}/{id}")
}

/// A record service.
///
/// Implementations must be `Send + Sync + 'static` so a client can share
/// them across tasks.
#[async_trait]
pub trait RecordBackend: Send + Sync + 'static {
    /// `GET /api/records`
    async fn list(&self) -> Result<Vec<Record>, BackendError>;

    /// `GET /api/records/{id}`
    async fn get(&self, id: RecordId) -> Result<Record, BackendError>;

    /// `POST /api/records`. The backend assigns the id.
    async fn create(&self, record: NewRecord) -> Result<Record, BackendError>;

    /// `PUT /api/records/{id}`
    async fn update(&self, id: RecordId, patch: RecordPatch) -> Result<Record, BackendError>;

    /// `DELETE /api/records/{id}`
    async fn delete(&self, id: RecordId) -> Result<(), BackendError>;
}
