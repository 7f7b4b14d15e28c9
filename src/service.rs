//! Note service.
//!
//! Sits between the HTTP handlers and the repository. Input is passed
//! through unchanged; store failures are normalized into [`ServiceError`].

use crate::models::{NewNote, Note, NoteFilter, NoteId, NotePatch};
use crate::store::{NoteRepository, StoreError};
use std::sync::Arc;
use tracing::error;

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("note not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error")]
    Internal(#[source] StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ServiceError::NotFound,
            StoreError::DuplicateKey(id) => ServiceError::Conflict(format!("note {id} already exists")),
            other => {
                error!(error = %other, "Store operation failed");
                ServiceError::Internal(other)
            }
        }
    }
}

/// Note operations
#[derive(Clone)]
pub struct NoteService {
    repo: Arc<dyn NoteRepository>,
}

impl NoteService {
    pub fn new(repo: Arc<dyn NoteRepository>) -> Self {
        Self { repo }
    }

    /// Assign identity and timestamps, then persist
    pub async fn create(&self, new: NewNote) -> Result<Note, ServiceError> {
        let note = Note::new(new);
        self.repo.create(&note).await?;
        Ok(note)
    }

    pub async fn get_by_id(&self, id: NoteId) -> Result<Note, ServiceError> {
        Ok(self.repo.get_by_id(id).await?)
    }

    pub async fn get_all(&self, filter: &NoteFilter) -> Result<Vec<Note>, ServiceError> {
        Ok(self.repo.get_all(filter).await?)
    }

    pub async fn update(&self, id: NoteId, patch: NotePatch) -> Result<Note, ServiceError> {
        Ok(self.repo.update(id, patch).await?)
    }
}
