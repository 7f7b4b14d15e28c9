//! Note repository and its in-memory document store.
//!
//! [`NoteRepository`] is the persistence seam: every call is one round trip
//! to the backing store, with no retries and no caching. [`MemoryStore`] is
//! the bundled implementation.

use crate::models::{Note, NoteFilter, NoteId, NotePatch};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Document store operations on notes
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Insert a fully built note, returning its identifier
    async fn create(&self, note: &Note) -> Result<NoteId, StoreError>;

    /// Fetch one note
    async fn get_by_id(&self, id: NoteId) -> Result<Note, StoreError>;

    /// Fetch all notes matching `filter`, oldest first
    async fn get_all(&self, filter: &NoteFilter) -> Result<Vec<Note>, StoreError>;

    /// Apply a partial update and return the stored result
    async fn update(&self, id: NoteId, patch: NotePatch) -> Result<Note, StoreError>;
}

/// Thread-safe in-memory document store
#[derive(Clone, Default)]
pub struct MemoryStore {
    /// Notes keyed by id
    notes: Arc<DashMap<NoteId, Note>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            notes: Arc::new(DashMap::new()),
        }
    }

    /// Number of stored notes
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Check if store is empty
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

#[async_trait]
impl NoteRepository for MemoryStore {
    async fn create(&self, note: &Note) -> Result<NoteId, StoreError> {
        match self.notes.entry(note.id) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey(note.id)),
            Entry::Vacant(slot) => {
                slot.insert(note.clone());
                debug!(note_id = %note.id, "Stored note");
                Ok(note.id)
            }
        }
    }

    async fn get_by_id(&self, id: NoteId) -> Result<Note, StoreError> {
        self.notes
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn get_all(&self, filter: &NoteFilter) -> Result<Vec<Note>, StoreError> {
        let mut notes: Vec<Note> = self
            .notes
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        notes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(notes)
    }

    async fn update(&self, id: NoteId, patch: NotePatch) -> Result<Note, StoreError> {
        let mut entry = self.notes.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        entry.value_mut().apply(patch);
        debug!(note_id = %id, "Updated note");
        Ok(entry.value().clone())
    }
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("note {0} not found")]
    NotFound(NoteId),

    #[error("note {0} already exists")]
    DuplicateKey(NoteId),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewNote, NoteStatus};

    fn note(title: &str, status: NoteStatus) -> Note {
        Note::new(NewNote {
            title: title.to_string(),
            status,
        })
    }

    #[tokio::test]
    async fn create_then_get_returns_same_note() {
        let store = MemoryStore::new();
        let n = note("buy milk", NoteStatus::Pending);

        let id = store.create(&n).await.unwrap();
        assert_eq!(id, n.id);
        assert_eq!(store.get_by_id(id).await.unwrap(), n);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_id() {
        let store = MemoryStore::new();
        let n = note("buy milk", NoteStatus::Pending);
        store.create(&n).await.unwrap();

        let err = store.create(&n).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(id) if id == n.id));
    }

    #[tokio::test]
    async fn missing_note_is_not_found() {
        let store = MemoryStore::new();
        let id = uuid::Uuid::new_v4();

        assert!(matches!(store.get_by_id(id).await, Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.update(id, NotePatch::default()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn get_all_filters_and_orders() {
        let store = MemoryStore::new();
        let first = note("first", NoteStatus::Pending);
        let second = note("second", NoteStatus::Done);
        let third = note("third", NoteStatus::Pending);
        for n in [&first, &second, &third] {
            store.create(n).await.unwrap();
        }

        let all = store.get_all(&NoteFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].created_at <= w[1].created_at));

        let pending = store
            .get_all(&NoteFilter {
                status: Some(NoteStatus::Pending),
            })
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|n| n.status == NoteStatus::Pending));
    }

    #[tokio::test]
    async fn update_applies_partial_patch() {
        let store = MemoryStore::new();
        let n = note("buy milk", NoteStatus::Pending);
        store.create(&n).await.unwrap();

        let updated = store
            .update(
                n.id,
                NotePatch {
                    title: None,
                    status: Some(NoteStatus::Done),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "buy milk");
        assert_eq!(updated.status, NoteStatus::Done);
        assert_eq!(store.get_by_id(n.id).await.unwrap(), updated);
    }
}
