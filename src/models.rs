//! Data models for the notes API.
//!
//! Domain types (`Note`, `NewNote`, `NotePatch`) are what the store and
//! service deal in. Request types mirror the JSON bodies clients send and
//! only become domain types after validation.

use crate::validation::{self, FieldError, Validate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Note identifier
pub type NoteId = Uuid;

/// Maximum title length in characters
pub const TITLE_MAX_CHARS: usize = 100;

/// Lifecycle status of a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NoteStatus {
    #[default]
    Pending,
    InProgress,
    Done,
}

impl NoteStatus {
    /// Wire names of every status, in declaration order
    pub const ALLOWED: &'static [&'static str] = &["pending", "in_progress", "done"];

    pub fn as_str(self) -> &'static str {
        match self {
            NoteStatus::Pending => "pending",
            NoteStatus::InProgress => "in_progress",
            NoteStatus::Done => "done",
        }
    }
}

impl fmt::Display for NoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown note status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for NoteStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(NoteStatus::Pending),
            "in_progress" => Ok(NoteStatus::InProgress),
            "done" => Ok(NoteStatus::Done),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A stored note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Server-assigned, immutable identifier
    pub id: NoteId,
    pub title: String,
    pub status: NoteStatus,
    pub created_at: DateTime<Utc>,
    /// Never earlier than `created_at`
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Build a note with a fresh identifier and timestamps
    pub fn new(new: NewNote) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: new.title,
            status: new.status,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply the present fields of a patch and bump `updated_at`
    pub fn apply(&mut self, patch: NotePatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = Utc::now().max(self.created_at);
    }
}

/// Validated input for creating a note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNote {
    pub title: String,
    pub status: NoteStatus,
}

/// Validated partial update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub status: Option<NoteStatus>,
}

impl NotePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.status.is_none()
    }
}

/// Filter for listing notes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    pub status: Option<NoteStatus>,
}

impl NoteFilter {
    pub fn matches(&self, note: &Note) -> bool {
        self.status.map_or(true, |s| note.status == s)
    }
}

// === API Request/Response Models ===

/// Create note request
///
/// Fields are optional at the serde level so missing values surface as
/// field errors rather than decode failures.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateNoteRequest {
    pub title: Option<String>,
    /// Defaults to `pending` when omitted
    pub status: Option<String>,
}

impl Validate for CreateNoteRequest {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        match self.title.as_deref() {
            Some(title) => validation::bounded_text("title", title, TITLE_MAX_CHARS, &mut errors),
            None => errors.push(FieldError::new("title", "is required")),
        }
        if let Some(status) = self.status.as_deref() {
            validation::one_of("status", status, NoteStatus::ALLOWED, &mut errors);
        }
        errors
    }
}

impl TryFrom<CreateNoteRequest> for NewNote {
    type Error = Vec<FieldError>;

    fn try_from(req: CreateNoteRequest) -> Result<Self, Self::Error> {
        req.check()?;
        Ok(NewNote {
            title: req.title.unwrap_or_default().trim().to_string(),
            status: parse_status(req.status.as_deref())?.unwrap_or_default(),
        })
    }
}

/// Partial update request; absent fields are not touched
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub status: Option<String>,
}

impl Validate for UpdateNoteRequest {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.title.is_none() && self.status.is_none() {
            errors.push(FieldError::new("body", "at least one of title, status is required"));
        }
        if let Some(title) = self.title.as_deref() {
            validation::bounded_text("title", title, TITLE_MAX_CHARS, &mut errors);
        }
        if let Some(status) = self.status.as_deref() {
            validation::one_of("status", status, NoteStatus::ALLOWED, &mut errors);
        }
        errors
    }
}

impl TryFrom<UpdateNoteRequest> for NotePatch {
    type Error = Vec<FieldError>;

    fn try_from(req: UpdateNoteRequest) -> Result<Self, Self::Error> {
        req.check()?;
        Ok(NotePatch {
            title: req.title.map(|t| t.trim().to_string()),
            status: parse_status(req.status.as_deref())?,
        })
    }
}

/// List notes query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ListNotesQuery {
    pub status: Option<String>,
}

impl Validate for ListNotesQuery {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if let Some(status) = self.status.as_deref() {
            validation::one_of("status", status, NoteStatus::ALLOWED, &mut errors);
        }
        errors
    }
}

impl TryFrom<ListNotesQuery> for NoteFilter {
    type Error = Vec<FieldError>;

    fn try_from(query: ListNotesQuery) -> Result<Self, Self::Error> {
        query.check()?;
        Ok(NoteFilter {
            status: parse_status(query.status.as_deref())?,
        })
    }
}

fn parse_status(raw: Option<&str>) -> Result<Option<NoteStatus>, Vec<FieldError>> {
    raw.map(|s| {
        s.parse()
            .map_err(|e: UnknownStatus| vec![FieldError::new("status", e.to_string())])
    })
    .transpose()
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldError>,
}
