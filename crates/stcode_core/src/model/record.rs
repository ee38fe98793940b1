//! Record domain model.
//!
//! # Responsibility
//! - Define the business record that owns exactly one sequence code.
//! - Keep business fields opaque; only the code carries allocation semantics.
//!
//! # Invariants
//! - `id` is stable and never reused for another record.
//! - `code` is set at creation and only rewritten by the reconciliation sweep.
//! - `title` is non-empty after trimming.

use crate::code::grammar::SequenceCode;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every record.
pub type RecordId = Uuid;

/// Persisted business record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub code: SequenceCode,
    pub title: String,
    pub body: Option<String>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

/// Business fields supplied by a create or edit request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordDraft {
    pub title: String,
    pub body: Option<String>,
}

impl RecordDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if self.title.trim().is_empty() {
            return Err(RecordValidationError::EmptyTitle);
        }
        Ok(())
    }
}

/// Insert payload: a draft bound to a candidate code and a fresh id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub id: RecordId,
    pub code: SequenceCode,
    pub title: String,
    pub body: Option<String>,
}

impl NewRecord {
    /// Binds `draft` to `code` under a newly generated id.
    pub fn new(code: SequenceCode, draft: &RecordDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            title: draft.title.clone(),
            body: draft.body.clone(),
        }
    }
}

/// Id + code projection loaded by the reconciliation sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAssignment {
    pub record_id: RecordId,
    pub code: SequenceCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordValidationError {
    EmptyTitle,
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "record title cannot be empty"),
        }
    }
}

impl Error for RecordValidationError {}
