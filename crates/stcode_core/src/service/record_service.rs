//! Record creation with sequence code assignment.
//!
//! # Responsibility
//! - Assign a code to every new record, either allocated or caller-supplied.
//! - Bridge the gap between reading the used-code snapshot and committing.
//! - Provide business-field CRUD that never changes an assigned code.
//!
//! # Invariants
//! - Every attempt re-reads the used-code snapshot; nothing is cached.
//! - Only `RepoError::DuplicateCode` triggers a retry, and attempts are
//!   bounded by `AllocatorConfig::max_attempts`.
//! - A taken manual code is rejected, never replaced by an allocated one.

use crate::code::allocator::{allocate, UsedCodes};
use crate::code::grammar::SequenceCode;
use crate::config::AllocatorConfig;
use crate::model::record::{
    NewRecord, Record, RecordDraft, RecordId, RecordValidationError,
};
use crate::repo::record_repo::{RecordListQuery, RecordRepository, RepoError, RepoResult};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const TEMPORARY_FAILURE_MESSAGE: &str =
    "the record could not be created right now; please try again";

/// Where the code for a new record comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeSource {
    /// Allocate the next free code.
    Auto,
    /// Use the caller's code, after normalization and validation.
    Manual(String),
}

impl From<Option<&str>> for CodeSource {
    fn from(value: Option<&str>) -> Self {
        match value {
            Some(raw) => Self::Manual(raw.to_string()),
            None => Self::Auto,
        }
    }
}

/// Service error for record use-cases.
#[derive(Debug)]
pub enum RecordServiceError {
    /// Business fields failed validation.
    InvalidRecord(RecordValidationError),
    /// Manual code does not match the code grammar.
    InvalidCode(String),
    /// Manual code is already held by another record.
    CodeTaken(SequenceCode),
    /// Every commit attempt hit a code conflict.
    AllocationExhausted { attempts: u32 },
    /// Target record does not exist.
    RecordNotFound(RecordId),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl RecordServiceError {
    /// HTTP-style status class for API adapters.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRecord(_) | Self::InvalidCode(_) | Self::CodeTaken(_) => 400,
            Self::RecordNotFound(_) => 404,
            Self::AllocationExhausted { .. } => 409,
            Self::Repo(_) | Self::InconsistentState(_) => 500,
        }
    }

    /// Message safe to show to end users.
    pub fn user_message(&self) -> String {
        match self {
            Self::AllocationExhausted { .. } | Self::Repo(_) | Self::InconsistentState(_) => {
                TEMPORARY_FAILURE_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

impl Display for RecordServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRecord(err) => write!(f, "{err}"),
            Self::InvalidCode(normalized) => write!(
                f,
                "`{normalized}` is not a valid sequence code; expected ST<digits>"
            ),
            Self::CodeTaken(code) => write!(
                f,
                "sequence code `{code}` is already in use; omit the code to auto-generate one"
            ),
            Self::AllocationExhausted { attempts } => write!(
                f,
                "could not assign a unique sequence code after {attempts} attempts"
            ),
            Self::RecordNotFound(id) => write!(f, "record not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent record state: {details}"),
        }
    }
}

impl Error for RecordServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidRecord(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for RecordServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::RecordNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<RecordValidationError> for RecordServiceError {
    fn from(value: RecordValidationError) -> Self {
        Self::InvalidRecord(value)
    }
}

/// Record service facade over repository implementations.
pub struct RecordService<R: RecordRepository> {
    repo: R,
    config: AllocatorConfig,
}

impl<R: RecordRepository> RecordService<R> {
    /// Creates a service with the default allocation policy.
    pub fn new(repo: R) -> Self {
        Self::with_config(repo, AllocatorConfig::default())
    }

    pub fn with_config(repo: R, config: AllocatorConfig) -> Self {
        Self { repo, config }
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Creates one record, allocating a code unless `manual_code` is given.
    pub fn create_record(
        &self,
        draft: &RecordDraft,
        manual_code: Option<&str>,
    ) -> Result<Record, RecordServiceError> {
        self.create_with_code(draft, &CodeSource::from(manual_code))
    }

    /// Commits `draft` under a code from `source`, retrying on code conflicts.
    ///
    /// Each attempt reads the used-code snapshot afresh, obtains a candidate,
    /// and inserts under the store's unique index. The returned record holds
    /// the code that was actually committed, which may differ from the first
    /// candidate.
    ///
    /// # Errors
    /// - `InvalidRecord` / `InvalidCode` / `CodeTaken` for caller mistakes.
    /// - `AllocationExhausted` once `max_attempts` conflicts have occurred.
    pub fn create_with_code(
        &self,
        draft: &RecordDraft,
        source: &CodeSource,
    ) -> Result<Record, RecordServiceError> {
        draft.validate()?;
        let started_at = Instant::now();
        let mode = match source {
            CodeSource::Auto => "auto",
            CodeSource::Manual(_) => "manual",
        };

        for attempt in 1..=self.config.max_attempts {
            let candidate = match source {
                CodeSource::Auto => allocate(&load_used_codes(&self.repo)?, &self.config),
                CodeSource::Manual(raw) => self.validate_manual_code(raw)?,
            };

            let new_record = NewRecord::new(candidate, draft);
            match self.repo.insert_record(&new_record) {
                Ok(id) => {
                    info!(
                        "event=record_create module=service status=ok mode={} code={} attempts={} duration_ms={}",
                        mode,
                        new_record.code,
                        attempt,
                        started_at.elapsed().as_millis()
                    );
                    return self.repo.get_record(id)?.ok_or(
                        RecordServiceError::InconsistentState(
                            "created record not found in read-back",
                        ),
                    );
                }
                Err(RepoError::DuplicateCode(code)) => {
                    warn!(
                        "event=code_conflict module=service status=retry mode={} code={} attempt={} max_attempts={}",
                        mode, code, attempt, self.config.max_attempts
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }

        error!(
            "event=allocation_exhausted module=service status=error mode={} attempts={} duration_ms={}",
            mode,
            self.config.max_attempts,
            started_at.elapsed().as_millis()
        );
        Err(RecordServiceError::AllocationExhausted {
            attempts: self.config.max_attempts,
        })
    }

    /// Normalizes a caller-supplied code and checks it is free.
    ///
    /// A free result is advisory only: the commit can still race and is
    /// therefore routed through `create_with_code`.
    pub fn validate_manual_code(&self, raw: &str) -> Result<SequenceCode, RecordServiceError> {
        let code = SequenceCode::parse(raw).map_err(|err| {
            info!("event=manual_code_rejected module=service status=error reason=malformed");
            RecordServiceError::InvalidCode(err.normalized)
        })?;

        if self.repo.code_exists(&code)? {
            info!(
                "event=manual_code_rejected module=service status=error reason=taken code={}",
                code
            );
            return Err(RecordServiceError::CodeTaken(code));
        }

        Ok(code)
    }

    pub fn get_record(&self, id: RecordId) -> RepoResult<Option<Record>> {
        self.repo.get_record(id)
    }

    /// Looks up a record by code; `raw` is normalized first.
    pub fn find_by_code(&self, raw: &str) -> Result<Option<Record>, RecordServiceError> {
        let code = SequenceCode::parse(raw)
            .map_err(|err| RecordServiceError::InvalidCode(err.normalized))?;
        Ok(self.repo.find_by_code(&code)?)
    }

    pub fn list_records(&self, query: &RecordListQuery) -> RepoResult<Vec<Record>> {
        self.repo.list_records(query)
    }

    /// Replaces business fields. The record keeps its code.
    pub fn update_record(
        &self,
        id: RecordId,
        draft: &RecordDraft,
    ) -> Result<Record, RecordServiceError> {
        draft.validate()?;
        self.repo
            .update_fields(id, draft.title.as_str(), draft.body.as_deref())?;
        self.repo
            .get_record(id)?
            .ok_or(RecordServiceError::InconsistentState(
                "updated record not found in read-back",
            ))
    }

    /// Deletes a record; its number becomes eligible for gap-fill.
    pub fn delete_record(&self, id: RecordId) -> Result<(), RecordServiceError> {
        self.repo.delete_record(id)?;
        info!("event=record_delete module=service status=ok");
        Ok(())
    }
}

/// Reads a fresh used-code snapshot from the store.
pub fn load_used_codes(repo: &impl RecordRepository) -> RepoResult<UsedCodes> {
    Ok(repo
        .list_codes()?
        .into_iter()
        .map(|assignment| assignment.code)
        .collect())
}
