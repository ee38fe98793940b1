//! Sequence code assignment and repair for business records.
//! This crate is the single source of truth for code uniqueness invariants.

pub mod code;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use code::allocator::{allocate, scan_windows, RangeExhausted, UsedCodes};
pub use code::grammar::{is_well_formed, normalize, MalformedCode, SequenceCode};
pub use config::{load_config, AllocatorConfig, CodeWindow, ConfigError};
pub use logging::{
    default_log_level, init_logging, init_logging_with, logging_status, LogSettings,
};
pub use model::record::{
    CodeAssignment, NewRecord, Record, RecordDraft, RecordId, RecordValidationError,
};
pub use repo::record_repo::{
    ensure_code_index, has_code_index, RecordListQuery, RecordRepository, RepoError, RepoResult,
    SqliteRecordRepository,
};
pub use service::reconcile::{
    CodeReassignment, ReconcileFailure, ReconcileService, ReconcileSummary,
};
pub use service::record_service::{
    load_used_codes, CodeSource, RecordService, RecordServiceError,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
