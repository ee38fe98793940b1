//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Code conflicts surface as `RepoError::DuplicateCode`, never as a raw
//!   SQLite error, so callers can retry on exactly that condition.

pub mod record_repo;
