//! Record domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by allocation and repair logic.
//!
//! # Invariants
//! - Every record is identified by a stable `RecordId` and owns one code.

pub mod record;
