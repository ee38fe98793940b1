//! Sequence code grammar and allocation policy.
//!
//! # Responsibility
//! - Define canonical sequence code strings.
//! - Choose the next code from a used-code snapshot without touching storage.
//!
//! # Invariants
//! - Everything in this module is pure; persistence and retries live in
//!   `repo` and `service`.

pub mod allocator;
pub mod grammar;
