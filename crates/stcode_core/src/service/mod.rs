//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into create/validate/repair use-cases.
//! - Keep CLI and API adapters decoupled from storage details.

pub mod reconcile;
pub mod record_service;
