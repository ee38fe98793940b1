//! Offline repair of duplicate sequence codes.
//!
//! # Responsibility
//! - Scan every record's code, group duplicates, and reassign all but one
//!   member of each group.
//! - Report what was scanned, fixed, and left unresolved.
//!
//! # Invariants
//! - Only id + code are loaded; business fields are never read.
//! - The first-encountered member of a group (creation order) keeps its code.
//! - Every reassignment is allocated against the snapshot plus all codes
//!   handed out earlier in the same run, so fixes never collide.
//! - A failed reassignment is logged and counted; the sweep keeps going.
//! - Re-running on an unchanged store finds nothing to fix.

use crate::code::allocator::{allocate, UsedCodes};
use crate::code::grammar::SequenceCode;
use crate::config::AllocatorConfig;
use crate::model::record::{CodeAssignment, RecordId};
use crate::repo::record_repo::{RecordRepository, RepoResult};
use log::{info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;

/// One record moved to a new code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeReassignment {
    pub record_id: RecordId,
    pub from: SequenceCode,
    pub to: SequenceCode,
}

/// One record that could not be moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileFailure {
    pub record_id: RecordId,
    pub code: SequenceCode,
    pub reason: String,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub scanned: usize,
    pub duplicate_groups: usize,
    pub fixed: usize,
    pub unresolved: usize,
    pub reassignments: Vec<CodeReassignment>,
    pub failures: Vec<ReconcileFailure>,
}

/// Batch entry point for the reconciliation sweep.
pub struct ReconcileService<R: RecordRepository> {
    repo: R,
    config: AllocatorConfig,
}

impl<R: RecordRepository> ReconcileService<R> {
    pub fn new(repo: R) -> Self {
        Self::with_config(repo, AllocatorConfig::default())
    }

    pub fn with_config(repo: R, config: AllocatorConfig) -> Self {
        Self { repo, config }
    }

    /// Runs one full sweep over the store.
    ///
    /// # Errors
    /// Only the initial code scan can fail the sweep; per-record write
    /// failures are reported in the summary instead.
    pub fn reconcile(&self) -> RepoResult<ReconcileSummary> {
        let started_at = Instant::now();
        info!("event=reconcile module=reconcile status=start");

        let assignments = self.repo.list_codes()?;
        let mut used: UsedCodes = assignments
            .iter()
            .map(|assignment| assignment.code.clone())
            .collect();
        let groups = duplicate_groups(&assignments);

        let mut summary = ReconcileSummary {
            scanned: assignments.len(),
            duplicate_groups: groups.len(),
            ..ReconcileSummary::default()
        };

        for group in &groups {
            for assignment in &group[1..] {
                let replacement = allocate(&used, &self.config);
                used.insert(replacement.clone());

                match self.repo.update_code(assignment.record_id, &replacement) {
                    Ok(()) => {
                        info!(
                            "event=reconcile_item module=reconcile status=ok record_id={} from={} to={}",
                            assignment.record_id, assignment.code, replacement
                        );
                        summary.fixed += 1;
                        summary.reassignments.push(CodeReassignment {
                            record_id: assignment.record_id,
                            from: assignment.code.clone(),
                            to: replacement,
                        });
                    }
                    Err(err) => {
                        warn!(
                            "event=reconcile_item module=reconcile status=error record_id={} code={} error={}",
                            assignment.record_id, assignment.code, err
                        );
                        summary.unresolved += 1;
                        summary.failures.push(ReconcileFailure {
                            record_id: assignment.record_id,
                            code: assignment.code.clone(),
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            "event=reconcile module=reconcile status=ok scanned={} duplicate_groups={} fixed={} unresolved={} duration_ms={}",
            summary.scanned,
            summary.duplicate_groups,
            summary.fixed,
            summary.unresolved,
            started_at.elapsed().as_millis()
        );
        Ok(summary)
    }
}

/// Groups assignments by code, keeping encounter order both across groups
/// and within each group. Only groups with more than one member are returned.
fn duplicate_groups(assignments: &[CodeAssignment]) -> Vec<Vec<&CodeAssignment>> {
    let mut index_by_code: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<&CodeAssignment>> = Vec::new();

    for assignment in assignments {
        match index_by_code.get(assignment.code.as_str()) {
            Some(&index) => groups[index].push(assignment),
            None => {
                index_by_code.insert(assignment.code.as_str(), groups.len());
                groups.push(vec![assignment]);
            }
        }
    }

    groups.retain(|group| group.len() > 1);
    groups
}
