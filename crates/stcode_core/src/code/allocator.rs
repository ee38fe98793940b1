//! Next-code selection policy.
//!
//! # Responsibility
//! - Pick the next free code from a caller-supplied used-code snapshot.
//! - Prefer small holes, then the extended window, then a synthesized code.
//!
//! # Invariants
//! - No storage access; the caller owns snapshot freshness.
//! - Window scans are ascending and only compare exact `ST<n>` strings, so
//!   fallback-form codes in the snapshot never block a window slot.
//! - `allocate` always returns a code absent from the snapshot.

use crate::code::grammar::SequenceCode;
use crate::config::{AllocatorConfig, CodeWindow};
use log::debug;
use rand::Rng;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Point-in-time snapshot of every code currently held.
pub type UsedCodes = HashSet<SequenceCode>;

const FALLBACK_SUFFIX_MAX: u16 = 999;

/// Both numeric windows are fully occupied.
///
/// Internal signal only; `allocate` absorbs it with a fallback code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeExhausted {
    pub gap_window: CodeWindow,
    pub primary_window: CodeWindow,
}

impl Display for RangeExhausted {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "no free code in {} or {}",
            self.gap_window, self.primary_window
        )
    }
}

impl Error for RangeExhausted {}

/// Returns the next code to try for a new record.
pub fn allocate(used: &UsedCodes, config: &AllocatorConfig) -> SequenceCode {
    match scan_windows(used, config) {
        Ok(code) => code,
        Err(exhausted) => {
            let code = synthesize_fallback(used);
            debug!(
                "event=range_exhausted module=allocator status=fallback detail=\"{}\" code={}",
                exhausted, code
            );
            code
        }
    }
}

/// Scans the gap window, then the primary window, for the first free slot.
pub fn scan_windows(
    used: &UsedCodes,
    config: &AllocatorConfig,
) -> Result<SequenceCode, RangeExhausted> {
    first_free(used, config.gap_window)
        .or_else(|| first_free(used, config.primary_window))
        .ok_or(RangeExhausted {
            gap_window: config.gap_window,
            primary_window: config.primary_window,
        })
}

/// Synthesizes `ST<epoch_millis>_<0..=999>` not present in `used`.
pub fn synthesize_fallback(used: &UsedCodes) -> SequenceCode {
    let mut rng = rand::thread_rng();
    loop {
        let code = SequenceCode::fallback(epoch_millis(), rng.gen_range(0..=FALLBACK_SUFFIX_MAX));
        if !used.contains(&code) {
            return code;
        }
    }
}

fn first_free(used: &UsedCodes, window: CodeWindow) -> Option<SequenceCode> {
    window
        .numbers()
        .map(SequenceCode::from_number)
        .find(|candidate| !used.contains(candidate))
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis())
}
