//! Sequence code grammar and normalization.
//!
//! # Responsibility
//! - Define what a valid sequence code string looks like.
//! - Normalize caller input (`42`, ` st42 `, `ST42`) into canonical form.
//!
//! # Invariants
//! - Canonical codes are upper-case and always carry the `ST` prefix.
//! - Preferred form is `ST<digits>`; fallback form is `ST<digits>_<digits>`.
//! - No numeric range policy lives here; see `code::allocator`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Prefix shared by every sequence code.
pub const CODE_PREFIX: &str = "ST";

static CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ST([0-9]+)(?:_([0-9]+))?$").expect("valid sequence code regex"));

/// Error returned when a string cannot be turned into a well-formed code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedCode {
    /// Normalized form of the rejected input.
    pub normalized: String,
}

impl Display for MalformedCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "`{}` is not a valid sequence code; expected ST<digits>",
            self.normalized
        )
    }
}

impl Error for MalformedCode {}

/// Short public identifier assigned to a record (e.g. `ST150`).
///
/// Values built through [`SequenceCode::parse`] are always well-formed.
/// Values loaded from storage are taken as-is so that legacy rows can still be
/// scanned and repaired.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SequenceCode(String);

impl SequenceCode {
    /// Normalizes and validates raw input.
    pub fn parse(raw: &str) -> Result<Self, MalformedCode> {
        let normalized = normalize(raw);
        if is_well_formed(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(MalformedCode { normalized })
        }
    }

    /// Builds the preferred `ST<n>` form.
    pub fn from_number(number: u64) -> Self {
        Self(format!("{CODE_PREFIX}{number}"))
    }

    /// Builds the fallback `ST<epoch_millis>_<suffix>` form.
    pub fn fallback(epoch_millis: u128, suffix: u16) -> Self {
        Self(format!("{CODE_PREFIX}{epoch_millis}_{suffix}"))
    }

    /// Wraps a value read back from storage without validation.
    pub(crate) fn from_persisted(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the numeric part for preferred-form codes.
    ///
    /// Fallback codes and digit strings that overflow `u64` return `None`.
    pub fn number(&self) -> Option<u64> {
        let caps = CODE_RE.captures(&self.0)?;
        if caps.get(2).is_some() {
            return None;
        }
        caps.get(1)?.as_str().parse().ok()
    }

    /// Returns whether this code uses the synthesized fallback form.
    pub fn is_fallback(&self) -> bool {
        CODE_RE
            .captures(&self.0)
            .is_some_and(|caps| caps.get(2).is_some())
    }
}

impl Display for SequenceCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SequenceCode {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for SequenceCode {
    type Error = MalformedCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SequenceCode> for String {
    fn from(value: SequenceCode) -> Self {
        value.0
    }
}

/// Trims, upper-cases, and prefixes `ST` when absent.
///
/// The result is not guaranteed to be well-formed; pair with
/// [`is_well_formed`] or use [`SequenceCode::parse`].
pub fn normalize(raw: &str) -> String {
    let upper = raw.trim().to_ascii_uppercase();
    if upper.starts_with(CODE_PREFIX) {
        upper
    } else {
        format!("{CODE_PREFIX}{upper}")
    }
}

/// Returns whether `code` matches `ST<digits>` or `ST<digits>_<digits>`.
pub fn is_well_formed(code: &str) -> bool {
    CODE_RE.is_match(code)
}
