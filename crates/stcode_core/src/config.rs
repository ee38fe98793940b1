//! Allocation policy configuration.
//!
//! # Responsibility
//! - Hold the tunable numeric windows and the commit retry bound.
//! - Load overrides from JSON and reject inconsistent settings.
//!
//! # Invariants
//! - Both windows are non-empty inclusive ranges and do not overlap.
//! - `max_attempts` is at least 1.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

pub const DEFAULT_GAP_WINDOW: CodeWindow = CodeWindow::new(110, 149);
pub const DEFAULT_PRIMARY_WINDOW: CodeWindow = CodeWindow::new(150, 2000);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Inclusive numeric window scanned by the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeWindow {
    pub start: u64,
    pub end: u64,
}

impl CodeWindow {
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn numbers(&self) -> RangeInclusive<u64> {
        self.start..=self.end
    }

    pub fn overlaps(&self, other: &CodeWindow) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl Display for CodeWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Tunable allocation policy.
///
/// Missing JSON fields fall back to the defaults, so a config file only needs
/// to name what it overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllocatorConfig {
    /// Low window back-filled first to keep codes dense.
    pub gap_window: CodeWindow,
    /// Extended window scanned once the gap window is full.
    pub primary_window: CodeWindow,
    /// Commit attempts before a create call gives up.
    pub max_attempts: u32,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            gap_window: DEFAULT_GAP_WINDOW,
            primary_window: DEFAULT_PRIMARY_WINDOW,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl AllocatorConfig {
    /// Checks window shape and retry bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, window) in [
            ("gap_window", self.gap_window),
            ("primary_window", self.primary_window),
        ] {
            if window.is_empty() {
                return Err(ConfigError::EmptyWindow { name, window });
            }
        }
        if self.gap_window.overlaps(&self.primary_window) {
            return Err(ConfigError::OverlappingWindows {
                gap: self.gap_window,
                primary: self.primary_window,
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }

    /// Parses a JSON document and validates the result.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }
}

/// Reads and validates an allocator config file.
pub fn load_config(path: impl AsRef<Path>) -> Result<AllocatorConfig, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    AllocatorConfig::from_json_str(&raw)
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    EmptyWindow {
        name: &'static str,
        window: CodeWindow,
    },
    OverlappingWindows {
        gap: CodeWindow,
        primary: CodeWindow,
    },
    ZeroAttempts,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid allocator config: {err}"),
            Self::EmptyWindow { name, window } => {
                write!(f, "{name} `{window}` is empty; start must be <= end")
            }
            Self::OverlappingWindows { gap, primary } => write!(
                f,
                "gap_window `{gap}` overlaps primary_window `{primary}`"
            ),
            Self::ZeroAttempts => write!(f, "max_attempts must be at least 1"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}
