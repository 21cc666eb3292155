//! Options controlling how a series is built

use crate::error::{NcError, Result};
use serde::{Deserialize, Serialize};

/// What to do when files of a series disagree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompatibilityMode {
    /// Fail construction with `ConstructionMismatch`
    #[default]
    Strict,
    /// Log the problem, record it on the handle and leave the offending item out
    Lenient,
}

/// Build options for a [`crate::SeriesHandle`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesOptions {
    /// How schema disagreements between files are handled
    pub compatibility: CompatibilityMode,

    /// Number of files opened concurrently during a build
    pub open_concurrency: usize,
}

impl SeriesOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compatibility(mut self, compatibility: CompatibilityMode) -> Self {
        self.compatibility = compatibility;
        self
    }

    pub fn with_open_concurrency(mut self, open_concurrency: usize) -> Self {
        self.open_concurrency = open_concurrency;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.compatibility == CompatibilityMode::Strict
    }

    pub fn validate(&self) -> Result<()> {
        if self.open_concurrency == 0 {
            return Err(NcError::InvalidFormat(
                "open_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SeriesOptions {
    fn default() -> Self {
        Self {
            compatibility: CompatibilityMode::Strict,
            open_concurrency: 4,
        }
    }
}
