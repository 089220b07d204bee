//! Reconciliation pass outcome reporting

use serde::{Deserialize, Serialize};

/// A per-file failure recorded during a pass.
///
/// Failures never abort the pass; they are collected here and surfaced to
/// the caller together with the counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassFailure {
    /// Slash-joined path of the file that failed, relative to the sync root
    pub path: String,
    /// Human-readable cause
    pub cause: String,
}

/// Summary of a completed reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassOutcome {
    /// Number of local files examined by the scanner
    pub scanned: u32,
    /// Number of files uploaded to the remote store
    pub pushed: u32,
    /// Number of files written under the local root
    pub pulled: u32,
    /// Number of folders created on either side
    pub folders_created: u32,
    /// Per-file failures (the pass continued past each of them)
    pub failures: Vec<PassFailure>,
    /// Wall-clock duration of the pass in milliseconds
    pub duration_ms: u64,
}

impl PassOutcome {
    /// Creates an empty outcome
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a per-file failure and keep going
    pub fn record_failure(&mut self, path: impl Into<String>, cause: impl Into<String>) {
        self.failures.push(PassFailure {
            path: path.into(),
            cause: cause.into(),
        });
    }

    /// True when nothing was transferred and nothing failed
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.pushed == 0 && self.pulled == 0 && self.folders_created == 0 && self.failures.is_empty()
    }

    /// Fold another outcome into this one (scanner pass + writer pass)
    pub fn absorb(&mut self, other: PassOutcome) {
        self.scanned += other.scanned;
        self.pushed += other.pushed;
        self.pulled += other.pulled;
        self.folders_created += other.folders_created;
        self.failures.extend(other.failures);
    }
}
