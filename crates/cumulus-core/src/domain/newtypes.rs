//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and
//! paths. Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// UUID-based ID types
// ============================================================================

/// Identifier for a lock holder (one edit session / one user agent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolderId(Uuid);

impl HolderId {
    /// Create a new random HolderId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a HolderId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for HolderId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for HolderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for HolderId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid HolderId: {e}")))
    }
}

/// Identifier for a client instance, used to recognize self-originated
/// change events delivered back over the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Create a new random ClientId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a ClientId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClientId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid ClientId: {e}")))
    }
}

// ============================================================================
// EntryId - remote store identifier
// ============================================================================

/// Provider-assigned identifier of a remote entry (file or folder).
///
/// The remote store hands these out; we only require them to be non-empty
/// and free of path separators so they can be embedded in request paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Create a validated EntryId
    ///
    /// # Errors
    /// Returns `DomainError::InvalidEntryId` if the value is empty or
    /// contains `/` or whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::InvalidEntryId("empty".to_string()));
        }
        if value.contains('/') || value.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidEntryId(value));
        }
        Ok(Self(value))
    }

    /// Get the inner string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EntryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ============================================================================
// VaultPath - absolute local path
// ============================================================================

/// An absolute path on the local filesystem, inside or at the sync root.
///
/// Guaranteed absolute at construction time so adapters never have to guess
/// what a relative path is relative to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VaultPath(PathBuf);

impl VaultPath {
    /// Create a validated VaultPath
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if the path is not absolute.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(DomainError::InvalidPath(path.display().to_string()));
        }
        Ok(Self(path))
    }

    /// Get the inner path
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Append a relative path, producing a new VaultPath
    #[must_use]
    pub fn join(&self, relative: &RelativePath) -> Self {
        let mut p = self.0.clone();
        for segment in relative.segments() {
            p.push(segment);
        }
        Self(p)
    }
}

impl Display for VaultPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

// ============================================================================
// RelativePath - slash-joined path rooted at the sync root
// ============================================================================

/// A normalized, slash-joined path relative to the sync root.
///
/// This is the key of the sync-record ledger and the canonical way the
/// engine names files on both sides. Invariants:
/// - never empty, never absolute
/// - no `.` / `..` segments, no empty segments, no backslashes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelativePath(String);

impl RelativePath {
    /// Create a validated RelativePath
    ///
    /// # Errors
    /// Returns `DomainError::InvalidRelativePath` on any invariant violation.
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::InvalidRelativePath("empty".to_string()));
        }
        if value.starts_with('/') || value.contains('\\') {
            return Err(DomainError::InvalidRelativePath(value));
        }
        if value
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..")
        {
            return Err(DomainError::InvalidRelativePath(value));
        }
        Ok(Self(value))
    }

    /// Build a RelativePath from individual segments
    pub fn from_segments<I, S>(segments: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("/");
        Self::new(joined)
    }

    /// Get the inner string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the path segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Number of segments; a top-level file has depth 1
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.split('/').count()
    }

    /// The final segment (file or folder name)
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The parent path, or `None` for a top-level entry
    #[must_use]
    pub fn parent(&self) -> Option<RelativePath> {
        self.0
            .rfind('/')
            .map(|idx| RelativePath(self.0[..idx].to_string()))
    }

    /// Append a single segment
    ///
    /// # Errors
    /// Returns `DomainError::InvalidRelativePath` if the segment is invalid.
    pub fn child(&self, name: &str) -> Result<RelativePath, DomainError> {
        Self::new(format!("{}/{}", self.0, name))
    }

    /// All ancestor paths from shallowest to deepest, excluding self.
    ///
    /// `"a/b/c.txt"` yields `["a", "a/b"]`. Used for parent-before-child
    /// folder creation.
    #[must_use]
    pub fn ancestors(&self) -> Vec<RelativePath> {
        let mut out = Vec::new();
        let mut end = 0;
        for (idx, ch) in self.0.char_indices() {
            if ch == '/' {
                end = idx;
                out.push(RelativePath(self.0[..end].to_string()));
            }
        }
        out
    }
}

impl Display for RelativePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RelativePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ============================================================================
// Tests
// ============================================================================
