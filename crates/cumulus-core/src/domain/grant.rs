//! Directory grant - the revocable capability for the local sync root
//!
//! Access to the local mirror directory is modeled as an explicit,
//! session-scoped grant. The grant is obtained once by an explicit user
//! action ([`DirectoryGrant::claim`]) and is deliberately not serializable:
//! a restarted process must re-acquire it, never resurrect a stale handle.
//!
//! When the underlying directory disappears or becomes unreadable the grant
//! is *invalidated*; callers receive [`GrantError::Invalidated`] and are
//! expected to stop auto-sync and prompt for re-selection rather than retry.

use thiserror::Error;

use super::newtypes::{RelativePath, VaultPath};

/// Errors produced by grant acquisition and verification
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrantError {
    /// The granted directory is no longer usable (deleted, moved, or
    /// permissions withdrawn). The caller must prompt for re-selection.
    #[error("Directory grant invalidated: {0}")]
    Invalidated(String),

    /// The claimed path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(String),
}

/// Session-scoped capability to read and write one local directory tree.
///
/// Intentionally carries no `Serialize`/`Deserialize` impls; see the module
/// docs. Cloning is allowed so the engine, scheduler, and lock manager can
/// each hold a handle to the same grant.
#[derive(Debug, Clone)]
pub struct DirectoryGrant {
    /// Absolute root the user granted access to
    root: VaultPath,
    /// Display label, the final path component of the root
    label: String,
}

impl DirectoryGrant {
    /// Claim a grant for the given directory.
    ///
    /// This is the one explicit, user-consented acquisition point. The
    /// directory must exist and be readable at claim time.
    ///
    /// # Errors
    /// - [`GrantError::Invalidated`] if the path does not exist or cannot
    ///   be inspected
    /// - [`GrantError::NotADirectory`] if the path is not a directory
    pub fn claim(root: VaultPath) -> Result<Self, GrantError> {
        let meta = std::fs::metadata(root.as_path())
            .map_err(|e| GrantError::Invalidated(format!("{}: {e}", root)))?;
        if !meta.is_dir() {
            return Err(GrantError::NotADirectory(root.to_string()));
        }

        let label = root
            .as_path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.to_string());

        Ok(Self { root, label })
    }

    /// The granted root directory
    #[must_use]
    pub fn root(&self) -> &VaultPath {
        &self.root
    }

    /// Human-readable label for the granted root
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Re-check that the grant is still usable.
    ///
    /// # Errors
    /// [`GrantError::Invalidated`] if the directory is gone or unreadable.
    pub fn verify(&self) -> Result<(), GrantError> {
        match std::fs::metadata(self.root.as_path()) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(GrantError::NotADirectory(self.root.to_string())),
            Err(e) => Err(GrantError::Invalidated(format!("{}: {e}", self.root))),
        }
    }

    /// Resolve a relative path against the granted root
    #[must_use]
    pub fn resolve(&self, relative: &RelativePath) -> VaultPath {
        self.root.join(relative)
    }
}
