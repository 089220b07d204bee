//! Lock records for cooperative "open for edit" sessions
//!
//! A lock is a soft editorial claim, not a security boundary: it exists so
//! two clients don't silently clobber each other's edits. At most one live
//! record exists per file id; expiry makes abandoned locks disappear without
//! an explicit release.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{EntryId, HolderId};

/// One live editorial lock on a remote file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// The locked file
    file_id: EntryId,
    /// Who holds the lock
    holder_id: HolderId,
    /// Display name of the holder, for conflict messages
    holder_name: String,
    /// When the lock was acquired or last refreshed
    acquired_at: DateTime<Utc>,
}

impl LockRecord {
    /// Creates a lock acquired now
    pub fn new(file_id: EntryId, holder_id: HolderId, holder_name: impl Into<String>) -> Self {
        Self::with_acquired_at(file_id, holder_id, holder_name, Utc::now())
    }

    /// Creates a lock with an explicit acquisition time (deterministic tests)
    pub fn with_acquired_at(
        file_id: EntryId,
        holder_id: HolderId,
        holder_name: impl Into<String>,
        acquired_at: DateTime<Utc>,
    ) -> Self {
        Self {
            file_id,
            holder_id,
            holder_name: holder_name.into(),
            acquired_at,
        }
    }

    /// The locked file's id
    pub fn file_id(&self) -> &EntryId {
        &self.file_id
    }

    /// The holder's id
    pub fn holder_id(&self) -> &HolderId {
        &self.holder_id
    }

    /// The holder's display name
    pub fn holder_name(&self) -> &str {
        &self.holder_name
    }

    /// When the lock was acquired or last refreshed
    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// Whether the same holder is asking again
    pub fn is_held_by(&self, holder: &HolderId) -> bool {
        &self.holder_id == holder
    }

    /// Push the acquisition time forward (activity on the edit session)
    pub fn refresh(&mut self, at: DateTime<Utc>) {
        self.acquired_at = at;
    }

    /// Whether the lock has sat idle longer than `ttl` as of `now`.
    ///
    /// An expired lock is treated as absent by the next acquire attempt.
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.acquired_at >= ttl
    }

    /// [`is_expired_at`](Self::is_expired_at) against the wall clock
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.is_expired_at(Utc::now(), ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_at(acquired_at: DateTime<Utc>) -> LockRecord {
        LockRecord::with_acquired_at(
            EntryId::new("f-1").unwrap(),
            HolderId::new(),
            "Ada",
            acquired_at,
        )
    }

    #[test]
    fn test_fresh_lock_is_not_expired() {
        let now = Utc::now();
        let lock = lock_at(now);
        assert!(!lock.is_expired_at(now, Duration::minutes(30)));
    }

    #[test]
    fn test_lock_expires_after_ttl() {
        let acquired = Utc::now();
        let lock = lock_at(acquired);
        let later = acquired + Duration::minutes(31);
        assert!(lock.is_expired_at(later, Duration::minutes(30)));
    }

    #[test]
    fn test_refresh_extends_lifetime() {
        let acquired = Utc::now();
        let mut lock = lock_at(acquired);

        let almost_expired = acquired + Duration::minutes(29);
        lock.refresh(almost_expired);

        let past_original_ttl = acquired + Duration::minutes(35);
        assert!(!lock.is_expired_at(past_original_ttl, Duration::minutes(30)));
    }

    #[test]
    fn test_is_held_by() {
        let holder = HolderId::new();
        let lock = LockRecord::new(EntryId::new("f-1").unwrap(), holder, "Ada");
        assert!(lock.is_held_by(&holder));
        assert!(!lock.is_held_by(&HolderId::new()));
    }
}
