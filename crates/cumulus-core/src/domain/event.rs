//! Change events delivered by the remote push channel
//!
//! These are the internal representation used by the scheduler, decoupled
//! from the wire format of the event feed. Events are transient: consumed
//! once, never persisted.

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{ClientId, EntryId};

/// What happened to the subject entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A new entry appeared
    Created,
    /// An existing file's content or metadata changed
    Updated,
    /// The entry was renamed in place
    Renamed,
    /// The entry was moved to another parent
    Moved,
    /// The entry was moved to the trash
    Deleted,
    /// The entry was removed permanently
    PermanentlyDeleted,
    /// The entry was restored from the trash
    Restored,
}

impl ChangeKind {
    /// Every recognized kind, used when registering wildcard subscribers
    pub const ALL: [ChangeKind; 7] = [
        ChangeKind::Created,
        ChangeKind::Updated,
        ChangeKind::Renamed,
        ChangeKind::Moved,
        ChangeKind::Deleted,
        ChangeKind::PermanentlyDeleted,
        ChangeKind::Restored,
    ];

    /// Parse the wire representation of a kind.
    ///
    /// Returns `None` for unrecognized values so callers can decide whether
    /// to skip or reject the message.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(ChangeKind::Created),
            "updated" => Some(ChangeKind::Updated),
            "renamed" => Some(ChangeKind::Renamed),
            "moved" => Some(ChangeKind::Moved),
            "deleted" => Some(ChangeKind::Deleted),
            "permanently_deleted" => Some(ChangeKind::PermanentlyDeleted),
            "restored" => Some(ChangeKind::Restored),
            _ => None,
        }
    }

    /// Wire representation of this kind
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Renamed => "renamed",
            ChangeKind::Moved => "moved",
            ChangeKind::Deleted => "deleted",
            ChangeKind::PermanentlyDeleted => "permanently_deleted",
            ChangeKind::Restored => "restored",
        }
    }
}

/// Whether the subject of an event is a file or a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    File,
    Folder,
}

impl SubjectKind {
    /// Parse the wire representation
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "file" => Some(SubjectKind::File),
            "folder" => Some(SubjectKind::Folder),
            _ => None,
        }
    }
}

/// A single remote change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// What happened
    pub kind: ChangeKind,
    /// Whether a file or a folder was affected
    pub subject: SubjectKind,
    /// Remote id of the affected entry
    pub subject_id: EntryId,
    /// Client that caused the change, when the backend reports it
    pub origin_client: Option<ClientId>,
}

impl ChangeEvent {
    /// Whether this event can invalidate path resolution for entries other
    /// than its subject.
    ///
    /// Only a `created`/`updated` *file* is safe to reconcile in isolation;
    /// anything touching a folder, or renaming/moving/deleting/restoring an
    /// entry, may change the resolved paths of siblings and descendants and
    /// therefore requires a full pull pass.
    #[must_use]
    pub fn is_folder_affecting(&self) -> bool {
        self.subject == SubjectKind::Folder
            || !matches!(self.kind, ChangeKind::Created | ChangeKind::Updated)
    }

    /// Whether the event originated from the given client
    #[must_use]
    pub fn originated_from(&self, client: &ClientId) -> bool {
        self.origin_client.as_ref() == Some(client)
    }

    /// Build an event from wire fields.
    ///
    /// Returns `Ok(None)` for connection-lifecycle messages (which carry no
    /// subject) and unrecognized types, and `Err` for change messages that
    /// are missing their subject.
    pub fn from_wire(
        event_type: &str,
        subject_id: Option<&str>,
        subject_kind: Option<&str>,
        origin_client: Option<ClientId>,
    ) -> Result<Option<Self>, DomainError> {
        let Some(kind) = ChangeKind::parse(event_type) else {
            // Lifecycle signals ("connected", "ping") and future types.
            return Ok(None);
        };

        let id = subject_id
            .ok_or_else(|| DomainError::MalformedEvent(format!("{event_type}: no subject id")))?;
        let subject_id = EntryId::new(id)?;

        let subject = subject_kind
            .and_then(SubjectKind::parse)
            .unwrap_or(SubjectKind::File);

        Ok(Some(Self {
            kind,
            subject,
            subject_id,
            origin_client,
        }))
    }
}
