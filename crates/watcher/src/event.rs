//! Raw change events as received from notify

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind};
use std::path::PathBuf;

/// Simplified event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Create,
    Modify,
    Remove,
    Rename,
    /// The platform dropped events; everything must be considered changed
    Rescan,
}

impl ChangeKind {
    /// Map a notify event kind; access events carry no change and map to `None`
    pub fn from_event_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Access(_) => None,
            EventKind::Create(_) => Some(Self::Create),
            EventKind::Modify(ModifyKind::Name(_)) => Some(Self::Rename),
            EventKind::Modify(_) => Some(Self::Modify),
            EventKind::Remove(_) => Some(Self::Remove),
            _ => Some(Self::Modify),
        }
    }

    /// Whether this kind of change alters a directory listing
    pub fn changes_listing(self) -> bool {
        matches!(self, Self::Create | Self::Remove | Self::Rename | Self::Rescan)
    }
}

/// What the changed path is, when the event says so
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
    Unknown,
}

impl EntryKind {
    fn from_event_kind(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => {
                Self::Directory
            }
            EventKind::Create(CreateKind::File) | EventKind::Remove(RemoveKind::File) => Self::File,
            _ => Self::Unknown,
        }
    }
}

/// One change to one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub entry: EntryKind,
}

impl RawChange {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind, entry: EntryKind) -> Self {
        Self {
            path: path.into(),
            kind,
            entry,
        }
    }

    /// Split a notify event into one change per affected path
    pub fn from_event(event: &Event) -> Vec<Self> {
        if event.need_rescan() {
            return vec![Self::new(PathBuf::new(), ChangeKind::Rescan, EntryKind::Unknown)];
        }
        let Some(kind) = ChangeKind::from_event_kind(&event.kind) else {
            return Vec::new();
        };
        let entry = EntryKind::from_event_kind(&event.kind);
        event
            .paths
            .iter()
            .map(|path| Self::new(path.clone(), kind, entry))
            .collect()
    }
}
