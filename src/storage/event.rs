use crate::domain::{
    field::Field,
    song::{SongId, SongRecord},
};

/// A mutation that the library has committed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Inserted {
        after: SongRecord,
    },
    Updated {
        before: SongRecord,
        after: SongRecord,
        /// fields whose value differs between `before` and `after`
        changed: Vec<Field>,
    },
    Removed {
        before: SongRecord,
    },
}

impl ChangeEvent {
    pub fn song_id(&self) -> SongId {
        match self {
            ChangeEvent::Inserted { after } => after.id,
            ChangeEvent::Updated { after, .. } => after.id,
            ChangeEvent::Removed { before } => before.id,
        }
    }

    /// Whether this event may affect the value of `field`.
    pub fn touches(&self, field: Field) -> bool {
        match self {
            ChangeEvent::Updated { changed, .. } => changed.contains(&field),
            ChangeEvent::Inserted { .. } | ChangeEvent::Removed { .. } => true,
        }
    }
}

/// Receives every committed change, synchronously, before the mutating call returns.
pub trait LibraryObserver: Send + Sync {
    fn on_change(&self, event: &ChangeEvent) -> anyhow::Result<()>;
}
