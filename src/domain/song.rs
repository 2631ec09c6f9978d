use std::{fmt::Display, path::PathBuf};

use serde::{Deserialize, Serialize};

use super::field::Field;

/// Seconds since the unix epoch, the way every timestamp is stored.
pub type SecondsSinceUnix = i64;

/// Identity of a song in the library.
///
/// Assigned once by the store and never reused, even after the song is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongId(i64);

impl SongId {
    pub(crate) fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for SongId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Descriptive metadata of a song, as read from the file and its tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongMetadata {
    pub name: String,
    pub artist: String,
    pub album: String,
    pub album_artist: String,
    pub genre: String,
    pub composer: String,
    pub comments: String,
    pub track_number: Option<u32>,
    pub track_count: Option<u32>,
    pub disc_number: Option<u32>,
    pub disc_count: Option<u32>,
    pub year: Option<u32>,
    pub duration_ms: Option<u64>,
    /// kbps
    pub bit_rate: Option<u32>,
    /// Hz
    pub sample_rate: Option<u32>,
    pub size: Option<u64>,
    /// lower-case file extension, e.g. "flac"
    pub kind: String,
    pub date_modified: Option<SecondsSinceUnix>,
}

/// Statistics owned by the library rather than by the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongStats {
    /// 0..=100
    pub rating: u32,
    pub play_count: u32,
    pub last_played: Option<SecondsSinceUnix>,
    pub date_added: SecondsSinceUnix,
}

/// A song as stored in the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRecord {
    pub id: SongId,
    pub path: PathBuf,
    pub metadata: SongMetadata,
    pub stats: SongStats,
}

impl SongRecord {
    /// Name shown to the user: the title tag, or the file name when the tag is empty.
    pub fn display_name(&self) -> String {
        if !self.metadata.name.is_empty() {
            return self.metadata.name.clone();
        }
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Fields whose value differs between `self` and `other`.
    pub fn changed_fields(&self, other: &SongRecord) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|field| match field {
                // value_of rounds to whole seconds
                Field::Duration => self.metadata.duration_ms != other.metadata.duration_ms,
                _ => field.value_of(self) != field.value_of(other),
            })
            .collect()
    }
}

/// Flat record handed over by the tag reader, keyed by absolute path.
///
/// Library statistics are optional: when a file is imported again they are
/// kept from the stored song unless given here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMetadata {
    pub path: PathBuf,
    pub metadata: SongMetadata,
    pub rating: Option<u32>,
    pub play_count: Option<u32>,
    pub last_played: Option<SecondsSinceUnix>,
    pub date_added: Option<SecondsSinceUnix>,
}

impl RawMetadata {
    pub fn new(path: impl Into<PathBuf>, metadata: SongMetadata) -> Self {
        Self {
            path: path.into(),
            metadata,
            ..Default::default()
        }
    }
}
