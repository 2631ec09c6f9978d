//! Playlists: the format codecs, entry resolution against the library and
//! the manager that owns the playlist list and its native files.

pub mod codec;
pub mod error;
pub mod manager;
pub mod resolve;
pub mod uri;

use std::{fmt::Display, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::song::SongId;

pub use codec::{CodecRegistry, PlaylistCodec};
pub use error::{CodecError, PlaylistError};
pub use manager::PlaylistManager;

/// Name given to playlists created without one.
pub const DEFAULT_PLAYLIST_NAME: &str = "New Playlist";

/// Identity of a playlist within one manager. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaylistId(u64);

impl PlaylistId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl Display for PlaylistId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "playlist {}", self.0)
    }
}

/// Playlist file formats known to the default registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    M3u,
    ExtM3u,
    M3u8,
    Wpl,
    Xspf,
    ITunes,
    Ttpl,
}

impl Format {
    pub fn description(&self) -> &'static str {
        match self {
            Format::M3u => "M3U Playlist",
            Format::ExtM3u => "Extended M3U Playlist",
            Format::M3u8 => "UTF-8 M3U Playlist",
            Format::Wpl => "Windows Media Playlist",
            Format::Xspf => "XML Shareable Playlist Format",
            Format::ITunes => "iTunes XML Playlist",
            Format::Ttpl => "TTPlayer Playlist",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Format::M3u => "m3u",
            Format::ExtM3u => "extm3u",
            Format::M3u8 => "m3u8",
            Format::Wpl => "wpl",
            Format::Xspf => "xspf",
            Format::ITunes => "itunes",
            Format::Ttpl => "ttpl",
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.to_lowercase().as_str() {
            "m3u" => Format::M3u,
            "extm3u" => Format::ExtM3u,
            "m3u8" => Format::M3u8,
            "wpl" => Format::Wpl,
            "xspf" => Format::Xspf,
            "itunes" | "xml" => Format::ITunes,
            "ttpl" => Format::Ttpl,
            _ => return Err(format!("unknown playlist format '{s}'")),
        };
        Ok(format)
    }
}

/// One entry as written in a playlist file, before resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryDescriptor {
    /// path or URI exactly as found in the file
    pub raw_path: String,
    pub title: Option<String>,
    pub duration_ms: Option<u64>,
}

impl EntryDescriptor {
    pub fn new(raw_path: impl Into<String>) -> Self {
        Self {
            raw_path: raw_path.into(),
            ..Default::default()
        }
    }
}

/// Result of parsing a playlist file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPlaylist {
    pub title: Option<String>,
    pub entries: Vec<EntryDescriptor>,
    /// malformed pieces that were dropped
    pub skipped: usize,
}

/// What a codec writes for one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportEntry {
    pub path: PathBuf,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportPlaylist {
    pub name: String,
    pub entries: Vec<ExportEntry>,
}

/// Where a playlist lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backing {
    Unsaved,
    File(PathBuf),
    /// the file it was loaded from has gone away
    Missing(PathBuf),
}

/// A playlist entry. Keeps the captured path and hints so an entry still
/// displays when its song is unresolved or has been removed from the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_id: Option<SongId>,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl PlaylistEntry {
    pub fn is_placeholder(&self) -> bool {
        self.song_id.is_none()
    }

    pub fn display_name(&self) -> String {
        match &self.title {
            Some(title) if !title.is_empty() => title.clone(),
            _ => self
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.to_string_lossy().into_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    pub entries: Vec<PlaylistEntry>,
    /// format it was imported from, if any
    pub source_format: Option<Format>,
    pub backing: Backing,
    /// changed since last save
    pub dirty: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_parse_from_their_names() {
        for format in [
            Format::M3u,
            Format::ExtM3u,
            Format::M3u8,
            Format::Wpl,
            Format::Xspf,
            Format::ITunes,
            Format::Ttpl,
        ] {
            assert_eq!(format.name().parse::<Format>(), Ok(format));
        }
        assert!("pls".parse::<Format>().is_err());
    }

    #[test]
    fn entry_display_name_falls_back_to_file_stem() {
        let mut entry = PlaylistEntry {
            song_id: None,
            path: PathBuf::from("/m/Some Song.flac"),
            title: None,
            duration_ms: None,
        };
        assert_eq!(entry.display_name(), "Some Song");
        entry.title = Some("Real Title".into());
        assert_eq!(entry.display_name(), "Real Title");
    }
}
