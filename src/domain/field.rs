use std::{fmt::Display, str::FromStr};

use super::song::SongRecord;

/// Every attribute of a song record that can be compared, searched or grouped on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Path,
    Name,
    Artist,
    Album,
    AlbumArtist,
    Genre,
    Composer,
    Comments,
    Kind,
    TrackNumber,
    TrackCount,
    DiscNumber,
    DiscCount,
    Year,
    Rating,
    PlayCount,
    LastPlayed,
    DateAdded,
    DateModified,
    /// whole seconds
    Duration,
    BitRate,
    SampleRate,
    Size,
}

/// Value of one field of one song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Number(Option<i64>),
}

impl FieldValue {
    /// Rendering used for substring matching and for category keys.
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Number(Some(n)) => n.to_string(),
            FieldValue::Number(None) => String::new(),
        }
    }
}

impl Field {
    pub const ALL: &'static [Field] = &[
        Field::Path,
        Field::Name,
        Field::Artist,
        Field::Album,
        Field::AlbumArtist,
        Field::Genre,
        Field::Composer,
        Field::Comments,
        Field::Kind,
        Field::TrackNumber,
        Field::TrackCount,
        Field::DiscNumber,
        Field::DiscCount,
        Field::Year,
        Field::Rating,
        Field::PlayCount,
        Field::LastPlayed,
        Field::DateAdded,
        Field::DateModified,
        Field::Duration,
        Field::BitRate,
        Field::SampleRate,
        Field::Size,
    ];

    /// Fields grouped by the category index.
    pub const CATEGORIZED: &'static [Field] =
        &[Field::Artist, Field::Album, Field::Genre, Field::Year];

    /// Looks a field up by one of its query names, ignoring case.
    pub fn from_query_name(name: &str) -> Option<Field> {
        let field = match name.to_lowercase().as_str() {
            "path" | "file" => Field::Path,
            "name" | "title" => Field::Name,
            "artist" => Field::Artist,
            "album" => Field::Album,
            "albumartist" | "album_artist" => Field::AlbumArtist,
            "genre" => Field::Genre,
            "composer" => Field::Composer,
            "comment" | "comments" => Field::Comments,
            "kind" => Field::Kind,
            "track" => Field::TrackNumber,
            "tracks" | "trackcount" => Field::TrackCount,
            "disc" => Field::DiscNumber,
            "discs" | "disccount" => Field::DiscCount,
            "year" => Field::Year,
            "rating" => Field::Rating,
            "plays" | "playcount" | "play_count" => Field::PlayCount,
            "lastplayed" | "last_played" => Field::LastPlayed,
            "added" | "dateadded" => Field::DateAdded,
            "modified" | "datemodified" => Field::DateModified,
            "duration" | "time" => Field::Duration,
            "bitrate" => Field::BitRate,
            "samplerate" => Field::SampleRate,
            "size" => Field::Size,
            _ => return None,
        };
        Some(field)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Field::Path => "path",
            Field::Name => "name",
            Field::Artist => "artist",
            Field::Album => "album",
            Field::AlbumArtist => "albumartist",
            Field::Genre => "genre",
            Field::Composer => "composer",
            Field::Comments => "comments",
            Field::Kind => "kind",
            Field::TrackNumber => "track",
            Field::TrackCount => "trackcount",
            Field::DiscNumber => "disc",
            Field::DiscCount => "disccount",
            Field::Year => "year",
            Field::Rating => "rating",
            Field::PlayCount => "playcount",
            Field::LastPlayed => "lastplayed",
            Field::DateAdded => "added",
            Field::DateModified => "modified",
            Field::Duration => "duration",
            Field::BitRate => "bitrate",
            Field::SampleRate => "samplerate",
            Field::Size => "size",
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(
            self,
            Field::Path
                | Field::Name
                | Field::Artist
                | Field::Album
                | Field::AlbumArtist
                | Field::Genre
                | Field::Composer
                | Field::Comments
                | Field::Kind
        )
    }

    pub fn value_of(&self, song: &SongRecord) -> FieldValue {
        let meta = &song.metadata;
        let stats = &song.stats;
        let text = |s: &String| FieldValue::Text(s.clone());
        let num = |n: Option<u32>| FieldValue::Number(n.map(i64::from));
        match self {
            Field::Path => FieldValue::Text(song.path.to_string_lossy().into_owned()),
            Field::Name => text(&meta.name),
            Field::Artist => text(&meta.artist),
            Field::Album => text(&meta.album),
            Field::AlbumArtist => text(&meta.album_artist),
            Field::Genre => text(&meta.genre),
            Field::Composer => text(&meta.composer),
            Field::Comments => text(&meta.comments),
            Field::Kind => text(&meta.kind),
            Field::TrackNumber => num(meta.track_number),
            Field::TrackCount => num(meta.track_count),
            Field::DiscNumber => num(meta.disc_number),
            Field::DiscCount => num(meta.disc_count),
            Field::Year => num(meta.year),
            Field::Rating => num(Some(stats.rating)),
            Field::PlayCount => num(Some(stats.play_count)),
            Field::LastPlayed => FieldValue::Number(stats.last_played),
            Field::DateAdded => FieldValue::Number(Some(stats.date_added)),
            Field::DateModified => FieldValue::Number(meta.date_modified),
            Field::Duration => {
                FieldValue::Number(meta.duration_ms.map(|ms| i64::try_from(ms / 1000).unwrap_or(i64::MAX)))
            }
            Field::BitRate => num(meta.bit_rate),
            Field::SampleRate => num(meta.sample_rate),
            Field::Size => {
                FieldValue::Number(meta.size.map(|s| i64::try_from(s).unwrap_or(i64::MAX)))
            }
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::from_query_name(s).ok_or_else(|| format!("unknown field '{s}'"))
    }
}
