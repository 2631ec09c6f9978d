//! iTunes XML playlists: a property list holding a `Tracks` dictionary keyed
//! by track id and a `Playlists` array whose items reference those ids.

use std::io::Cursor;

use log::warn;
use plist::{Dictionary, Value};

use super::{PlaylistCodec, head};
use crate::playlist::{
    EntryDescriptor, ExportPlaylist, Format, ParsedPlaylist, error::CodecError, uri::file_uri,
};

pub struct ITunesCodec;

impl PlaylistCodec for ITunesCodec {
    fn format(&self) -> Format {
        Format::ITunes
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["xml"]
    }

    fn detect(&self, bytes: &[u8]) -> u8 {
        let head = head(bytes);
        if !head.contains("<plist") {
            return 0;
        }
        if head.contains("<key>Tracks</key>") || head.contains("<key>Major Version</key>") {
            95
        } else {
            50
        }
    }

    fn parse(&self, bytes: &[u8]) -> Result<ParsedPlaylist, CodecError> {
        let value = Value::from_reader(Cursor::new(bytes))?;
        let root = value
            .as_dictionary()
            .ok_or_else(|| CodecError::Malformed("root is not a dictionary".into()))?;
        let tracks = root
            .get("Tracks")
            .and_then(Value::as_dictionary)
            .ok_or_else(|| CodecError::Malformed("no Tracks dictionary".into()))?;
        let playlist = root
            .get("Playlists")
            .and_then(Value::as_array)
            .and_then(|playlists| playlists.first())
            .and_then(Value::as_dictionary)
            .ok_or_else(|| CodecError::Malformed("no playlist in Playlists".into()))?;

        let mut parsed = ParsedPlaylist {
            title: playlist
                .get("Name")
                .and_then(Value::as_string)
                .map(str::to_string),
            ..Default::default()
        };

        let items = playlist
            .get("Playlist Items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for item in items {
            let track = item
                .as_dictionary()
                .and_then(|item| item.get("Track ID"))
                .and_then(integer)
                .and_then(|id| tracks.get(&id.to_string()))
                .and_then(Value::as_dictionary);
            let Some(track) = track else {
                warn!("skipping iTunes playlist item with an unknown track id");
                parsed.skipped += 1;
                continue;
            };
            let Some(location) = track.get("Location").and_then(Value::as_string) else {
                // remote or streamed
                parsed.skipped += 1;
                continue;
            };

            parsed.entries.push(EntryDescriptor {
                raw_path: location.to_string(),
                title: track
                    .get("Name")
                    .and_then(Value::as_string)
                    .map(str::to_string),
                duration_ms: track
                    .get("Total Time")
                    .and_then(integer)
                    .and_then(|ms| u64::try_from(ms).ok()),
            });
        }

        Ok(parsed)
    }

    fn serialize(&self, playlist: &ExportPlaylist) -> Result<Vec<u8>, CodecError> {
        let mut tracks = Dictionary::new();
        let mut items = Vec::with_capacity(playlist.entries.len());

        for (i, entry) in playlist.entries.iter().enumerate() {
            let id = i64::try_from(i + 1)
                .map_err(|_| CodecError::Malformed("too many entries".into()))?;
            let mut track = Dictionary::new();
            track.insert("Track ID".into(), Value::Integer(id.into()));
            let optional = [
                ("Name", entry.title.as_ref()),
                ("Artist", entry.artist.as_ref()),
                ("Album", entry.album.as_ref()),
            ];
            for (key, value) in optional {
                if let Some(value) = value {
                    track.insert(key.into(), Value::String(value.clone()));
                }
            }
            if let Some(ms) = entry.duration_ms.and_then(|ms| i64::try_from(ms).ok()) {
                track.insert("Total Time".into(), Value::Integer(ms.into()));
            }
            let location = file_uri(&entry.path).replacen("file://", "file://localhost", 1);
            track.insert("Location".into(), Value::String(location));
            tracks.insert(id.to_string(), Value::Dictionary(track));

            let mut item = Dictionary::new();
            item.insert("Track ID".into(), Value::Integer(id.into()));
            items.push(Value::Dictionary(item));
        }

        let mut list = Dictionary::new();
        list.insert("Name".into(), Value::String(playlist.name.clone()));
        list.insert("Playlist Items".into(), Value::Array(items));

        let mut root = Dictionary::new();
        root.insert("Major Version".into(), Value::Integer(1i64.into()));
        root.insert("Minor Version".into(), Value::Integer(1i64.into()));
        root.insert("Tracks".into(), Value::Dictionary(tracks));
        root.insert("Playlists".into(), Value::Array(vec![Value::Dictionary(list)]));

        let mut out = Vec::new();
        Value::Dictionary(root).to_writer_xml(&mut out)?;
        Ok(out)
    }
}

fn integer(value: &Value) -> Option<i64> {
    value
        .as_signed_integer()
        .or_else(|| value.as_unsigned_integer().and_then(|n| i64::try_from(n).ok()))
}
