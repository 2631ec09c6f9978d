//! XML Shareable Playlist Format, version 1.

use log::warn;
use quick_xml::{Reader, escape::escape, events::Event};

use super::{PlaylistCodec, decode_text, head};
use crate::playlist::{
    EntryDescriptor, ExportPlaylist, Format, ParsedPlaylist, error::CodecError, uri::file_uri,
};

const NAMESPACE: &str = "http://xspf.org/ns/0/";

pub struct XspfCodec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    PlaylistTitle,
    Location,
    Title,
    Duration,
    Other,
}

impl PlaylistCodec for XspfCodec {
    fn format(&self) -> Format {
        Format::Xspf
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["xspf"]
    }

    fn detect(&self, bytes: &[u8]) -> u8 {
        let head = head(bytes);
        if head.contains(NAMESPACE) {
            100
        } else if head.contains("<playlist") && head.contains("<trackList") {
            60
        } else {
            0
        }
    }

    fn parse(&self, bytes: &[u8]) -> Result<ParsedPlaylist, CodecError> {
        let text = decode_text(bytes);
        let mut reader = Reader::from_str(&text);
        reader.config_mut().trim_text(true);

        let mut parsed = ParsedPlaylist::default();
        let mut track: Option<EntryDescriptor> = None;
        let mut slot = Slot::Other;
        // set when a value inside the current track could not be read
        let mut broken = false;

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) if parsed.entries.is_empty() => return Err(e.into()),
                Err(e) => {
                    warn!(
                        "XSPF parse stopped at byte {}: {e}",
                        reader.buffer_position()
                    );
                    parsed.skipped += 1;
                    break;
                }
            };
            match event {
                Event::Start(e) => {
                    slot = match (e.local_name().as_ref(), track.is_some()) {
                        (b"track", false) => {
                            track = Some(EntryDescriptor::default());
                            broken = false;
                            Slot::Other
                        }
                        (b"location", true) => Slot::Location,
                        (b"title", true) => Slot::Title,
                        (b"duration", true) => Slot::Duration,
                        (b"title", false) => Slot::PlaylistTitle,
                        _ => Slot::Other,
                    };
                }
                Event::Text(t) => {
                    let value = match t.unescape() {
                        Ok(value) => value.into_owned(),
                        Err(e) => {
                            warn!("unreadable XSPF text: {e}");
                            broken |= track.is_some();
                            continue;
                        }
                    };
                    match (slot, track.as_mut()) {
                        (Slot::PlaylistTitle, _) => parsed.title = Some(value),
                        // first location wins
                        (Slot::Location, Some(track)) if track.raw_path.is_empty() => {
                            track.raw_path = value
                        }
                        (Slot::Title, Some(track)) => track.title = Some(value),
                        (Slot::Duration, Some(track)) => track.duration_ms = value.parse().ok(),
                        _ => {}
                    }
                }
                Event::End(e) => {
                    slot = Slot::Other;
                    if e.local_name().as_ref() == b"track" {
                        match track.take() {
                            Some(_) if broken => parsed.skipped += 1,
                            Some(track) if !track.raw_path.is_empty() => parsed.entries.push(track),
                            _ => {
                                warn!("skipping XSPF track without a location");
                                parsed.skipped += 1;
                            }
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(parsed)
    }

    fn serialize(&self, playlist: &ExportPlaylist) -> Result<Vec<u8>, CodecError> {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(&format!("<playlist version=\"1\" xmlns=\"{NAMESPACE}\">\n"));
        out.push_str(&format!("  <title>{}</title>\n", escape(playlist.name.as_str())));
        out.push_str("  <trackList>\n");
        for entry in &playlist.entries {
            out.push_str("    <track>\n");
            let location = file_uri(&entry.path);
            out.push_str(&format!("      <location>{}</location>\n", escape(location.as_str())));
            let optional = [
                ("title", entry.title.clone()),
                ("creator", entry.artist.clone()),
                ("album", entry.album.clone()),
                ("duration", entry.duration_ms.map(|ms| ms.to_string())),
            ];
            for (tag, value) in optional {
                if let Some(value) = value.filter(|v| !v.is_empty()) {
                    out.push_str(&format!("      <{tag}>{}</{tag}>\n", escape(value.as_str())));
                }
            }
            out.push_str("    </track>\n");
        }
        out.push_str("  </trackList>\n</playlist>\n");
        Ok(out.into_bytes())
    }
}
