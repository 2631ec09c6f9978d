//! Windows Media Player playlists (`.wpl`).

use log::warn;
use quick_xml::{
    Reader,
    escape::escape,
    events::{BytesStart, Event},
};

use super::{PlaylistCodec, decode_text, head};
use crate::playlist::{
    EntryDescriptor, ExportPlaylist, Format, ParsedPlaylist, error::CodecError,
};

pub struct WplCodec;

impl PlaylistCodec for WplCodec {
    fn format(&self) -> Format {
        Format::Wpl
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["wpl"]
    }

    fn detect(&self, bytes: &[u8]) -> u8 {
        let head = head(bytes);
        if head.contains("<?wpl") {
            100
        } else if head.contains("<smil") {
            70
        } else {
            0
        }
    }

    fn parse(&self, bytes: &[u8]) -> Result<ParsedPlaylist, CodecError> {
        let text = decode_text(bytes);
        let mut reader = Reader::from_str(&text);
        reader.config_mut().trim_text(true);

        let mut parsed = ParsedPlaylist::default();
        let mut in_title = false;

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) if parsed.entries.is_empty() => return Err(e.into()),
                Err(e) => {
                    // keep what was read so far
                    warn!(
                        "WPL parse stopped at byte {}: {e}",
                        reader.buffer_position()
                    );
                    parsed.skipped += 1;
                    break;
                }
            };
            match event {
                Event::Start(e) if e.local_name().as_ref() == b"title" => in_title = true,
                Event::End(e) if e.local_name().as_ref() == b"title" => in_title = false,
                Event::Text(t) if in_title => match t.unescape() {
                    Ok(title) => parsed.title = Some(title.into_owned()),
                    Err(e) => warn!("ignoring unreadable WPL title: {e}"),
                },
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"media" => {
                    match media_source(&e) {
                        Ok(Some(src)) => parsed.entries.push(EntryDescriptor::new(src)),
                        Ok(None) => parsed.skipped += 1,
                        Err(e) => {
                            warn!("skipping WPL media element: {e}");
                            parsed.skipped += 1;
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
        out.push_str("<?wpl version=\"1.0\"?>\r\n<smil>\r\n  <head>\r\n");
        out.push_str("    <meta name=\"Generator\" content=\"songshelf\"/>\r\n");
        out.push_str(&format!(
            "    <meta name=\"ItemCount\" content=\"{}\"/>\r\n",
            playlist.entries.len()
        ));
        out.push_str(&format!("    <title>{}</title>\r\n", escape(playlist.name.as_str())));
        out.push_str("  </head>\r\n  <body>\r\n    <seq>\r\n");
        for entry in &playlist.entries {
            let src = entry.path.to_string_lossy();
            out.push_str(&format!("      <media src=\"{}\"/>\r\n", escape(src.as_ref())));
        }
        out.push_str("    </seq>\r\n  </body>\r\n</smil>\r\n");
        Ok(out.into_bytes())
    }
}

/// Unescaped `src` of a `<media>` element, if it has one.
fn media_source(element: &BytesStart<'_>) -> Result<Option<String>, quick_xml::Error> {
    match element
        .try_get_attribute("src")
        .map_err(quick_xml::Error::from)?
    {
        Some(src) => Ok(Some(src.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}
