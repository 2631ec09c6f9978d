//! TTPlayer playlists. The file is XML in shape, but every `<item>` sits on a
//! line of its own and is read line by line, so one bad line costs one entry.

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

pub struct TtplCodec;

impl PlaylistCodec for TtplCodec {
    fn format(&self) -> Format {
        Format::Ttpl
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ttpl"]
    }

    fn detect(&self, bytes: &[u8]) -> u8 {
        if head(bytes).contains("<ttplaylist") {
            100
        } else {
            0
        }
    }

    fn parse(&self, bytes: &[u8]) -> Result<ParsedPlaylist, CodecError> {
        let text = decode_text(bytes);
        let mut parsed = ParsedPlaylist::default();

        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.starts_with("<ttplaylist") {
                parsed.title = read_element(line)
                    .ok()
                    .flatten()
                    .and_then(|attrs| attrs.title);
                continue;
            }
            if !is_item(line) {
                continue;
            }
            match read_element(line) {
                Ok(Some(Attrs {
                    file: Some(file),
                    title,
                    duration_ms,
                })) if !file.is_empty() => parsed.entries.push(EntryDescriptor {
                    raw_path: file,
                    title,
                    duration_ms,
                }),
                other => {
                    warn!("skipping TTPL line {}: {other:?}", number + 1);
                    parsed.skipped += 1;
                }
            }
        }

        Ok(parsed)
    }

    fn serialize(&self, playlist: &ExportPlaylist) -> Result<Vec<u8>, CodecError> {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\r\n");
        out.push_str(&format!(
            "<ttplaylist version=\"1.0\" title=\"{}\">\r\n<items>\r\n",
            escape(playlist.name.as_str())
        ));
        for entry in &playlist.entries {
            let file = entry.path.to_string_lossy();
            out.push_str(&format!("<item file=\"{}\"", escape(file.as_ref())));
            if let Some(title) = &entry.title {
                out.push_str(&format!(" title=\"{}\"", escape(title.as_str())));
            }
            if let Some(ms) = entry.duration_ms {
                out.push_str(&format!(" duration=\"{ms}\""));
            }
            out.push_str("/>\r\n");
        }
        out.push_str("</items>\r\n</ttplaylist>\r\n");
        Ok(out.into_bytes())
    }
}

/// True for an `<item>` element, not the `<items>` wrapper.
fn is_item(line: &str) -> bool {
    line.strip_prefix("<item")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_whitespace() || c == '/' || c == '>')
}

#[derive(Debug, Default)]
struct Attrs {
    file: Option<String>,
    title: Option<String>,
    duration_ms: Option<u64>,
}

/// Attributes of the first element on `line`.
fn read_element(line: &str) -> Result<Option<Attrs>, CodecError> {
    let mut reader = Reader::from_str(line);
    reader.config_mut().check_end_names = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => return attrs_of(&e).map(Some),
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

fn attrs_of(element: &BytesStart<'_>) -> Result<Attrs, CodecError> {
    let mut attrs = Attrs::default();
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let value = attr.unescape_value()?.into_owned();
        match attr.key.local_name().as_ref() {
            b"file" => attrs.file = Some(value),
            b"title" => attrs.title = Some(value),
            b"duration" => attrs.duration_ms = value.trim().parse().ok(),
            _ => {}
        }
    }
    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::playlist::ExportEntry;

    #[test]
    fn bad_lines_are_skipped_individually() -> anyhow::Result<()> {
        let text = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\r\n\
<ttplaylist version=\"1.0\" title=\"Old Songs\">\r\n\
<items>\r\n\
<item file=\"D:\\Music\\a.mp3\" title=\"A\" duration=\"180000\"/>\r\n\
<item file=\"D:\\Music\\b.mp3\" title=\"broken/>\r\n\
<item title=\"no file\"/>\r\n\
<item file=\"c.wma\"/>\r\n\
</items>\r\n\
</ttplaylist>\r\n";
        let parsed = TtplCodec.parse(text.as_bytes())?;
        assert_eq!(parsed.title.as_deref(), Some("Old Songs"));
        assert_eq!(parsed.skipped, 2);
        assert_eq!(
            parsed.entries,
            vec![
                EntryDescriptor {
                    raw_path: r"D:\Music\a.mp3".into(),
                    title: Some("A".into()),
                    duration_ms: Some(180_000),
                },
                EntryDescriptor::new("c.wma"),
            ]
        );
        Ok(())
    }

    #[test]
    fn items_wrapper_is_not_an_entry() {
        assert!(is_item("<item file=\"a.mp3\"/>"));
        assert!(is_item("<item/>"));
        assert!(!is_item("<items>"));
        assert!(!is_item("</items>"));
    }

    #[test]
    fn round_trip() -> anyhow::Result<()> {
        let export = ExportPlaylist {
            name: "\"Quoted\" & more".into(),
            entries: vec![
                ExportEntry {
                    path: PathBuf::from("/m/a.mp3"),
                    title: Some("<A>".into()),
                    duration_ms: Some(5),
                    ..Default::default()
                },
                ExportEntry {
                    path: PathBuf::from("/m/b.mp3"),
                    ..Default::default()
                },
            ],
        };
        let bytes = TtplCodec.serialize(&export)?;
        assert_eq!(TtplCodec.detect(&bytes), 100);

        let parsed = TtplCodec.parse(&bytes)?;
        assert_eq!(parsed.title.as_deref(), Some("\"Quoted\" & more"));
        assert_eq!(parsed.skipped, 0);
        assert_eq!(
            parsed.entries,
            vec![
                EntryDescriptor {
                    raw_path: "/m/a.mp3".into(),
                    title: Some("<A>".into()),
                    duration_ms: Some(5),
                },
                EntryDescriptor::new("/m/b.mp3"),
            ]
        );
        Ok(())
    }
}
