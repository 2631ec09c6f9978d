//! M3U in its three flavours: plain path lists, extended M3U with `#EXTINF`
//! lines, and the UTF-8 variant of extended M3U.

use log::warn;

use super::{PlaylistCodec, UTF8_BOM, decode_text, encode_latin1};
use crate::playlist::{
    EntryDescriptor, ExportPlaylist, Format, ParsedPlaylist, error::CodecError,
};

const HEADER: &str = "#EXTM3U";
const EXTINF: &str = "#EXTINF:";
const LINE_END: &str = "\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavour {
    Plain,
    Extended,
    Utf8,
}

pub struct M3uCodec {
    flavour: Flavour,
}

impl M3uCodec {
    pub fn plain() -> Self {
        Self {
            flavour: Flavour::Plain,
        }
    }

    pub fn extended() -> Self {
        Self {
            flavour: Flavour::Extended,
        }
    }

    pub fn utf8() -> Self {
        Self {
            flavour: Flavour::Utf8,
        }
    }

    fn encode(&self, text: &str) -> Vec<u8> {
        match self.flavour {
            Flavour::Utf8 => text.as_bytes().to_vec(),
            Flavour::Plain | Flavour::Extended => encode_latin1(text),
        }
    }
}

impl PlaylistCodec for M3uCodec {
    fn format(&self) -> Format {
        match self.flavour {
            Flavour::Plain => Format::M3u,
            Flavour::Extended => Format::ExtM3u,
            Flavour::Utf8 => Format::M3u8,
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        match self.flavour {
            Flavour::Plain | Flavour::Extended => &["m3u"],
            Flavour::Utf8 => &["m3u8"],
        }
    }

    fn detect(&self, bytes: &[u8]) -> u8 {
        if bytes.contains(&0) {
            return 0;
        }
        let has_bom = bytes.starts_with(UTF8_BOM);
        let text = decode_text(bytes);
        let first = text.lines().map(str::trim).find(|l| !l.is_empty());
        if first.is_some_and(|l| l.starts_with('<')) {
            return 0;
        }
        let has_header = first.is_some_and(|l| l.starts_with(HEADER));
        let utf8 = std::str::from_utf8(bytes).is_ok();

        match self.flavour {
            Flavour::Plain if has_header => 10,
            Flavour::Plain => 20,
            Flavour::Extended if has_header && has_bom => 60,
            Flavour::Extended if has_header => 80,
            Flavour::Extended => 0,
            Flavour::Utf8 if has_bom => 90,
            Flavour::Utf8 if !utf8 => 0,
            Flavour::Utf8 if has_header && !bytes.is_ascii() => 85,
            Flavour::Utf8 if has_header => 80,
            Flavour::Utf8 => 20,
        }
    }

    fn parse(&self, bytes: &[u8]) -> Result<ParsedPlaylist, CodecError> {
        let text = match self.flavour {
            Flavour::Utf8 => {
                let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                String::from_utf8_lossy(bytes).into_owned()
            }
            Flavour::Plain | Flavour::Extended => decode_text(bytes),
        };
        let extended = self.flavour != Flavour::Plain;

        let mut parsed = ParsedPlaylist::default();
        let mut pending: Option<(Option<u64>, String)> = None;

        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(info) = line.strip_prefix(EXTINF) {
                if !extended {
                    continue;
                }
                match parse_extinf(info) {
                    Some(hint) => pending = Some(hint),
                    None => {
                        warn!("skipping malformed #EXTINF on line {}: {line}", number + 1);
                        parsed.skipped += 1;
                        pending = None;
                    }
                }
                continue;
            }
            if line.starts_with('#') {
                continue;
            }

            let (duration_ms, title) = pending.take().unwrap_or_default();
            parsed.entries.push(EntryDescriptor {
                raw_path: line.to_string(),
                title: (!title.is_empty()).then_some(title),
                duration_ms,
            });
        }

        Ok(parsed)
    }

    fn serialize(&self, playlist: &ExportPlaylist) -> Result<Vec<u8>, CodecError> {
        let mut out = String::new();
        if self.flavour != Flavour::Plain {
            out.push_str(HEADER);
            out.push_str(LINE_END);
        }
        for entry in &playlist.entries {
            if self.flavour != Flavour::Plain {
                let seconds = entry
                    .duration_ms
                    .map(|ms| (ms / 1000).to_string())
                    .unwrap_or_else(|| "-1".to_string());
                let title = match (&entry.artist, &entry.title) {
                    (Some(artist), Some(title)) if !artist.is_empty() => {
                        format!("{artist} - {title}")
                    }
                    (_, Some(title)) => title.clone(),
                    (_, None) => String::new(),
                };
                out.push_str(&format!("{EXTINF}{seconds},{title}{LINE_END}"));
            }
            out.push_str(&entry.path.to_string_lossy());
            out.push_str(LINE_END);
        }
        Ok(self.encode(&out))
    }
}

/// `<seconds>,<title>`; `-1` or any negative duration means unknown.
fn parse_extinf(info: &str) -> Option<(Option<u64>, String)> {
    let (seconds, title) = info.split_once(',')?;
    let seconds: f64 = seconds.trim().parse().ok()?;
    let duration_ms = (seconds >= 0.0).then(|| (seconds * 1000.0).round() as u64);
    Some((duration_ms, title.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::playlist::ExportEntry;

    #[test]
    fn plain_lists_skip_comments() -> anyhow::Result<()> {
        let parsed = M3uCodec::plain().parse(b"# mix\r\n/m/a.mp3\r\n\r\nrel/b.mp3\n")?;
        let paths: Vec<_> = parsed.entries.iter().map(|e| e.raw_path.as_str()).collect();
        assert_eq!(paths, vec!["/m/a.mp3", "rel/b.mp3"]);
        assert_eq!(parsed.skipped, 0);
        Ok(())
    }

    #[test]
    fn extinf_hints_attach_to_next_path() -> anyhow::Result<()> {
        let bytes = b"#EXTM3U\r\n#EXTINF:215,Queen - Innuendo\r\n/m/a.mp3\r\n#EXTINF:-1,Live\r\n/m/b.mp3\r\n/m/c.mp3\r\n";
        let parsed = M3uCodec::extended().parse(bytes)?;
        assert_eq!(
            parsed.entries,
            vec![
                EntryDescriptor {
                    raw_path: "/m/a.mp3".into(),
                    title: Some("Queen - Innuendo".into()),
                    duration_ms: Some(215_000),
                },
                EntryDescriptor {
                    raw_path: "/m/b.mp3".into(),
                    title: Some("Live".into()),
                    duration_ms: None,
                },
                EntryDescriptor::new("/m/c.mp3"),
            ]
        );
        Ok(())
    }

    #[test]
    fn malformed_extinf_is_counted_but_path_kept() -> anyhow::Result<()> {
        let mut text = String::from("#EXTM3U\r\n");
        for i in 0..10 {
            if i == 4 {
                text.push_str("#EXTINF:abc,broken\r\n");
            } else if i == 7 {
                text.push_str("#EXTINF:no comma here\r\n");
            } else {
                text.push_str(&format!("#EXTINF:{i},Song {i}\r\n"));
            }
            text.push_str(&format!("/m/{i}.mp3\r\n"));
        }

        let parsed = M3uCodec::extended().parse(text.as_bytes())?;
        assert_eq!(parsed.entries.len(), 10);
        assert_eq!(parsed.skipped, 2);
        assert_eq!(parsed.entries[4].raw_path, "/m/4.mp3");
        assert_eq!(parsed.entries[4].title, None);
        assert_eq!(parsed.entries[5].title.as_deref(), Some("Song 5"));
        Ok(())
    }

    #[test]
    fn latin1_round_trip() -> anyhow::Result<()> {
        let codec = M3uCodec::extended();
        let export = ExportPlaylist {
            name: "x".into(),
            entries: vec![ExportEntry {
                path: PathBuf::from("/m/Café.mp3"),
                title: Some("Café".into()),
                duration_ms: Some(61_500),
                ..Default::default()
            }],
        };
        let bytes = codec.serialize(&export)?;
        assert_eq!(bytes, b"#EXTM3U\r\n#EXTINF:61,Caf\xe9\r\n/m/Caf\xe9.mp3\r\n");

        let parsed = codec.parse(&bytes)?;
        assert_eq!(parsed.entries[0].raw_path, "/m/Café.mp3");
        assert_eq!(parsed.entries[0].duration_ms, Some(61_000));
        Ok(())
    }

    #[test]
    fn m3u8_keeps_unicode_and_strips_bom() -> anyhow::Result<()> {
        let codec = M3uCodec::utf8();
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("#EXTM3U\n#EXTINF:1,周杰倫\n/m/周.mp3\n".as_bytes());
        let parsed = codec.parse(&bytes)?;
        assert_eq!(parsed.entries[0].raw_path, "/m/周.mp3");
        assert_eq!(parsed.entries[0].title.as_deref(), Some("周杰倫"));

        let export = ExportPlaylist {
            name: "x".into(),
            entries: vec![ExportEntry {
                path: PathBuf::from("/m/周.mp3"),
                ..Default::default()
            }],
        };
        let written = String::from_utf8(codec.serialize(&export)?)?;
        assert_eq!(written, "#EXTM3U\r\n#EXTINF:-1,\r\n/m/周.mp3\r\n");
        Ok(())
    }
}
