//! Playlist formats behind one trait, and the registry that picks a codec for a file.

pub mod itunes;
pub mod m3u;
pub mod ttpl;
pub mod wpl;
pub mod xspf;

use std::{cmp::Reverse, path::Path};

use log::debug;

use super::{ExportPlaylist, Format, ParsedPlaylist, error::CodecError};

/// Reads and writes one playlist format.
pub trait PlaylistCodec: Send + Sync {
    fn format(&self) -> Format;

    /// lower-case, without the dot
    fn extensions(&self) -> &'static [&'static str];

    /// How sure the codec is that `bytes` are in its format: 0 not at all, 100 certain.
    fn detect(&self, bytes: &[u8]) -> u8;

    fn parse(&self, bytes: &[u8]) -> Result<ParsedPlaylist, CodecError>;

    fn serialize(&self, playlist: &ExportPlaylist) -> Result<Vec<u8>, CodecError>;
}

#[derive(Default)]
pub struct CodecRegistry {
    codecs: Vec<Box<dyn PlaylistCodec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_codecs() -> Self {
        let mut registry = Self::new();
        registry.register(m3u::M3uCodec::plain());
        registry.register(m3u::M3uCodec::extended());
        registry.register(m3u::M3uCodec::utf8());
        registry.register(wpl::WplCodec);
        registry.register(xspf::XspfCodec);
        registry.register(itunes::ITunesCodec);
        registry.register(ttpl::TtplCodec);
        registry
    }

    /// Adds `codec`, replacing the codec already registered for its format.
    pub fn register(&mut self, codec: impl PlaylistCodec + 'static) {
        let codec: Box<dyn PlaylistCodec> = Box::new(codec);
        match self.codecs.iter_mut().find(|c| c.format() == codec.format()) {
            Some(slot) => *slot = codec,
            None => self.codecs.push(codec),
        }
    }

    pub fn codec(&self, format: Format) -> Option<&dyn PlaylistCodec> {
        self.codecs
            .iter()
            .find(|c| c.format() == format)
            .map(|c| c.as_ref())
    }

    pub fn formats(&self) -> impl Iterator<Item = Format> + '_ {
        self.codecs.iter().map(|c| c.format())
    }

    /// First registered format claiming the extension of `path`.
    pub fn format_for_extension(&self, path: &Path) -> Option<Format> {
        let ext = extension_of(path)?;
        self.codecs
            .iter()
            .find(|c| c.extensions().contains(&ext.as_str()))
            .map(|c| c.format())
    }

    /// The most confident codec wins; on a tie a codec claiming the file's
    /// extension beats one that doesn't, then registration order decides.
    pub fn detect(&self, bytes: &[u8], path: &Path) -> Option<Format> {
        let ext = extension_of(path);
        let best = self
            .codecs
            .iter()
            .enumerate()
            .map(|(order, codec)| {
                let score = codec.detect(bytes);
                let ext_match = ext
                    .as_deref()
                    .is_some_and(|ext| codec.extensions().contains(&ext));
                (score, ext_match, Reverse(order), codec.format())
            })
            .filter(|(score, ..)| *score > 0)
            .max_by_key(|(score, ext_match, order, _)| (*score, *ext_match, *order));

        debug!("detected {:?} for {}", best, path.display());
        best.map(|(.., format)| format)
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Text of a playlist file: UTF-8 (BOM stripped) when valid, otherwise Latin-1.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Latin-1 bytes of `text`; characters outside Latin-1 become `?`.
pub(crate) fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

pub(crate) const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Leading bytes of a text file, lossily decoded, for cheap sniffing.
pub(crate) fn head(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    String::from_utf8_lossy(&bytes[..bytes.len().min(1024)]).into_owned()
}
