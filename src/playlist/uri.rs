//! `file://` URIs as written by XSPF and iTunes playlists.

use std::path::{Path, PathBuf};

use urlencoding::{decode, encode};

/// `file:///music/a%20b.mp3` for `/music/a b.mp3`. Each path segment is
/// percent-encoded on its own, so separators survive.
pub fn file_uri(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    let encoded: Vec<String> = text
        .split('/')
        .map(|segment| {
            if is_drive(segment) {
                segment.to_string()
            } else {
                encode(segment).into_owned()
            }
        })
        .collect();
    let joined = encoded.join("/");
    if joined.starts_with('/') {
        format!("file://{joined}")
    } else {
        format!("file:///{joined}")
    }
}

/// Path named by a `file:` URI, `None` for anything else.
pub fn path_from_uri(uri: &str) -> Option<PathBuf> {
    let rest = uri
        .strip_prefix("file://localhost")
        .or_else(|| uri.strip_prefix("file://"))
        .or_else(|| uri.strip_prefix("file:"))?;
    let decoded = decode(rest).ok()?;
    let decoded: &str = &decoded;
    // file:///C:/x
    let path = match decoded.strip_prefix('/') {
        Some(windows) if windows.split('/').next().is_some_and(is_drive) => windows,
        _ => decoded,
    };
    Some(PathBuf::from(path))
}

pub fn is_uri(text: &str) -> bool {
    text.split_once("://").is_some_and(|(scheme, _)| {
        scheme.len() > 1 && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+')
    })
}

fn is_drive(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
