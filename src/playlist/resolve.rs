//! Turns entry descriptors read from a playlist file into playlist entries
//! pointing at library songs.

use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::{
    domain::song::SongId,
    storage::{
        error::StorageError,
        fs::{is_valid_music_path, normalize_path, raw_metadata_for_file},
        library::Library,
    },
};

use super::{
    EntryDescriptor, PlaylistEntry,
    uri::{is_uri, path_from_uri},
};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    pub entries: Vec<PlaylistEntry>,
    pub resolved: usize,
    pub placeholders: usize,
    /// songs added to the library while resolving
    pub inserted: usize,
}

/// Absolute, normalized path named by `raw`. Relative paths are taken
/// relative to `base_dir`, the directory of the playlist file.
pub fn entry_path(raw: &str, base_dir: Option<&Path>) -> PathBuf {
    let path = if is_uri(raw) || raw.starts_with("file:") {
        match path_from_uri(raw) {
            Some(path) => path,
            // other schemes are kept verbatim and never resolve
            None => return PathBuf::from(raw),
        }
    } else {
        PathBuf::from(raw)
    };

    let path = match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    };
    normalize_path(&path)
}

/// Resolves every descriptor, in order. Nothing is dropped: an entry that
/// matches no library song becomes a placeholder.
///
/// When `add_missing` is set, a music file that exists on disk but is not in
/// the library is added to it, taking the title and duration hints as its
/// initial metadata.
pub fn resolve_entries(
    library: &Library,
    descriptors: Vec<EntryDescriptor>,
    base_dir: Option<&Path>,
    add_missing: bool,
) -> Result<Resolution, StorageError> {
    let mut resolution = Resolution::default();

    for descriptor in descriptors {
        let path = entry_path(&descriptor.raw_path, base_dir);

        let song_id = match library.find_by_path(&path)? {
            Some(song) => Some(song.id),
            None if add_missing && is_valid_music_path(&path) => {
                match add_to_library(library, &path, &descriptor) {
                    Ok(id) => {
                        resolution.inserted += 1;
                        Some(id)
                    }
                    Err(e) => {
                        warn!("could not add {} to the library: {e}", path.display());
                        None
                    }
                }
            }
            None => None,
        };

        match song_id {
            Some(_) => resolution.resolved += 1,
            None => {
                debug!("no library song for playlist entry {}", path.display());
                resolution.placeholders += 1;
            }
        }

        resolution.entries.push(PlaylistEntry {
            song_id,
            path,
            title: descriptor.title,
            duration_ms: descriptor.duration_ms,
        });
    }

    Ok(resolution)
}

fn add_to_library(
    library: &Library,
    path: &Path,
    descriptor: &EntryDescriptor,
) -> Result<SongId, StorageError> {
    let mut raw = raw_metadata_for_file(path)?;
    if let Some(title) = descriptor.title.as_ref().filter(|t| !t.is_empty()) {
        raw.metadata.name = title.clone();
    }
    if descriptor.duration_ms.is_some() {
        raw.metadata.duration_ms = descriptor.duration_ms;
    }
    library.insert_or_update(raw)
}
