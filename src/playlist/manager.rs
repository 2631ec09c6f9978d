//! Owns the list of playlists and their native `.mplst` files.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    cancel::CancelToken,
    config::PlaylistConfig,
    domain::song::SongId,
    storage::library::Library,
};

use super::{
    Backing, DEFAULT_PLAYLIST_NAME, ExportEntry, ExportPlaylist, Format, Playlist, PlaylistEntry,
    PlaylistId,
    codec::CodecRegistry,
    error::PlaylistError,
    resolve::resolve_entries,
};

pub const NATIVE_EXTENSION: &str = "mplst";

pub const LOAD_FAILURE_TEMPLATE: &str =
    "%1 playlists cannot be loaded. Those playlists may be moved, deleted or renamed.";

const CONTAINER_VERSION: u32 = 1;

/// On-disk form of a playlist.
#[derive(Debug, Serialize, Deserialize)]
struct Container {
    version: u32,
    name: String,
    entries: Vec<PlaylistEntry>,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub failed: Vec<(PathBuf, String)>,
}

impl LoadReport {
    /// One message for every playlist that failed, `None` when all loaded.
    pub fn describe(&self) -> Option<String> {
        self.describe_with(LOAD_FAILURE_TEMPLATE)
    }

    pub fn describe_with(&self, template: &str) -> Option<String> {
        (!self.failed.is_empty()).then(|| template.replace("%1", &self.failed.len().to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub playlist: PlaylistId,
    pub format: Format,
    pub entries: usize,
    pub resolved: usize,
    pub placeholders: usize,
    pub skipped: usize,
    pub added_to_library: usize,
}

#[derive(Debug, Default)]
pub struct BatchImportReport {
    pub imported: Vec<ImportReport>,
    pub failed: Vec<(PathBuf, String)>,
    pub cancelled: bool,
}

pub struct PlaylistManager {
    library: Arc<Library>,
    registry: CodecRegistry,
    directory: PathBuf,
    add_missing_to_library: bool,
    playlists: Vec<Playlist>,
    next_id: u64,
}

impl PlaylistManager {
    pub fn new(library: Arc<Library>, registry: CodecRegistry, config: &PlaylistConfig) -> Self {
        Self {
            library,
            registry,
            directory: config.directory.clone(),
            add_missing_to_library: config.add_missing_to_library,
            playlists: Vec::new(),
            next_id: 1,
        }
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn get(&self, id: PlaylistId) -> Result<&Playlist, PlaylistError> {
        self.playlists
            .iter()
            .find(|p| p.id == id)
            .ok_or(PlaylistError::NotFound(id))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.name == name)
    }

    /// Loads every native playlist file in the playlist directory that is
    /// not loaded yet. A file that cannot be read is reported, not fatal.
    pub fn load_all(&mut self) -> Result<LoadReport, PlaylistError> {
        std::fs::create_dir_all(&self.directory).map_err(PlaylistError::io(&self.directory))?;

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.directory)
            .map_err(PlaylistError::io(&self.directory))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(NATIVE_EXTENSION))
            })
            .collect();
        paths.sort();

        let mut report = LoadReport::default();
        for path in paths {
            if self.is_backed_by(&path) {
                continue;
            }
            match read_container(&path) {
                Ok(container) => {
                    let id = self.allocate_id();
                    let name = self.unique_name(&container.name, None);
                    self.playlists.push(Playlist {
                        id,
                        name,
                        entries: container.entries,
                        source_format: None,
                        backing: Backing::File(path),
                        dirty: false,
                    });
                    report.loaded += 1;
                }
                Err(e) => {
                    warn!("failed to load playlist {}: {e}", path.display());
                    report.failed.push((path, e.to_string()));
                }
            }
        }

        info!(
            "loaded {} playlists, {} failed",
            report.loaded,
            report.failed.len()
        );
        Ok(report)
    }

    pub fn create(&mut self, name: &str) -> PlaylistId {
        let id = self.allocate_id();
        let name = self.unique_name(name, None);
        debug!("creating playlist {name:?}");
        self.playlists.push(Playlist {
            id,
            name,
            entries: Vec::new(),
            source_format: None,
            backing: Backing::Unsaved,
            dirty: true,
        });
        id
    }

    pub fn rename(&mut self, id: PlaylistId, name: &str) -> Result<(), PlaylistError> {
        let name = self.unique_name(name, Some(id));
        let playlist = self.get_mut(id)?;
        playlist.name = name;
        playlist.dirty = true;
        Ok(())
    }

    /// Removes the playlist and its native file.
    pub fn delete(&mut self, id: PlaylistId) -> Result<Playlist, PlaylistError> {
        let position = self.position(id)?;
        let playlist = self.playlists.remove(position);
        if let Backing::File(path) = &playlist.backing {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(PlaylistError::io(path)(e)),
            }
        }
        info!("deleted playlist {:?}", playlist.name);
        Ok(playlist)
    }

    pub fn duplicate(&mut self, id: PlaylistId) -> Result<PlaylistId, PlaylistError> {
        let source = self.get(id)?;
        let entries = source.entries.clone();
        let source_format = source.source_format;
        let name = format!("{} Copy", source.name);

        let copy = self.allocate_id();
        let name = self.unique_name(&name, None);
        self.playlists.push(Playlist {
            id: copy,
            name,
            entries,
            source_format,
            backing: Backing::Unsaved,
            dirty: true,
        });
        Ok(copy)
    }

    /// Appends (or inserts at `at`) library songs; unknown ids are skipped.
    /// Returns how many entries were added.
    pub fn add_songs(
        &mut self,
        id: PlaylistId,
        songs: &[SongId],
        at: Option<usize>,
    ) -> Result<usize, PlaylistError> {
        let records = self.library.get_many(songs)?;
        let playlist = self.get_mut(id)?;
        let len = playlist.entries.len();
        let at = at.unwrap_or(len);
        if at > len {
            return Err(PlaylistError::EntryOutOfRange { index: at, len });
        }

        let added = records.len();
        let entries = records.into_iter().map(|song| PlaylistEntry {
            song_id: Some(song.id),
            title: Some(song.display_name()),
            duration_ms: song.metadata.duration_ms,
            path: song.path,
        });
        playlist.entries.splice(at..at, entries);
        playlist.dirty = true;
        Ok(added)
    }

    /// Removes the entries at `indices`; duplicates are ignored.
    pub fn remove_entries(
        &mut self,
        id: PlaylistId,
        indices: &[usize],
    ) -> Result<usize, PlaylistError> {
        let playlist = self.get_mut(id)?;
        let len = playlist.entries.len();
        if let Some(&index) = indices.iter().find(|&&i| i >= len) {
            return Err(PlaylistError::EntryOutOfRange { index, len });
        }

        let mut indices = indices.to_vec();
        indices.sort_unstable();
        indices.dedup();
        for &index in indices.iter().rev() {
            playlist.entries.remove(index);
        }
        playlist.dirty = true;
        Ok(indices.len())
    }

    pub fn move_entry(
        &mut self,
        id: PlaylistId,
        from: usize,
        to: usize,
    ) -> Result<(), PlaylistError> {
        let playlist = self.get_mut(id)?;
        let len = playlist.entries.len();
        for index in [from, to] {
            if index >= len {
                return Err(PlaylistError::EntryOutOfRange { index, len });
            }
        }
        let entry = playlist.entries.remove(from);
        playlist.entries.insert(to, entry);
        playlist.dirty = true;
        Ok(())
    }

    /// New entry `i` is old entry `permutation[i]`.
    pub fn reorder(&mut self, id: PlaylistId, permutation: &[usize]) -> Result<(), PlaylistError> {
        let playlist = self.get_mut(id)?;
        let len = playlist.entries.len();
        let mut seen = vec![false; len];
        if permutation.len() != len {
            return Err(PlaylistError::InvalidOrder);
        }
        for &i in permutation {
            match seen.get_mut(i) {
                Some(slot) if !*slot => *slot = true,
                _ => return Err(PlaylistError::InvalidOrder),
            }
        }

        let mut old: Vec<Option<PlaylistEntry>> =
            std::mem::take(&mut playlist.entries).into_iter().map(Some).collect();
        playlist.entries = permutation
            .iter()
            .filter_map(|&i| old[i].take())
            .collect();
        playlist.dirty = true;
        Ok(())
    }

    /// Writes the playlist to its native file, choosing a file name in the
    /// playlist directory when it has none yet.
    pub fn save(&mut self, id: PlaylistId) -> Result<PathBuf, PlaylistError> {
        let position = self.position(id)?;
        let path = match &self.playlists[position].backing {
            Backing::File(path) | Backing::Missing(path) => path.clone(),
            Backing::Unsaved => self.new_file_path(&self.playlists[position].name),
        };

        let playlist = &mut self.playlists[position];
        let container = Container {
            version: CONTAINER_VERSION,
            name: playlist.name.clone(),
            entries: playlist.entries.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&container).map_err(|source| {
            PlaylistError::Container {
                path: path.clone(),
                source,
            }
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(PlaylistError::io(parent))?;
        }
        std::fs::write(&path, bytes).map_err(PlaylistError::io(&path))?;

        debug!("saved playlist {:?} to {}", playlist.name, path.display());
        playlist.backing = Backing::File(path.clone());
        playlist.dirty = false;
        Ok(path)
    }

    /// Saves every playlist with unsaved changes. Returns how many were written.
    pub fn save_all(&mut self) -> Result<usize, PlaylistError> {
        let dirty: Vec<PlaylistId> = self
            .playlists
            .iter()
            .filter(|p| p.dirty || matches!(p.backing, Backing::Missing(_)))
            .map(|p| p.id)
            .collect();
        for id in &dirty {
            self.save(*id)?;
        }
        Ok(dirty.len())
    }

    /// Marks playlists whose native file disappeared as missing, and those
    /// whose file came back as file-backed again. Returns the missing count.
    pub fn refresh_backing(&mut self) -> usize {
        let mut missing = 0;
        for playlist in &mut self.playlists {
            playlist.backing = match std::mem::replace(&mut playlist.backing, Backing::Unsaved) {
                Backing::File(path) if !path.exists() => {
                    warn!("playlist file {} is gone", path.display());
                    Backing::Missing(path)
                }
                Backing::Missing(path) if path.exists() => Backing::File(path),
                other => other,
            };
            if matches!(playlist.backing, Backing::Missing(_)) {
                missing += 1;
            }
        }
        missing
    }

    /// Reads a playlist file in any registered format and adds it as a new,
    /// unsaved playlist.
    pub fn import_file(&mut self, path: &Path) -> Result<ImportReport, PlaylistError> {
        let bytes = std::fs::read(path).map_err(PlaylistError::io(path))?;
        let format = self
            .registry
            .detect(&bytes, path)
            .ok_or_else(|| PlaylistError::UnknownFormat(path.to_path_buf()))?;
        let codec = self
            .registry
            .codec(format)
            .ok_or_else(|| PlaylistError::UnknownFormat(path.to_path_buf()))?;
        let parsed = codec.parse(&bytes)?;
        let skipped = parsed.skipped;

        let resolution = resolve_entries(
            &self.library,
            parsed.entries,
            path.parent(),
            self.add_missing_to_library,
        )?;

        let name = parsed
            .title
            .filter(|t| !t.trim().is_empty())
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_default();
        let id = self.allocate_id();
        let name = self.unique_name(&name, None);

        let report = ImportReport {
            playlist: id,
            format,
            entries: resolution.entries.len(),
            resolved: resolution.resolved,
            placeholders: resolution.placeholders,
            skipped,
            added_to_library: resolution.inserted,
        };
        info!(
            "imported {} as {format} playlist {name:?}: {} entries, {} unresolved, {} skipped",
            path.display(),
            report.entries,
            report.placeholders,
            report.skipped
        );

        self.playlists.push(Playlist {
            id,
            name,
            entries: resolution.entries,
            source_format: Some(format),
            backing: Backing::Unsaved,
            dirty: true,
        });
        Ok(report)
    }

    /// Imports `paths` one by one until done or cancelled. A failing file is
    /// reported and does not stop the batch.
    pub fn import_files(
        &mut self,
        paths: impl IntoIterator<Item = PathBuf>,
        cancel: &CancelToken,
    ) -> BatchImportReport {
        let mut report = BatchImportReport::default();
        for path in paths {
            if cancel.is_cancelled() {
                info!(
                    "playlist import cancelled after {} files",
                    report.imported.len() + report.failed.len()
                );
                report.cancelled = true;
                break;
            }
            match self.import_file(&path) {
                Ok(imported) => report.imported.push(imported),
                Err(e) => {
                    warn!("failed to import playlist {}: {e}", path.display());
                    report.failed.push((path, e.to_string()));
                }
            }
        }
        report
    }

    /// Writes the playlist to `path`. Without an explicit format the file
    /// extension picks the codec.
    pub fn export(
        &self,
        id: PlaylistId,
        path: &Path,
        format: Option<Format>,
    ) -> Result<Format, PlaylistError> {
        let playlist = self.get(id)?;
        let format = format
            .or_else(|| self.registry.format_for_extension(path))
            .ok_or_else(|| PlaylistError::UnknownFormat(path.to_path_buf()))?;
        let codec = self
            .registry
            .codec(format)
            .ok_or_else(|| PlaylistError::UnknownFormat(path.to_path_buf()))?;

        let export = self.export_view(playlist)?;
        let bytes = codec.serialize(&export)?;
        std::fs::write(path, bytes).map_err(PlaylistError::io(path))?;
        info!(
            "exported {:?} to {} as {format}",
            playlist.name,
            path.display()
        );
        Ok(format)
    }

    /// Entries as codecs see them: live library data for resolved songs,
    /// captured hints for the rest.
    fn export_view(&self, playlist: &Playlist) -> Result<ExportPlaylist, PlaylistError> {
        let ids: Vec<SongId> = playlist.entries.iter().filter_map(|e| e.song_id).collect();
        let songs: HashMap<SongId, _> = self
            .library
            .get_many(&ids)?
            .into_iter()
            .map(|song| (song.id, song))
            .collect();

        let entries = playlist
            .entries
            .iter()
            .map(|entry| match entry.song_id.and_then(|id| songs.get(&id)) {
                Some(song) => ExportEntry {
                    path: song.path.clone(),
                    title: Some(song.display_name()),
                    artist: Some(song.metadata.artist.clone()).filter(|a| !a.is_empty()),
                    album: Some(song.metadata.album.clone()).filter(|a| !a.is_empty()),
                    duration_ms: song.metadata.duration_ms,
                },
                None => ExportEntry {
                    path: entry.path.clone(),
                    title: entry.title.clone(),
                    artist: None,
                    album: None,
                    duration_ms: entry.duration_ms,
                },
            })
            .collect();

        Ok(ExportPlaylist {
            name: playlist.name.clone(),
            entries,
        })
    }

    fn allocate_id(&mut self) -> PlaylistId {
        let id = PlaylistId::from_raw(self.next_id);
        self.next_id += 1;
        id
    }

    fn position(&self, id: PlaylistId) -> Result<usize, PlaylistError> {
        self.playlists
            .iter()
            .position(|p| p.id == id)
            .ok_or(PlaylistError::NotFound(id))
    }

    fn get_mut(&mut self, id: PlaylistId) -> Result<&mut Playlist, PlaylistError> {
        self.playlists
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(PlaylistError::NotFound(id))
    }

    fn is_backed_by(&self, path: &Path) -> bool {
        self.playlists.iter().any(|p| match &p.backing {
            Backing::File(own) | Backing::Missing(own) => own == path,
            Backing::Unsaved => false,
        })
    }

    /// `name`, or `name (2)`, `name (3)`... when another playlist already uses it.
    fn unique_name(&self, name: &str, except: Option<PlaylistId>) -> String {
        let base = match name.trim() {
            "" => DEFAULT_PLAYLIST_NAME,
            trimmed => trimmed,
        };
        let taken = |candidate: &str| {
            self.playlists
                .iter()
                .any(|p| Some(p.id) != except && p.name == candidate)
        };
        if !taken(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base} ({n})"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    fn new_file_path(&self, name: &str) -> PathBuf {
        let stem: String = name
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        let free = |path: &Path| !path.exists() && !self.is_backed_by(path);

        let first = self.directory.join(format!("{stem}.{NATIVE_EXTENSION}"));
        if free(&first) {
            return first;
        }
        (2..)
            .map(|n| self.directory.join(format!("{stem} ({n}).{NATIVE_EXTENSION}")))
            .find(|path| free(path))
            .unwrap_or(first)
    }
}

fn read_container(path: &Path) -> Result<Container, PlaylistError> {
    let bytes = std::fs::read(path).map_err(PlaylistError::io(path))?;
    let container: Container =
        serde_json::from_slice(&bytes).map_err(|source| PlaylistError::Container {
            path: path.to_path_buf(),
            source,
        })?;
    if container.version > CONTAINER_VERSION {
        warn!(
            "{} was written by a newer version ({}), reading it anyway",
            path.display(),
            container.version
        );
    }
    Ok(container)
}
