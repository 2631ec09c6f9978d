//! Module to scan music directories in the file system

use walkdir::WalkDir;

use std::{
    path::{Component, Path, PathBuf},
    time::SystemTime,
};

use crate::{
    config,
    domain::song::{RawMetadata, SongMetadata},
    storage::{db::system_time_to_i64, error::StorageError},
};

const MUSIC_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "wav", "m4a", "ogg", "oga", "opus", "aac", "wma", "ape", "aiff", "aif",
];

pub fn is_music_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MUSIC_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Lexically normalizes a path: drops `.` components and folds `..` into the parent.
///
/// The file system is not consulted, so this also works for files that no longer exist.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// The string under which a path is stored and looked up in the library.
pub fn path_key(path: &Path) -> String {
    normalize_path(path).to_string_lossy().into_owned()
}

#[derive(Debug)]
pub struct FsSnapshot {
    pub observed_at: SystemTime,
    pub files: Vec<PathBuf>,
}

impl FsSnapshot {
    pub fn scan(config: &config::LibrarySource) -> Result<Self, StorageError> {
        let observed_at = SystemTime::now();
        let files = scan_dirs(config.follow_symlinks, &config.roots, &config.ignored_dirs);
        Ok(Self { observed_at, files })
    }
}

/// Recursively collects all music files in the given directory
pub fn scan_dir(follow_symlinks: bool, root: &Path, ignored_dirs: &[PathBuf]) -> Vec<PathBuf> {
    let root_str = root.to_string_lossy();

    let walker = WalkDir::new(root).follow_links(follow_symlinks);

    walker
        // filter out ignored directories
        .into_iter()
        .filter_entry(|entry| {
            let entry_path = entry.path();
            !ignored_dirs
                .iter()
                .any(|ignored| entry_path.starts_with(ignored))
        })
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(err) => {
                log::warn!("error while scanning dir {root_str}, skipping an entry: {err}");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|e| is_music_file(e))
        .collect()
}

/// Recursively collects all music files in given directories
pub fn scan_dirs(follow_symlinks: bool, roots: &[PathBuf], ignored_dirs: &[PathBuf]) -> Vec<PathBuf> {
    roots
        .iter()
        .flat_map(|root| scan_dir(follow_symlinks, root, ignored_dirs))
        .collect()
}

/// Builds the raw record the file system alone can tell about a music file.
///
/// Tags are filled in by the tag reader; here the name is the file stem.
pub fn raw_metadata_for_file(path: &Path) -> Result<RawMetadata, StorageError> {
    let meta = std::fs::metadata(path)?;
    let date_modified = meta
        .modified()
        .ok()
        .and_then(|time| system_time_to_i64(time).ok());

    let metadata = SongMetadata {
        name: path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        kind: path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default(),
        size: Some(meta.len()),
        date_modified,
        ..Default::default()
    };

    Ok(RawMetadata::new(normalize_path(path), metadata))
}

/// Best-effort check that a path points to a real, playable music file.
///
/// This does NOT decode audio, but rules out:
/// - missing paths
/// - directories / special files
/// - wrong extensions
/// - unreadable files
pub fn is_valid_music_path(path: &Path) -> bool {
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return false,
    };

    if !meta.is_file() {
        return false;
    }

    if !is_music_file(path) {
        return false;
    }

    std::fs::File::open(path).is_ok()
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use tempfile::TempDir;

    use crate::{
        config,
        storage::fs::{FsSnapshot, normalize_path, raw_metadata_for_file, scan_dir},
    };

    #[test]
    fn scan_finds_music_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();

        let song1 = root.join("song1.mp3");
        let song2 = root.join("song2.FLAC");
        let not_music = root.join("notes.txt");

        std::fs::write(&song1, b"aaa").unwrap();
        std::fs::write(&song2, b"bbb").unwrap();
        std::fs::write(&not_music, b"ccc").unwrap();

        let files = scan_dir(false, &root, &[]);

        assert_eq!(files.len(), 2);
        assert!(files.contains(&song1));
        assert!(files.contains(&song2));
    }

    #[test]
    fn scan_dirs_scans_multiple_directories() {
        let dir1 = TempDir::new().unwrap();
        let dir2 = TempDir::new().unwrap();

        let song1 = dir1.path().join("a.mp3");
        let song2 = dir2.path().join("b.flac");

        std::fs::write(&song1, b"song one").unwrap();
        std::fs::write(&song2, b"song two").unwrap();
        std::fs::write(dir2.path().join("notes.txt"), b"ignore me").unwrap();

        let config = config::LibrarySource {
            follow_symlinks: false,
            roots: vec![dir1.path().to_path_buf(), dir2.path().to_path_buf()],
            ignored_dirs: vec![],
        };

        let snapshot = FsSnapshot::scan(&config).unwrap();

        assert_eq!(snapshot.files.len(), 2);
        assert!(snapshot.files.contains(&song1));
        assert!(snapshot.files.contains(&song2));
    }

    #[test]
    fn scan_respects_ignored_dirs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        let song1 = root.join("song1.mp3");
        let ignored_dir = root.join("ignored");
        std::fs::create_dir_all(&ignored_dir).unwrap();
        let ignored_song = ignored_dir.join("ignored_song.mp3");

        std::fs::write(&song1, b"aaa").unwrap();
        std::fs::write(&ignored_song, b"ccc").unwrap();

        let files = scan_dir(false, root, &[ignored_dir.clone()]);

        assert_eq!(files, vec![song1]);
    }

    #[test]
    fn normalize_folds_dot_components() {
        assert_eq!(
            normalize_path(Path::new("/music/./a/../b/song.mp3")),
            PathBuf::from("/music/b/song.mp3")
        );
        assert_eq!(
            normalize_path(Path::new("../x.mp3")),
            PathBuf::from("../x.mp3")
        );
    }

    #[test]
    fn raw_metadata_uses_file_stem_and_extension() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("Blue Monday.MP3");
        std::fs::write(&path, b"12345")?;

        let raw = raw_metadata_for_file(&path)?;

        assert_eq!(raw.metadata.name, "Blue Monday");
        assert_eq!(raw.metadata.kind, "mp3");
        assert_eq!(raw.metadata.size, Some(5));
        assert!(raw.metadata.date_modified.is_some());
        Ok(())
    }
}
