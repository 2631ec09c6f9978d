//! Wires the library, its category index and the playlist manager together.

use std::sync::Arc;

use log::{info, warn};

use crate::{
    cancel::CancelToken,
    category::CategoryIndex,
    config::{Config, LibrarySource},
    playlist::{CodecRegistry, PlaylistManager},
    search::{self, Scope, SearchResult},
    storage::{
        error::StorageError,
        import::{ImportReport, import_library_source},
        library::Library,
    },
};

pub struct Catalog {
    library: Arc<Library>,
    index: Arc<CategoryIndex>,
    playlists: PlaylistManager,
    source: LibrarySource,
}

impl Catalog {
    pub fn open(config: &Config) -> Result<Self, StorageError> {
        let library = Arc::new(Library::open(&config.database)?);
        let index = Arc::new(CategoryIndex::default());
        library.subscribe(index.clone());

        let playlists = PlaylistManager::new(
            library.clone(),
            CodecRegistry::with_default_codecs(),
            &config.playlists,
        );
        let catalog = Self {
            library,
            index,
            playlists,
            source: config.library_source.clone(),
        };
        catalog.resync_index()?;
        Ok(catalog)
    }

    pub fn library(&self) -> &Arc<Library> {
        &self.library
    }

    pub fn index(&self) -> &CategoryIndex {
        &self.index
    }

    pub fn playlists(&self) -> &PlaylistManager {
        &self.playlists
    }

    pub fn playlists_mut(&mut self) -> &mut PlaylistManager {
        &mut self.playlists
    }

    /// Rebuilds the index from the store, which is authoritative.
    pub fn resync_index(&self) -> Result<(), StorageError> {
        self.library.read(|reader| {
            let snapshot = reader.scan_all()?;
            self.index.rebuild(snapshot.iter());
            info!("category index rebuilt from {} songs", snapshot.len());
            Ok(())
        })
    }

    /// Imports every music file under the configured library roots and forgets
    /// songs whose file was deleted.
    pub fn scan(&self, cancel: &CancelToken) -> Result<ImportReport, StorageError> {
        let report = import_library_source(&self.library, &self.source, cancel)?;
        if !report.failed.is_empty() {
            warn!("{} files failed to import, resyncing index", report.failed.len());
            self.resync_index()?;
        }
        Ok(report)
    }

    pub fn search(&self, query: &str, scope: Option<&Scope>) -> Result<SearchResult, StorageError> {
        match scope {
            None => search::search(&self.library, query),
            Some(scope) => {
                let compiled = search::compile(query);
                let songs =
                    search::search_in(&self.library, &self.index, &compiled.predicate, scope)?;
                Ok(SearchResult {
                    songs,
                    issues: compiled.issues,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use super::*;
    use crate::{
        config::{Database, PlaylistConfig},
        domain::field::Field,
    };

    fn config(root: PathBuf, playlists: PathBuf) -> Config {
        Config {
            version: 1,
            database: Database::in_memory(),
            library_source: LibrarySource {
                roots: vec![root],
                follow_symlinks: false,
                ignored_dirs: vec![],
            },
            playlists: PlaylistConfig {
                directory: playlists,
                add_missing_to_library: true,
            },
        }
    }

    #[test]
    fn test_scan_feeds_index_and_search() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let music = dir.path().join("music");
        fs::create_dir_all(&music)?;
        fs::write(music.join("Intro.mp3"), b"x")?;
        fs::write(music.join("Outro.flac"), b"x")?;
        fs::write(music.join("notes.txt"), b"x")?;

        let catalog = Catalog::open(&config(music.clone(), dir.path().join("lists")))?;
        let report = catalog.scan(&CancelToken::new())?;
        assert_eq!(report.inserted, 2);

        assert_eq!(catalog.index().song_count(), 2);
        let artists = catalog.index().buckets_for(Field::Artist);
        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].key, "");
        assert_eq!(artists[0].count, 2);

        assert_eq!(catalog.search("intro", None)?.songs.len(), 1);
        let scoped = catalog.search("kind:flac", Some(&Scope::new(Field::Artist, "")))?;
        assert_eq!(scoped.songs.len(), 1);
        assert_eq!(scoped.songs[0].metadata.name, "Outro");

        fs::remove_file(music.join("Intro.mp3"))?;
        let report = catalog.scan(&CancelToken::new())?;
        assert_eq!(report.removed, 1);
        assert_eq!(catalog.index().song_count(), 1);
        assert!(catalog.search("intro", None)?.songs.is_empty());
        Ok(())
    }

    #[test]
    fn test_resync_after_manual_drift() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = Catalog::open(&config(dir.path().into(), dir.path().join("lists")))?;
        catalog
            .library()
            .insert_or_update(crate::storage::library::tests::raw("/m/a.mp3", "A", "X", "Y"))?;
        catalog.index().rebuild(std::iter::empty());
        assert_eq!(catalog.index().song_count(), 0);

        catalog.resync_index()?;
        assert_eq!(catalog.index().song_count(), 1);
        Ok(())
    }
}
