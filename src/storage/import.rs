//! Bulk import of raw metadata records into the library.

use std::{collections::HashSet, path::PathBuf};

use crate::{
    cancel::CancelToken,
    config::LibrarySource,
    domain::song::RawMetadata,
    storage::{
        error::StorageError,
        fs::{FsSnapshot, normalize_path, path_key, raw_metadata_for_file},
        library::{Library, Upsert},
    },
};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// songs forgotten because their file is gone
    pub removed: usize,
    /// records that could not be stored, with the reason
    pub failed: Vec<(PathBuf, String)>,
    /// set when the token stopped the import before every record was seen
    pub cancelled: bool,
}

impl ImportReport {
    pub fn processed(&self) -> usize {
        self.inserted + self.updated + self.unchanged + self.removed + self.failed.len()
    }
}

/// Feeds `records` into the library one by one until done or cancelled.
///
/// A failing record is reported and skipped; it does not stop the import.
pub fn import_records(
    library: &Library,
    records: impl IntoIterator<Item = RawMetadata>,
    cancel: &CancelToken,
) -> ImportReport {
    let mut report = ImportReport::default();

    for raw in records {
        if cancel.is_cancelled() {
            log::info!("import cancelled after {} records", report.processed());
            report.cancelled = true;
            break;
        }

        let path = raw.path.clone();
        match library.upsert(raw) {
            Ok((_, Upsert::Inserted)) => report.inserted += 1,
            Ok((_, Upsert::Updated)) => report.updated += 1,
            Ok((_, Upsert::Unchanged)) => report.unchanged += 1,
            Err(e) => {
                log::warn!("failed to import {}: {e}", path.display());
                report.failed.push((path, e.to_string()));
            }
        }
    }

    report
}

/// Scans the configured library roots, imports every music file found and
/// forgets songs under those roots whose file is gone.
pub fn import_library_source(
    library: &Library,
    source: &LibrarySource,
    cancel: &CancelToken,
) -> Result<ImportReport, StorageError> {
    let snapshot = FsSnapshot::scan(source)?;
    log::info!("found {} music files on the file system", snapshot.files.len());

    let fs_paths = snapshot
        .files
        .iter()
        .map(|path| path_key(path))
        .collect::<HashSet<_>>();

    let mut unreadable = Vec::new();
    let records = snapshot
        .files
        .into_iter()
        .take_while(|_| !cancel.is_cancelled())
        .filter_map(|path| match raw_metadata_for_file(&path) {
            Ok(raw) => Some(raw),
            Err(e) => {
                unreadable.push((path, e.to_string()));
                None
            }
        });

    let mut report = import_records(library, records, cancel);
    report.failed.extend(unreadable);
    if cancel.is_cancelled() {
        report.cancelled = true;
        return Ok(report);
    }

    let roots = source
        .roots
        .iter()
        .map(|root| normalize_path(root))
        .collect::<Vec<_>>();
    let vanished = library
        .scan_all()?
        .into_iter()
        .map(|song| song.path)
        .filter(|path| roots.iter().any(|root| path.starts_with(root)))
        .filter(|path| !fs_paths.contains(&path_key(path)) && !path.exists())
        .collect::<Vec<_>>();

    for path in vanished {
        if cancel.is_cancelled() {
            log::info!("scan cancelled after removing {} songs", report.removed);
            report.cancelled = true;
            break;
        }
        match library.remove_path(&path) {
            Ok(Some(id)) => {
                log::debug!("forgot song {id}, {} is gone", path.display());
                report.removed += 1;
            }
            Ok(None) => {}
            Err(e) => {
                log::warn!("failed to remove {}: {e}", path.display());
                report.failed.push((path, e.to_string()));
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::TempDir;

    use crate::{
        cancel::CancelToken,
        config::LibrarySource,
        storage::{
            import::{import_library_source, import_records},
            library::tests::{raw, setup_library},
        },
    };

    #[test]
    fn import_counts_outcomes() -> anyhow::Result<()> {
        let library = setup_library();
        library.insert_or_update(raw("/m/a.mp3", "A", "X", "Y"))?;

        let report = import_records(
            &library,
            vec![
                raw("/m/a.mp3", "A", "X", "Y"),
                raw("/m/b.mp3", "B", "X", "Y"),
                raw("/m/a.mp3", "A2", "X", "Y"),
            ],
            &CancelToken::new(),
        );

        assert_eq!(report.unchanged, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.updated, 1);
        assert!(!report.cancelled);
        assert_eq!(library.len()?, 2);

        Ok(())
    }

    #[test]
    fn cancelled_import_stops_enqueuing() -> anyhow::Result<()> {
        let library = setup_library();
        let cancel = CancelToken::new();

        let records = (0..10).map(|i| {
            if i == 3 {
                cancel.cancel();
            }
            raw(&format!("/m/{i}.mp3"), "t", "a", "b")
        });

        let report = import_records(&library, records, &cancel);

        assert!(report.cancelled);
        // records 0..3 were stored, record 3 was produced after cancellation
        assert_eq!(report.inserted, 3);
        assert_eq!(library.len()?, 3);

        Ok(())
    }

    #[test]
    fn import_library_source_walks_roots() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        std::fs::write(tmp.path().join("one.mp3"), b"1")?;
        std::fs::write(tmp.path().join("two.flac"), b"22")?;
        std::fs::write(tmp.path().join("cover.jpg"), b"img")?;

        let library = setup_library();
        let source = LibrarySource {
            roots: vec![tmp.path().to_path_buf()],
            follow_symlinks: false,
            ignored_dirs: vec![],
        };

        let report = import_library_source(&library, &source, &CancelToken::new())?;
        assert_eq!(report.inserted, 2);

        // scanning again finds nothing new
        let again = import_library_source(&library, &source, &CancelToken::new())?;
        assert_eq!(again.inserted, 0);
        assert_eq!(again.unchanged, 2);

        Ok(())
    }

    #[test]
    fn import_library_source_forgets_deleted_files() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        std::fs::write(tmp.path().join("one.mp3"), b"1")?;
        std::fs::write(tmp.path().join("two.flac"), b"22")?;

        let library = setup_library();
        // outside the roots, never touched by a scan
        library.insert_or_update(raw("/elsewhere/gone.mp3", "g", "a", "b"))?;
        let source = LibrarySource {
            roots: vec![tmp.path().to_path_buf()],
            follow_symlinks: false,
            ignored_dirs: vec![],
        };
        import_library_source(&library, &source, &CancelToken::new())?;
        assert_eq!(library.len()?, 3);

        std::fs::remove_file(tmp.path().join("two.flac"))?;
        let report = import_library_source(&library, &source, &CancelToken::new())?;

        assert_eq!(report.removed, 1);
        assert_eq!(report.unchanged, 1);
        assert!(library.find_by_path(&tmp.path().join("two.flac"))?.is_none());
        assert!(library.find_by_path(Path::new("/elsewhere/gone.mp3"))?.is_some());

        Ok(())
    }

    #[test]
    fn cancelled_scan_reads_and_removes_nothing() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        std::fs::write(tmp.path().join("one.mp3"), b"1")?;

        let library = setup_library();
        library.insert_or_update(raw(
            &tmp.path().join("deleted.mp3").to_string_lossy(),
            "d",
            "a",
            "b",
        ))?;
        let source = LibrarySource {
            roots: vec![tmp.path().to_path_buf()],
            follow_symlinks: false,
            ignored_dirs: vec![],
        };
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = import_library_source(&library, &source, &cancel)?;

        assert!(report.cancelled);
        assert_eq!(report.processed(), 0);
        assert_eq!(library.len()?, 1);

        Ok(())
    }
}
