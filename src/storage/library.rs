use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
};

use anyhow::anyhow;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};

use crate::{
    config,
    domain::song::{RawMetadata, SongId, SongMetadata, SongRecord, SongStats},
    storage::{
        db::{self, SecondsSinceUnix},
        error::StorageError,
        event::{ChangeEvent, LibraryObserver},
        fs::{normalize_path, path_key},
        schema::{columns, tables},
    },
};

use columns::*;
use tables::*;

/// What `upsert` did with a raw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
    /// same path, same content: nothing written, no event
    Unchanged,
}

/// Songs of the library at one point in time.
///
/// Owned and finite: the library may change right after it is taken,
/// iterating it never observes that.
#[derive(Debug, Clone)]
pub struct LibrarySnapshot {
    pub taken_at: SecondsSinceUnix,
    pub songs: Vec<SongRecord>,
}

impl LibrarySnapshot {
    pub fn iter(&self) -> std::slice::Iter<'_, SongRecord> {
        self.songs.iter()
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}

impl IntoIterator for LibrarySnapshot {
    type Item = SongRecord;
    type IntoIter = std::vec::IntoIter<SongRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.songs.into_iter()
    }
}

/// The song catalog. Sole owner of song records; everything else holds ids
/// and learns about changes through [`LibraryObserver`]s.
pub struct Library {
    db: Mutex<Connection>,
    observers: RwLock<Vec<Arc<dyn LibraryObserver>>>,
}

/// Read access to the library while writers are held off.
pub struct LibraryReader<'a> {
    conn: &'a Connection,
}

impl LibraryReader<'_> {
    pub fn get(&self, id: SongId) -> Result<SongRecord, StorageError> {
        select_by_id(self.conn, id)?.ok_or(StorageError::SongNotFound(id))
    }

    /// Records for `ids` in the given order. Ids no longer in the library are skipped.
    pub fn get_many(&self, ids: &[SongId]) -> Result<Vec<SongRecord>, StorageError> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {SONG_COLUMNS} FROM {SONGS} WHERE {SONG_ID} = ?1"
        ))?;
        let mut songs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(song) = stmt
                .query_row(params![id.as_i64()], row_to_song)
                .optional()?
            {
                songs.push(song);
            }
        }
        Ok(songs)
    }

    pub fn find_by_path(&self, path: &Path) -> Result<Option<SongRecord>, StorageError> {
        select_by_path(self.conn, &path_key(path))
    }

    pub fn scan_all(&self) -> Result<LibrarySnapshot, StorageError> {
        let taken_at = db::now()?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SONG_COLUMNS} FROM {SONGS} ORDER BY {SONG_ID}"
        ))?;
        let songs = stmt
            .query_map([], row_to_song)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LibrarySnapshot { taken_at, songs })
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {SONGS}"), [], |row| row.get(0))?;
        usize::try_from(count).map_err(|e| {
            StorageError::Internal(anyhow!("strange song count {count}: {e}"))
        })
    }

    /// Time of the last committed mutation, 0 if there was none.
    pub fn last_updated(&self) -> Result<SecondsSinceUnix, StorageError> {
        Ok(self.conn.query_row(
            &format!("SELECT COALESCE(MAX({UPDATED_AT}), 0) FROM {UPDATES}"),
            [],
            |row| row.get(0),
        )?)
    }
}

impl Library {
    /// when called, opens a data base connection
    pub fn open(db_config: &config::Database) -> Result<Self, StorageError> {
        let db = db::open(db_config)?;
        Ok(Self::from_existing_conn(db))
    }

    pub fn from_existing_conn(db: Connection) -> Self {
        Self {
            db: Mutex::new(db),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn LibraryObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.db.lock().map_err(|e| {
            StorageError::Internal(anyhow!("could not access library database under lock: {e}"))
        })
    }

    /// Runs `f` with no write able to interleave.
    ///
    /// Observers are updated inside the same critical section as the store,
    /// so whatever `f` reads from them agrees with what it reads from `reader`.
    pub fn read<T>(
        &self,
        f: impl FnOnce(&LibraryReader<'_>) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let conn = self.lock()?;
        f(&LibraryReader { conn: &*conn })
    }

    pub fn get(&self, id: SongId) -> Result<SongRecord, StorageError> {
        self.read(|reader| reader.get(id))
    }

    pub fn get_many(&self, ids: &[SongId]) -> Result<Vec<SongRecord>, StorageError> {
        self.read(|reader| reader.get_many(ids))
    }

    pub fn find_by_path(&self, path: &Path) -> Result<Option<SongRecord>, StorageError> {
        self.read(|reader| reader.find_by_path(path))
    }

    pub fn scan_all(&self) -> Result<LibrarySnapshot, StorageError> {
        self.read(|reader| reader.scan_all())
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        self.read(|reader| reader.len())
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    pub fn last_updated(&self) -> Result<SecondsSinceUnix, StorageError> {
        self.read(|reader| reader.last_updated())
    }

    /// Adds the song at `raw.path`, or refreshes it if the path is already known.
    pub fn insert_or_update(&self, raw: RawMetadata) -> Result<SongId, StorageError> {
        self.upsert(raw).map(|(id, _)| id)
    }

    pub fn upsert(&self, raw: RawMetadata) -> Result<(SongId, Upsert), StorageError> {
        let key = path_key(&raw.path);
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let (id, outcome, event) = match select_by_path(&tx, &key)? {
            Some(before) => {
                let after = SongRecord {
                    id: before.id,
                    path: PathBuf::from(&key),
                    metadata: raw.metadata,
                    stats: SongStats {
                        rating: raw.rating.unwrap_or(before.stats.rating),
                        play_count: raw.play_count.unwrap_or(before.stats.play_count),
                        last_played: raw.last_played.or(before.stats.last_played),
                        date_added: raw.date_added.unwrap_or(before.stats.date_added),
                    },
                };
                if before == after {
                    return Ok((before.id, Upsert::Unchanged));
                }
                let changed = before.changed_fields(&after);
                write_song(&tx, &after)?;
                (
                    after.id,
                    Upsert::Updated,
                    ChangeEvent::Updated {
                        before,
                        after,
                        changed,
                    },
                )
            }
            None => {
                let date_added = match raw.date_added {
                    Some(t) => t,
                    None => db::now()?,
                };
                let stats = SongStats {
                    rating: raw.rating.unwrap_or(0),
                    play_count: raw.play_count.unwrap_or(0),
                    last_played: raw.last_played,
                    date_added,
                };
                let id = insert_song(&tx, &key, &raw.metadata, &stats)?;
                let after = SongRecord {
                    id,
                    path: PathBuf::from(&key),
                    metadata: raw.metadata,
                    stats,
                };
                (id, Upsert::Inserted, ChangeEvent::Inserted { after })
            }
        };

        record_update(&tx)?;
        tx.commit()?;
        log::debug!("{outcome:?} song {id} at {key}");

        self.publish(&event)?;
        Ok((id, outcome))
    }

    /// Replaces the stored fields of an existing song.
    pub fn update(&self, record: SongRecord) -> Result<(), StorageError> {
        let id = record.id;
        self.modify(id, move |song| *song = record)
    }

    /// Moves a song to a new path, keeping its identity.
    pub fn rename(&self, id: SongId, new_path: &Path) -> Result<(), StorageError> {
        let new_path = new_path.to_path_buf();
        self.modify(id, move |song| song.path = new_path)
    }

    pub fn set_rating(&self, id: SongId, rating: u32) -> Result<(), StorageError> {
        self.modify(id, move |song| song.stats.rating = rating.min(100))
    }

    pub fn record_play(&self, id: SongId, at: SecondsSinceUnix) -> Result<(), StorageError> {
        self.modify(id, move |song| {
            song.stats.play_count += 1;
            song.stats.last_played = Some(at);
        })
    }

    /// Read-modify-write of one song under the write lock.
    fn modify(
        &self,
        id: SongId,
        edit: impl FnOnce(&mut SongRecord),
    ) -> Result<(), StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let before = select_by_id(&tx, id)?.ok_or(StorageError::SongNotFound(id))?;
        let mut after = before.clone();
        edit(&mut after);
        after.id = id;
        after.path = normalize_path(&after.path);

        if after.path != before.path {
            if let Some(owner) = select_by_path(&tx, &path_key(&after.path))? {
                if owner.id != id {
                    return Err(StorageError::PathConflict {
                        path: after.path,
                        owner: owner.id,
                    });
                }
            }
        }

        if before == after {
            return Ok(());
        }
        let changed = before.changed_fields(&after);

        write_song(&tx, &after)?;
        record_update(&tx)?;
        tx.commit()?;
        log::debug!("updated song {id}: {changed:?}");

        self.publish(&ChangeEvent::Updated {
            before,
            after,
            changed,
        })
    }

    /// Removes a song; its id is never handed out again. Returns false if it was unknown.
    pub fn remove(&self, id: SongId) -> Result<bool, StorageError> {
        let mut conn = self.lock()?;
        let before = match select_by_id(&conn, id)? {
            Some(song) => song,
            None => return Ok(false),
        };
        self.remove_locked(&mut conn, before)?;
        Ok(true)
    }

    /// Removes the song stored at `path`, e.g. after its file was deleted.
    pub fn remove_path(&self, path: &Path) -> Result<Option<SongId>, StorageError> {
        let mut conn = self.lock()?;
        let before = match select_by_path(&conn, &path_key(path))? {
            Some(song) => song,
            None => return Ok(None),
        };
        let id = before.id;
        self.remove_locked(&mut conn, before)?;
        Ok(Some(id))
    }

    fn remove_locked(&self, conn: &mut Connection, before: SongRecord) -> Result<(), StorageError> {
        let removed_at = db::now()?;
        let tx = conn.transaction()?;
        tx.execute(
            &format!("DELETE FROM {SONGS} WHERE {SONG_ID} = ?1"),
            params![before.id.as_i64()],
        )?;
        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO {TOMBSTONES} ({SONG_ID}, {PATH}, {REMOVED_AT}) VALUES (?1, ?2, ?3)"
            ),
            params![before.id.as_i64(), before.path.to_string_lossy(), removed_at],
        )?;
        record_update(&tx)?;
        tx.commit()?;
        log::debug!("removed song {} at {}", before.id, before.path.display());

        self.publish(&ChangeEvent::Removed { before })
    }

    /// Hands `event` to every observer. Called with the write lock held.
    fn publish(&self, event: &ChangeEvent) -> Result<(), StorageError> {
        let observers = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let failures = observers
            .iter()
            .filter_map(|observer| observer.on_change(event).err())
            .map(|e| {
                log::error!("observer rejected change of song {}: {e:#}", event.song_id());
                format!("{e:#}")
            })
            .collect::<Vec<_>>();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(StorageError::Consistency(failures.join("; ")))
        }
    }
}

fn opt_u64(value: Option<i64>) -> Option<u64> {
    value.and_then(|v| u64::try_from(v).ok())
}

fn opt_i64(value: Option<u64>) -> Option<i64> {
    value.and_then(|v| i64::try_from(v).ok())
}

fn row_to_song(row: &Row<'_>) -> rusqlite::Result<SongRecord> {
    Ok(SongRecord {
        id: SongId::from_raw(row.get(0)?),
        path: PathBuf::from(row.get::<_, String>(1)?),
        metadata: SongMetadata {
            name: row.get(2)?,
            artist: row.get(3)?,
            album: row.get(4)?,
            album_artist: row.get(5)?,
            genre: row.get(6)?,
            composer: row.get(7)?,
            comments: row.get(8)?,
            track_number: row.get(9)?,
            track_count: row.get(10)?,
            disc_number: row.get(11)?,
            disc_count: row.get(12)?,
            year: row.get(13)?,
            date_modified: row.get(18)?,
            duration_ms: opt_u64(row.get(19)?),
            bit_rate: row.get(20)?,
            sample_rate: row.get(21)?,
            size: opt_u64(row.get(22)?),
            kind: row.get(23)?,
        },
        stats: SongStats {
            rating: row.get(14)?,
            play_count: row.get(15)?,
            last_played: row.get(16)?,
            date_added: row.get(17)?,
        },
    })
}

fn select_by_id(conn: &Connection, id: SongId) -> Result<Option<SongRecord>, StorageError> {
    Ok(conn
        .query_row(
            &format!("SELECT {SONG_COLUMNS} FROM {SONGS} WHERE {SONG_ID} = ?1"),
            params![id.as_i64()],
            row_to_song,
        )
        .optional()?)
}

fn select_by_path(conn: &Connection, key: &str) -> Result<Option<SongRecord>, StorageError> {
    Ok(conn
        .query_row(
            &format!("SELECT {SONG_COLUMNS} FROM {SONGS} WHERE {PATH} = ?1"),
            params![key],
            row_to_song,
        )
        .optional()?)
}

fn insert_song(
    tx: &Transaction<'_>,
    key: &str,
    meta: &SongMetadata,
    stats: &SongStats,
) -> Result<SongId, StorageError> {
    tx.execute(
        &format!(
            "INSERT INTO {SONGS} ({PATH}, name, artist, album, album_artist, genre, composer, \
             comments, track_number, track_count, disc_number, disc_count, year, rating, \
             play_count, last_played, date_added, date_modified, duration_ms, bit_rate, \
             sample_rate, size, kind) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
             ?17, ?18, ?19, ?20, ?21, ?22, ?23)"
        ),
        params![
            key,
            meta.name,
            meta.artist,
            meta.album,
            meta.album_artist,
            meta.genre,
            meta.composer,
            meta.comments,
            meta.track_number,
            meta.track_count,
            meta.disc_number,
            meta.disc_count,
            meta.year,
            stats.rating,
            stats.play_count,
            stats.last_played,
            stats.date_added,
            meta.date_modified,
            opt_i64(meta.duration_ms),
            meta.bit_rate,
            meta.sample_rate,
            opt_i64(meta.size),
            meta.kind,
        ],
    )?;
    Ok(SongId::from_raw(tx.last_insert_rowid()))
}

fn write_song(tx: &Transaction<'_>, song: &SongRecord) -> Result<(), StorageError> {
    let meta = &song.metadata;
    let stats = &song.stats;
    tx.execute(
        &format!(
            "UPDATE {SONGS} SET {PATH} = ?2, name = ?3, artist = ?4, album = ?5, \
             album_artist = ?6, genre = ?7, composer = ?8, comments = ?9, track_number = ?10, \
             track_count = ?11, disc_number = ?12, disc_count = ?13, year = ?14, rating = ?15, \
             play_count = ?16, last_played = ?17, date_added = ?18, date_modified = ?19, \
             duration_ms = ?20, bit_rate = ?21, sample_rate = ?22, size = ?23, kind = ?24 \
             WHERE {SONG_ID} = ?1"
        ),
        params![
            song.id.as_i64(),
            song.path.to_string_lossy(),
            meta.name,
            meta.artist,
            meta.album,
            meta.album_artist,
            meta.genre,
            meta.composer,
            meta.comments,
            meta.track_number,
            meta.track_count,
            meta.disc_number,
            meta.disc_count,
            meta.year,
            stats.rating,
            stats.play_count,
            stats.last_played,
            stats.date_added,
            meta.date_modified,
            opt_i64(meta.duration_ms),
            meta.bit_rate,
            meta.sample_rate,
            opt_i64(meta.size),
            meta.kind,
        ],
    )?;
    Ok(())
}

fn record_update(tx: &Transaction<'_>) -> Result<(), StorageError> {
    tx.execute(
        &format!("INSERT INTO {UPDATES} ({UPDATED_AT}) VALUES (?1)"),
        params![db::now()?],
    )?;
    Ok(())
}
