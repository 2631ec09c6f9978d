//! Category index: songs grouped by artist, album, genre and year.
//!
//! The index is a materialized view of the library. It is fed by the
//! library's change events and never written to by anyone else; when it
//! disagrees with the library, [`CategoryIndex::rebuild`] recomputes it.

pub mod collation;

use std::{
    collections::{BTreeSet, HashMap},
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use thiserror::Error;

use crate::{
    domain::{
        field::Field,
        song::{SongId, SongRecord},
    },
    storage::event::{ChangeEvent, LibraryObserver},
};

use collation::SortKey;

/// Artist label of an album whose songs span several artists.
pub const VARIOUS_ARTISTS: &str = "Various Artists";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("song {song} is not in the {field} index")]
    UnknownSong { field: Field, song: SongId },

    #[error("song {song} is already in the {field} index")]
    DuplicateSong { field: Field, song: SongId },
}

/// One line of a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSummary {
    pub key: String,
    pub count: usize,
    /// only ever set for album buckets
    pub various_artists: bool,
}

#[derive(Debug, Default)]
struct Bucket {
    members: BTreeSet<SongId>,
    /// artist -> number of members with that artist
    artists: HashMap<String, usize>,
}

impl Bucket {
    /// Untagged songs do not make an album various.
    fn various_artists(&self) -> bool {
        self.artists.keys().filter(|artist| !artist.is_empty()).count() >= 2
    }

    fn shared_artist(&self) -> Option<&String> {
        self.artists
            .keys()
            .find(|artist| !artist.is_empty())
            .or_else(|| self.artists.keys().next())
    }
}

/// Where the index currently files a song for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Membership {
    key: String,
    artist: String,
}

impl Membership {
    fn of(field: Field, song: &SongRecord) -> Self {
        Self {
            key: field.value_of(song).render(),
            artist: song.metadata.artist.clone(),
        }
    }
}

#[derive(Debug)]
struct FieldBuckets {
    field: Field,
    buckets: HashMap<String, Bucket>,
    memberships: HashMap<SongId, Membership>,
}

impl FieldBuckets {
    fn new(field: Field) -> Self {
        Self {
            field,
            buckets: HashMap::new(),
            memberships: HashMap::new(),
        }
    }

    fn add(&mut self, id: SongId, membership: Membership) {
        let bucket = self.buckets.entry(membership.key.clone()).or_default();
        bucket.members.insert(id);
        if self.field == Field::Album {
            *bucket.artists.entry(membership.artist.clone()).or_default() += 1;
        }
        self.memberships.insert(id, membership);
    }

    fn take(&mut self, id: SongId) -> Option<Membership> {
        let membership = self.memberships.remove(&id)?;
        if let Some(bucket) = self.buckets.get_mut(&membership.key) {
            bucket.members.remove(&id);
            if let Some(count) = bucket.artists.get_mut(&membership.artist) {
                *count -= 1;
                if *count == 0 {
                    bucket.artists.remove(&membership.artist);
                }
            }
            if bucket.members.is_empty() {
                self.buckets.remove(&membership.key);
            }
        }
        Some(membership)
    }

    fn contains(&self, id: SongId) -> bool {
        self.memberships.contains_key(&id)
    }
}

#[derive(Debug)]
struct IndexState {
    fields: Vec<FieldBuckets>,
}

impl IndexState {
    fn new(fields: &[Field]) -> Self {
        Self {
            fields: fields.iter().map(|f| FieldBuckets::new(*f)).collect(),
        }
    }

    fn field(&self, field: Field) -> Option<&FieldBuckets> {
        self.fields.iter().find(|fb| fb.field == field)
    }

    fn insert(&mut self, song: &SongRecord) -> Result<(), IndexError> {
        if let Some(fb) = self.fields.iter().find(|fb| fb.contains(song.id)) {
            return Err(IndexError::DuplicateSong {
                field: fb.field,
                song: song.id,
            });
        }
        for fb in &mut self.fields {
            fb.add(song.id, Membership::of(fb.field, song));
        }
        Ok(())
    }

    fn check_known(&self, id: SongId) -> Result<(), IndexError> {
        match self.fields.iter().find(|fb| !fb.contains(id)) {
            Some(fb) => Err(IndexError::UnknownSong {
                field: fb.field,
                song: id,
            }),
            None => Ok(()),
        }
    }

    fn remove(&mut self, id: SongId) -> Result<(), IndexError> {
        self.check_known(id)?;
        for fb in &mut self.fields {
            fb.take(id);
        }
        Ok(())
    }

    fn update(&mut self, after: &SongRecord) -> Result<(), IndexError> {
        self.check_known(after.id)?;
        for fb in &mut self.fields {
            let membership = Membership::of(fb.field, after);
            let unchanged = fb.memberships.get(&after.id).is_some_and(|current| {
                current.key == membership.key
                    && (fb.field != Field::Album || current.artist == membership.artist)
            });
            if !unchanged {
                fb.take(after.id);
                fb.add(after.id, membership);
            }
        }
        Ok(())
    }
}

/// Live groupings of library songs by categorized field.
pub struct CategoryIndex {
    fields: Vec<Field>,
    state: RwLock<IndexState>,
}

impl Default for CategoryIndex {
    fn default() -> Self {
        Self::new(Field::CATEGORIZED)
    }
}

impl CategoryIndex {
    pub fn new(fields: &[Field]) -> Self {
        Self {
            fields: fields.to_vec(),
            state: RwLock::new(IndexState::new(fields)),
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the whole index with groupings computed from `songs`.
    pub fn rebuild<'a>(&self, songs: impl IntoIterator<Item = &'a SongRecord>) {
        let mut fresh = IndexState::new(&self.fields);
        for song in songs {
            if let Err(e) = fresh.insert(song) {
                log::warn!("skipping song while rebuilding category index: {e}");
            }
        }
        *self.write() = fresh;
    }

    /// Applies one library change. Every field is updated under a single
    /// write guard, so readers see the change entirely or not at all.
    pub fn apply(&self, event: &ChangeEvent) -> Result<(), IndexError> {
        let mut state = self.write();
        match event {
            ChangeEvent::Inserted { after } => state.insert(after),
            ChangeEvent::Removed { before } => state.remove(before.id),
            ChangeEvent::Updated { after, .. } => state.update(after),
        }
    }

    /// Buckets of `field` with their member counts, in collation order.
    pub fn buckets_for(&self, field: Field) -> Vec<BucketSummary> {
        let state = self.read();
        let Some(fb) = state.field(field) else {
            return Vec::new();
        };
        let mut buckets = fb
            .buckets
            .iter()
            .map(|(key, bucket)| BucketSummary {
                key: key.clone(),
                count: bucket.members.len(),
                various_artists: bucket.various_artists(),
            })
            .collect::<Vec<_>>();
        buckets.sort_by_cached_key(|b| SortKey::new(field, &b.key));
        buckets
    }

    /// Members of one bucket in id order; empty for an unknown key.
    pub fn members_of(&self, field: Field, key: &str) -> std::vec::IntoIter<SongId> {
        let state = self.read();
        let members = state
            .field(field)
            .and_then(|fb| fb.buckets.get(key))
            .map(|bucket| bucket.members.iter().copied().collect::<Vec<_>>())
            .unwrap_or_default();
        members.into_iter()
    }

    /// Key of the bucket holding `song` for `field`.
    pub fn bucket_of(&self, field: Field, song: SongId) -> Option<String> {
        self.read()
            .field(field)
            .and_then(|fb| fb.memberships.get(&song))
            .map(|m| m.key.clone())
    }

    /// Artist to show for an album: the shared artist, or [`VARIOUS_ARTISTS`].
    pub fn album_artist_label(&self, album: &str) -> Option<String> {
        let state = self.read();
        let bucket = state.field(Field::Album)?.buckets.get(album)?;
        if bucket.various_artists() {
            Some(VARIOUS_ARTISTS.to_string())
        } else {
            bucket.shared_artist().cloned()
        }
    }

    /// Number of songs the index knows.
    pub fn song_count(&self) -> usize {
        self.read()
            .fields
            .first()
            .map(|fb| fb.memberships.len())
            .unwrap_or(0)
    }
}

impl LibraryObserver for CategoryIndex {
    fn on_change(&self, event: &ChangeEvent) -> anyhow::Result<()> {
        Ok(self.apply(event)?)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, path::Path, sync::Arc, thread};

    use crate::{
        category::{BucketSummary, CategoryIndex, IndexError, VARIOUS_ARTISTS},
        domain::{
            field::Field,
            song::{SongId, SongMetadata, SongRecord, SongStats},
        },
        storage::{
            event::ChangeEvent,
            library::{
                Library,
                tests::{raw, setup_library},
            },
        },
    };

    fn setup() -> (Library, Arc<CategoryIndex>) {
        let library = setup_library();
        let index = Arc::new(CategoryIndex::default());
        library.subscribe(index.clone());
        (library, index)
    }

    fn keys(index: &CategoryIndex, field: Field) -> Vec<(String, usize)> {
        index
            .buckets_for(field)
            .into_iter()
            .map(|b| (b.key, b.count))
            .collect()
    }

    /// Every bucket must hold exactly the live songs with that value.
    fn assert_matches_library(library: &Library, index: &CategoryIndex) {
        let songs = library.scan_all().unwrap();
        for field in index.fields() {
            let mut expected: Vec<(String, BTreeSet<SongId>)> = Vec::new();
            for song in songs.iter() {
                let key = field.value_of(song).render();
                match expected.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, ids)) => {
                        ids.insert(song.id);
                    }
                    None => expected.push((key, BTreeSet::from([song.id]))),
                }
            }
            assert_eq!(index.buckets_for(*field).len(), expected.len(), "{field}");
            for (key, ids) in expected {
                let members: BTreeSet<_> = index.members_of(*field, &key).collect();
                assert_eq!(members, ids, "{field} bucket {key:?}");
            }
        }
    }

    #[test]
    fn buckets_follow_inserts_updates_and_removals() -> anyhow::Result<()> {
        let (library, index) = setup();

        let a = library.insert_or_update(raw("/m/a.mp3", "A", "John Doe", "Hits"))?;
        let b = library.insert_or_update(raw("/m/b.mp3", "B", "John Doe", "Hits"))?;
        let c = library.insert_or_update(raw("/m/c.mp3", "C", "Jane Doe", "Other"))?;

        assert_eq!(
            keys(&index, Field::Artist),
            vec![("Jane Doe".to_string(), 1), ("John Doe".to_string(), 2)]
        );

        let mut song = library.get(b)?;
        song.metadata.artist = "Jane Doe".to_string();
        library.update(song)?;
        assert_eq!(index.bucket_of(Field::Artist, b).as_deref(), Some("Jane Doe"));

        library.remove(c)?;
        library.remove(a)?;
        assert_matches_library(&library, &index);

        Ok(())
    }

    #[test]
    fn removing_last_song_deletes_bucket() -> anyhow::Result<()> {
        let (library, index) = setup();
        let a = library.insert_or_update(raw("/m/a.mp3", "A", "Solo", "X"))?;
        library.insert_or_update(raw("/m/b.mp3", "B", "Duo", "X"))?;

        library.remove(a)?;

        let artists = keys(&index, Field::Artist);
        assert_eq!(artists, vec![("Duo".to_string(), 1)]);
        assert_eq!(index.members_of(Field::Artist, "Solo").count(), 0);

        Ok(())
    }

    #[test]
    fn rename_leaves_unrelated_buckets_alone() -> anyhow::Result<()> {
        let (library, index) = setup();
        let a = library.insert_or_update(raw("/m/a.mp3", "A", "Solo", "X"))?;
        let before = index.buckets_for(Field::Artist);

        library.rename(a, Path::new("/m/moved/a.mp3"))?;

        assert_eq!(library.get(a)?.id, a);
        assert_eq!(index.buckets_for(Field::Artist), before);
        assert_eq!(index.bucket_of(Field::Album, a).as_deref(), Some("X"));

        Ok(())
    }

    #[test]
    fn album_spanning_artists_is_various() -> anyhow::Result<()> {
        let (library, index) = setup();
        let a = library.insert_or_update(raw("/m/a.mp3", "A", "One", "Mix"))?;
        library.insert_or_update(raw("/m/b.mp3", "B", "One", "Mix"))?;

        assert_eq!(index.album_artist_label("Mix").as_deref(), Some("One"));

        let mut song = library.get(a)?;
        song.metadata.artist = "Two".to_string();
        library.update(song.clone())?;

        assert_eq!(index.album_artist_label("Mix").as_deref(), Some(VARIOUS_ARTISTS));
        assert_eq!(
            index.buckets_for(Field::Album),
            vec![BucketSummary {
                key: "Mix".to_string(),
                count: 2,
                various_artists: true
            }]
        );

        // moving the odd song back makes the album single-artist again
        song.metadata.artist = "One".to_string();
        library.update(song)?;
        assert_eq!(index.album_artist_label("Mix").as_deref(), Some("One"));
        assert_eq!(index.album_artist_label("Nope"), None);

        Ok(())
    }

    #[test]
    fn untagged_artist_does_not_make_album_various() -> anyhow::Result<()> {
        let (library, index) = setup();
        library.insert_or_update(raw("/m/a.mp3", "A", "", "Live"))?;
        library.insert_or_update(raw("/m/b.mp3", "B", "One", "Live"))?;

        assert_eq!(index.album_artist_label("Live").as_deref(), Some("One"));
        assert!(!index.buckets_for(Field::Album)[0].various_artists);

        library.insert_or_update(raw("/m/c.mp3", "C", "Two", "Live"))?;
        assert_eq!(index.album_artist_label("Live").as_deref(), Some(VARIOUS_ARTISTS));

        Ok(())
    }

    #[test]
    fn years_sort_numerically() -> anyhow::Result<()> {
        let (library, index) = setup();
        for (i, year) in [2001, 999, 1980].iter().enumerate() {
            let mut r = raw(&format!("/m/{i}.mp3"), "t", "a", "b");
            r.metadata.year = Some(*year);
            library.insert_or_update(r)?;
        }
        library.insert_or_update(raw("/m/undated.mp3", "t", "a", "b"))?;

        let years: Vec<_> = index
            .buckets_for(Field::Year)
            .into_iter()
            .map(|b| b.key)
            .collect();
        assert_eq!(years, vec!["999", "1980", "2001", ""]);

        Ok(())
    }

    #[test]
    fn events_for_unknown_songs_are_rejected() {
        let index = CategoryIndex::default();
        let song = SongRecord {
            id: SongId::from_raw(7),
            path: "/m/x.mp3".into(),
            metadata: SongMetadata {
                artist: "Ghost".to_string(),
                ..Default::default()
            },
            stats: SongStats::default(),
        };

        let err = index
            .apply(&ChangeEvent::Removed {
                before: song.clone(),
            })
            .unwrap_err();
        assert!(matches!(err, IndexError::UnknownSong { .. }));

        index
            .apply(&ChangeEvent::Inserted {
                after: song.clone(),
            })
            .unwrap();
        let err = index
            .apply(&ChangeEvent::Inserted {
                after: song.clone(),
            })
            .unwrap_err();
        assert!(matches!(err, IndexError::DuplicateSong { .. }));

        // the rejected duplicate left the existing membership intact
        assert_eq!(index.members_of(Field::Artist, "Ghost").count(), 1);
    }

    #[test]
    fn rebuild_recovers_from_a_snapshot() -> anyhow::Result<()> {
        let library = setup_library();
        library.insert_or_update(raw("/m/a.mp3", "A", "One", "X"))?;
        library.insert_or_update(raw("/m/b.mp3", "B", "Two", "X"))?;

        let index = CategoryIndex::default();
        index.rebuild(library.scan_all()?.iter());

        assert_eq!(index.song_count(), 2);
        assert_matches_library(&library, &index);

        Ok(())
    }

    #[test]
    fn random_mutation_sequence_stays_consistent() -> anyhow::Result<()> {
        let (library, index) = setup();
        let artists = ["A", "B", "C"];
        let albums = ["X", "Y"];
        let mut ids = Vec::new();

        // deterministic pseudo random walk over inserts, updates and removals
        let mut seed: u64 = 42;
        for step in 0..200 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let pick = (seed >> 33) as usize;
            match pick % 3 {
                0 => {
                    let id = library.insert_or_update(raw(
                        &format!("/m/{step}.mp3"),
                        "t",
                        artists[pick % artists.len()],
                        albums[pick % albums.len()],
                    ))?;
                    ids.push(id);
                }
                1 if !ids.is_empty() => {
                    let id = ids[pick % ids.len()];
                    let mut song = library.get(id)?;
                    song.metadata.artist = artists[(pick / 3) % artists.len()].to_string();
                    song.metadata.album = albums[(pick / 7) % albums.len()].to_string();
                    library.update(song)?;
                }
                2 if !ids.is_empty() => {
                    let id = ids.swap_remove(pick % ids.len());
                    library.remove(id)?;
                }
                _ => {}
            }
        }

        assert_matches_library(&library, &index);
        Ok(())
    }

    #[test]
    fn concurrent_readers_never_see_a_song_twice() -> anyhow::Result<()> {
        let (library, index) = setup();
        let total = 20;
        let mut ids = Vec::new();
        for i in 0..total {
            ids.push(library.insert_or_update(raw(&format!("/m/{i}.mp3"), "t", "Left", "X"))?);
        }

        thread::scope(|scope| {
            let writer = scope.spawn(|| -> anyhow::Result<()> {
                for round in 0..30 {
                    for id in &ids {
                        let mut song = library.get(*id)?;
                        song.metadata.artist =
                            if round % 2 == 0 { "Right" } else { "Left" }.to_string();
                        library.update(song)?;
                    }
                }
                Ok(())
            });

            let reader = scope.spawn(|| {
                for _ in 0..500 {
                    let counted: usize = index
                        .buckets_for(Field::Artist)
                        .iter()
                        .map(|b| b.count)
                        .sum();
                    assert_eq!(counted, total);
                }
            });

            writer.join().unwrap().unwrap();
            reader.join().unwrap();
        });

        assert_matches_library(&library, &index);
        Ok(())
    }
}
