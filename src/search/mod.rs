//! Query compilation and evaluation over the library.
//!
//! A query is a whitespace-separated list of clauses, all of which must match:
//! `field:value`, `field:"quoted value"`, or a bare term searched in the
//! descriptive fields and the file name. Numeric fields accept `>`, `>=`,
//! `<`, `<=` and `=` before the number. Nothing in a query is ever rejected;
//! doubtful input is reported through [`QueryIssue`].

pub mod lexer;
pub mod phrase;
pub mod predicate;

use log::debug;

pub use lexer::QueryIssue;
pub use predicate::{Comparison, Matcher, Predicate};

use crate::{
    category::CategoryIndex,
    domain::{field::Field, song::SongRecord},
    storage::{error::StorageError, library::Library},
};

use self::phrase::CountPhrases;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiled {
    pub predicate: Predicate,
    pub issues: Vec<QueryIssue>,
}

pub fn compile(query: &str) -> Compiled {
    let (clauses, issues) = lexer::tokenize(query);
    let predicate = Predicate::from_clauses(&clauses);
    debug!("compiled query {query:?} into {predicate:?}");
    Compiled { predicate, issues }
}

/// Lazily filters `songs`, keeping their order.
pub fn evaluate<'p, I>(predicate: &'p Predicate, songs: I) -> impl Iterator<Item = SongRecord> + 'p
where
    I: IntoIterator<Item = SongRecord>,
    I::IntoIter: 'p,
{
    songs.into_iter().filter(move |song| predicate.matches(song))
}

/// Restricts a search to the members of one category bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub field: Field,
    pub key: String,
}

impl Scope {
    pub fn new(field: Field, key: impl Into<String>) -> Self {
        Self {
            field,
            key: key.into(),
        }
    }

    pub fn label(&self) -> String {
        phrase::describe_scope(phrase::SCOPE_TEMPLATE, &self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub songs: Vec<SongRecord>,
    pub issues: Vec<QueryIssue>,
}

impl SearchResult {
    pub fn summary(&self, phrases: &CountPhrases) -> String {
        phrases.describe(self.songs.len())
    }
}

/// Runs `query` over the whole library, in library order.
pub fn search(library: &Library, query: &str) -> Result<SearchResult, StorageError> {
    let Compiled { predicate, issues } = compile(query);
    let songs = evaluate(&predicate, library.scan_all()?).collect();
    Ok(SearchResult { songs, issues })
}

/// Runs `predicate` over the members of `scope` only.
///
/// Bucket membership and song records are read in one critical section, so a
/// concurrent write cannot leave a member id pointing at a removed song.
pub fn search_in(
    library: &Library,
    index: &CategoryIndex,
    predicate: &Predicate,
    scope: &Scope,
) -> Result<Vec<SongRecord>, StorageError> {
    library.read(|reader| {
        let members: Vec<_> = index.members_of(scope.field, &scope.key).collect();
        let songs = reader.get_many(&members)?;
        Ok(evaluate(predicate, songs).collect())
    })
}
