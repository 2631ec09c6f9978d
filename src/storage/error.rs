use std::path::PathBuf;

use thiserror::Error;

use crate::domain::song::SongId;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("song {0} not found")]
    SongNotFound(SongId),

    #[error("path {path} already belongs to song {owner}")]
    PathConflict { path: PathBuf, owner: SongId },

    /// A derived view refused a change event; the store itself is unaffected.
    #[error("library consistency error: {0}")]
    Consistency(String),

    #[error("filesystem error: {0}")]
    Fs(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
