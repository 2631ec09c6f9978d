use std::path::PathBuf;

use thiserror::Error;

use crate::storage::error::StorageError;

use super::PlaylistId;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed playlist: {0}")]
    Malformed(String),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("property list error: {0}")]
    Plist(#[from] plist::Error),
    #[error("{0} is not supported by this format")]
    Unsupported(&'static str),
}

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("{0} does not exist")]
    NotFound(PlaylistId),
    #[error("no playlist format recognizes {0}")]
    UnknownFormat(PathBuf),
    #[error("not a permutation of the playlist entries")]
    InvalidOrder,
    #[error("entry {index} is out of range for {len} entries")]
    EntryOutOfRange { index: usize, len: usize },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("invalid playlist file {path}: {source}")]
    Container {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl PlaylistError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> PlaylistError {
        let path = path.into();
        move |source| PlaylistError::Io { path, source }
    }
}
