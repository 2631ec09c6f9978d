pub mod db;
pub mod error;
pub mod event;
pub mod fs;
pub mod import;
pub mod library;
pub(crate) mod schema;
