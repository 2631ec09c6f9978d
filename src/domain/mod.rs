pub mod field;
pub mod song;
