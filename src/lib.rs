pub mod cancel;
pub mod catalog;
pub mod category;
pub mod cli;
pub mod config;
pub mod domain;
pub mod playlist;
pub mod search;
pub mod storage;
pub mod text;
