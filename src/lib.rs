//! Music library catalog
//!
//! SQLite-backed storage of artists, albums, tracks and playlists with
//! dense ordering inside albums and playlists.

pub mod config;
pub mod library;
pub mod sqlite_persistence;

pub use config::LibraryConfig;
pub use library::{Library, LibraryError, LibraryResult};
