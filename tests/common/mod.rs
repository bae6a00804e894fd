//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.

#![allow(dead_code)]

mod constants;
mod fixtures;

pub use constants::*;
pub use fixtures::{album_order, backups_in, create_legacy_db, playlist_order, Seed, TestLibrary};
