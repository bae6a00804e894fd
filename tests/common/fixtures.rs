//! Test fixtures for library databases

use super::constants::*;
use anyhow::Result;
use music_library::library::LIBRARY_VERSIONED_SCHEMAS;
use music_library::library::NewTrack;
use music_library::{Library, LibraryConfig};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A library living in its own temporary directory, which also acts as the
/// media root.
pub struct TestLibrary {
    pub dir: TempDir,
    pub library: Library,
}

impl TestLibrary {
    pub fn open() -> Self {
        let dir = TempDir::new().unwrap();
        let library = Library::open(dir.path().join("library.db"), dir.path()).unwrap();
        TestLibrary { dir, library }
    }

    /// An empty library plus one artist, one album and three tracks that are
    /// not yet part of any album.
    pub fn seeded() -> (Self, Seed) {
        let test = Self::open();
        let library = &test.library;

        let artist_id = library.add_artist(ARTIST_NAME).unwrap();
        let album_id = library
            .add_album(ALBUM_TITLE, Some(artist_id), Some(ALBUM_YEAR))
            .unwrap();
        let mut track_ids = [0; 3];
        for (i, title) in TRACK_TITLES.iter().enumerate() {
            let track = NewTrack::new(*title, format!("tracks/{}.mp3", i + 1))
                .with_artist(artist_id)
                .with_duration(TRACK_DURATIONS[i]);
            track_ids[i] = library.add_track(&track).unwrap();
        }

        (
            test,
            Seed {
                artist_id,
                album_id,
                track_ids,
            },
        )
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("library.db")
    }

    pub fn config(&self) -> LibraryConfig {
        LibraryConfig::new(self.db_path()).with_media_root(self.dir.path())
    }

    /// Files in the temporary directory whose name contains `.backup_`.
    pub fn backups(&self) -> Vec<PathBuf> {
        backups_in(self.dir.path())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Seed {
    pub artist_id: i64,
    pub album_id: i64,
    pub track_ids: [i64; 3],
}

pub fn backups_in(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.to_string_lossy().contains(".backup_"))
        .collect();
    found.sort();
    found
}

/// `(track_id, track_number)` pairs of the album in order.
pub fn album_order(library: &Library, album_id: i64) -> Vec<(i64, i64)> {
    library
        .get_album_tracks(album_id)
        .unwrap()
        .into_iter()
        .map(|t| (t.track_id, t.track_number))
        .collect()
}

/// `(track_id, position)` pairs of the playlist in order.
pub fn playlist_order(library: &Library, playlist_id: i64) -> Vec<(i64, i64)> {
    library
        .get_playlist_tracks(playlist_id)
        .unwrap()
        .into_iter()
        .map(|e| (e.track_id, e.position))
        .collect()
}

/// Writes a database with the layout used before versioning existed: album
/// membership only through `tracks.album_id` and one playlist row per track.
///
/// Contents:
/// - artist 1, album 1 by artist 1
/// - tracks 1..=3 on album 1, track 4 without album
/// - playlist 1 holding tracks 3, 1 and 4 at positions 5, 2 and NULL
pub fn create_legacy_db(path: &Path) -> Result<()> {
    let conn = Connection::open(path)?;
    LIBRARY_VERSIONED_SCHEMAS[0].create(&conn)?;
    conn.pragma_update(None, "user_version", 0)?;

    conn.execute(
        "INSERT INTO artists (id, name) VALUES (1, ?1)",
        [LEGACY_ARTIST_NAME],
    )?;
    conn.execute(
        "INSERT INTO albums (id, title, artist_id, year) VALUES (1, ?1, 1, 1999)",
        [LEGACY_ALBUM_TITLE],
    )?;
    for (id, album) in [(1, Some(1)), (2, Some(1)), (3, Some(1)), (4, None)] {
        conn.execute(
            "INSERT INTO tracks (id, title, artist_id, album_id, duration, file_path)
             VALUES (?1, ?2, 1, ?3, 200, ?4)",
            rusqlite::params![id, format!("Legacy {}", id), album, format!("legacy/{}.mp3", id)],
        )?;
    }
    conn.execute(
        "INSERT INTO playlists (id, name) VALUES (1, ?1)",
        [LEGACY_PLAYLIST_NAME],
    )?;
    conn.execute(
        "INSERT INTO playlist_tracks (playlist_id, track_id, position)
         VALUES (1, 3, 5), (1, 1, 2), (1, 4, NULL)",
        [],
    )?;
    Ok(())
}
