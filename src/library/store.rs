//! SQLite-backed music library.
//!
//! `Library` is the only entry point for reading and mutating the catalog.
//! Each public method runs as one transaction on the single shared
//! connection: writes take `BEGIN IMMEDIATE`, and any error rolls back.

use super::error::{LibraryError, LibraryResult};
use super::integrity;
use super::models::*;
use super::ordering::{self, Family};
use super::repository;
use super::schema::LIBRARY_VERSIONED_SCHEMAS;
use super::schema_store;
use super::validation;
use crate::config::LibraryConfig;
use chrono::Local;
use rusqlite::{Connection, OpenFlags, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct Library {
    conn: Arc<Mutex<Connection>>,
    config: LibraryConfig,
    /// Data operations are refused while this is above zero.
    pending_migrations: Arc<AtomicUsize>,
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
        r.get(0)
    })
    .unwrap_or(0)
}

fn require<T>(value: Option<T>, entity: &'static str, id: i64) -> LibraryResult<T> {
    value.ok_or(LibraryError::NotFound { entity, id })
}

fn ensure(exists: bool, entity: &'static str, id: i64) -> LibraryResult<()> {
    if exists {
        Ok(())
    } else {
        Err(LibraryError::NotFound { entity, id })
    }
}

fn ensure_artist_ref(conn: &Connection, artist_id: Option<i64>) -> LibraryResult<()> {
    match artist_id {
        Some(id) => ensure(repository::artist_exists(conn, id)?, "artist", id),
        None => Ok(()),
    }
}

fn ensure_album_ref(conn: &Connection, album_id: Option<i64>) -> LibraryResult<()> {
    match album_id {
        Some(id) => ensure(repository::album_exists(conn, id)?, "album", id),
        None => Ok(()),
    }
}

impl Library {
    /// Opens (or creates) the library at `storage_location` with default
    /// settings. Track paths under `media_root` are stored relative to it.
    pub fn open<P: AsRef<Path>, M: AsRef<Path>>(
        storage_location: P,
        media_root: M,
    ) -> LibraryResult<Self> {
        Self::open_with_config(&LibraryConfig::new(storage_location).with_media_root(media_root))
    }

    pub fn open_with_config(config: &LibraryConfig) -> LibraryResult<Self> {
        let conn = Connection::open_with_flags(
            &config.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            LibraryError::StoreUnavailable(format!(
                "Failed to open library database {:?}: {}",
                config.db_path, e
            ))
        })?;

        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let version = schema_store::initialize(&conn, LIBRARY_VERSIONED_SCHEMAS)?;

        info!(
            "Opened music library {:?} at schema version {}: {} artists, {} albums, {} tracks, {} playlists",
            config.db_path,
            version,
            count_rows(&conn, "artists"),
            count_rows(&conn, "albums"),
            count_rows(&conn, "tracks"),
            count_rows(&conn, "playlists"),
        );

        let pending = LIBRARY_VERSIONED_SCHEMAS.len().saturating_sub(version + 1);
        let library = Library {
            conn: Arc::new(Mutex::new(conn)),
            config: config.clone(),
            pending_migrations: Arc::new(AtomicUsize::new(pending)),
        };

        if config.auto_migrate {
            library.update_db()?;
        }
        Ok(library)
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    fn ensure_current_schema(&self, conn: &Connection) -> LibraryResult<()> {
        let pending = self.pending_migrations.load(Ordering::SeqCst);
        if pending == 0 {
            return Ok(());
        }
        Err(LibraryError::SchemaOutdated {
            version: schema_store::stored_version(conn)?,
            pending,
        })
    }

    fn write<T>(&self, f: impl FnOnce(&Connection) -> LibraryResult<T>) -> LibraryResult<T> {
        let mut conn = self.conn.lock()?;
        self.ensure_current_schema(&conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    fn read<T>(&self, f: impl FnOnce(&Connection) -> LibraryResult<T>) -> LibraryResult<T> {
        let mut conn = self.conn.lock()?;
        self.ensure_current_schema(&conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    // =========================================================================
    // Media paths
    // =========================================================================

    fn to_stored_path(&self, file_path: &str) -> String {
        let path = Path::new(file_path);
        if path.is_absolute() {
            if let Ok(relative) = path.strip_prefix(&self.config.media_root) {
                if !relative.as_os_str().is_empty() {
                    return relative.to_string_lossy().into_owned();
                }
            }
        }
        file_path.to_string()
    }

    /// Absolute location of a stored track path.
    pub fn resolve_media_path(&self, stored_path: &str) -> PathBuf {
        let path = Path::new(stored_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.media_root.join(path)
        }
    }

    // =========================================================================
    // Tracks
    // =========================================================================

    /// Adds a track, appending it to its album when one is given.
    pub fn add_track(&self, track: &NewTrack) -> LibraryResult<i64> {
        validation::validate_new_track(track)?;
        let stored_path = self.to_stored_path(&track.file_path);
        self.write(|conn| {
            ensure_artist_ref(conn, track.artist_id)?;
            ensure_album_ref(conn, track.album_id)?;

            let track_id = repository::insert_track(conn, track, &stored_path)?;
            if let Some(album_id) = track.album_id {
                ordering::attach(conn, Family::AlbumTracks, album_id, track_id, None)?;
                integrity::sync_track_album(conn, track_id)?;
            }
            debug!("Added track {} ({})", track_id, stored_path);
            Ok(track_id)
        })
    }

    pub fn get_track(&self, id: i64) -> LibraryResult<Track> {
        self.read(|conn| require(repository::get_track(conn, id)?, "track", id))
    }

    pub fn get_track_info(&self, id: i64) -> LibraryResult<TrackInfo> {
        let (track, artist_name, album_title) = self.read(|conn| {
            let track = require(repository::get_track(conn, id)?, "track", id)?;
            let (artist_name, album_title) = repository::track_labels(conn, &track)?;
            Ok((track, artist_name, album_title))
        })?;
        Ok(TrackInfo {
            media_path: self.resolve_media_path(&track.file_path),
            track,
            artist_name,
            album_title,
        })
    }

    /// Applies a partial update. Setting `album_id` moves the track out of its
    /// current album and appends it to the new one; clearing it removes the
    /// track from every album.
    pub fn update_track(&self, id: i64, update: &TrackUpdate) -> LibraryResult<bool> {
        validation::validate_track_update(update)?;
        if update.is_empty() {
            return Ok(false);
        }
        let stored_path = update.file_path.as_deref().map(|p| self.to_stored_path(p));

        self.write(|conn| {
            let track = require(repository::get_track(conn, id)?, "track", id)?;
            if let Some(artist_id) = update.artist_id {
                ensure_artist_ref(conn, artist_id)?;
            }
            if let Some(album_id) = update.album_id {
                ensure_album_ref(conn, album_id)?;
            }

            repository::update_track_attributes(conn, id, update, stored_path.as_deref())?;

            match update.album_id {
                Some(Some(album_id)) if track.album_id != Some(album_id) => {
                    let mut stale = Vec::new();
                    if let Some(current) = track.album_id {
                        stale.push(current);
                    }
                    stale.push(album_id);
                    for parent in stale {
                        if let Some(row) = ordering::find_first(conn, Family::AlbumTracks, parent, id)? {
                            ordering::detach_row(conn, Family::AlbumTracks, &row)?;
                        }
                    }
                    ordering::attach(conn, Family::AlbumTracks, album_id, id, None)?;
                    integrity::sync_track_album(conn, id)?;
                }
                Some(None) => {
                    for row in ordering::memberships_of_track(conn, Family::AlbumTracks, id)? {
                        ordering::detach_row(conn, Family::AlbumTracks, &row)?;
                    }
                    repository::set_track_album(conn, id, None)?;
                }
                _ => {}
            }
            Ok(true)
        })
    }

    /// Deletes the track and every album and playlist entry referencing it.
    pub fn delete_track(&self, id: i64) -> LibraryResult<usize> {
        self.write(|conn| integrity::delete_track(conn, id))
    }

    pub fn get_all_tracks(&self) -> LibraryResult<Vec<Track>> {
        self.read(repository::all_tracks)
    }

    // =========================================================================
    // Playlists
    // =========================================================================

    pub fn create_playlist(&self, name: &str) -> LibraryResult<i64> {
        validation::require_non_empty("name", name)?;
        self.write(|conn| repository::insert_playlist(conn, name))
    }

    pub fn get_playlist(&self, id: i64) -> LibraryResult<Playlist> {
        self.read(|conn| require(repository::get_playlist(conn, id)?, "playlist", id))
    }

    pub fn get_playlist_info(&self, id: i64) -> LibraryResult<PlaylistInfo> {
        self.read(|conn| {
            let playlist = require(repository::get_playlist(conn, id)?, "playlist", id)?;
            repository::playlist_info(conn, playlist)
        })
    }

    pub fn update_playlist(&self, id: i64, name: &str) -> LibraryResult<bool> {
        validation::require_non_empty("name", name)?;
        self.write(|conn| {
            ensure(repository::playlist_exists(conn, id)?, "playlist", id)?;
            Ok(repository::rename_playlist(conn, id, name)? > 0)
        })
    }

    /// Inserts the track before the entry at `position`, or appends it.
    /// Returns the position the track landed at.
    pub fn add_track_to_playlist(
        &self,
        playlist_id: i64,
        track_id: i64,
        position: Option<i64>,
    ) -> LibraryResult<i64> {
        self.write(|conn| {
            ensure(repository::playlist_exists(conn, playlist_id)?, "playlist", playlist_id)?;
            ensure(repository::track_exists(conn, track_id)?, "track", track_id)?;
            ordering::attach(conn, Family::PlaylistEntries, playlist_id, track_id, position)
        })
    }

    pub fn get_playlist_tracks(&self, playlist_id: i64) -> LibraryResult<Vec<PlaylistEntry>> {
        self.read(|conn| {
            ensure(repository::playlist_exists(conn, playlist_id)?, "playlist", playlist_id)?;
            Ok(ordering::list(conn, Family::PlaylistEntries, playlist_id)?
                .into_iter()
                .map(PlaylistEntry::from)
                .collect())
        })
    }

    /// Moves the first occurrence of the track to `new_position`.
    pub fn change_track_position_in_playlist(
        &self,
        playlist_id: i64,
        track_id: i64,
        new_position: i64,
    ) -> LibraryResult<()> {
        self.write(|conn| {
            ensure(repository::playlist_exists(conn, playlist_id)?, "playlist", playlist_id)?;
            let row = require(
                ordering::find_first(conn, Family::PlaylistEntries, playlist_id, track_id)?,
                "playlist entry",
                track_id,
            )?;
            ordering::move_row(conn, Family::PlaylistEntries, &row, new_position)
        })
    }

    /// Moves whatever entry sits at `from` to `to`.
    pub fn move_playlist_entry(&self, playlist_id: i64, from: i64, to: i64) -> LibraryResult<()> {
        self.write(|conn| {
            ensure(repository::playlist_exists(conn, playlist_id)?, "playlist", playlist_id)?;
            let row = match ordering::find_at(conn, Family::PlaylistEntries, playlist_id, from)? {
                Some(row) => row,
                None => {
                    let count = ordering::count(conn, Family::PlaylistEntries, playlist_id)?;
                    return Err(LibraryError::IndexOutOfRange {
                        index: from,
                        min: 0,
                        max: count - 1,
                    });
                }
            };
            ordering::move_row(conn, Family::PlaylistEntries, &row, to)
        })
    }

    /// Removes the first occurrence of the track. Returns the entries removed.
    pub fn remove_track_from_playlist(&self, playlist_id: i64, track_id: i64) -> LibraryResult<usize> {
        self.write(|conn| {
            match ordering::find_first(conn, Family::PlaylistEntries, playlist_id, track_id)? {
                Some(row) => ordering::detach_row(conn, Family::PlaylistEntries, &row),
                None => Ok(0),
            }
        })
    }

    pub fn remove_playlist_entry_at(&self, playlist_id: i64, position: i64) -> LibraryResult<usize> {
        self.write(|conn| {
            match ordering::find_at(conn, Family::PlaylistEntries, playlist_id, position)? {
                Some(row) => ordering::detach_row(conn, Family::PlaylistEntries, &row),
                None => Ok(0),
            }
        })
    }

    pub fn delete_playlist(&self, id: i64) -> LibraryResult<usize> {
        self.write(|conn| integrity::delete_playlist(conn, id))
    }

    pub fn get_all_playlists(&self) -> LibraryResult<Vec<Playlist>> {
        self.read(repository::all_playlists)
    }

    // =========================================================================
    // Artists
    // =========================================================================

    /// Returns the id of the artist with this name, creating it if needed.
    pub fn add_artist(&self, name: &str) -> LibraryResult<i64> {
        validation::require_non_empty("name", name)?;
        self.write(|conn| match repository::find_artist_by_name(conn, name)? {
            Some(id) => Ok(id),
            None => repository::insert_artist(conn, name),
        })
    }

    pub fn get_artist(&self, id: i64) -> LibraryResult<Artist> {
        self.read(|conn| require(repository::get_artist(conn, id)?, "artist", id))
    }

    pub fn get_artist_info(&self, id: i64) -> LibraryResult<ArtistInfo> {
        self.read(|conn| {
            let artist = require(repository::get_artist(conn, id)?, "artist", id)?;
            repository::artist_info(conn, artist)
        })
    }

    pub fn update_artist(&self, id: i64, name: &str) -> LibraryResult<bool> {
        validation::require_non_empty("name", name)?;
        self.write(|conn| {
            ensure(repository::artist_exists(conn, id)?, "artist", id)?;
            Ok(repository::rename_artist(conn, id, name)? > 0)
        })
    }

    pub fn get_artist_albums(&self, id: i64) -> LibraryResult<Vec<Album>> {
        self.read(|conn| {
            ensure(repository::artist_exists(conn, id)?, "artist", id)?;
            repository::albums_of_artist(conn, id)
        })
    }

    pub fn get_artist_tracks(&self, id: i64) -> LibraryResult<Vec<Track>> {
        self.read(|conn| {
            ensure(repository::artist_exists(conn, id)?, "artist", id)?;
            repository::tracks_of_artist(conn, id)
        })
    }

    /// Deletes the artist. Albums and tracks survive without an artist.
    pub fn delete_artist(&self, id: i64) -> LibraryResult<usize> {
        self.write(|conn| integrity::delete_artist(conn, id))
    }

    pub fn get_all_artists(&self) -> LibraryResult<Vec<Artist>> {
        self.read(repository::all_artists)
    }

    // =========================================================================
    // Albums
    // =========================================================================

    /// Returns the id of the album with this title and artist, creating it if
    /// needed.
    pub fn add_album(
        &self,
        title: &str,
        artist_id: Option<i64>,
        year: Option<i32>,
    ) -> LibraryResult<i64> {
        validation::validate_album(title, year)?;
        self.write(|conn| {
            ensure_artist_ref(conn, artist_id)?;
            match repository::find_album(conn, title, artist_id)? {
                Some(id) => Ok(id),
                None => repository::insert_album(conn, title, artist_id, year),
            }
        })
    }

    pub fn get_album(&self, id: i64) -> LibraryResult<Album> {
        self.read(|conn| require(repository::get_album(conn, id)?, "album", id))
    }

    pub fn get_album_info(&self, id: i64) -> LibraryResult<AlbumInfo> {
        self.read(|conn| {
            let album = require(repository::get_album(conn, id)?, "album", id)?;
            repository::album_info(conn, album)
        })
    }

    pub fn update_album(&self, id: i64, update: &AlbumUpdate) -> LibraryResult<bool> {
        validation::validate_album_update(update)?;
        if update.is_empty() {
            return Ok(false);
        }
        self.write(|conn| {
            ensure(repository::album_exists(conn, id)?, "album", id)?;
            if let Some(artist_id) = update.artist_id {
                ensure_artist_ref(conn, artist_id)?;
            }
            Ok(repository::update_album(conn, id, update)? > 0)
        })
    }

    /// Inserts the track before the one numbered `track_number`, or appends
    /// it. Returns the track number it received.
    pub fn add_track_to_album(
        &self,
        album_id: i64,
        track_id: i64,
        track_number: Option<i64>,
    ) -> LibraryResult<i64> {
        self.write(|conn| {
            ensure(repository::album_exists(conn, album_id)?, "album", album_id)?;
            ensure(repository::track_exists(conn, track_id)?, "track", track_id)?;
            let number = ordering::attach(conn, Family::AlbumTracks, album_id, track_id, track_number)?;
            integrity::sync_track_album(conn, track_id)?;
            Ok(number)
        })
    }

    pub fn get_album_tracks(&self, album_id: i64) -> LibraryResult<Vec<AlbumTrack>> {
        self.read(|conn| {
            ensure(repository::album_exists(conn, album_id)?, "album", album_id)?;
            Ok(ordering::list(conn, Family::AlbumTracks, album_id)?
                .into_iter()
                .map(AlbumTrack::from)
                .collect())
        })
    }

    pub fn change_track_number_in_album(
        &self,
        album_id: i64,
        track_id: i64,
        new_number: i64,
    ) -> LibraryResult<()> {
        self.write(|conn| {
            ensure(repository::album_exists(conn, album_id)?, "album", album_id)?;
            let row = require(
                ordering::find_first(conn, Family::AlbumTracks, album_id, track_id)?,
                "album track",
                track_id,
            )?;
            ordering::move_row(conn, Family::AlbumTracks, &row, new_number)
        })
    }

    pub fn remove_track_from_album(&self, album_id: i64, track_id: i64) -> LibraryResult<usize> {
        self.write(|conn| {
            let Some(row) = ordering::find_first(conn, Family::AlbumTracks, album_id, track_id)?
            else {
                return Ok(0);
            };
            let removed = ordering::detach_row(conn, Family::AlbumTracks, &row)?;
            integrity::sync_track_album(conn, track_id)?;
            Ok(removed)
        })
    }

    /// Deletes the album. Its tracks survive and fall back to another album
    /// they belong to, if any. Their `album_id` is only cleared when no such
    /// album remains, instead of always being cleared.
    pub fn delete_album(&self, id: i64) -> LibraryResult<usize> {
        self.write(|conn| integrity::delete_album(conn, id))
    }

    pub fn get_all_albums(&self) -> LibraryResult<Vec<Album>> {
        self.read(repository::all_albums)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Migrations `update_db` would apply. Data operations fail with
    /// `SchemaOutdated` until this is zero.
    pub fn pending_migrations(&self) -> usize {
        self.pending_migrations.load(Ordering::SeqCst)
    }

    pub fn schema_version(&self) -> LibraryResult<usize> {
        let conn = self.conn.lock()?;
        schema_store::stored_version(&conn)
    }

    /// Copies the database to `<db>.backup_<YYYYmmdd_HHMMSS>`.
    pub fn backup_database(&self) -> LibraryResult<PathBuf> {
        let conn = self.conn.lock()?;
        self.backup_with(&conn)
    }

    fn backup_with(&self, conn: &Connection) -> LibraryResult<PathBuf> {
        let stem = format!(
            "{}.backup_{}",
            self.config.db_path.display(),
            Local::now().format("%Y%m%d_%H%M%S")
        );
        let mut backup_path = PathBuf::from(&stem);
        let mut attempt = 1;
        while backup_path.exists() {
            backup_path = PathBuf::from(format!("{}_{}", stem, attempt));
            attempt += 1;
        }

        let target = backup_path.to_string_lossy().into_owned();
        conn.execute("VACUUM INTO ?1", [&target])?;
        info!("Backed up library db to {:?}", backup_path);
        Ok(backup_path)
    }

    /// Applies every pending migration. Returns how many were applied.
    pub fn update_db(&self) -> LibraryResult<usize> {
        let mut conn = self.conn.lock()?;
        let pending = schema_store::pending_migrations(&conn, LIBRARY_VERSIONED_SCHEMAS)?;
        if pending == 0 {
            return Ok(0);
        }

        let backup_path = if self.config.backup_before_migrate {
            Some(self.backup_with(&conn)?)
        } else {
            None
        };

        let result = schema_store::apply_pending(&mut conn, LIBRARY_VERSIONED_SCHEMAS);
        // Steps committed before a failure count too
        if let Ok(left) = schema_store::pending_migrations(&conn, LIBRARY_VERSIONED_SCHEMAS) {
            self.pending_migrations.store(left, Ordering::SeqCst);
        }

        match result {
            Ok(applied) => {
                if let Some(path) = backup_path {
                    if let Err(e) = std::fs::remove_file(&path) {
                        warn!("Failed to remove migration backup {:?}: {}", path, e);
                    }
                }
                info!("Applied {} library db migration(s)", applied);
                Ok(applied)
            }
            Err(e) => {
                if let Some(path) = backup_path {
                    warn!("Library db migration failed, backup kept at {:?}", path);
                }
                Err(e)
            }
        }
    }
}
