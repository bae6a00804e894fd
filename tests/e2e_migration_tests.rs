//! End-to-end tests for schema versions, migrations and backups

mod common;

use common::{
    album_order, backups_in, create_legacy_db, playlist_order, TestLibrary, LEGACY_ALBUM_TITLE,
    LEGACY_ARTIST_NAME, LEGACY_PLAYLIST_NAME,
};
use music_library::library::{NewTrack, LIBRARY_VERSIONED_SCHEMAS};
use music_library::sqlite_persistence::BASE_DB_VERSION;
use music_library::{Library, LibraryConfig, LibraryError};
use rusqlite::Connection;
use tempfile::TempDir;

fn latest_version() -> usize {
    LIBRARY_VERSIONED_SCHEMAS.last().unwrap().version
}

fn legacy_library_dir() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("library.db");
    create_legacy_db(&db_path).unwrap();
    (dir, db_path)
}

#[test]
fn test_new_database_starts_at_latest_version() {
    let test = TestLibrary::open();

    assert_eq!(test.library.schema_version().unwrap(), latest_version());
    assert_eq!(test.library.update_db().unwrap(), 0);
    assert!(test.backups().is_empty());
}

#[test]
fn test_legacy_database_migrates_with_data() {
    let (dir, db_path) = legacy_library_dir();
    let library = Library::open(&db_path, dir.path()).unwrap();
    assert_eq!(library.schema_version().unwrap(), 0);
    assert_eq!(library.pending_migrations(), latest_version());

    assert_eq!(library.update_db().unwrap(), latest_version());
    assert_eq!(library.update_db().unwrap(), 0);
    assert_eq!(library.schema_version().unwrap(), latest_version());
    assert!(backups_in(dir.path()).is_empty());

    let artists = library.get_all_artists().unwrap();
    assert_eq!(artists.len(), 1);
    assert_eq!(artists[0].name, LEGACY_ARTIST_NAME);

    let album = library.get_album(1).unwrap();
    assert_eq!(album.title, LEGACY_ALBUM_TITLE);
    assert_eq!(album.year, Some(1999));
    assert_eq!(album_order(&library, 1), vec![(1, 1), (2, 2), (3, 3)]);

    let tracks = library.get_all_tracks().unwrap();
    assert_eq!(tracks.len(), 4);
    assert!(tracks.iter().all(|t| t.cover_path.is_none() && t.lyrics.is_none()));
    assert_eq!(library.get_track(4).unwrap().album_id, None);

    let playlist = library.get_playlist(1).unwrap();
    assert_eq!(playlist.name, LEGACY_PLAYLIST_NAME);
    assert_eq!(playlist_order(&library, 1), vec![(1, 0), (3, 1), (4, 2)]);
}

#[test]
fn test_migrated_database_accepts_new_features() {
    let (dir, db_path) = legacy_library_dir();
    let library = Library::open(&db_path, dir.path()).unwrap();
    library.update_db().unwrap();

    // A track may now appear twice in the same playlist
    assert_eq!(library.add_track_to_playlist(1, 1, None).unwrap(), 3);
    assert_eq!(library.add_track_to_album(1, 4, Some(1)).unwrap(), 1);
    assert_eq!(album_order(&library, 1), vec![(4, 1), (1, 2), (2, 3), (3, 4)]);
}

#[test]
fn test_auto_migrate_on_open() {
    let (dir, db_path) = legacy_library_dir();
    let config = LibraryConfig::new(&db_path)
        .with_media_root(dir.path())
        .with_auto_migrate(true)
        .with_backup_before_migrate(false);

    let library = Library::open_with_config(&config).unwrap();
    assert_eq!(library.schema_version().unwrap(), latest_version());
    assert!(backups_in(dir.path()).is_empty());
    drop(library);

    // Reopening finds a versioned database that validates
    let reopened = Library::open(&db_path, dir.path()).unwrap();
    assert_eq!(reopened.schema_version().unwrap(), latest_version());
    assert_eq!(reopened.get_all_tracks().unwrap().len(), 4);
}

#[test]
fn test_failed_migration_keeps_version_and_backup() {
    let (dir, db_path) = legacy_library_dir();
    {
        let conn = Connection::open(&db_path).unwrap();
        conn.execute("DROP TABLE playlist_tracks", []).unwrap();
    }

    let library = Library::open(&db_path, dir.path()).unwrap();
    match library.update_db() {
        Err(LibraryError::MigrationFailure { version, .. }) => assert_eq!(version, 1),
        other => panic!("Expected MigrationFailure, got {:?}", other),
    }

    assert_eq!(library.schema_version().unwrap(), 0);
    assert_eq!(library.pending_migrations(), latest_version());
    assert_eq!(backups_in(dir.path()).len(), 1);
    assert!(matches!(
        library.get_artist(1),
        Err(LibraryError::SchemaOutdated { version: 0, .. })
    ));
    drop(library);

    // Data written before the failed attempt is untouched
    let conn = Connection::open(&db_path).unwrap();
    let name: String = conn
        .query_row("SELECT name FROM artists WHERE id = 1", [], |r| r.get(0))
        .unwrap();
    assert_eq!(name, LEGACY_ARTIST_NAME);
}

#[test]
fn test_unmigrated_database_refuses_data_operations() {
    let (dir, db_path) = legacy_library_dir();
    let library = Library::open(&db_path, dir.path()).unwrap();
    assert_eq!(library.pending_migrations(), latest_version());

    let outdated = |result: Result<(), LibraryError>| match result {
        Err(LibraryError::SchemaOutdated { version, pending }) => {
            assert_eq!((version, pending), (0, latest_version()));
        }
        other => panic!("Expected SchemaOutdated, got {:?}", other),
    };
    outdated(library.get_playlist_tracks(1).map(|_| ()));
    outdated(library.add_track_to_album(1, 4, None).map(|_| ()));
    outdated(library.delete_track(4).map(|_| ()));
    outdated(
        library
            .add_track(&NewTrack::new("New", "legacy/new.mp3").with_album(1))
            .map(|_| ()),
    );
    outdated(library.get_all_artists().map(|_| ()));

    // Clones see the migration through the shared handle
    let other = library.clone();
    assert_eq!(library.update_db().unwrap(), latest_version());
    assert_eq!(other.pending_migrations(), 0);
    assert_eq!(other.get_playlist_tracks(1).unwrap().len(), 3);
    assert_eq!(other.delete_track(4).unwrap(), 1);
}

#[test]
fn test_newer_database_is_refused() {
    let test = TestLibrary::open();
    let db_path = test.db_path();
    drop(test.library);

    let conn = Connection::open(&db_path).unwrap();
    let too_new = (BASE_DB_VERSION + latest_version() + 1) as i64;
    conn.pragma_update(None, "user_version", too_new).unwrap();
    drop(conn);

    assert!(matches!(
        Library::open(&db_path, test.dir.path()),
        Err(LibraryError::MigrationFailure { .. })
    ));
}

#[test]
fn test_backup_database_writes_a_copy() {
    let (test, _seed) = TestLibrary::seeded();

    let backup = test.library.backup_database().unwrap();
    assert!(backup.exists());
    assert_eq!(test.backups(), vec![backup.clone()]);

    let copy = Library::open(&backup, test.dir.path()).unwrap();
    assert_eq!(copy.get_all_tracks().unwrap().len(), 3);
    assert_eq!(copy.schema_version().unwrap(), latest_version());
}

#[test]
fn test_data_survives_reopen() {
    let (test, seed) = TestLibrary::seeded();
    test.library
        .add_track_to_album(seed.album_id, seed.track_ids[1], None)
        .unwrap();
    let config = test.config();
    drop(test.library);

    let library = Library::open_with_config(&config).unwrap();
    assert_eq!(
        album_order(&library, seed.album_id),
        vec![(seed.track_ids[1], 1)]
    );
}
