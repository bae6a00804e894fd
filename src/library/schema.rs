//! Versioned table definitions of the library database.
//!
//! Version 0 is the layout of databases written before versioning existed,
//! every later version carries the migration that produces it.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
};
use rusqlite::Connection;

// =============================================================================
// Foreign keys
// =============================================================================

const ARTIST_SET_NULL_FK: ForeignKey = ForeignKey {
    foreign_table: "artists",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::SetNull,
};

const ALBUM_SET_NULL_FK: ForeignKey = ForeignKey {
    foreign_table: "albums",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::SetNull,
};

const ALBUM_CASCADE_FK: ForeignKey = ForeignKey {
    foreign_table: "albums",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const TRACK_CASCADE_FK: ForeignKey = ForeignKey {
    foreign_table: "tracks",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const PLAYLIST_CASCADE_FK: ForeignKey = ForeignKey {
    foreign_table: "playlists",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

// =============================================================================
// Entity tables
// =============================================================================

const ARTISTS_TABLE_V_0: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true, is_unique = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

const ALBUMS_TABLE_V_0: Table = Table {
    name: "albums",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!(
            "artist_id",
            &SqlType::Integer,
            foreign_key = Some(&ARTIST_SET_NULL_FK)
        ),
        sqlite_column!("year", &SqlType::Integer),
    ],
    indices: &[],
    unique_constraints: &[],
};

const TRACKS_TABLE_V_0: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!(
            "artist_id",
            &SqlType::Integer,
            foreign_key = Some(&ARTIST_SET_NULL_FK)
        ),
        sqlite_column!(
            "album_id",
            &SqlType::Integer,
            foreign_key = Some(&ALBUM_SET_NULL_FK)
        ),
        sqlite_column!("duration", &SqlType::Integer), // seconds
        sqlite_column!("file_path", &SqlType::Text, non_null = true, is_unique = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

/// Adds cover art and lyrics.
const TRACKS_TABLE_V_1: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!(
            "artist_id",
            &SqlType::Integer,
            foreign_key = Some(&ARTIST_SET_NULL_FK)
        ),
        sqlite_column!(
            "album_id",
            &SqlType::Integer,
            foreign_key = Some(&ALBUM_SET_NULL_FK)
        ),
        sqlite_column!("duration", &SqlType::Integer),
        sqlite_column!("file_path", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("cover_path", &SqlType::Text),
        sqlite_column!("lyrics", &SqlType::Text),
    ],
    indices: &[],
    unique_constraints: &[],
};

const PLAYLISTS_TABLE_V_0: Table = Table {
    name: "playlists",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true, is_unique = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

// =============================================================================
// Association tables
// =============================================================================

/// One row per (playlist, track) pair, so a track could appear only once.
const PLAYLIST_TRACKS_TABLE_V_0: Table = Table {
    name: "playlist_tracks",
    columns: &[
        sqlite_column!(
            "playlist_id",
            &SqlType::Integer,
            is_primary_key = true,
            foreign_key = Some(&PLAYLIST_CASCADE_FK)
        ),
        sqlite_column!(
            "track_id",
            &SqlType::Integer,
            is_primary_key = true,
            foreign_key = Some(&TRACK_CASCADE_FK)
        ),
        sqlite_column!("position", &SqlType::Integer),
    ],
    indices: &[],
    unique_constraints: &[],
};

const ALBUM_TRACKS_TABLE_V_2: Table = Table {
    name: "album_tracks",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "album_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ALBUM_CASCADE_FK)
        ),
        sqlite_column!(
            "track_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&TRACK_CASCADE_FK)
        ),
        sqlite_column!("track_number", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_album_tracks_album", "album_id"),
        ("idx_album_tracks_track", "track_id"),
    ],
    unique_constraints: &[&["album_id", "track_id"]],
};

/// Entries have their own identity so the same track may repeat.
const PLAYLIST_ENTRIES_TABLE_V_3: Table = Table {
    name: "playlist_entries",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "playlist_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&PLAYLIST_CASCADE_FK)
        ),
        sqlite_column!(
            "track_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&TRACK_CASCADE_FK)
        ),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_playlist_entries_playlist", "playlist_id"),
        ("idx_playlist_entries_track", "track_id"),
    ],
    unique_constraints: &[],
};

// =============================================================================
// Migrations
// =============================================================================

fn migrate_v0_to_v1(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("ALTER TABLE tracks ADD COLUMN cover_path TEXT", [])?;
    conn.execute("ALTER TABLE tracks ADD COLUMN lyrics TEXT", [])?;
    Ok(())
}

fn migrate_v1_to_v2(conn: &Connection) -> anyhow::Result<()> {
    ALBUM_TRACKS_TABLE_V_2.create(conn)?;

    conn.execute(
        "UPDATE tracks SET album_id = NULL
         WHERE album_id IS NOT NULL AND album_id NOT IN (SELECT id FROM albums)",
        [],
    )?;

    // Existing memberships are numbered by track id within each album
    conn.execute(
        "INSERT INTO album_tracks (album_id, track_id, track_number)
         SELECT album_id, id, ROW_NUMBER() OVER (PARTITION BY album_id ORDER BY id)
         FROM tracks
         WHERE album_id IS NOT NULL",
        [],
    )?;
    Ok(())
}

fn migrate_v2_to_v3(conn: &Connection) -> anyhow::Result<()> {
    PLAYLIST_ENTRIES_TABLE_V_3.create(conn)?;

    // Rows without a position keep their insertion order after the positioned ones
    conn.execute(
        "INSERT INTO playlist_entries (playlist_id, track_id, position)
         SELECT playlist_id, track_id,
                ROW_NUMBER() OVER (
                    PARTITION BY playlist_id
                    ORDER BY position IS NULL, position, rowid
                ) - 1
         FROM playlist_tracks
         WHERE playlist_id IN (SELECT id FROM playlists)
           AND track_id IN (SELECT id FROM tracks)",
        [],
    )?;

    conn.execute("DROP TABLE playlist_tracks", [])?;
    Ok(())
}

pub const LIBRARY_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[
            ARTISTS_TABLE_V_0,
            ALBUMS_TABLE_V_0,
            TRACKS_TABLE_V_0,
            PLAYLISTS_TABLE_V_0,
            PLAYLIST_TRACKS_TABLE_V_0,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[
            ARTISTS_TABLE_V_0,
            ALBUMS_TABLE_V_0,
            TRACKS_TABLE_V_1,
            PLAYLISTS_TABLE_V_0,
            PLAYLIST_TRACKS_TABLE_V_0,
        ],
        migration: Some(migrate_v0_to_v1),
    },
    VersionedSchema {
        version: 2,
        tables: &[
            ARTISTS_TABLE_V_0,
            ALBUMS_TABLE_V_0,
            TRACKS_TABLE_V_1,
            ALBUM_TRACKS_TABLE_V_2,
            PLAYLISTS_TABLE_V_0,
            PLAYLIST_TRACKS_TABLE_V_0,
        ],
        migration: Some(migrate_v1_to_v2),
    },
    VersionedSchema {
        version: 3,
        tables: &[
            ARTISTS_TABLE_V_0,
            ALBUMS_TABLE_V_0,
            TRACKS_TABLE_V_1,
            ALBUM_TRACKS_TABLE_V_2,
            PLAYLISTS_TABLE_V_0,
            PLAYLIST_ENTRIES_TABLE_V_3,
        ],
        migration: Some(migrate_v2_to_v3),
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    fn open_at(version: usize) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        LIBRARY_VERSIONED_SCHEMAS[version].create(&conn).unwrap();
        conn
    }

    #[test]
    fn every_version_creates_and_validates() {
        for schema in LIBRARY_VERSIONED_SCHEMAS {
            let conn = open_at(schema.version);
            schema.validate(&conn).unwrap();
        }
    }

    #[test]
    fn versions_are_sequential() {
        for (index, schema) in LIBRARY_VERSIONED_SCHEMAS.iter().enumerate() {
            assert_eq!(schema.version, index);
            assert_eq!(schema.migration.is_some(), index > 0);
        }
    }

    #[test]
    fn each_migration_produces_next_schema() {
        for schema in LIBRARY_VERSIONED_SCHEMAS.iter().skip(1) {
            let conn = open_at(schema.version - 1);
            (schema.migration.unwrap())(&conn).unwrap();
            schema.validate(&conn).unwrap();
        }
    }

    #[test]
    fn album_membership_backfill_numbers_by_track_id() {
        let conn = open_at(1);
        conn.execute_batch(
            "INSERT INTO albums (id, title) VALUES (1, 'First'), (2, 'Second');
             INSERT INTO tracks (id, title, album_id, file_path) VALUES
                (10, 'a', 2, 'a.mp3'),
                (11, 'b', 1, 'b.mp3'),
                (12, 'c', 2, 'c.mp3'),
                (13, 'd', NULL, 'd.mp3');",
        )
        .unwrap();
        // Dangling reference left behind by a store without enforced keys
        conn.execute_batch(
            "PRAGMA foreign_keys = OFF;
             INSERT INTO tracks (id, title, album_id, file_path) VALUES (14, 'e', 99, 'e.mp3');
             PRAGMA foreign_keys = ON;",
        )
        .unwrap();

        migrate_v1_to_v2(&conn).unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT album_id, track_id, track_number FROM album_tracks
                 ORDER BY album_id, track_number",
            )
            .unwrap();
        let rows: Vec<(i64, i64, i64)> = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(rows, vec![(1, 11, 1), (2, 10, 1), (2, 12, 2)]);

        let dangling: Option<i64> = conn
            .query_row("SELECT album_id FROM tracks WHERE id = 14", [], |r| r.get(0))
            .unwrap();
        assert_eq!(dangling, None);
    }

    #[test]
    fn playlist_positions_are_renormalized() {
        let conn = open_at(2);
        conn.execute_batch(
            "INSERT INTO playlists (id, name) VALUES (1, 'Mix');
             INSERT INTO tracks (id, title, file_path) VALUES
                (1, 'a', 'a.mp3'), (2, 'b', 'b.mp3'), (3, 'c', 'c.mp3'), (4, 'd', 'd.mp3');
             INSERT INTO playlist_tracks (playlist_id, track_id, position) VALUES
                (1, 1, 7), (1, 2, 3), (1, 3, NULL), (1, 4, 5);",
        )
        .unwrap();

        migrate_v2_to_v3(&conn).unwrap();

        let mut stmt = conn
            .prepare("SELECT track_id, position FROM playlist_entries ORDER BY position")
            .unwrap();
        let rows: Vec<(i64, i64)> = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(rows, vec![(2, 0), (4, 1), (1, 2), (3, 3)]);

        let legacy_left: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'playlist_tracks'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(legacy_left, 0);
    }
}
