//! Row level storage of artists, albums, tracks and playlists.
//!
//! Nothing here orders or cascades, callers run these inside their own
//! transaction.

use super::error::LibraryResult;
use super::models::*;
use rusqlite::{params, Connection, OptionalExtension, ToSql};

const ARTIST_COLUMNS: &str = "id, name";
const ALBUM_COLUMNS: &str = "id, title, artist_id, year";
const TRACK_COLUMNS: &str =
    "id, title, artist_id, album_id, duration, file_path, cover_path, lyrics";
const PLAYLIST_COLUMNS: &str = "id, name";

fn parse_artist_row(row: &rusqlite::Row) -> rusqlite::Result<Artist> {
    Ok(Artist {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn parse_album_row(row: &rusqlite::Row) -> rusqlite::Result<Album> {
    Ok(Album {
        id: row.get(0)?,
        title: row.get(1)?,
        artist_id: row.get(2)?,
        year: row.get(3)?,
    })
}

fn parse_track_row(row: &rusqlite::Row) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        title: row.get(1)?,
        artist_id: row.get(2)?,
        album_id: row.get(3)?,
        duration: row.get(4)?,
        file_path: row.get(5)?,
        cover_path: row.get(6)?,
        lyrics: row.get(7)?,
    })
}

fn parse_playlist_row(row: &rusqlite::Row) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn query_all<T, P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    parse: fn(&rusqlite::Row) -> rusqlite::Result<T>,
) -> LibraryResult<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, parse)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn exists(conn: &Connection, table: &str, id: i64) -> LibraryResult<bool> {
    Ok(conn
        .query_row(
            &format!("SELECT 1 FROM {} WHERE id = ?1", table),
            params![id],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

/// Builds one UPDATE out of the supplied assignments. Returns rows changed.
fn apply_patch(
    conn: &Connection,
    table: &str,
    id: i64,
    assignments: &[(&'static str, &dyn ToSql)],
) -> LibraryResult<usize> {
    if assignments.is_empty() {
        return Ok(0);
    }
    let set_clause = assignments
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?{}",
        table,
        set_clause,
        assignments.len() + 1
    );
    let mut values: Vec<&dyn ToSql> = assignments.iter().map(|(_, value)| *value).collect();
    values.push(&id);
    Ok(conn.execute(&sql, values.as_slice())?)
}

fn delete_by_id(conn: &Connection, table: &str, id: i64) -> LibraryResult<usize> {
    Ok(conn.execute(
        &format!("DELETE FROM {} WHERE id = ?1", table),
        params![id],
    )?)
}

// =========================================================================
// Artists
// =========================================================================

pub fn artist_exists(conn: &Connection, id: i64) -> LibraryResult<bool> {
    exists(conn, "artists", id)
}

pub fn find_artist_by_name(conn: &Connection, name: &str) -> LibraryResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM artists WHERE name = ?1",
            params![name],
            |r| r.get(0),
        )
        .optional()?)
}

pub fn insert_artist(conn: &Connection, name: &str) -> LibraryResult<i64> {
    conn.execute("INSERT INTO artists (name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

pub fn get_artist(conn: &Connection, id: i64) -> LibraryResult<Option<Artist>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM artists WHERE id = ?1", ARTIST_COLUMNS),
            params![id],
            parse_artist_row,
        )
        .optional()?)
}

pub fn all_artists(conn: &Connection) -> LibraryResult<Vec<Artist>> {
    query_all(
        conn,
        &format!("SELECT {} FROM artists ORDER BY name, id", ARTIST_COLUMNS),
        [],
        parse_artist_row,
    )
}

pub fn rename_artist(conn: &Connection, id: i64, name: &str) -> LibraryResult<usize> {
    apply_patch(conn, "artists", id, &[("name", &name)])
}

pub fn delete_artist(conn: &Connection, id: i64) -> LibraryResult<usize> {
    delete_by_id(conn, "artists", id)
}

pub fn artist_info(conn: &Connection, artist: Artist) -> LibraryResult<ArtistInfo> {
    let (album_count, track_count): (i64, i64) = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM albums WHERE artist_id = ?1),
                (SELECT COUNT(*) FROM tracks WHERE artist_id = ?1)",
        params![artist.id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    Ok(ArtistInfo {
        artist,
        album_count: album_count as usize,
        track_count: track_count as usize,
    })
}

// =========================================================================
// Albums
// =========================================================================

pub fn album_exists(conn: &Connection, id: i64) -> LibraryResult<bool> {
    exists(conn, "albums", id)
}

pub fn find_album(
    conn: &Connection,
    title: &str,
    artist_id: Option<i64>,
) -> LibraryResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM albums WHERE title = ?1 AND artist_id IS ?2 ORDER BY id LIMIT 1",
            params![title, artist_id],
            |r| r.get(0),
        )
        .optional()?)
}

pub fn insert_album(
    conn: &Connection,
    title: &str,
    artist_id: Option<i64>,
    year: Option<i32>,
) -> LibraryResult<i64> {
    conn.execute(
        "INSERT INTO albums (title, artist_id, year) VALUES (?1, ?2, ?3)",
        params![title, artist_id, year],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_album(conn: &Connection, id: i64) -> LibraryResult<Option<Album>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM albums WHERE id = ?1", ALBUM_COLUMNS),
            params![id],
            parse_album_row,
        )
        .optional()?)
}

pub fn all_albums(conn: &Connection) -> LibraryResult<Vec<Album>> {
    query_all(
        conn,
        &format!("SELECT {} FROM albums ORDER BY title, id", ALBUM_COLUMNS),
        [],
        parse_album_row,
    )
}

pub fn albums_of_artist(conn: &Connection, artist_id: i64) -> LibraryResult<Vec<Album>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM albums WHERE artist_id = ?1 ORDER BY year, title, id",
            ALBUM_COLUMNS
        ),
        params![artist_id],
        parse_album_row,
    )
}

pub fn update_album(conn: &Connection, id: i64, update: &AlbumUpdate) -> LibraryResult<usize> {
    let mut assignments: Vec<(&'static str, &dyn ToSql)> = Vec::new();
    if let Some(title) = &update.title {
        assignments.push(("title", title));
    }
    if let Some(artist_id) = &update.artist_id {
        assignments.push(("artist_id", artist_id));
    }
    if let Some(year) = &update.year {
        assignments.push(("year", year));
    }
    apply_patch(conn, "albums", id, &assignments)
}

pub fn delete_album(conn: &Connection, id: i64) -> LibraryResult<usize> {
    delete_by_id(conn, "albums", id)
}

pub fn album_info(conn: &Connection, album: Album) -> LibraryResult<AlbumInfo> {
    let artist_name: Option<String> = match album.artist_id {
        Some(artist_id) => conn
            .query_row(
                "SELECT name FROM artists WHERE id = ?1",
                params![artist_id],
                |r| r.get(0),
            )
            .optional()?,
        None => None,
    };
    let (track_count, total_duration): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(t.duration), 0)
         FROM album_tracks at JOIN tracks t ON t.id = at.track_id
         WHERE at.album_id = ?1",
        params![album.id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    Ok(AlbumInfo {
        album,
        artist_name,
        track_count: track_count as usize,
        total_duration,
    })
}

// =========================================================================
// Tracks
// =========================================================================

pub fn track_exists(conn: &Connection, id: i64) -> LibraryResult<bool> {
    exists(conn, "tracks", id)
}

/// Inserts the track row. `album_id` is left NULL, album membership is
/// tracked by the association engine.
pub fn insert_track(conn: &Connection, track: &NewTrack, stored_path: &str) -> LibraryResult<i64> {
    conn.execute(
        "INSERT INTO tracks (title, artist_id, duration, file_path, cover_path, lyrics)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            track.title,
            track.artist_id,
            track.duration,
            stored_path,
            track.cover_path,
            track.lyrics
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_track(conn: &Connection, id: i64) -> LibraryResult<Option<Track>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM tracks WHERE id = ?1", TRACK_COLUMNS),
            params![id],
            parse_track_row,
        )
        .optional()?)
}

pub fn all_tracks(conn: &Connection) -> LibraryResult<Vec<Track>> {
    query_all(
        conn,
        &format!("SELECT {} FROM tracks ORDER BY id", TRACK_COLUMNS),
        [],
        parse_track_row,
    )
}

pub fn tracks_of_artist(conn: &Connection, artist_id: i64) -> LibraryResult<Vec<Track>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM tracks WHERE artist_id = ?1 ORDER BY id",
            TRACK_COLUMNS
        ),
        params![artist_id],
        parse_track_row,
    )
}

/// Patches plain attributes. The album link is left to the caller.
pub fn update_track_attributes(
    conn: &Connection,
    id: i64,
    update: &TrackUpdate,
    stored_path: Option<&str>,
) -> LibraryResult<usize> {
    let mut assignments: Vec<(&'static str, &dyn ToSql)> = Vec::new();
    if let Some(title) = &update.title {
        assignments.push(("title", title));
    }
    if let Some(path) = &stored_path {
        assignments.push(("file_path", path));
    }
    if let Some(artist_id) = &update.artist_id {
        assignments.push(("artist_id", artist_id));
    }
    if let Some(duration) = &update.duration {
        assignments.push(("duration", duration));
    }
    if let Some(cover_path) = &update.cover_path {
        assignments.push(("cover_path", cover_path));
    }
    if let Some(lyrics) = &update.lyrics {
        assignments.push(("lyrics", lyrics));
    }
    apply_patch(conn, "tracks", id, &assignments)
}

pub fn set_track_album(conn: &Connection, id: i64, album_id: Option<i64>) -> LibraryResult<usize> {
    apply_patch(conn, "tracks", id, &[("album_id", &album_id)])
}

pub fn clear_artist_references(conn: &Connection, artist_id: i64) -> LibraryResult<()> {
    conn.execute(
        "UPDATE albums SET artist_id = NULL WHERE artist_id = ?1",
        params![artist_id],
    )?;
    conn.execute(
        "UPDATE tracks SET artist_id = NULL WHERE artist_id = ?1",
        params![artist_id],
    )?;
    Ok(())
}

pub fn delete_track(conn: &Connection, id: i64) -> LibraryResult<usize> {
    delete_by_id(conn, "tracks", id)
}

/// Artist name and album title of a track.
pub fn track_labels(
    conn: &Connection,
    track: &Track,
) -> LibraryResult<(Option<String>, Option<String>)> {
    Ok(conn.query_row(
        "SELECT (SELECT name FROM artists WHERE id = ?1),
                (SELECT title FROM albums WHERE id = ?2)",
        params![track.artist_id, track.album_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?)
}

// =========================================================================
// Playlists
// =========================================================================

pub fn playlist_exists(conn: &Connection, id: i64) -> LibraryResult<bool> {
    exists(conn, "playlists", id)
}

pub fn insert_playlist(conn: &Connection, name: &str) -> LibraryResult<i64> {
    conn.execute("INSERT INTO playlists (name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

pub fn get_playlist(conn: &Connection, id: i64) -> LibraryResult<Option<Playlist>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM playlists WHERE id = ?1", PLAYLIST_COLUMNS),
            params![id],
            parse_playlist_row,
        )
        .optional()?)
}

pub fn all_playlists(conn: &Connection) -> LibraryResult<Vec<Playlist>> {
    query_all(
        conn,
        &format!("SELECT {} FROM playlists ORDER BY name, id", PLAYLIST_COLUMNS),
        [],
        parse_playlist_row,
    )
}

pub fn rename_playlist(conn: &Connection, id: i64, name: &str) -> LibraryResult<usize> {
    apply_patch(conn, "playlists", id, &[("name", &name)])
}

pub fn delete_playlist(conn: &Connection, id: i64) -> LibraryResult<usize> {
    delete_by_id(conn, "playlists", id)
}

pub fn playlist_info(conn: &Connection, playlist: Playlist) -> LibraryResult<PlaylistInfo> {
    let (track_count, total_duration): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(t.duration), 0)
         FROM playlist_entries pe JOIN tracks t ON t.id = pe.track_id
         WHERE pe.playlist_id = ?1",
        params![playlist.id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    Ok(PlaylistInfo {
        playlist,
        track_count: track_count as usize,
        total_duration,
    })
}
