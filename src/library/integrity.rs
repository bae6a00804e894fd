//! Cascades run when an entity is deleted, and the denormalized album link
//! of tracks.
//!
//! Foreign keys declared on the tables are only a backstop: every cascade is
//! performed here so that collections are renumbered and stay dense.

use super::error::LibraryResult;
use super::ordering::{self, Family};
use super::repository;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

/// Points `tracks.album_id` at the album of the most recently attached
/// membership that remains, or NULL when there is none.
pub fn sync_track_album(conn: &Connection, track_id: i64) -> LibraryResult<()> {
    let album_id: Option<i64> = conn
        .query_row(
            "SELECT album_id FROM album_tracks WHERE track_id = ?1 ORDER BY id DESC LIMIT 1",
            params![track_id],
            |r| r.get(0),
        )
        .optional()?;
    repository::set_track_album(conn, track_id, album_id)?;
    Ok(())
}

/// Detaches the track from every collection holding it.
pub fn detach_track_everywhere(conn: &Connection, track_id: i64) -> LibraryResult<usize> {
    let mut detached = 0;
    for family in [Family::AlbumTracks, Family::PlaylistEntries] {
        for membership in ordering::memberships_of_track(conn, family, track_id)? {
            detached += ordering::detach_row(conn, family, &membership)?;
        }
    }
    Ok(detached)
}

pub fn delete_track(conn: &Connection, track_id: i64) -> LibraryResult<usize> {
    let detached = detach_track_everywhere(conn, track_id)?;
    let removed = repository::delete_track(conn, track_id)?;
    debug!(
        "Deleted track {} ({} collection entries detached)",
        track_id, detached
    );
    Ok(removed)
}

pub fn delete_album(conn: &Connection, album_id: i64) -> LibraryResult<usize> {
    let members = ordering::list(conn, Family::AlbumTracks, album_id)?;
    ordering::clear(conn, Family::AlbumTracks, album_id)?;
    for member in &members {
        sync_track_album(conn, member.track_id)?;
    }
    let removed = repository::delete_album(conn, album_id)?;
    debug!(
        "Deleted album {} ({} former tracks relinked)",
        album_id,
        members.len()
    );
    Ok(removed)
}

pub fn delete_artist(conn: &Connection, artist_id: i64) -> LibraryResult<usize> {
    repository::clear_artist_references(conn, artist_id)?;
    repository::delete_artist(conn, artist_id)
}

pub fn delete_playlist(conn: &Connection, playlist_id: i64) -> LibraryResult<usize> {
    let entries = ordering::clear(conn, Family::PlaylistEntries, playlist_id)?;
    let removed = repository::delete_playlist(conn, playlist_id)?;
    debug!("Deleted playlist {} ({} entries)", playlist_id, entries);
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::models::NewTrack;
    use crate::library::LIBRARY_VERSIONED_SCHEMAS;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        LIBRARY_VERSIONED_SCHEMAS.last().unwrap().create(&conn).unwrap();
        conn
    }

    fn add_track(conn: &Connection, name: &str) -> i64 {
        repository::insert_track(conn, &NewTrack::new(name, name), name).unwrap()
    }

    fn indices(conn: &Connection, family: Family, parent: i64) -> Vec<(i64, i64)> {
        ordering::list(conn, family, parent)
            .unwrap()
            .into_iter()
            .map(|m| (m.track_id, m.index))
            .collect()
    }

    #[test]
    fn album_link_follows_latest_membership() {
        let conn = setup();
        let first = repository::insert_album(&conn, "First", None, None).unwrap();
        let second = repository::insert_album(&conn, "Second", None, None).unwrap();
        let track = add_track(&conn, "t");

        ordering::attach(&conn, Family::AlbumTracks, first, track, None).unwrap();
        ordering::attach(&conn, Family::AlbumTracks, second, track, None).unwrap();
        sync_track_album(&conn, track).unwrap();
        assert_eq!(
            repository::get_track(&conn, track).unwrap().unwrap().album_id,
            Some(second)
        );

        delete_album(&conn, second).unwrap();
        assert_eq!(
            repository::get_track(&conn, track).unwrap().unwrap().album_id,
            Some(first)
        );

        delete_album(&conn, first).unwrap();
        assert_eq!(
            repository::get_track(&conn, track).unwrap().unwrap().album_id,
            None
        );
    }

    #[test]
    fn deleting_track_renumbers_every_collection() {
        let conn = setup();
        let album = repository::insert_album(&conn, "A", None, None).unwrap();
        let playlist = repository::insert_playlist(&conn, "P").unwrap();
        let a = add_track(&conn, "a");
        let b = add_track(&conn, "b");
        let c = add_track(&conn, "c");

        for track in [a, b, c] {
            ordering::attach(&conn, Family::AlbumTracks, album, track, None).unwrap();
        }
        for track in [b, a, c, a] {
            ordering::attach(&conn, Family::PlaylistEntries, playlist, track, None).unwrap();
        }

        assert_eq!(delete_track(&conn, a).unwrap(), 1);
        assert_eq!(
            indices(&conn, Family::AlbumTracks, album),
            vec![(b, 1), (c, 2)]
        );
        assert_eq!(
            indices(&conn, Family::PlaylistEntries, playlist),
            vec![(b, 0), (c, 1)]
        );
    }

    #[test]
    fn deleting_missing_rows_is_a_noop() {
        let conn = setup();
        assert_eq!(delete_track(&conn, 42).unwrap(), 0);
        assert_eq!(delete_album(&conn, 42).unwrap(), 0);
        assert_eq!(delete_artist(&conn, 42).unwrap(), 0);
        assert_eq!(delete_playlist(&conn, 42).unwrap(), 0);
    }
}
