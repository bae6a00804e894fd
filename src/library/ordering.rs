//! Dense ordering of tracks inside albums and playlists.
//!
//! Both collections share one algorithm and differ only in table, index
//! column, index base and whether a track may repeat. Every shift is a single
//! ranged UPDATE run inside the caller's transaction.

use super::error::{LibraryError, LibraryResult};
use super::models::{AlbumTrack, PlaylistEntry};
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
    /// 1-based `track_number`, a track appears at most once.
    AlbumTracks,
    /// 0-based `position`, a track may appear many times.
    PlaylistEntries,
}

impl Family {
    fn table(self) -> &'static str {
        match self {
            Family::AlbumTracks => "album_tracks",
            Family::PlaylistEntries => "playlist_entries",
        }
    }

    fn parent_column(self) -> &'static str {
        match self {
            Family::AlbumTracks => "album_id",
            Family::PlaylistEntries => "playlist_id",
        }
    }

    fn index_column(self) -> &'static str {
        match self {
            Family::AlbumTracks => "track_number",
            Family::PlaylistEntries => "position",
        }
    }

    pub fn base(self) -> i64 {
        match self {
            Family::AlbumTracks => 1,
            Family::PlaylistEntries => 0,
        }
    }

    fn allows_duplicates(self) -> bool {
        matches!(self, Family::PlaylistEntries)
    }
}

/// A row of an association table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Membership {
    pub row_id: i64,
    pub parent_id: i64,
    pub track_id: i64,
    pub index: i64,
}

impl From<Membership> for AlbumTrack {
    fn from(m: Membership) -> Self {
        AlbumTrack {
            album_id: m.parent_id,
            track_id: m.track_id,
            track_number: m.index,
        }
    }
}

impl From<Membership> for PlaylistEntry {
    fn from(m: Membership) -> Self {
        PlaylistEntry {
            playlist_id: m.parent_id,
            track_id: m.track_id,
            position: m.index,
        }
    }
}

fn parse_membership(row: &rusqlite::Row) -> rusqlite::Result<Membership> {
    Ok(Membership {
        row_id: row.get(0)?,
        parent_id: row.get(1)?,
        track_id: row.get(2)?,
        index: row.get(3)?,
    })
}

fn select_columns(family: Family) -> String {
    format!(
        "SELECT id, {}, track_id, {} FROM {}",
        family.parent_column(),
        family.index_column(),
        family.table()
    )
}

fn check_range(index: i64, min: i64, max: i64) -> LibraryResult<()> {
    if index < min || index > max {
        return Err(LibraryError::IndexOutOfRange { index, min, max });
    }
    Ok(())
}

pub fn count(conn: &Connection, family: Family, parent_id: i64) -> LibraryResult<i64> {
    Ok(conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1",
            family.table(),
            family.parent_column()
        ),
        params![parent_id],
        |r| r.get(0),
    )?)
}

pub fn list(conn: &Connection, family: Family, parent_id: i64) -> LibraryResult<Vec<Membership>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE {} = ?1 ORDER BY {}, id",
        select_columns(family),
        family.parent_column(),
        family.index_column()
    ))?;
    let rows = stmt
        .query_map(params![parent_id], parse_membership)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Lowest-indexed row of `track_id` inside the collection.
pub fn find_first(
    conn: &Connection,
    family: Family,
    parent_id: i64,
    track_id: i64,
) -> LibraryResult<Option<Membership>> {
    Ok(conn
        .query_row(
            &format!(
                "{} WHERE {} = ?1 AND track_id = ?2 ORDER BY {} LIMIT 1",
                select_columns(family),
                family.parent_column(),
                family.index_column()
            ),
            params![parent_id, track_id],
            parse_membership,
        )
        .optional()?)
}

pub fn find_at(
    conn: &Connection,
    family: Family,
    parent_id: i64,
    index: i64,
) -> LibraryResult<Option<Membership>> {
    Ok(conn
        .query_row(
            &format!(
                "{} WHERE {} = ?1 AND {} = ?2",
                select_columns(family),
                family.parent_column(),
                family.index_column()
            ),
            params![parent_id, index],
            parse_membership,
        )
        .optional()?)
}

/// Every row referencing `track_id`, highest index first within each parent
/// so rows can be detached in order without invalidating the ones left.
pub fn memberships_of_track(
    conn: &Connection,
    family: Family,
    track_id: i64,
) -> LibraryResult<Vec<Membership>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE track_id = ?1 ORDER BY {}, {} DESC",
        select_columns(family),
        family.parent_column(),
        family.index_column()
    ))?;
    let rows = stmt
        .query_map(params![track_id], parse_membership)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Inserts the track before the element currently at `index`, or appends it
/// when no index is given. Returns the index the track landed at.
pub fn attach(
    conn: &Connection,
    family: Family,
    parent_id: i64,
    track_id: i64,
    index: Option<i64>,
) -> LibraryResult<i64> {
    if !family.allows_duplicates() && find_first(conn, family, parent_id, track_id)?.is_some() {
        return Err(LibraryError::DuplicateAssociation {
            album_id: parent_id,
            track_id,
        });
    }

    let base = family.base();
    let count = count(conn, family, parent_id)?;
    let target = match index {
        Some(index) => {
            check_range(index, base, base + count)?;
            index
        }
        None => base + count,
    };

    conn.execute(
        &format!(
            "UPDATE {table} SET {idx} = {idx} + 1 WHERE {parent} = ?1 AND {idx} >= ?2",
            table = family.table(),
            idx = family.index_column(),
            parent = family.parent_column()
        ),
        params![parent_id, target],
    )?;
    conn.execute(
        &format!(
            "INSERT INTO {} ({}, track_id, {}) VALUES (?1, ?2, ?3)",
            family.table(),
            family.parent_column(),
            family.index_column()
        ),
        params![parent_id, track_id, target],
    )?;
    Ok(target)
}

/// Moves an existing row to `new_index`, shifting the rows in between by one.
pub fn move_row(
    conn: &Connection,
    family: Family,
    membership: &Membership,
    new_index: i64,
) -> LibraryResult<()> {
    let base = family.base();
    let count = count(conn, family, membership.parent_id)?;
    check_range(new_index, base, base + count - 1)?;

    let old_index = membership.index;
    if new_index == old_index {
        return Ok(());
    }

    let (shift, lower, upper) = if new_index > old_index {
        // (old, new] slides down to close the gap
        ("- 1", old_index + 1, new_index)
    } else {
        // [new, old) slides up to open it
        ("+ 1", new_index, old_index - 1)
    };
    conn.execute(
        &format!(
            "UPDATE {table} SET {idx} = {idx} {shift}
             WHERE {parent} = ?1 AND {idx} >= ?2 AND {idx} <= ?3 AND id != ?4",
            table = family.table(),
            idx = family.index_column(),
            parent = family.parent_column(),
            shift = shift
        ),
        params![membership.parent_id, lower, upper, membership.row_id],
    )?;
    conn.execute(
        &format!(
            "UPDATE {} SET {} = ?1 WHERE id = ?2",
            family.table(),
            family.index_column()
        ),
        params![new_index, membership.row_id],
    )?;
    Ok(())
}

/// Removes one row and closes the gap it leaves. Returns the rows removed.
pub fn detach_row(conn: &Connection, family: Family, membership: &Membership) -> LibraryResult<usize> {
    let removed = conn.execute(
        &format!("DELETE FROM {} WHERE id = ?1", family.table()),
        params![membership.row_id],
    )?;
    if removed == 0 {
        return Ok(0);
    }
    conn.execute(
        &format!(
            "UPDATE {table} SET {idx} = {idx} - 1 WHERE {parent} = ?1 AND {idx} > ?2",
            table = family.table(),
            idx = family.index_column(),
            parent = family.parent_column()
        ),
        params![membership.parent_id, membership.index],
    )?;
    Ok(removed)
}

/// Removes the whole collection of `parent_id`.
pub fn clear(conn: &Connection, family: Family, parent_id: i64) -> LibraryResult<usize> {
    Ok(conn.execute(
        &format!(
            "DELETE FROM {} WHERE {} = ?1",
            family.table(),
            family.parent_column()
        ),
        params![parent_id],
    )?)
}
