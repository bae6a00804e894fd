//! Library entities, typed patches and aggregated info views.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// =============================================================================
// Entities
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: i64,
    pub title: String,
    pub artist_id: Option<i64>,
    pub year: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: i64,
    pub title: String,
    pub artist_id: Option<i64>,
    /// Album of the most recently attached album membership, if any.
    pub album_id: Option<i64>,
    /// Duration in seconds
    pub duration: Option<i64>,
    /// Stored relative to the media root when the file lives under it.
    pub file_path: String,
    pub cover_path: Option<String>,
    pub lyrics: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: i64,
    pub name: String,
}

/// Membership of a track in an album. Track numbers are 1-based and dense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumTrack {
    pub album_id: i64,
    pub track_id: i64,
    pub track_number: i64,
}

/// One occurrence of a track in a playlist. Positions are 0-based and dense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub playlist_id: i64,
    pub track_id: i64,
    pub position: i64,
}

// =============================================================================
// Inputs and patches
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewTrack {
    pub title: String,
    pub file_path: String,
    pub artist_id: Option<i64>,
    /// When set, the track is appended to this album.
    pub album_id: Option<i64>,
    pub duration: Option<i64>,
    pub cover_path: Option<String>,
    pub lyrics: Option<String>,
}

impl NewTrack {
    pub fn new(title: impl Into<String>, file_path: impl Into<String>) -> Self {
        NewTrack {
            title: title.into(),
            file_path: file_path.into(),
            ..Default::default()
        }
    }

    pub fn with_artist(mut self, artist_id: i64) -> Self {
        self.artist_id = Some(artist_id);
        self
    }

    pub fn with_album(mut self, album_id: i64) -> Self {
        self.album_id = Some(album_id);
        self
    }

    pub fn with_duration(mut self, seconds: i64) -> Self {
        self.duration = Some(seconds);
        self
    }
}

/// Partial track update. Outer `None` leaves a field untouched, `Some(None)`
/// clears a nullable field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackUpdate {
    pub title: Option<String>,
    pub file_path: Option<String>,
    pub artist_id: Option<Option<i64>>,
    pub album_id: Option<Option<i64>>,
    pub duration: Option<Option<i64>>,
    pub cover_path: Option<Option<String>>,
    pub lyrics: Option<Option<String>>,
}

impl TrackUpdate {
    pub fn is_empty(&self) -> bool {
        self == &TrackUpdate::default()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlbumUpdate {
    pub title: Option<String>,
    pub artist_id: Option<Option<i64>>,
    pub year: Option<Option<i32>>,
}

impl AlbumUpdate {
    pub fn is_empty(&self) -> bool {
        self == &AlbumUpdate::default()
    }
}

// =============================================================================
// Info views
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrackInfo {
    pub track: Track,
    pub artist_name: Option<String>,
    pub album_title: Option<String>,
    pub media_path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AlbumInfo {
    pub album: Album,
    pub artist_name: Option<String>,
    pub track_count: usize,
    pub total_duration: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArtistInfo {
    pub artist: Artist,
    pub album_count: usize,
    pub track_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlaylistInfo {
    pub playlist: Playlist,
    pub track_count: usize,
    pub total_duration: i64,
}

/// Formats seconds as `MM:SS`, or `HH:MM:SS` from one hour up.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (hours, rest) = (seconds / 3600, seconds % 3600);
    let (minutes, seconds) = (rest / 60, rest % 60);
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_short_and_long_durations() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(61), "01:01");
        assert_eq!(format_duration(3599), "59:59");
        assert_eq!(format_duration(3600), "01:00:00");
        assert_eq!(format_duration(7322), "02:02:02");
    }

    #[test]
    fn empty_patches() {
        assert!(TrackUpdate::default().is_empty());
        assert!(AlbumUpdate::default().is_empty());

        let clear_lyrics = TrackUpdate {
            lyrics: Some(None),
            ..Default::default()
        };
        assert!(!clear_lyrics.is_empty());
    }

    #[test]
    fn track_serializes_nullable_fields() {
        let track = Track {
            id: 1,
            title: "Intro".to_string(),
            artist_id: None,
            album_id: Some(2),
            duration: Some(90),
            file_path: "a/intro.mp3".to_string(),
            cover_path: None,
            lyrics: None,
        };
        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["album_id"], 2);
        assert!(json["artist_id"].is_null());
    }
}
