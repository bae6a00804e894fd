//! Shared constants for end-to-end tests

// ============================================================================
// Library Metadata
// ============================================================================

pub const ARTIST_NAME: &str = "The Test Band";

pub const ALBUM_TITLE: &str = "First Album";

pub const ALBUM_YEAR: i32 = 2001;

pub const PLAYLIST_NAME: &str = "Road Trip";

/// Titles of the tracks created by `TestLibrary::seeded`.
pub const TRACK_TITLES: [&str; 3] = ["Opening Track", "Middle Track", "Closing Track"];

/// Durations in seconds, matching [`TRACK_TITLES`].
pub const TRACK_DURATIONS: [i64; 3] = [180, 240, 300];

// ============================================================================
// Legacy Database
// ============================================================================

pub const LEGACY_ARTIST_NAME: &str = "Legacy Artist";

pub const LEGACY_ALBUM_TITLE: &str = "Legacy Album";

pub const LEGACY_PLAYLIST_NAME: &str = "Legacy Mix";
