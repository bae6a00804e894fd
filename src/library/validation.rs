//! Attribute validation performed before anything reaches the store.

use super::models::{AlbumUpdate, NewTrack, TrackUpdate};
use std::fmt;

pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField { field: &'static str },
    NegativeValue { field: &'static str, value: i64 },
    ImplausibleYear { value: i32 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField { field } => {
                write!(f, "Field '{}' is required but was empty", field)
            }
            ValidationError::NegativeValue { field, value } => {
                write!(f, "Field '{}' must be non-negative, got {}", field, value)
            }
            ValidationError::ImplausibleYear { value } => {
                write!(
                    f,
                    "Year must be between {} and {}, got {}",
                    MIN_YEAR, MAX_YEAR, value
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = Result<T, ValidationError>;

pub fn require_non_empty(field: &'static str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField { field });
    }
    Ok(())
}

fn validate_year(year: Option<i32>) -> ValidationResult<()> {
    match year {
        Some(value) if !(MIN_YEAR..=MAX_YEAR).contains(&value) => {
            Err(ValidationError::ImplausibleYear { value })
        }
        _ => Ok(()),
    }
}

fn validate_duration(duration: Option<i64>) -> ValidationResult<()> {
    match duration {
        Some(value) if value < 0 => Err(ValidationError::NegativeValue {
            field: "duration",
            value,
        }),
        _ => Ok(()),
    }
}

pub fn validate_album(title: &str, year: Option<i32>) -> ValidationResult<()> {
    require_non_empty("title", title)?;
    validate_year(year)
}

pub fn validate_new_track(track: &NewTrack) -> ValidationResult<()> {
    require_non_empty("title", &track.title)?;
    require_non_empty("file_path", &track.file_path)?;
    validate_duration(track.duration)
}

pub fn validate_track_update(update: &TrackUpdate) -> ValidationResult<()> {
    if let Some(title) = &update.title {
        require_non_empty("title", title)?;
    }
    if let Some(file_path) = &update.file_path {
        require_non_empty("file_path", file_path)?;
    }
    validate_duration(update.duration.flatten())
}

pub fn validate_album_update(update: &AlbumUpdate) -> ValidationResult<()> {
    if let Some(title) = &update.title {
        require_non_empty("title", title)?;
    }
    validate_year(update.year.flatten())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_names_are_rejected() {
        assert_eq!(
            require_non_empty("name", "   "),
            Err(ValidationError::EmptyField { field: "name" })
        );
        assert!(require_non_empty("name", "Blur").is_ok());
    }

    #[test]
    fn new_track_checks_title_path_and_duration() {
        let mut track = NewTrack::new("", "song.mp3");
        assert_eq!(
            validate_new_track(&track),
            Err(ValidationError::EmptyField { field: "title" })
        );

        track.title = "Song".to_string();
        track.file_path = " ".to_string();
        assert_eq!(
            validate_new_track(&track),
            Err(ValidationError::EmptyField { field: "file_path" })
        );

        track.file_path = "song.mp3".to_string();
        track.duration = Some(-1);
        assert_eq!(
            validate_new_track(&track),
            Err(ValidationError::NegativeValue {
                field: "duration",
                value: -1
            })
        );

        track.duration = Some(0);
        assert!(validate_new_track(&track).is_ok());
    }

    #[test]
    fn album_year_bounds() {
        assert!(validate_album("Parklife", Some(1994)).is_ok());
        assert!(validate_album("Parklife", None).is_ok());
        assert_eq!(
            validate_album("Parklife", Some(0)),
            Err(ValidationError::ImplausibleYear { value: 0 })
        );
        assert_eq!(
            validate_album("Parklife", Some(10000)),
            Err(ValidationError::ImplausibleYear { value: 10000 })
        );
    }

    #[test]
    fn updates_only_check_supplied_fields() {
        assert!(validate_track_update(&TrackUpdate::default()).is_ok());
        assert!(validate_track_update(&TrackUpdate {
            duration: Some(None),
            ..Default::default()
        })
        .is_ok());
        assert!(validate_track_update(&TrackUpdate {
            title: Some(String::new()),
            ..Default::default()
        })
        .is_err());
        assert!(validate_album_update(&AlbumUpdate {
            year: Some(Some(-5)),
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            ValidationError::EmptyField { field: "title" }.to_string(),
            "Field 'title' is required but was empty"
        );
        assert_eq!(
            ValidationError::ImplausibleYear { value: 0 }.to_string(),
            "Year must be between 1 and 9999, got 0"
        );
    }
}
