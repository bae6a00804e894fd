//! End-to-end tests for playlists and their ordered entries

mod common;

use common::{playlist_order, TestLibrary, PLAYLIST_NAME, TRACK_DURATIONS};
use music_library::LibraryError;

#[test]
fn test_move_track_to_front() {
    let (test, seed) = TestLibrary::seeded();
    let library = &test.library;
    let [t1, t2, t3] = seed.track_ids;
    let playlist = library.create_playlist(PLAYLIST_NAME).unwrap();

    for track in seed.track_ids {
        library.add_track_to_playlist(playlist, track, None).unwrap();
    }
    assert_eq!(
        playlist_order(library, playlist),
        vec![(t1, 0), (t2, 1), (t3, 2)]
    );

    library
        .change_track_position_in_playlist(playlist, t3, 0)
        .unwrap();
    assert_eq!(
        playlist_order(library, playlist),
        vec![(t3, 0), (t1, 1), (t2, 2)]
    );
}

#[test]
fn test_insert_at_position_shifts_following_entries() {
    let (test, seed) = TestLibrary::seeded();
    let library = &test.library;
    let [t1, t2, t3] = seed.track_ids;
    let playlist = library.create_playlist(PLAYLIST_NAME).unwrap();

    assert_eq!(library.add_track_to_playlist(playlist, t1, None).unwrap(), 0);
    assert_eq!(library.add_track_to_playlist(playlist, t2, None).unwrap(), 1);
    assert_eq!(library.add_track_to_playlist(playlist, t3, Some(1)).unwrap(), 1);
    assert_eq!(
        playlist_order(library, playlist),
        vec![(t1, 0), (t3, 1), (t2, 2)]
    );

    // Appending explicitly at the end is allowed
    assert_eq!(library.add_track_to_playlist(playlist, t1, Some(3)).unwrap(), 3);
}

#[test]
fn test_same_track_can_appear_twice() {
    let (test, seed) = TestLibrary::seeded();
    let library = &test.library;
    let [t1, t2, _] = seed.track_ids;
    let playlist = library.create_playlist(PLAYLIST_NAME).unwrap();

    for track in [t1, t2, t1] {
        library.add_track_to_playlist(playlist, track, None).unwrap();
    }
    assert_eq!(
        playlist_order(library, playlist),
        vec![(t1, 0), (t2, 1), (t1, 2)]
    );

    // Only the first occurrence goes
    assert_eq!(library.remove_track_from_playlist(playlist, t1).unwrap(), 1);
    assert_eq!(playlist_order(library, playlist), vec![(t2, 0), (t1, 1)]);

    let info = library.get_playlist_info(playlist).unwrap();
    assert_eq!(info.track_count, 2);
    assert_eq!(info.total_duration, TRACK_DURATIONS[0] + TRACK_DURATIONS[1]);
}

#[test]
fn test_move_and_remove_by_position() {
    let (test, seed) = TestLibrary::seeded();
    let library = &test.library;
    let [t1, t2, t3] = seed.track_ids;
    let playlist = library.create_playlist(PLAYLIST_NAME).unwrap();
    for track in [t1, t2, t3, t1] {
        library.add_track_to_playlist(playlist, track, None).unwrap();
    }

    library.move_playlist_entry(playlist, 3, 1).unwrap();
    assert_eq!(
        playlist_order(library, playlist),
        vec![(t1, 0), (t1, 1), (t2, 2), (t3, 3)]
    );

    library.move_playlist_entry(playlist, 0, 3).unwrap();
    assert_eq!(
        playlist_order(library, playlist),
        vec![(t1, 0), (t2, 1), (t3, 2), (t1, 3)]
    );

    assert_eq!(library.remove_playlist_entry_at(playlist, 1).unwrap(), 1);
    assert_eq!(
        playlist_order(library, playlist),
        vec![(t1, 0), (t3, 1), (t1, 2)]
    );
    assert_eq!(library.remove_playlist_entry_at(playlist, 7).unwrap(), 0);
}

#[test]
fn test_out_of_range_positions_are_rejected() {
    let (test, seed) = TestLibrary::seeded();
    let library = &test.library;
    let [t1, t2, t3] = seed.track_ids;
    let playlist = library.create_playlist(PLAYLIST_NAME).unwrap();
    library.add_track_to_playlist(playlist, t1, None).unwrap();
    library.add_track_to_playlist(playlist, t2, None).unwrap();

    match library.add_track_to_playlist(playlist, t3, Some(5)) {
        Err(LibraryError::IndexOutOfRange { index, min, max }) => {
            assert_eq!((index, min, max), (5, 0, 2));
        }
        other => panic!("Expected IndexOutOfRange, got {:?}", other),
    }
    assert!(matches!(
        library.add_track_to_playlist(playlist, t3, Some(-1)),
        Err(LibraryError::IndexOutOfRange { .. })
    ));
    assert!(matches!(
        library.change_track_position_in_playlist(playlist, t1, 2),
        Err(LibraryError::IndexOutOfRange { index: 2, min: 0, max: 1 })
    ));
    assert!(matches!(
        library.move_playlist_entry(playlist, 4, 0),
        Err(LibraryError::IndexOutOfRange { index: 4, .. })
    ));

    assert_eq!(playlist_order(library, playlist), vec![(t1, 0), (t2, 1)]);
}

#[test]
fn test_unknown_playlist_or_track() {
    let (test, seed) = TestLibrary::seeded();
    let library = &test.library;
    let playlist = library.create_playlist(PLAYLIST_NAME).unwrap();

    assert!(matches!(
        library.add_track_to_playlist(999, seed.track_ids[0], None),
        Err(LibraryError::NotFound { entity: "playlist", id: 999 })
    ));
    assert!(matches!(
        library.add_track_to_playlist(playlist, 999, None),
        Err(LibraryError::NotFound { entity: "track", id: 999 })
    ));
    assert!(matches!(
        library.get_playlist_tracks(999),
        Err(LibraryError::NotFound { .. })
    ));
    assert!(matches!(
        library.change_track_position_in_playlist(playlist, seed.track_ids[0], 0),
        Err(LibraryError::NotFound { .. })
    ));
    assert_eq!(
        library
            .remove_track_from_playlist(playlist, seed.track_ids[0])
            .unwrap(),
        0
    );
}

#[test]
fn test_playlist_names() {
    let test = TestLibrary::open();
    let library = &test.library;

    let playlist = library.create_playlist(PLAYLIST_NAME).unwrap();
    assert!(matches!(
        library.create_playlist(PLAYLIST_NAME),
        Err(LibraryError::IntegrityViolation(_))
    ));
    assert!(matches!(
        library.create_playlist(""),
        Err(LibraryError::Validation(_))
    ));

    assert!(library.update_playlist(playlist, "Evening").unwrap());
    assert_eq!(library.get_playlist(playlist).unwrap().name, "Evening");
    assert!(matches!(
        library.update_playlist(999, "Nope"),
        Err(LibraryError::NotFound { .. })
    ));
    assert_eq!(library.get_all_playlists().unwrap().len(), 1);
}
