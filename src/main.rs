use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli_style;

use cli_style::{get_styles, TableBuilder};
use music_library::config::{CliConfig, FileConfig};
use music_library::library::{format_duration, AlbumUpdate, NewTrack, TrackUpdate};
use music_library::{Library, LibraryConfig, LibraryResult};

use rustyline::{
    completion::Completer, highlight::Highlighter, history::FileHistory, validate::Validator,
    CompletionType, Config, Editor, Helper,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles=get_styles())]
struct CliArgs {
    /// Path to the SQLite library database file.
    #[clap(value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Path to a TOML config file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory track paths are stored relative to. Defaults to the database directory.
    #[clap(long, value_parser = parse_path)]
    pub media_root: Option<PathBuf>,

    /// How long to wait for a lock held by another process, in milliseconds.
    #[clap(long)]
    pub busy_timeout_ms: Option<u64>,

    /// Apply pending schema migrations on startup.
    #[clap(long)]
    pub auto_migrate: bool,

    /// Skip the database backup taken before migrating.
    #[clap(long)]
    pub no_backup: bool,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db_path.clone(),
            media_root: self.media_root.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
            auto_migrate: self.auto_migrate,
            no_backup: self.no_backup,
        }
    }
}

#[derive(Parser)]
#[command(styles=get_styles(), name = "", disable_help_subcommand = true)]
struct InnerCli {
    #[command(subcommand)]
    command: InnerCommand,
}

#[derive(Subcommand)]
enum InnerCommand {
    /// Adds an artist, or shows the id of the existing one with that name.
    AddArtist { name: String },

    /// Lists all artists.
    Artists,

    /// Shows an artist with its albums.
    Artist { id: i64 },

    /// Renames an artist.
    RenameArtist { id: i64, name: String },

    /// Deletes an artist, its albums and tracks are kept.
    DeleteArtist { id: i64 },

    /// Adds an album, or shows the id of the existing one.
    AddAlbum {
        title: String,
        #[clap(long)]
        artist: Option<i64>,
        #[clap(long)]
        year: Option<i32>,
    },

    /// Lists all albums.
    Albums,

    /// Shows an album with its tracks in order.
    Album {
        id: i64,
        /// Print the album info as JSON
        #[clap(long)]
        json: bool,
    },

    /// Changes album attributes.
    UpdateAlbum {
        id: i64,
        #[clap(long)]
        title: Option<String>,
        #[clap(long, conflicts_with = "clear_artist")]
        artist: Option<i64>,
        #[clap(long)]
        clear_artist: bool,
        #[clap(long, conflicts_with = "clear_year")]
        year: Option<i32>,
        #[clap(long)]
        clear_year: bool,
    },

    /// Deletes an album, its tracks are kept.
    DeleteAlbum { id: i64 },

    /// Puts a track on an album, before the given track number or at the end.
    AlbumAdd {
        album: i64,
        track: i64,
        #[clap(long)]
        number: Option<i64>,
    },

    /// Gives a track of an album a new track number.
    AlbumMove { album: i64, track: i64, number: i64 },

    /// Takes a track off an album.
    AlbumRemove { album: i64, track: i64 },

    /// Adds a track. The file is not checked.
    AddTrack {
        title: String,
        path: String,
        #[clap(long)]
        artist: Option<i64>,
        #[clap(long)]
        album: Option<i64>,
        /// Duration in seconds
        #[clap(long)]
        duration: Option<i64>,
        #[clap(long)]
        cover: Option<String>,
    },

    /// Lists all tracks.
    Tracks,

    /// Shows a track.
    Track {
        id: i64,
        /// Print the track info as JSON
        #[clap(long)]
        json: bool,
    },

    /// Changes track attributes.
    UpdateTrack {
        id: i64,
        #[clap(long)]
        title: Option<String>,
        #[clap(long)]
        path: Option<String>,
        #[clap(long)]
        artist: Option<i64>,
        /// Moves the track to this album.
        #[clap(long, conflicts_with = "no_album")]
        album: Option<i64>,
        /// Takes the track off every album.
        #[clap(long)]
        no_album: bool,
        #[clap(long)]
        duration: Option<i64>,
        #[clap(long)]
        lyrics: Option<String>,
    },

    /// Deletes a track and removes it from every album and playlist.
    DeleteTrack { id: i64 },

    /// Creates a playlist.
    CreatePlaylist { name: String },

    /// Lists all playlists.
    Playlists,

    /// Shows a playlist with its entries in order.
    Playlist { id: i64 },

    /// Renames a playlist.
    RenamePlaylist { id: i64, name: String },

    /// Deletes a playlist.
    DeletePlaylist { id: i64 },

    /// Puts a track in a playlist, before the given position or at the end.
    PlaylistAdd {
        playlist: i64,
        track: i64,
        #[clap(long)]
        position: Option<i64>,
    },

    /// Moves the first occurrence of a track to a new position.
    PlaylistMove {
        playlist: i64,
        track: i64,
        position: i64,
    },

    /// Moves the entry at one position to another.
    PlaylistMoveEntry { playlist: i64, from: i64, to: i64 },

    /// Removes the first occurrence of a track.
    PlaylistRemove { playlist: i64, track: i64 },

    /// Removes the entry at a position.
    PlaylistRemoveAt { playlist: i64, position: i64 },

    /// Applies pending schema migrations.
    Migrate,

    /// Copies the database next to itself.
    Backup,

    /// Shows the schema version of the database.
    Version,

    /// Shows the path of the current library db.
    Where,

    /// Shows this help.
    Help,

    /// Close this program.
    Exit,
}

enum CommandExecutionResult {
    Ok,
    Exit,
    Error(String),
}

fn print_tracks_table(library: &Library, rows: &[(i64, i64)], index_header: &str) -> LibraryResult<()> {
    if rows.is_empty() {
        cli_style::print_empty_list("(empty)");
        return Ok(());
    }
    let mut table = TableBuilder::new(&[index_header, "Track", "Title", "Duration"]);
    for (index, track_id) in rows {
        let track = library.get_track(*track_id)?;
        table.add_row(vec![
            index.to_string(),
            track.id.to_string(),
            track.title,
            track.duration.map(format_duration).unwrap_or_default(),
        ]);
    }
    table.print();
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> CommandExecutionResult {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            CommandExecutionResult::Ok
        }
        Err(err) => CommandExecutionResult::Error(err.to_string()),
    }
}

fn run_command(library: &Library, command: InnerCommand) -> LibraryResult<CommandExecutionResult> {
    match command {
        InnerCommand::AddArtist { name } => {
            let id = library.add_artist(&name)?;
            cli_style::print_success(&format!("Artist '{}' has id {}", name, id));
        }
        InnerCommand::Artists => {
            let mut table = TableBuilder::new(&["Id", "Name"]);
            for artist in library.get_all_artists()? {
                table.add_row(vec![artist.id.to_string(), artist.name]);
            }
            table.print();
        }
        InnerCommand::Artist { id } => {
            let info = library.get_artist_info(id)?;
            cli_style::print_section_header(&info.artist.name);
            cli_style::print_key_value("Id", &info.artist.id.to_string());
            cli_style::print_key_value("Albums", &info.album_count.to_string());
            cli_style::print_key_value("Tracks", &info.track_count.to_string());
            for album in library.get_artist_albums(id)? {
                let year = album.year.map(|y| format!(" ({})", y)).unwrap_or_default();
                cli_style::print_key_value(&album.id.to_string(), &format!("{}{}", album.title, year));
            }
            cli_style::print_section_footer();
        }
        InnerCommand::RenameArtist { id, name } => {
            library.update_artist(id, &name)?;
            cli_style::print_success(&format!("Artist {} renamed to '{}'", id, name));
        }
        InnerCommand::DeleteArtist { id } => {
            let removed = library.delete_artist(id)?;
            cli_style::print_success(&format!("Deleted {} artist(s)", removed));
        }
        InnerCommand::AddAlbum {
            title,
            artist,
            year,
        } => {
            let id = library.add_album(&title, artist, year)?;
            cli_style::print_success(&format!("Album '{}' has id {}", title, id));
        }
        InnerCommand::Albums => {
            let mut table = TableBuilder::new(&["Id", "Title", "Artist", "Year"]);
            for album in library.get_all_albums()? {
                table.add_row(vec![
                    album.id.to_string(),
                    album.title,
                    album.artist_id.map(|a| a.to_string()).unwrap_or_default(),
                    album.year.map(|y| y.to_string()).unwrap_or_default(),
                ]);
            }
            table.print();
        }
        InnerCommand::Album { id, json } => {
            let info = library.get_album_info(id)?;
            if json {
                return Ok(print_json(&info));
            }
            cli_style::print_section_header(&info.album.title);
            cli_style::print_key_value("Id", &info.album.id.to_string());
            cli_style::print_key_value("Artist", info.artist_name.as_deref().unwrap_or("-"));
            if let Some(year) = info.album.year {
                cli_style::print_key_value("Year", &year.to_string());
            }
            cli_style::print_key_value("Tracks", &info.track_count.to_string());
            cli_style::print_key_value("Duration", &format_duration(info.total_duration));
            cli_style::print_section_footer();
            let rows: Vec<(i64, i64)> = library
                .get_album_tracks(id)?
                .into_iter()
                .map(|t| (t.track_number, t.track_id))
                .collect();
            print_tracks_table(library, &rows, "#")?;
        }
        InnerCommand::UpdateAlbum {
            id,
            title,
            artist,
            clear_artist,
            year,
            clear_year,
        } => {
            let update = AlbumUpdate {
                title,
                artist_id: if clear_artist { Some(None) } else { artist.map(Some) },
                year: if clear_year { Some(None) } else { year.map(Some) },
            };
            if library.update_album(id, &update)? {
                cli_style::print_success(&format!("Album {} updated", id));
            } else {
                cli_style::print_warning("Nothing to update");
            }
        }
        InnerCommand::DeleteAlbum { id } => {
            let removed = library.delete_album(id)?;
            cli_style::print_success(&format!("Deleted {} album(s)", removed));
        }
        InnerCommand::AlbumAdd {
            album,
            track,
            number,
        } => {
            let number = library.add_track_to_album(album, track, number)?;
            cli_style::print_success(&format!("Track {} is number {} of album {}", track, number, album));
        }
        InnerCommand::AlbumMove {
            album,
            track,
            number,
        } => {
            library.change_track_number_in_album(album, track, number)?;
            cli_style::print_success(&format!("Track {} is now number {}", track, number));
        }
        InnerCommand::AlbumRemove { album, track } => {
            let removed = library.remove_track_from_album(album, track)?;
            cli_style::print_success(&format!("Removed {} track(s) from album {}", removed, album));
        }
        InnerCommand::AddTrack {
            title,
            path,
            artist,
            album,
            duration,
            cover,
        } => {
            let track = NewTrack {
                title,
                file_path: path,
                artist_id: artist,
                album_id: album,
                duration,
                cover_path: cover,
                lyrics: None,
            };
            let id = library.add_track(&track)?;
            cli_style::print_success(&format!("Track '{}' has id {}", track.title, id));
        }
        InnerCommand::Tracks => {
            let mut table = TableBuilder::new(&["Id", "Title", "Artist", "Album", "Duration", "Path"]);
            for track in library.get_all_tracks()? {
                table.add_row(vec![
                    track.id.to_string(),
                    track.title,
                    track.artist_id.map(|a| a.to_string()).unwrap_or_default(),
                    track.album_id.map(|a| a.to_string()).unwrap_or_default(),
                    track.duration.map(format_duration).unwrap_or_default(),
                    track.file_path,
                ]);
            }
            table.print();
        }
        InnerCommand::Track { id, json } => {
            let info = library.get_track_info(id)?;
            if json {
                return Ok(print_json(&info));
            }
            cli_style::print_section_header(&info.track.title);
            cli_style::print_key_value("Id", &info.track.id.to_string());
            cli_style::print_key_value("Artist", info.artist_name.as_deref().unwrap_or("-"));
            cli_style::print_key_value("Album", info.album_title.as_deref().unwrap_or("-"));
            if let Some(duration) = info.track.duration {
                cli_style::print_key_value("Duration", &format_duration(duration));
            }
            cli_style::print_key_value("File", &info.media_path.display().to_string());
            if let Some(cover) = &info.track.cover_path {
                cli_style::print_key_value("Cover", cover);
            }
            if let Some(lyrics) = &info.track.lyrics {
                cli_style::print_key_value("Lyrics", lyrics);
            }
            cli_style::print_section_footer();
        }
        InnerCommand::UpdateTrack {
            id,
            title,
            path,
            artist,
            album,
            no_album,
            duration,
            lyrics,
        } => {
            let update = TrackUpdate {
                title,
                file_path: path,
                artist_id: artist.map(Some),
                album_id: if no_album { Some(None) } else { album.map(Some) },
                duration: duration.map(Some),
                cover_path: None,
                lyrics: lyrics.map(Some),
            };
            if library.update_track(id, &update)? {
                cli_style::print_success(&format!("Track {} updated", id));
            } else {
                cli_style::print_warning("Nothing to update");
            }
        }
        InnerCommand::DeleteTrack { id } => {
            let removed = library.delete_track(id)?;
            cli_style::print_success(&format!("Deleted {} track(s)", removed));
        }
        InnerCommand::CreatePlaylist { name } => {
            let id = library.create_playlist(&name)?;
            cli_style::print_success(&format!("Playlist '{}' has id {}", name, id));
        }
        InnerCommand::Playlists => {
            let mut table = TableBuilder::new(&["Id", "Name"]);
            for playlist in library.get_all_playlists()? {
                table.add_row(vec![playlist.id.to_string(), playlist.name]);
            }
            table.print();
        }
        InnerCommand::Playlist { id } => {
            let info = library.get_playlist_info(id)?;
            cli_style::print_section_header(&info.playlist.name);
            cli_style::print_key_value("Id", &info.playlist.id.to_string());
            cli_style::print_key_value("Entries", &info.track_count.to_string());
            cli_style::print_key_value("Duration", &format_duration(info.total_duration));
            cli_style::print_section_footer();
            let rows: Vec<(i64, i64)> = library
                .get_playlist_tracks(id)?
                .into_iter()
                .map(|e| (e.position, e.track_id))
                .collect();
            print_tracks_table(library, &rows, "Pos")?;
        }
        InnerCommand::RenamePlaylist { id, name } => {
            library.update_playlist(id, &name)?;
            cli_style::print_success(&format!("Playlist {} renamed to '{}'", id, name));
        }
        InnerCommand::DeletePlaylist { id } => {
            let removed = library.delete_playlist(id)?;
            cli_style::print_success(&format!("Deleted {} playlist(s)", removed));
        }
        InnerCommand::PlaylistAdd {
            playlist,
            track,
            position,
        } => {
            let position = library.add_track_to_playlist(playlist, track, position)?;
            cli_style::print_success(&format!("Track {} added at position {}", track, position));
        }
        InnerCommand::PlaylistMove {
            playlist,
            track,
            position,
        } => {
            library.change_track_position_in_playlist(playlist, track, position)?;
            cli_style::print_success(&format!("Track {} moved to position {}", track, position));
        }
        InnerCommand::PlaylistMoveEntry { playlist, from, to } => {
            library.move_playlist_entry(playlist, from, to)?;
            cli_style::print_success(&format!("Entry moved from {} to {}", from, to));
        }
        InnerCommand::PlaylistRemove { playlist, track } => {
            let removed = library.remove_track_from_playlist(playlist, track)?;
            cli_style::print_success(&format!("Removed {} entry(ies)", removed));
        }
        InnerCommand::PlaylistRemoveAt { playlist, position } => {
            let removed = library.remove_playlist_entry_at(playlist, position)?;
            cli_style::print_success(&format!("Removed {} entry(ies)", removed));
        }
        InnerCommand::Migrate => {
            let applied = library.update_db()?;
            cli_style::print_success(&format!(
                "Applied {} migration(s), schema version is {}",
                applied,
                library.schema_version()?
            ));
        }
        InnerCommand::Backup => {
            let path = library.backup_database()?;
            cli_style::print_success(&format!("Backup written to {}", path.display()));
        }
        InnerCommand::Version => {
            cli_style::print_key_value("Schema version", &library.schema_version()?.to_string());
        }
        InnerCommand::Where => {
            println!("{}", library.config().db_path.display());
        }
        InnerCommand::Help => {
            if let Err(err) = InnerCli::command().print_long_help() {
                return Ok(CommandExecutionResult::Error(err.to_string()));
            }
        }
        InnerCommand::Exit => return Ok(CommandExecutionResult::Exit),
    }
    Ok(CommandExecutionResult::Ok)
}

fn execute_command(line: String, library: &Library) -> CommandExecutionResult {
    if line.trim().is_empty() {
        return CommandExecutionResult::Ok;
    }

    let args =
        shlex::split(&line).unwrap_or_else(|| line.split_whitespace().map(String::from).collect());

    let cli = InnerCli::try_parse_from(std::iter::once(" ").chain(args.iter().map(String::as_str)));

    match cli {
        Ok(cli) => {
            cli_style::print_command_echo(&line);
            match run_command(library, cli.command) {
                Ok(result) => result,
                Err(err) => CommandExecutionResult::Error(err.to_string()),
            }
        }
        Err(e) => {
            if e.print().is_err() {
                println!("{}", e);
            }
            CommandExecutionResult::Ok
        }
    }
}

#[derive(rustyline_derive::Hinter)]
struct CommandHelper {
    commands_names: Vec<String>,
}

impl CommandHelper {
    pub fn new() -> Self {
        let commands_names: Vec<String> = InnerCli::command()
            .get_subcommands()
            .map(|sc| sc.get_name().to_string())
            .collect();

        CommandHelper { commands_names }
    }
}

impl Completer for CommandHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if line.contains(' ') {
            return Ok((0, Vec::with_capacity(0)));
        }
        let matches = self
            .commands_names
            .iter()
            .filter(|c| c.starts_with(line))
            .cloned()
            .collect::<Vec<_>>();

        Ok((0, matches))
    }
}

impl Highlighter for CommandHelper {}
impl Validator for CommandHelper {}
impl Helper for CommandHelper {}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    let cli_args = CliArgs::parse();
    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let config = LibraryConfig::resolve(&cli_args.to_cli_config(), file_config)?;
    let library = Library::open_with_config(&config)
        .with_context(|| format!("Could not open library at {:?}", config.db_path))?;

    cli_style::print_welcome(
        &config.db_path.display().to_string(),
        library.schema_version()?,
    );

    let pending = library.pending_migrations();
    if pending > 0 {
        cli_style::print_warning(&format!(
            "{} schema migration(s) pending, run 'migrate' before using the library",
            pending
        ));
    }

    let rl_config = Config::builder()
        .completion_type(CompletionType::List)
        .build();

    let mut rl = Editor::<CommandHelper, FileHistory>::with_config(rl_config)?;
    rl.set_helper(Some(CommandHelper::new()));

    let prompt = cli_style::get_prompt();
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                match execute_command(line, &library) {
                    CommandExecutionResult::Ok => {}
                    CommandExecutionResult::Exit => break,
                    CommandExecutionResult::Error(err) => {
                        cli_style::print_error(&err);
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("CTRL-D: exiting.");
                break;
            }
            Err(e) => {
                cli_style::print_error(&format!("{:?}", e));
                break;
            }
        }
    }
    cli_style::print_goodbye();
    Ok(())
}
