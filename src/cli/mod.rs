use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cancel::CancelToken;
use crate::catalog::Catalog;
use crate::config;
use crate::domain::field::Field;
use crate::playlist::{Backing, Format};
use crate::search::{QueryIssue, Scope, phrase::CountPhrases};
use crate::storage::db::i64_seconds_to_local_time;

#[derive(Parser)]
#[command(name = "songshelf")]
#[command(version = "0.1")]
#[command(about = "Music library, search and playlist manager")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show library status
    Status,
    /// Import music files found under the library roots
    Scan,
    /// Search the library, e.g. `artist:"John Doe" year:>1990 love`
    Search {
        query: String,
        /// Only search songs by this artist
        #[arg(long, conflicts_with_all = ["album", "genre"])]
        artist: Option<String>,
        /// Only search songs on this album
        #[arg(long, conflicts_with = "genre")]
        album: Option<String>,
        /// Only search songs of this genre
        #[arg(long)]
        genre: Option<String>,
    },
    /// List the category buckets of a field (artist, album, genre, year)
    Buckets { field: Field },
    /// List playlists
    Playlists,
    /// Import playlist files (m3u, m3u8, wpl, xspf, iTunes xml, ttpl)
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Export a playlist to a file
    Export {
        name: String,
        file: PathBuf,
        /// Output format; guessed from the file extension when omitted
        #[arg(short, long)]
        format: Option<Format>,
    },
    /// Create an empty playlist
    NewPlaylist { name: String },
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_path = cli.config.to_str().context("config path is not valid UTF-8")?;
    let cfg = config::Config::load(config_path)?;
    let mut catalog = Catalog::open(&cfg).context("Failed to open library")?;

    match cli.command {
        Commands::Status => {
            let library = catalog.library();
            println!("Library contains {}", CountPhrases::songs().describe(library.len()?));
            println!(
                "Library was updated {}",
                i64_seconds_to_local_time(library.last_updated()?)?
            );
            for field in catalog.index().fields() {
                println!("  {} {}s", catalog.index().buckets_for(*field).len(), field);
            }
            let report = catalog.playlists_mut().load_all()?;
            println!("{} playlists", report.loaded);
            if let Some(message) = report.describe() {
                println!("{message}");
            }
        }

        Commands::Scan => {
            let report = catalog.scan(&CancelToken::new())?;
            println!(
                "Scan finished: {} new, {} updated, {} unchanged, {} removed",
                report.inserted, report.updated, report.unchanged, report.removed
            );
            for (path, reason) in &report.failed {
                println!("  [FAILED]  {}: {reason}", path.to_string_lossy());
            }
        }

        Commands::Search {
            query,
            artist,
            album,
            genre,
        } => {
            let scope = [
                (Field::Artist, artist),
                (Field::Album, album),
                (Field::Genre, genre),
            ]
            .into_iter()
            .find_map(|(field, key)| key.map(|key| Scope::new(field, key)));

            let result = catalog.search(&query, scope.as_ref())?;
            for issue in &result.issues {
                match issue {
                    QueryIssue::UnbalancedQuote { position } => {
                        eprintln!("warning: quote at {position} is never closed")
                    }
                }
            }
            if let Some(scope) = &scope {
                println!("{}", scope.label());
            }
            for song in &result.songs {
                println!(
                    "  {}  {} - {}  ({})",
                    song.id,
                    song.metadata.artist,
                    song.display_name(),
                    song.path.to_string_lossy()
                );
            }
            println!("{}", result.summary(&CountPhrases::results()));
        }

        Commands::Buckets { field } => {
            if !catalog.index().fields().contains(&field) {
                bail!("{field} is not a categorized field");
            }
            for bucket in catalog.index().buckets_for(field) {
                let key = if bucket.key.is_empty() {
                    "<unknown>"
                } else {
                    bucket.key.as_str()
                };
                let label = match field {
                    Field::Album => catalog
                        .index()
                        .album_artist_label(&bucket.key)
                        .map(|artist| format!(" [{artist}]"))
                        .unwrap_or_default(),
                    _ => String::new(),
                };
                println!(
                    "  {key}{label}  {}",
                    CountPhrases::songs().describe(bucket.count)
                );
            }
        }

        Commands::Playlists => {
            let report = catalog.playlists_mut().load_all()?;
            for playlist in catalog.playlists().playlists() {
                let placeholders = playlist.entries.iter().filter(|e| e.is_placeholder()).count();
                let backing = match &playlist.backing {
                    Backing::Unsaved => "unsaved".to_string(),
                    Backing::File(path) => path.to_string_lossy().into_owned(),
                    Backing::Missing(path) => format!("MISSING {}", path.to_string_lossy()),
                };
                println!(
                    "  {}  {} ({} unresolved)  {backing}",
                    playlist.name,
                    CountPhrases::songs().describe(playlist.entries.len()),
                    placeholders
                );
            }
            if let Some(message) = report.describe() {
                println!("{message}");
                for (path, reason) in &report.failed {
                    println!("    - {}: {reason}", path.to_string_lossy());
                }
            }
        }

        Commands::Import { files } => {
            let playlists = catalog.playlists_mut();
            playlists.load_all()?;
            let report = playlists.import_files(files, &CancelToken::new());
            for imported in &report.imported {
                let name = &playlists.get(imported.playlist)?.name;
                println!(
                    "  [{}]  {name}: {} entries, {} unresolved, {} skipped, {} added to library",
                    imported.format.description(),
                    imported.entries,
                    imported.placeholders,
                    imported.skipped,
                    imported.added_to_library
                );
            }
            for (path, reason) in &report.failed {
                println!("  [FAILED]  {}: {reason}", path.to_string_lossy());
            }
            let saved = playlists.save_all()?;
            println!("{saved} playlists saved");
        }

        Commands::Export { name, file, format } => {
            let playlists = catalog.playlists_mut();
            playlists.load_all()?;
            let id = playlists
                .find_by_name(&name)
                .map(|p| p.id)
                .with_context(|| format!("no playlist named {name:?}"))?;
            let format = playlists.export(id, &file, format)?;
            println!("Exported {name:?} to {} as {}", file.display(), format.description());
        }

        Commands::NewPlaylist { name } => {
            let playlists = catalog.playlists_mut();
            playlists.load_all()?;
            let id = playlists.create(&name);
            let path = playlists.save(id)?;
            println!(
                "Created {:?} at {}",
                playlists.get(id)?.name,
                path.display()
            );
        }
    }

    Ok(())
}
