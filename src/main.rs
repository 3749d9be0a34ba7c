// TubeTunes - terminal front end for the music bot core
// Stands in for the chat dispatcher: parses a command, offloads the blocking work, prints the reply

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tubetunes::{Config, Delivery, Jukebox, PlayOutcome};

#[derive(Parser)]
#[command(name = "tubetunes")]
#[command(about = "Search, fetch, queue and replay tracks from an online catalog")]
struct Args {
    /// Config file to use instead of the one in the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log to stderr instead of the log file
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search the catalog
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Fetch a track, or queue a whole playlist
    Play {
        locator: String,
        #[arg(long, default_value = "local")]
        user: String,
        /// Keep the audio file instead of deleting it after delivery
        #[arg(long)]
        keep: bool,
    },
    /// Fetch the next track from the queue
    Next {
        #[arg(long, default_value = "local")]
        user: String,
        #[arg(long)]
        keep: bool,
    },
    /// Show the queue
    Queue {
        #[arg(long, default_value = "local")]
        user: String,
    },
    /// Empty the queue
    Clear {
        #[arg(long, default_value = "local")]
        user: String,
    },
    /// Show recently played tracks
    History {
        #[arg(long, default_value = "local")]
        user: String,
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn init_logging(log_dir: &Path, verbose: bool) -> Result<Option<WorkerGuard>> {
    // Base filter: info level for general logs, debug for tubetunes
    let base_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tubetunes=debug"));

    if verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_env_filter(base_filter)
            .init();
        return Ok(None);
    }

    std::fs::create_dir_all(log_dir)?;

    // Daily rotating file appender
    let file_appender = tracing_appender::rolling::daily(log_dir, "tubetunes.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::fmt()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_env_filter(base_filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(Some(guard))
}

/// Run a blocking Jukebox call on the blocking pool so the runtime stays free
async fn offload<T, F>(jukebox: &Arc<Jukebox>, work: F) -> Result<T>
where
    F: FnOnce(&Jukebox) -> T + Send + 'static,
    T: Send + 'static,
{
    let jukebox = Arc::clone(jukebox);
    Ok(tokio::task::spawn_blocking(move || work(&jukebox)).await?)
}

async fn deliver(jukebox: &Arc<Jukebox>, user: String, delivery: Delivery, keep: bool) -> Result<()> {
    match &delivery {
        Delivery::Audio { track, artifact } => {
            println!("🎵 {} ({})", track.display_title(), track.duration_label());
            println!(
                "{} [{}k, {} bytes]",
                artifact.path().display(),
                artifact.bitrate_kbps(),
                artifact.size_bytes()
            );
        }
        Delivery::Link { track, locator } => {
            println!("🔗 {} is too large to upload, listen here:", track.display_title());
            println!("{}", locator);
        }
    }

    match delivery {
        // Keeping the file: record the play but leave the artifact on disk
        Delivery::Audio { track, artifact } if keep => {
            let kept = artifact.into_path();
            offload(jukebox, move |j| j.record_play(&user, &track)).await??;
            debug!("Kept {}", kept.display());
        }
        delivery => {
            offload(jukebox, move |j| j.finish(&user, delivery)).await??;
        }
    }
    Ok(())
}

async fn run(args: Args, config: Config) -> Result<()> {
    let history_limit = config.history.display_limit;
    let jukebox = Arc::new(Jukebox::from_config(&config)?);

    match args.command {
        Command::Search { query } => {
            let query = query.join(" ");
            let results = offload(&jukebox, move |j| j.search(&query)).await??;
            if results.is_empty() {
                println!("No results found.");
            }
            for (i, track) in results.iter().enumerate() {
                println!("{}. {} ({})", i + 1, track.short_title(40), track.duration_label());
                println!("   {}", track.locator);
            }
        }
        Command::Play { locator, user, keep } => {
            let player = user.clone();
            match offload(&jukebox, move |j| j.play(&player, &locator)).await?? {
                PlayOutcome::Enqueued { count } => println!("Enqueued {} tracks from the playlist.", count),
                PlayOutcome::Ready(delivery) => deliver(&jukebox, user, delivery, keep).await?,
            }
        }
        Command::Next { user, keep } => {
            let player = user.clone();
            match offload(&jukebox, move |j| j.play_next(&player)).await?? {
                Some(delivery) => deliver(&jukebox, user, delivery, keep).await?,
                None => println!("Your queue is empty. Use search to add something."),
            }
        }
        Command::Queue { user } => {
            let queued = jukebox.queue(&user);
            if queued.is_empty() {
                println!("Your queue is empty.");
            }
            for (i, track) in queued.iter().enumerate() {
                println!("{}. {} ({})", i + 1, track.display_title(), track.duration_label());
            }
        }
        Command::Clear { user } => {
            jukebox.clear_queue(&user)?;
            println!("Queue cleared.");
        }
        Command::History { user, limit } => {
            let entries = jukebox.history(&user, limit.unwrap_or(history_limit));
            if entries.is_empty() {
                println!("No history yet. Use play or search to start listening.");
            }
            for (i, entry) in entries.iter().enumerate() {
                println!("{}. [{}] {}", i + 1, entry.short_timestamp(), entry.track.display_title());
                println!("   {}", entry.track.locator);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load config - falls back to defaults if missing
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let _guard = init_logging(&config.logs_dir(), args.verbose)?;
    info!("TubeTunes starting up");
    debug!("Data in {}, downloads in {}", config.data_dir.display(), config.downloads_dir.display());

    if let Err(e) = run(args, config).await {
        error!("Command failed: {:#}", e);
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
