//! ranked-channel command line: build a session or record feedback

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use ranked_channel::{
    apply_feedback, FeedbackAction, HttpExtractor, SessionEngine, SessionRequest, Settings, SqliteStore,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ranked-channel", version, about = "Build ranked sessions by crawling related items")]
struct Cli {
    #[arg(long, env = "RC_DB_PATH", help = "SQLite database path (overrides settings)")]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Build a ranked session playlist")]
    Run {
        #[arg(long, help = "Page to start the walk from")]
        seed_url: String,
        #[arg(long, help = "Requested session length (defaults to RC_DEFAULT_SESSION_LEN)")]
        n: Option<usize>,
        #[arg(long, default_value = "discovery")]
        profile: String,
        #[arg(long, default_value = "session.json")]
        out: PathBuf,
        #[arg(long, help = "Seed the sampling RNG for a reproducible walk")]
        seed: Option<u64>,
    },
    #[command(about = "Record like/skip/block feedback for a session item")]
    Feedback {
        #[arg(long)]
        session_id: String,
        #[arg(long)]
        video_id: String,
        #[arg(long, help = "like | skip | block")]
        action: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env()?;
    if let Some(path) = cli.db_path {
        settings.db_path = path.to_string_lossy().into_owned();
    }
    let store = Arc::new(
        SqliteStore::open(&settings.db_path).with_context(|| format!("opening store {}", settings.db_path))?,
    );

    match cli.command {
        Commands::Run {
            seed_url,
            n,
            profile,
            out,
            seed,
        } => {
            let extractor = Arc::new(HttpExtractor::new(&settings)?);
            let engine = SessionEngine::new(store, extractor, settings);

            let mut req = SessionRequest::new(seed_url, n);
            req.profile = profile;
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };

            let session = engine.build_session(req, &mut rng).await?;
            let json = serde_json::to_string_pretty(&session)?;
            std::fs::write(&out, json).with_context(|| format!("writing {}", out.display()))?;
            println!(
                "Wrote {} (session_id={}, {} items)",
                out.display(),
                session.session_id,
                session.items.len()
            );
        }
        Commands::Feedback {
            session_id,
            video_id,
            action,
        } => {
            let action: FeedbackAction = action.parse()?;
            apply_feedback(store.as_ref(), &session_id, &video_id, action)?;
            println!("Recorded {} for {} in session {}", action, video_id, session_id);
        }
    }

    Ok(())
}
