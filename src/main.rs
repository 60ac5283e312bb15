use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use reviewtrend::config::{Config, SimilarityBackend};
use reviewtrend::db::Database;
use reviewtrend::pipeline::dedup::SimilaritySource;

/// reviewtrend: daily topic trends from Google Play reviews.
///
/// Collects recent reviews, extracts a topic from each one, merges
/// near-duplicate topics, and counts mentions per day.
#[derive(Parser)]
#[command(name = "reviewtrend", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Settings every stage can override from the command line.
#[derive(Args, Clone, Default)]
struct AppArgs {
    /// Play Store package id (default: GOOGLE_PLAY_APP_ID)
    #[arg(long)]
    app_id: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Download the sentence embedding model (~90 MB)
    DownloadModel,

    /// Fetch recent reviews from the Play Store
    Collect {
        #[command(flatten)]
        app: AppArgs,

        /// Newest reviews to request (default: MAX_REVIEWS)
        #[arg(long)]
        max_reviews: Option<usize>,

        /// Keep reviews from the last N days (default: TREND_DAYS)
        #[arg(long)]
        days: Option<i64>,
    },

    /// Extract a topic from every review that doesn't have one yet
    Extract {
        #[command(flatten)]
        app: AppArgs,

        /// Number of reviews to extract in parallel (default: 4)
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },

    /// Merge near-duplicate topics into canonical topics
    Dedup {
        #[command(flatten)]
        app: AppArgs,

        /// Similarity needed to join an existing topic (default: DEDUP_THRESHOLD)
        #[arg(long)]
        threshold: Option<f64>,

        /// Cluster topics from the last N days (default: TREND_DAYS)
        #[arg(long)]
        days: Option<i64>,

        /// Reference time for the window, RFC 3339 (default: now)
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        /// Number of merged clusters to print (default: 20)
        #[arg(long, default_value = "20")]
        show: usize,
    },

    /// Build the topic x day trend table and write it as CSV
    Trend {
        #[command(flatten)]
        app: AppArgs,

        /// Trailing window in days (default: TREND_DAYS)
        #[arg(long)]
        days: Option<i64>,

        /// Reference time for the window, RFC 3339 (default: now)
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        /// Number of topics to print (default: 15)
        #[arg(long, default_value = "15")]
        top: usize,
    },

    /// Run collect, extract, dedup and trend in sequence
    Run {
        #[command(flatten)]
        app: AppArgs,

        #[arg(long)]
        max_reviews: Option<usize>,

        #[arg(long)]
        days: Option<i64>,

        #[arg(long)]
        threshold: Option<f64>,

        #[arg(long, default_value = "4")]
        concurrency: usize,
    },

    /// Show system status (DB stats, stage counts, last run times)
    Status {
        #[command(flatten)]
        app: AppArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("reviewtrend=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            info!("Initializing reviewtrend database...");
            let config = Config::load()?;
            let db = reviewtrend::db::initialize_sqlite(&config.db_path)?;
            let table_count = db.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nNext step: set OPENAI_API_KEY in your .env file");
            println!("  (see .env.example for the other variables)");
            println!("\nThen run: reviewtrend download-model && reviewtrend run");
        }

        Commands::DownloadModel => {
            let config = Config::load()?;
            let model_dir = &config.model_dir;

            println!("Downloading ONNX models...");
            println!("  Destination: {}", model_dir.display());

            reviewtrend::topics::download::download_model(model_dir).await?;

            println!("\n{}", "Model downloaded successfully.".bold());
            println!("You can now run `reviewtrend dedup`.");
        }

        Commands::Collect {
            app,
            max_reviews,
            days,
        } => {
            let mut config = Config::load()?;
            apply_app(&mut config, &app);
            if let Some(n) = max_reviews {
                config.max_reviews = n;
            }
            if let Some(d) = days {
                config.trend_days = d;
            }
            config.validate()?;
            let db = reviewtrend::db::open_sqlite(&config.db_path)?;

            let stored = collect(&config, &db, Utc::now()).await?;
            println!("\n{}", "Collect complete.".bold());
            println!("  Reviews stored: {stored}");
        }

        Commands::Extract { app, concurrency } => {
            let mut config = Config::load()?;
            apply_app(&mut config, &app);
            config.validate()?;
            config.require_openai()?;
            let db = reviewtrend::db::open_sqlite(&config.db_path)?;

            let summary = extract(&config, &db, concurrency).await?;
            println!("\n{}", "Extract complete.".bold());
            println!("  Topics extracted: {}", summary.extracted);
            if summary.skipped_empty > 0 {
                println!("  Empty reviews skipped: {}", summary.skipped_empty);
            }
            if summary.failed > 0 {
                println!(
                    "  {} {} reviews failed; run `reviewtrend extract` again to retry",
                    "Warning:".yellow(),
                    summary.failed
                );
            }
        }

        Commands::Dedup {
            app,
            threshold,
            days,
            now,
            show,
        } => {
            let mut config = Config::load()?;
            apply_app(&mut config, &app);
            if let Some(t) = threshold {
                config.dedup_threshold = t;
            }
            if let Some(d) = days {
                config.trend_days = d;
            }
            config.validate()?;
            config.require_similarity()?;
            let db = reviewtrend::db::open_sqlite(&config.db_path)?;

            let now = now.unwrap_or_else(Utc::now);
            let map = dedup(&config, &db, now).await?;
            reviewtrend::output::terminal::display_clusters(&map, show);
        }

        Commands::Trend {
            app,
            days,
            now,
            top,
        } => {
            let mut config = Config::load()?;
            apply_app(&mut config, &app);
            if let Some(d) = days {
                config.trend_days = d;
            }
            config.validate()?;
            let db = reviewtrend::db::open_sqlite(&config.db_path)?;

            let now = now.unwrap_or_else(Utc::now);
            trend(&config, &db, now, top).await?;
        }

        Commands::Run {
            app,
            max_reviews,
            days,
            threshold,
            concurrency,
        } => {
            let mut config = Config::load()?;
            apply_app(&mut config, &app);
            if let Some(n) = max_reviews {
                config.max_reviews = n;
            }
            if let Some(d) = days {
                config.trend_days = d;
            }
            if let Some(t) = threshold {
                config.dedup_threshold = t;
            }
            config.validate()?;
            config.require_openai()?;
            config.require_similarity()?;
            let db = reviewtrend::db::initialize_sqlite(&config.db_path)?;

            // Every stage of one run shares the same window.
            let now = Utc::now();

            println!(
                "{}",
                format!("[1/4] Collecting reviews for {}...", config.app_id).bold()
            );
            let stored = collect(&config, &db, now).await?;
            println!("  Reviews stored: {stored}");

            println!("{}", "[2/4] Extracting topics...".bold());
            let summary = extract(&config, &db, concurrency).await?;
            println!(
                "  Topics extracted: {} ({} failed)",
                summary.extracted, summary.failed
            );

            println!("{}", "[3/4] Merging near-duplicate topics...".bold());
            let map = dedup(&config, &db, now).await?;
            println!(
                "  {} raw topics -> {} canonical topics",
                map.len(),
                map.canonical_count()
            );

            println!("{}", "[4/4] Building trend table...".bold());
            trend(&config, &db, now, 15).await?;
        }

        Commands::Status { app } => {
            let mut config = Config::load()?;
            apply_app(&mut config, &app);
            let db = reviewtrend::db::open_sqlite(&config.db_path)?;
            reviewtrend::status::show(&db, &config.db_path, &config.app_id).await?;
        }
    }

    Ok(())
}

fn apply_app(config: &mut Config, app: &AppArgs) {
    if let Some(ref id) = app.app_id {
        config.app_id = id.clone();
    }
}

async fn collect(config: &Config, db: &Arc<dyn Database>, now: DateTime<Utc>) -> Result<usize> {
    let client = reviewtrend::playstore::client::PlayStoreClient::new(
        &config.play_store_url,
        &config.play_store_lang,
        &config.play_store_country,
    )?;
    reviewtrend::pipeline::collect::run(
        &client,
        db,
        &config.app_id,
        config.max_reviews,
        config.trend_days,
        now,
    )
    .await
}

async fn extract(
    config: &Config,
    db: &Arc<dyn Database>,
    concurrency: usize,
) -> Result<reviewtrend::pipeline::extract::ExtractSummary> {
    let extractor = reviewtrend::extract::openai::OpenAiExtractor::new(
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        &config.openai_api_url,
        config.openai_rps,
    );
    reviewtrend::pipeline::extract::run(&extractor, db, &config.app_id, concurrency).await
}

/// Cluster with the configured backend. The embedder lives only for this call.
async fn dedup(
    config: &Config,
    db: &Arc<dyn Database>,
    now: DateTime<Utc>,
) -> Result<reviewtrend::topics::canonical::CanonicalMap> {
    match config.similarity_backend {
        SimilarityBackend::Embedding => {
            info!("Using local sentence embeddings for topic similarity");
            let embed_dir = reviewtrend::topics::download::embedding_model_dir(&config.model_dir);
            let embedder = reviewtrend::topics::embeddings::SentenceEmbedder::load(&embed_dir)?;
            reviewtrend::pipeline::dedup::run(
                db,
                &config.app_id,
                SimilaritySource::Embedding(&embedder),
                config.dedup_threshold,
                config.trend_days,
                now,
            )
            .await
        }
        SimilarityBackend::Lexical => {
            info!("Using lexical token similarity for topics");
            reviewtrend::pipeline::dedup::run(
                db,
                &config.app_id,
                SimilaritySource::Lexical,
                config.dedup_threshold,
                config.trend_days,
                now,
            )
            .await
        }
    }
}

async fn trend(
    config: &Config,
    db: &Arc<dyn Database>,
    now: DateTime<Utc>,
    top: usize,
) -> Result<()> {
    let csv_path = config.trend_csv_path();
    let matrix = reviewtrend::pipeline::trend::run(
        db,
        &config.app_id,
        config.trend_days,
        now,
        &csv_path,
    )
    .await?;

    reviewtrend::output::terminal::display_trend_summary(&matrix, top, 7);
    println!(
        "\n{}",
        format!("Trend table saved to: {}", csv_path.display()).bold()
    );
    Ok(())
}
