//! Curio Sync Runner
//!
//! Reconcile the content store against the blog source from the command line.
//!
//! Usage:
//!   cargo run --bin curio-sync -- --new
//!   cargo run --bin curio-sync -- --edited
//!   cargo run --bin curio-sync -- --new --edited --batch-size 50

use std::env;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curio_core::SyncConfig;
use curio_db::Database;
use curio_fetch::SourceRegistry;
use curio_sync::SyncController;

#[derive(Debug, Default)]
struct Args {
    download_new: bool,
    update_edited: bool,
    batch_size: Option<usize>,
}

fn parse_args() -> Args {
    let args: Vec<String> = env::args().collect();
    let mut result = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--new" | "-n" => {
                result.download_new = true;
            }
            "--edited" | "-e" => {
                result.update_edited = true;
            }
            "--batch-size" | "-b" => {
                i += 1;
                if i < args.len() {
                    match args[i].parse::<usize>() {
                        Ok(n) if n > 0 => result.batch_size = Some(n),
                        _ => {
                            eprintln!("Invalid batch size: {}. Using default.", args[i]);
                        }
                    }
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    result
}

fn print_help() {
    println!(
        r#"
Curio Sync Runner

Usage: cargo run --bin curio-sync -- [OPTIONS]

Options:
  -n, --new               Download blog posts missing from the store
  -e, --edited            Re-download posts edited since their last download
  -b, --batch-size <N>    Items per bulk-create batch (default: 20)
  -h, --help              Print help

Environment:
  DATABASE_URL             Postgres connection string (default: postgres://localhost/curio)
  CURIO_SYNC_BATCH_SIZE    Default bulk-create batch size
  CURIO_BLOG_BASE          Blog scraper service base URL
  CURIO_ESSAY_BASE         Essay archive base URL
  YOUTUBE_API_KEY          Enables the YouTube source
  SPOTIFY_CLIENT_ID        Enables the Spotify source (with SPOTIFY_CLIENT_SECRET)
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "curio_sync=info,curio_db=info,curio_fetch=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = parse_args();
    if !args.download_new && !args.update_edited {
        print_help();
        return Ok(());
    }

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/curio".to_string());

    let db = Database::connect(&database_url).await?;
    db.migrate().await?;
    info!("Database ready");

    let sources = SourceRegistry::from_env();
    let batch_size = args
        .batch_size
        .unwrap_or_else(|| SyncConfig::from_env().batch_size);
    let controller = SyncController::new(db, sources, batch_size);

    if args.download_new {
        let created = controller.download_new_items().await?;
        info!(created = created.len(), "Download run finished");
        for item in &created {
            println!("created  {}  {}", item.item_id, item.title);
        }
    }

    if args.update_edited {
        let results = controller.update_edited_items().await?;
        let updated = results.iter().filter(|(_, updated)| *updated).count();
        info!(selected = results.len(), updated, "Update run finished");
        for (item, updated) in &results {
            if *updated {
                println!("updated  {}  {}", item.item_id, item.title);
            }
        }
    }

    Ok(())
}
