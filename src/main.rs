use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use teloxide::prelude::*;

use tendersbot::cli::{Cli, Commands};
use tendersbot::core::{config, init_logger};
use tendersbot::notify::{DisabledNotifier, Notifier, SmtpNotifier};
use tendersbot::storage::{self, get_connection, nodes};
use tendersbot::telegram::navigation;
use tendersbot::telegram::{create_bot, schema, HandlerDeps, SessionStore};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments, initializes logging and the runtime, and
/// dispatches to the appropriate subcommand. Only startup errors (storage
/// unavailable, invalid content tree, bad configuration) terminate the
/// process; per-update errors are handled inside the dispatcher schema.
fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present (before the logger,
    // LOG_FILE_PATH may come from there)
    let _ = dotenv();

    init_logger(&config::LOG_FILE_PATH)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(*config::WORKER_THREADS)
        .enable_all()
        .build()?;

    match cli.command {
        Some(Commands::Check) => runtime.block_on(check()),
        Some(Commands::Run) | None => runtime.block_on(run_bot()),
    }
}

async fn run_bot() -> Result<()> {
    let db_pool = Arc::new(storage::create_pool(&config::DATABASE_PATH)?);
    setup_node_tree(&db_pool)?;

    let bot = create_bot()?;
    let sessions = Arc::new(SessionStore::new());
    let notifier: Arc<dyn Notifier> = match SmtpNotifier::from_config()? {
        Some(notifier) => Arc::new(notifier),
        None => {
            log::warn!("EMAIL_HOST is not set, feedback notifications are disabled");
            Arc::new(DisabledNotifier)
        }
    };

    let deps = HandlerDeps::new(db_pool, sessions, notifier);

    log::info!("Starting telegram bot");
    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Startup pass over the content tree, mirrored by `check`: the
/// materialized paths are brought up to date and every stored
/// input_function must resolve in the closed flow registry.
fn setup_node_tree(db_pool: &storage::DbPool) -> Result<()> {
    log::info!("Recalculating node tree");
    let conn = get_connection(db_pool)?;
    let root = nodes::root(&conn)?.ok_or_else(|| anyhow::anyhow!("node tree has no root node"))?;
    nodes::refresh_paths(&conn, root.id)?;
    navigation::validate_input_functions(&conn)?;
    log::info!("Successfully updated node tree");
    Ok(())
}

async fn check() -> Result<()> {
    let db_pool = Arc::new(storage::create_pool(&config::DATABASE_PATH)?);
    setup_node_tree(&db_pool)?;

    if config::BOT_TOKEN.is_empty() {
        anyhow::bail!("BOT_TOKEN (or TELOXIDE_TOKEN) is not set");
    }
    if SmtpNotifier::from_config()?.is_none() {
        log::warn!("EMAIL_HOST is not set, feedback notifications would be disabled");
    }

    log::info!("Configuration and content tree look valid");
    Ok(())
}
