use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

mod prune;

#[derive(Debug, Parser)]
#[command(name = "hostel_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print recommendations for one user as JSON.
    Recommend {
        #[arg(long)]
        user_id: String,

        #[arg(long, default_value_t = hostel_core::recommend::DEFAULT_LIMIT)]
        limit: usize,
    },

    /// Delete view history older than the retention window.
    PruneViews {
        #[arg(long, default_value_t = prune::DEFAULT_RETAIN_DAYS)]
        retain_days: i64,

        /// Count what would be deleted without deleting it.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = hostel_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let res = match args.command {
        Command::Recommend { user_id, limit } => recommend(&settings, &user_id, limit).await,
        Command::PruneViews {
            retain_days,
            dry_run,
        } => prune::run(&settings, retain_days, dry_run).await,
    };

    if let Err(err) = &res {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "worker run failed");
    }
    res
}

async fn recommend(
    settings: &hostel_core::config::Settings,
    user_id: &str,
    limit: usize,
) -> anyhow::Result<()> {
    let user_id = Uuid::parse_str(user_id).with_context(|| format!("invalid --user-id {user_id}"))?;

    let store = hostel_core::storage::open_store(settings).await?;
    let recommender = hostel_core::recommend::Recommender::new(store);

    // Surface retrieval errors here instead of degrading to an empty list.
    let out = recommender.try_recommend(user_id, limit).await?;
    tracing::info!(%user_id, recommended = out.len(), "recommendations computed");

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn init_sentry(settings: &hostel_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
