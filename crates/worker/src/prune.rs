use chrono::{DateTime, Duration, Utc};
use hostel_core::storage::{lock, postgres};

pub const DEFAULT_RETAIN_DAYS: i64 = 180;

const JOB_NAME: &str = "prune_listing_views";

pub async fn run(
    settings: &hostel_core::config::Settings,
    retain_days: i64,
    dry_run: bool,
) -> anyhow::Result<()> {
    let cutoff = retention_cutoff(Utc::now(), retain_days)?;

    let pool = hostel_core::storage::connect(settings).await?;
    hostel_core::storage::migrate(&pool).await?;

    if dry_run {
        let count = postgres::count_views_before(&pool, cutoff).await?;
        tracing::info!(%cutoff, count, dry_run = true, "listing views eligible for pruning");
        return Ok(());
    }

    let mut conn = pool.acquire().await?;
    let acquired = lock::try_acquire_job_lock(&mut conn, JOB_NAME).await?;
    if !acquired {
        tracing::warn!(%cutoff, "prune lock not acquired; another run in progress");
        return Ok(());
    }

    let res = postgres::prune_views_before(&mut conn, cutoff).await;
    let _ = lock::release_job_lock(&mut conn, JOB_NAME).await;

    let deleted = res?;
    tracing::info!(%cutoff, deleted, "pruned listing views");
    Ok(())
}

fn retention_cutoff(now: DateTime<Utc>, retain_days: i64) -> anyhow::Result<DateTime<Utc>> {
    anyhow::ensure!(
        (1..=3650).contains(&retain_days),
        "retain_days must be 1..=3650 (got {retain_days})"
    );
    Ok(now - Duration::days(retain_days))
}
