use anyhow::Context;
use sqlx::PgConnection;

// Advisory locks are scoped to the Postgres session, so acquire and release must
// run on the same connection.
const LOCK_NAMESPACE: i64 = 0x484F_5354_454C; // "HOSTEL"

fn lock_key_for_job(job: &str) -> i64 {
    // FNV-1a; stable across builds unlike std's hasher.
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in job.as_bytes() {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    LOCK_NAMESPACE ^ (hash as i64)
}

pub async fn try_acquire_job_lock(conn: &mut PgConnection, job: &str) -> anyhow::Result<bool> {
    let key = lock_key_for_job(job);
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(key)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("failed to acquire advisory lock (job={job}, key={key})"))?;
    Ok(acquired.0)
}

pub async fn release_job_lock(conn: &mut PgConnection, job: &str) -> anyhow::Result<()> {
    let key = lock_key_for_job(job);
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .persistent(false)
        .bind(key)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to release advisory lock (job={job}, key={key})"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_keys_are_stable_and_distinct() {
        assert_eq!(lock_key_for_job("prune_views"), lock_key_for_job("prune_views"));
        assert_ne!(lock_key_for_job("prune_views"), lock_key_for_job("other_job"));
    }
}
