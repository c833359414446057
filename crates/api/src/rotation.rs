//! Periodic signing-secret rotation.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use keystone_auth::TokenManager;

/// Rotate `manager`'s secret on its policy interval.
///
/// Returns `None` when the policy disables rotation (e.g. a shared secret).
/// Dropping the handle does not stop the task; abort it to stop rotating.
pub fn spawn_secret_rotation(manager: Arc<TokenManager>) -> Option<JoinHandle<()>> {
    let interval_ms = manager
        .policy()
        .interval_ms
        .and_then(|ms| u64::try_from(ms).ok())
        .filter(|ms| *ms > 0)?;
    let period = Duration::from_millis(interval_ms);

    tracing::info!(interval_ms, "secret rotation scheduled");
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            manager.rotate();
        }
    }))
}
