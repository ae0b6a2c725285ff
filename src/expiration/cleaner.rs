use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::manager::UserManager;

/// Start the background expiration cleaner task
pub fn start_expiration_cleaner(manager: Arc<UserManager>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);

        loop {
            interval_timer.tick().await;
            run_cleanup(&manager);
        }
    })
}

/// Drop expired tokens. Passive cleanup: the version is left alone and
/// nothing is replicated, receivers expire tokens on their own.
pub fn run_cleanup(manager: &UserManager) -> usize {
    debug!("Running expiration cleanup");

    let removed = manager.sweep_expired();
    if removed > 0 {
        debug!(tokens_cleaned = removed, "Expired tokens cleaned");
    }
    removed
}
