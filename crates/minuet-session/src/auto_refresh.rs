//! Proactive background refresh ahead of token expiry.
//!
//! A single timer fires shortly before the access token expires, triggers a
//! silent refresh, and reschedules itself from the (possibly new) token's
//! TTL regardless of outcome, so the loop is self-healing across refresh
//! cycles. Hosts call `wake()` on focus/visibility/online events, since a
//! suspended process may have slept through its timer.

use crate::refresh::RefreshCoordinator;
use minuet_storage::TokenVault;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Scheduling parameters for the proactive refresh.
#[derive(Debug, Clone)]
pub struct RefreshSchedule {
    /// Minimum lead before expiry at which the refresh fires.
    pub min_lead_secs: i64,
    /// Fraction of the remaining TTL added to the lead.
    pub lead_percent: f64,
    /// Clock-skew allowance added on top of the lead.
    pub skew_secs: i64,
    /// Recheck cadence while there is nothing to schedule against (no
    /// refresh token, unknown expiry) and the backoff after a failed
    /// refresh.
    pub recheck_secs: u64,
    /// Debounce applied to wake() bursts.
    pub wake_debounce_ms: u64,
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        Self {
            min_lead_secs: 60,
            lead_percent: 0.1,
            skew_secs: 15,
            recheck_secs: 60,
            wake_debounce_ms: 250,
        }
    }
}

/// `lead = max(min_lead, ceil(ttl * lead_percent)) + skew`
pub fn compute_lead(ttl_secs: i64, schedule: &RefreshSchedule) -> i64 {
    let percent_lead = (ttl_secs as f64 * schedule.lead_percent).ceil() as i64;
    schedule.min_lead_secs.max(percent_lead) + schedule.skew_secs
}

/// `delay = max(0, remaining_ttl - lead)`
pub fn compute_delay(remaining_secs: i64, schedule: &RefreshSchedule) -> Duration {
    let lead = compute_lead(remaining_secs, schedule);
    Duration::from_secs(remaining_secs.saturating_sub(lead).max(0) as u64)
}

/// Handle to a running auto-refresh task.
///
/// Dropping (or `dispose`-ing) the handle cancels the timer and the task —
/// hosts must not leak schedulers across repeated mounts.
pub struct AutoRefreshHandle {
    handle: JoinHandle<()>,
    notify: Arc<Notify>,
}

impl AutoRefreshHandle {
    /// Re-evaluate scheduling immediately (focus / visibility / online).
    pub fn wake(&self) {
        self.notify.notify_one();
    }

    /// Cancel the timer and detach.
    pub fn dispose(&self) {
        self.handle.abort();
    }
}

impl Drop for AutoRefreshHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawn the auto-refresh task.
pub fn spawn_auto_refresher(
    coordinator: Arc<RefreshCoordinator>,
    vault: Arc<TokenVault>,
    schedule: RefreshSchedule,
) -> AutoRefreshHandle {
    let notify = Arc::new(Notify::new());
    let task_notify = notify.clone();
    let handle = tokio::spawn(async move {
        run_loop(coordinator, vault, schedule, task_notify).await;
    });
    AutoRefreshHandle { handle, notify }
}

async fn run_loop(
    coordinator: Arc<RefreshCoordinator>,
    vault: Arc<TokenVault>,
    schedule: RefreshSchedule,
    notify: Arc<Notify>,
) {
    let recheck = Duration::from_secs(schedule.recheck_secs);
    let debounce = Duration::from_millis(schedule.wake_debounce_ms);

    loop {
        let has_refresh_token = vault.refresh_token().ok().flatten().is_some();
        if !has_refresh_token {
            // Nothing to refresh with: park until woken or the next recheck.
            tokio::select! {
                _ = notify.notified() => tokio::time::sleep(debounce).await,
                _ = tokio::time::sleep(recheck) => {}
            }
            continue;
        }

        match vault.remaining_secs().ok().flatten() {
            Some(remaining) => {
                let delay = compute_delay(remaining, &schedule);
                debug!(remaining, delay_secs = delay.as_secs(), "refresh scheduled");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        // Reschedule from the (possibly new) token either way.
                        if let Err(e) = coordinator.refresh_now().await {
                            warn!(error = %e, "proactive refresh failed");
                            // Back off before recomputing, or the stale
                            // schedule would retry in a tight loop.
                            tokio::select! {
                                _ = notify.notified() => tokio::time::sleep(debounce).await,
                                _ = tokio::time::sleep(recheck) => {}
                            }
                        }
                    }
                    _ = notify.notified() => {
                        // Woken: coalesce the burst, then recompute. A timer
                        // missed during suspension recomputes to delay 0 and
                        // fires immediately.
                        tokio::time::sleep(debounce).await;
                    }
                }
            }
            None => {
                // Unknown expiry: nothing to schedule against; revalidation
                // happens on the next authenticated call instead.
                tokio::select! {
                    _ = notify.notified() => tokio::time::sleep(debounce).await,
                    _ = tokio::time::sleep(recheck) => {}
                }
            }
        }
    }
}
