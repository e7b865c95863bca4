//! Session expiry warning: countdown state machine and controller.
//!
//! The countdown is an explicit three-state machine — `Hidden`, `Warning`,
//! `ForcedLogoutPending` — driven by a single recomputed "seconds
//! remaining" value. `ForcedLogoutPending` is terminal, which makes the
//! forced logout one-shot by construction rather than by a guard flag.
//!
//! The controller is headless: it owns timing and state and emits
//! `WarningEvent`s through a callback; rendering the dialog belongs to the
//! host.

use crate::error::SessionResult;
use crate::refresh::RefreshCoordinator;
use crate::session::SessionStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Thresholds and poll cadence for the expiry warning.
#[derive(Debug, Clone)]
pub struct WarningPolicy {
    /// Remaining seconds at which the warning becomes visible.
    pub warn_threshold_secs: i64,
    /// Remaining seconds at which logout is forced.
    pub hard_floor_secs: i64,
    /// Poll cadence while hidden.
    pub hidden_poll: Duration,
    /// Poll cadence while the warning is visible.
    pub visible_poll: Duration,
}

impl Default for WarningPolicy {
    fn default() -> Self {
        Self {
            warn_threshold_secs: 120,
            hard_floor_secs: 10,
            hidden_poll: Duration::from_secs(5),
            visible_poll: Duration::from_secs(1),
        }
    }
}

/// Countdown phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningPhase {
    Hidden,
    Warning,
    /// Terminal: the forced logout has been emitted.
    ForcedLogoutPending,
}

/// Events the controller emits to its host.
#[derive(Debug, Clone, PartialEq)]
pub enum WarningEvent {
    /// The warning became visible.
    Show { remaining_secs: i64 },
    /// Countdown update while visible.
    Tick { remaining_secs: i64 },
    /// The warning is gone (session renewed, or user action).
    Hide,
    /// The countdown reached the hard floor; the session is being ended.
    ForceLogout,
    /// A manual "keep session alive" attempt failed; the dialog stays open.
    KeepAliveFailed { message: String },
}

/// Callback type for warning events.
pub type WarningCallback = Arc<dyn Fn(WarningEvent) + Send + Sync>;

/// The pure countdown machine. Time-free and directly testable.
#[derive(Debug)]
pub struct ExpiryCountdown {
    policy: WarningPolicy,
    phase: WarningPhase,
}

impl ExpiryCountdown {
    pub fn new(policy: WarningPolicy) -> Self {
        Self {
            policy,
            phase: WarningPhase::Hidden,
        }
    }

    pub fn phase(&self) -> WarningPhase {
        self.phase
    }

    pub fn policy(&self) -> &WarningPolicy {
        &self.policy
    }

    /// Poll cadence for the current phase.
    pub fn poll_interval(&self) -> Duration {
        match self.phase {
            WarningPhase::Hidden => self.policy.hidden_poll,
            _ => self.policy.visible_poll,
        }
    }

    /// Force the machine back to `Hidden` (session renewed or dialog
    /// dismissed by a user action).
    pub fn dismiss(&mut self) {
        if self.phase == WarningPhase::Warning {
            self.phase = WarningPhase::Hidden;
        }
    }

    /// Advance the machine with a recomputed remaining-seconds value.
    ///
    /// `refresh_in_flight` suppresses the floor-triggered forced logout: a
    /// refresh issued just before the floor must be allowed to land. Once
    /// it settles, the next tick decides.
    pub fn on_tick(
        &mut self,
        remaining_secs: Option<i64>,
        refresh_in_flight: bool,
    ) -> Option<WarningEvent> {
        match self.phase {
            WarningPhase::ForcedLogoutPending => None,
            WarningPhase::Hidden => {
                let remaining = remaining_secs?;
                if remaining <= self.policy.hard_floor_secs && !refresh_in_flight {
                    self.phase = WarningPhase::ForcedLogoutPending;
                    Some(WarningEvent::ForceLogout)
                } else if remaining <= self.policy.warn_threshold_secs {
                    self.phase = WarningPhase::Warning;
                    Some(WarningEvent::Show {
                        remaining_secs: remaining,
                    })
                } else {
                    None
                }
            }
            WarningPhase::Warning => match remaining_secs {
                // Expiry became unknown: nothing to count down against.
                None => {
                    self.phase = WarningPhase::Hidden;
                    Some(WarningEvent::Hide)
                }
                Some(remaining) if remaining > self.policy.warn_threshold_secs => {
                    self.phase = WarningPhase::Hidden;
                    Some(WarningEvent::Hide)
                }
                Some(remaining) if remaining <= self.policy.hard_floor_secs => {
                    if refresh_in_flight {
                        Some(WarningEvent::Tick {
                            remaining_secs: remaining,
                        })
                    } else {
                        self.phase = WarningPhase::ForcedLogoutPending;
                        Some(WarningEvent::ForceLogout)
                    }
                }
                Some(remaining) => Some(WarningEvent::Tick {
                    remaining_secs: remaining,
                }),
            },
        }
    }
}

/// Headless controller for the expiry warning dialog.
pub struct ExpiryWarning {
    session: Arc<SessionStore>,
    coordinator: Arc<RefreshCoordinator>,
    countdown: Mutex<ExpiryCountdown>,
    callback: WarningCallback,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ExpiryWarning {
    /// Spawn the countdown poller. At most one interval exists per
    /// controller; it clears itself when authentication drops and on
    /// `dispose`.
    pub fn spawn(
        session: Arc<SessionStore>,
        coordinator: Arc<RefreshCoordinator>,
        policy: WarningPolicy,
        callback: WarningCallback,
    ) -> Arc<Self> {
        let warning = Arc::new(Self {
            session,
            coordinator,
            countdown: Mutex::new(ExpiryCountdown::new(policy)),
            callback,
            task: Mutex::new(None),
        });

        let poller = warning.clone();
        let handle = tokio::spawn(async move {
            poller.run().await;
        });
        *warning.task.lock().unwrap() = Some(handle);
        warning
    }

    async fn run(self: Arc<Self>) {
        loop {
            if !self.session.is_authenticated() {
                debug!("expiry warning poller stopping (not authenticated)");
                break;
            }

            let remaining = self.session.vault().remaining_secs().ok().flatten();
            let event = {
                let mut countdown = self.countdown.lock().unwrap();
                countdown.on_tick(remaining, self.coordinator.is_refreshing())
            };

            if let Some(event) = event {
                let force = matches!(event, WarningEvent::ForceLogout);
                (self.callback)(event);
                if force {
                    info!("expiry countdown reached the hard floor");
                    self.session.logout("expired");
                    break;
                }
            }

            let interval = self.countdown.lock().unwrap().poll_interval();
            tokio::time::sleep(interval).await;
        }
    }

    /// Current countdown phase.
    pub fn phase(&self) -> WarningPhase {
        self.countdown.lock().unwrap().phase()
    }

    /// "Keep session alive": one manual refresh. Hides the warning when
    /// the session was renewed past the threshold; on failure the dialog
    /// stays open with an inline error and nothing auto-retries.
    pub async fn keep_alive(&self) -> SessionResult<()> {
        match self.coordinator.refresh_now().await {
            Ok(_) => {
                let remaining = self.session.vault().remaining_secs().ok().flatten();
                let hide = {
                    let mut countdown = self.countdown.lock().unwrap();
                    let renewed = remaining
                        .map_or(true, |r| r > countdown.policy().warn_threshold_secs);
                    if countdown.phase() == WarningPhase::Warning && renewed {
                        countdown.dismiss();
                        true
                    } else {
                        false
                    }
                };
                if hide {
                    (self.callback)(WarningEvent::Hide);
                }
                Ok(())
            }
            Err(e) => {
                (self.callback)(WarningEvent::KeepAliveFailed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// "Logout now": close immediately and end the session.
    pub fn logout_now(&self) {
        self.countdown.lock().unwrap().dismiss();
        (self.callback)(WarningEvent::Hide);
        self.session.logout("user");
        self.dispose();
    }

    /// Stop the poller.
    pub fn dispose(&self) {
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
    }
}
