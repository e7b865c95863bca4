//! Session lifecycle and token refresh for the Minuet client runtime.
//!
//! This crate provides:
//! - `SessionStore`: the auth state machine over the persisted token pair
//! - `ApiClient`: the authenticated HTTP layer with single-retry-on-refresh
//! - `RefreshCoordinator`: at most one in-flight token refresh system-wide
//! - `AutoRefresher`: proactive silent refresh ahead of expiry
//! - `ExpiryWarning`: the countdown controller driving the expiry dialog
//! - `ProfileStore`: the TTL-cached session profile from `/auth/me`
//! - The error taxonomy shared by all of the above

mod auth_fsm;
mod auto_refresh;
mod client;
mod codes;
mod context;
mod error;
mod expiry_warning;
mod profile;
mod refresh;
mod resources;
mod session;
mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth_fsm::session_machine;
pub use auth_fsm::{
    AuthState, AuthStateCallback, AuthStateChangedPayload, SessionMachine, SessionMachineInput,
    SessionMachineState,
};
pub use auto_refresh::{compute_delay, compute_lead, AutoRefreshHandle, RefreshSchedule};
pub use client::{ApiClient, Notice, NoticeCallback};
pub use codes::{ApiErrorCode, ErrorAction, ErrorDescriptor};
pub use context::SessionContext;
pub use error::{LoginFailure, SessionError, SessionResult};
pub use expiry_warning::{
    ExpiryCountdown, ExpiryWarning, WarningCallback, WarningEvent, WarningPhase, WarningPolicy,
};
pub use profile::{
    ProfileAuthz, ProfileConnections, ProfileMeta, ProfileStore, ProfileUser, SessionProfile,
};
pub use refresh::RefreshCoordinator;
pub use resources::{ClientRecord, MinuteRecord, ProjectRecord, TagRecord, TeamRecord};
pub use session::{AuthSnapshot, SessionStore};
pub use transport::{
    AuthTransport, ConnectionInfo, HttpTransport, LoginRequest, MeResponse, TokenResponse,
};
