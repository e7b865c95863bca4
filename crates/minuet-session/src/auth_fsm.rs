//! Authentication state machine using rust-fsm.
//!
//! The machine is deliberately small: `LoggedIn` has no sub-states, and
//! refresh activity is invisible to it. A refresh that fails hard reuses
//! the logout transition.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────┐  LoginAttempt   ┌─────────────┐
//! │  LoggedOut  │ ──────────────► │  LoggingIn  │
//! └─────┬───▲───┘                 └──────┬──────┘
//!       │   │  LoginFailed               │ LoginSucceeded
//!       │   └────────────────────────────┤
//!       │ SessionRestored                ▼
//!       │                         ┌─────────────┐
//!       └───────────────────────► │  LoggedIn   │
//!                                 └──────┬──────┘
//!                  LogoutRequested       │
//!       ◄────────────────────────────────┘
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Define the FSM using rust-fsm's declarative macro.
// This generates a module `session_machine` with State, Input, and
// StateMachine types.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(LoggedOut)

    LoggedOut => {
        LoginAttempt => LoggingIn,
        SessionRestored => LoggedIn
    },
    LoggingIn => {
        LoginSucceeded => LoggedIn,
        LoginFailed => LoggedOut
    },
    LoggedIn => {
        LogoutRequested => LoggedOut
    }
}

// Re-export the generated types with clearer names
pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Public authentication state for hosts and IPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// Not logged in.
    LoggedOut,
    /// Explicit login call in flight.
    LoggingIn,
    /// Logged in with a session token pair.
    LoggedIn,
}

impl AuthState {
    /// Returns true if the user has a session (LoggedIn state only).
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::LoggedIn)
    }

    /// Returns true only during an explicit login call — background
    /// refresh never reports loading.
    pub fn is_loading(&self) -> bool {
        matches!(self, AuthState::LoggingIn)
    }
}

impl From<&SessionMachineState> for AuthState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::LoggedOut => AuthState::LoggedOut,
            SessionMachineState::LoggingIn => AuthState::LoggingIn,
            SessionMachineState::LoggedIn => AuthState::LoggedIn,
        }
    }
}

/// Payload for auth state change events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStateChangedPayload {
    /// Current auth state.
    pub state: AuthState,
    /// Why the state changed, when a reason was given (e.g. "expired").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Callback type for auth state change notifications.
pub type AuthStateCallback = Box<dyn Fn(AuthStateChangedPayload) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_logged_out() {
        let machine = SessionMachine::new();
        assert_eq!(*machine.state(), SessionMachineState::LoggedOut);
    }

    #[test]
    fn test_login_flow() {
        let mut machine = SessionMachine::new();

        machine.consume(&SessionMachineInput::LoginAttempt).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::LoggingIn);

        machine
            .consume(&SessionMachineInput::LoginSucceeded)
            .unwrap();
        assert_eq!(*machine.state(), SessionMachineState::LoggedIn);
    }

    #[test]
    fn test_login_failure_returns_to_logged_out() {
        let mut machine = SessionMachine::new();

        machine.consume(&SessionMachineInput::LoginAttempt).unwrap();
        machine.consume(&SessionMachineInput::LoginFailed).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::LoggedOut);
    }

    #[test]
    fn test_restore_goes_straight_to_logged_in() {
        let mut machine = SessionMachine::new();

        machine
            .consume(&SessionMachineInput::SessionRestored)
            .unwrap();
        assert_eq!(*machine.state(), SessionMachineState::LoggedIn);
    }

    #[test]
    fn test_logout_flow() {
        let mut machine = SessionMachine::new();

        machine.consume(&SessionMachineInput::LoginAttempt).unwrap();
        machine
            .consume(&SessionMachineInput::LoginSucceeded)
            .unwrap();
        machine
            .consume(&SessionMachineInput::LogoutRequested)
            .unwrap();
        assert_eq!(*machine.state(), SessionMachineState::LoggedOut);
    }

    #[test]
    fn test_invalid_transition_returns_error() {
        let mut machine = SessionMachine::new();

        // Can't logout from LoggedOut
        assert!(machine
            .consume(&SessionMachineInput::LogoutRequested)
            .is_err());

        // Can't claim login success without an attempt
        assert!(machine
            .consume(&SessionMachineInput::LoginSucceeded)
            .is_err());
    }

    #[test]
    fn test_auth_state_flags() {
        assert!(!AuthState::LoggedOut.is_authenticated());
        assert!(!AuthState::LoggingIn.is_authenticated());
        assert!(AuthState::LoggedIn.is_authenticated());

        assert!(AuthState::LoggingIn.is_loading());
        assert!(!AuthState::LoggedIn.is_loading());
        assert!(!AuthState::LoggedOut.is_loading());
    }

    #[test]
    fn test_auth_state_conversion() {
        assert_eq!(
            AuthState::from(&SessionMachineState::LoggedOut),
            AuthState::LoggedOut
        );
        assert_eq!(
            AuthState::from(&SessionMachineState::LoggingIn),
            AuthState::LoggingIn
        );
        assert_eq!(
            AuthState::from(&SessionMachineState::LoggedIn),
            AuthState::LoggedIn
        );
    }
}
