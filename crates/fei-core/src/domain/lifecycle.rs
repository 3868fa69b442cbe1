//! Lifecycle decision table for the server controller.
//!
//! The controller receives two kinds of input: the port the user configured
//! and explicit control commands.  Both arrive through one entry point,
//! `on_receive_event(port, command)`.  This module decides what that event
//! means given whether a listener is currently running, without touching any
//! socket.  The controller then executes the returned [`Transition`].
//!
//! # Decision table
//!
//! ```text
//! command   port      phase              → transition
//! ───────   ───────   ─────────────────  ─────────────────────────────
//! Off       any       any                → Ignore
//! Stop      any       Running            → Stop(Command)
//! Stop      any       Idle               → Ignore
//! Restart   invalid   any                → Reject (stop first if running)
//! Restart   valid     Running            → Restart(port, Restart)
//! Restart   valid     Idle               → Start(port)
//! none      invalid   any                → Reject (stop first if running)
//! none      p         Running on p       → Ignore
//! none      p         Running on q ≠ p   → Restart(p, PortChanged)
//! none      p         Idle               → Start(p)
//! ```
//!
//! `Idle` covers the `Init`, `Stopped` and `Error` states alike.

use std::fmt;

/// Lowest port the server agrees to bind.  Privileged ports are refused so
/// that an unset or garbage setting never turns into a bind attempt on a
/// system port.
pub const MIN_PORT: i32 = 1024;

/// Highest valid TCP port.
pub const MAX_PORT: i32 = 65535;

/// Port used when the configuration does not name one.
pub const DEFAULT_PORT: u16 = 8080;

/// Explicit control commands accepted next to a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerCommand {
    /// Stop the listener if one is running.
    Stop,
    /// Stop the listener if one is running, then start on the given port.
    Restart,
    /// Suppress any reaction to this event.
    Off,
}

/// Whether a listener is currently running, and on which port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running { port: u16 },
}

/// Why a running listener was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// An explicit `Stop` command.
    Command,
    /// First half of an explicit `Restart`.
    Restart,
    /// The configured port changed while running.
    PortChanged,
    /// The configured port became invalid while running.
    InvalidPort,
    /// The host process is shutting down.
    Shutdown,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::Command => "stopped by command",
            StopReason::Restart => "restarting",
            StopReason::PortChanged => "port changed",
            StopReason::InvalidPort => "port became invalid",
            StopReason::Shutdown => "shutting down",
        };
        f.write_str(text)
    }
}

/// What the controller must do in response to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Leave the state untouched.
    Ignore,
    /// Stop the running listener.
    Stop { reason: StopReason },
    /// Start a listener; nothing is running.
    Start { port: u16 },
    /// Stop the running listener, then start on `port`.
    Restart { port: u16, reason: StopReason },
    /// The port is unusable: stop if running, then enter the error state.
    Reject { port: i32 },
}

/// Returns the port as `u16` when it lies within `MIN_PORT..=MAX_PORT`.
pub fn validate_port(port: i32) -> Option<u16> {
    if (MIN_PORT..=MAX_PORT).contains(&port) {
        u16::try_from(port).ok()
    } else {
        None
    }
}

/// Applies the decision table above.
///
/// # Example
///
/// ```rust
/// use fei_core::{plan_transition, Phase, ServerCommand, StopReason, Transition};
///
/// let running = Phase::Running { port: 8080 };
/// assert_eq!(plan_transition(running, 8080, None), Transition::Ignore);
/// assert_eq!(
///     plan_transition(running, 0, Some(ServerCommand::Stop)),
///     Transition::Stop { reason: StopReason::Command }
/// );
/// ```
pub fn plan_transition(phase: Phase, port: i32, command: Option<ServerCommand>) -> Transition {
    match command {
        Some(ServerCommand::Off) => Transition::Ignore,

        Some(ServerCommand::Stop) => match phase {
            Phase::Running { .. } => Transition::Stop {
                reason: StopReason::Command,
            },
            Phase::Idle => Transition::Ignore,
        },

        Some(ServerCommand::Restart) => match (validate_port(port), phase) {
            (None, _) => Transition::Reject { port },
            (Some(port), Phase::Running { .. }) => Transition::Restart {
                port,
                reason: StopReason::Restart,
            },
            (Some(port), Phase::Idle) => Transition::Start { port },
        },

        None => match (validate_port(port), phase) {
            (None, _) => Transition::Reject { port },
            (Some(port), Phase::Running { port: current }) if port == current => {
                Transition::Ignore
            }
            (Some(port), Phase::Running { .. }) => Transition::Restart {
                port,
                reason: StopReason::PortChanged,
            },
            (Some(port), Phase::Idle) => Transition::Start { port },
        },
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const RUNNING: Phase = Phase::Running { port: 8080 };

    #[test]
    fn test_validate_port_bounds() {
        assert_eq!(validate_port(MIN_PORT - 1), None);
        assert_eq!(validate_port(MIN_PORT), Some(1024));
        assert_eq!(validate_port(MAX_PORT), Some(65535));
        assert_eq!(validate_port(MAX_PORT + 1), None);
        assert_eq!(validate_port(-1), None);
    }

    #[test]
    fn test_off_is_always_ignored() {
        assert_eq!(plan_transition(RUNNING, 9000, Some(ServerCommand::Off)), Transition::Ignore);
        assert_eq!(plan_transition(Phase::Idle, 0, Some(ServerCommand::Off)), Transition::Ignore);
    }

    #[test]
    fn test_stop_when_running_stops() {
        assert_eq!(
            plan_transition(RUNNING, 0, Some(ServerCommand::Stop)),
            Transition::Stop { reason: StopReason::Command }
        );
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        assert_eq!(
            plan_transition(Phase::Idle, 8080, Some(ServerCommand::Stop)),
            Transition::Ignore
        );
    }

    #[test]
    fn test_restart_when_running_restarts_even_on_same_port() {
        assert_eq!(
            plan_transition(RUNNING, 8080, Some(ServerCommand::Restart)),
            Transition::Restart { port: 8080, reason: StopReason::Restart }
        );
    }

    #[test]
    fn test_restart_when_idle_starts() {
        assert_eq!(
            plan_transition(Phase::Idle, 9000, Some(ServerCommand::Restart)),
            Transition::Start { port: 9000 }
        );
    }

    #[test]
    fn test_restart_with_invalid_port_is_rejected() {
        assert_eq!(
            plan_transition(RUNNING, 80, Some(ServerCommand::Restart)),
            Transition::Reject { port: 80 }
        );
    }

    #[test]
    fn test_same_port_while_running_is_idempotent() {
        assert_eq!(plan_transition(RUNNING, 8080, None), Transition::Ignore);
    }

    #[test]
    fn test_new_port_while_running_restarts() {
        assert_eq!(
            plan_transition(RUNNING, 9090, None),
            Transition::Restart { port: 9090, reason: StopReason::PortChanged }
        );
    }

    #[test]
    fn test_valid_port_while_idle_starts() {
        assert_eq!(plan_transition(Phase::Idle, 8080, None), Transition::Start { port: 8080 });
    }

    #[test]
    fn test_invalid_port_without_command_is_rejected() {
        assert_eq!(plan_transition(Phase::Idle, 0, None), Transition::Reject { port: 0 });
        assert_eq!(plan_transition(RUNNING, 70000, None), Transition::Reject { port: 70000 });
    }

    #[test]
    fn test_stop_reason_display() {
        assert_eq!(StopReason::Command.to_string(), "stopped by command");
        assert_eq!(StopReason::PortChanged.to_string(), "port changed");
    }
}
