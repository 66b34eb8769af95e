//! Session controller: resolve, adapt, turn on, wait, turn off, tear down.
//!
//! ```text
//! Uninitialized → Resolving → Adapted → Vibrating → Stopping → TornDown
//!                     │           │
//!                     └───────────┴──→ Error (fatal, nothing left open)
//! ```
//!
//! Turn-off is only sent after a successful turn-on; it is never used as
//! cleanup for a failed one. A failed turn-on or turn-off is reported in the
//! [`SessionReport`] but does not make [`Session::run`] return an error.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use crate::{
    adapt, resolve, Binding, Domain, DurationMs, InterfaceDialect, Operation, SessionId,
    Timestamp, Transport, VibratorError,
};

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Blocks the calling thread between turn-on and turn-off.
pub trait Delay {
    /// Blocks for `duration`.
    fn sleep(&self, duration: Duration);
}

/// [`Delay`] backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Delay for ThreadSleep {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Progress notifications, for console output.
///
/// All methods default to doing nothing.
pub trait SessionEvents {
    /// The service was bound under `dialect`.
    fn bound(&mut self, _dialect: InterfaceDialect) {}
    /// The actuator accepted the turn-on request.
    fn started(&mut self, _duration: DurationMs) {}
    /// The turn-on request failed.
    fn start_failed(&mut self, _error: Option<&VibratorError>) {}
    /// The actuator accepted the turn-off request.
    fn stopped(&mut self) {}
    /// The turn-off request failed.
    fn stop_failed(&mut self, _error: Option<&VibratorError>) {}
}

impl SessionEvents for () {}

// ---------------------------------------------------------------------------
// State and report
// ---------------------------------------------------------------------------

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Resolving,
    Adapted,
    Vibrating,
    Stopping,
    TornDown,
    /// Setup failed; absorbing.
    Error,
}

/// Result of one transaction as seen by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The service replied with result code `0`.
    Succeeded,
    /// The service replied with a nonzero result code.
    Rejected,
    /// The transaction could not be completed.
    Failed {
        /// Display form of the error.
        reason: String,
    },
}

impl Outcome {
    fn from_result(result: &Result<bool, VibratorError>) -> Self {
        match result {
            Ok(true) => Self::Succeeded,
            Ok(false) => Self::Rejected,
            Err(err) => Self::Failed {
                reason: err.to_string(),
            },
        }
    }

    /// Returns `true` for [`Outcome::Succeeded`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Summary of a completed (non-fatal) session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Identifier of the session.
    pub session_id: SessionId,
    /// Dialect the session was bound under.
    pub dialect: InterfaceDialect,
    /// Requested vibration length.
    pub duration: DurationMs,
    /// Turn-on result.
    pub on: Outcome,
    /// Turn-off result; `None` when turn-off was not attempted.
    pub off: Option<Outcome>,
    /// State the session finished in.
    pub final_state: SessionState,
    /// When resolution started.
    pub started_at: Timestamp,
    /// When teardown finished.
    pub finished_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One vibrate invocation over a [`Transport`].
pub struct Session<'t, T: Transport, D: Delay> {
    transport: &'t T,
    delay: D,
    domains: Vec<Domain>,
    id: SessionId,
    state: SessionState,
}

impl<'t, T: Transport, D: Delay> Session<'t, T, D> {
    /// Creates a session that will search `domains` in the order given.
    pub fn new(transport: &'t T, delay: D, domains: impl Into<Vec<Domain>>) -> Self {
        Self {
            transport,
            delay,
            domains: domains.into(),
            id: SessionId::new_random(),
            state: SessionState::Uninitialized,
        }
    }

    /// Identifier attached to this session's logs.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    fn enter(&mut self, next: SessionState) {
        tracing::debug!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    /// Runs the full on → wait → off sequence for `duration`.
    ///
    /// # Errors
    ///
    /// Only fatal setup failures are returned:
    /// [`VibratorError::ServiceUnavailable`] and
    /// [`VibratorError::ClientBindFailure`]. The session is in
    /// [`SessionState::Error`] afterwards and holds no resources.
    pub fn run(
        &mut self,
        duration: DurationMs,
        events: &mut impl SessionEvents,
    ) -> Result<SessionReport, VibratorError> {
        let span = info_span!("session", session_id = %self.id, duration_ms = duration.as_i32());
        let _guard = span.enter();
        let started_at = Timestamp::now();

        self.enter(SessionState::Resolving);
        let binding = match resolve(self.transport, &self.domains)
            .and_then(|resolved| adapt(self.transport, resolved))
        {
            Ok(binding) => binding,
            Err(err) => {
                warn!(error = %err, "vibrator initialization failed");
                self.enter(SessionState::Error);
                return Err(err);
            }
        };
        self.enter(SessionState::Adapted);

        let dialect = binding.dialect();
        let (on, off) = self.vibrate(&binding, duration, events);

        teardown(&mut Some(binding));
        self.enter(SessionState::TornDown);
        info!(on = ?on, off = ?off, "session finished");

        Ok(SessionReport {
            session_id: self.id,
            dialect,
            duration,
            on,
            off,
            final_state: self.state,
            started_at,
            finished_at: Timestamp::now(),
        })
    }

    fn vibrate(
        &mut self,
        binding: &Binding<T>,
        duration: DurationMs,
        events: &mut impl SessionEvents,
    ) -> (Outcome, Option<Outcome>) {
        events.bound(binding.dialect());

        self.enter(SessionState::Vibrating);
        let on = binding.execute(self.transport, Operation::On(duration));
        match &on {
            Ok(true) => events.started(duration),
            Ok(false) => events.start_failed(None),
            Err(err) => events.start_failed(Some(err)),
        }
        if !matches!(on, Ok(true)) {
            return (Outcome::from_result(&on), None);
        }

        self.delay.sleep(duration.as_duration());

        self.enter(SessionState::Stopping);
        let off = binding.execute(self.transport, Operation::Off);
        match &off {
            Ok(true) => events.stopped(),
            Ok(false) => events.stop_failed(None),
            Err(err) => events.stop_failed(Some(err)),
        }
        (Outcome::from_result(&on), Some(Outcome::from_result(&off)))
    }
}

/// Releases a binding if one is still held.
///
/// Safe to call any number of times; only the first call releases anything.
pub fn teardown<T: Transport>(binding: &mut Option<Binding<T>>) {
    if let Some(binding) = binding.take() {
        tracing::debug!(dialect = %binding.dialect(), "releasing vibrator binding");
        drop(binding);
    }
}
