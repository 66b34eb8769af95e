//! Error types for the vibrator domain.
//!
//! [`TransportError`] is what a [`crate::Transport`] implementation reports.
//! The resolver, adapter and engine translate it into the session-level
//! taxonomy of [`VibratorError`], which is what callers match on.
//!
//! No variant here is a panic path: every failure is recovered into a value at
//! the boundary of the component that detected it.

use thiserror::Error;

use crate::{DevicePath, InterfaceName, OperationKind};

// ---------------------------------------------------------------------------
// Transport-level errors
// ---------------------------------------------------------------------------

/// Failure reported by a transport provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The device or service could not be reached at all.
    #[error("unavailable: {reason}")]
    Unavailable {
        /// Human-readable cause (e.g. the OS error when opening a device node).
        reason: String,
    },

    /// The transaction completed with a non-OK transport status.
    ///
    /// `code` follows the kernel convention of negative errno values.
    #[error("transaction status {code}")]
    Status {
        /// Raw status code.
        code: i32,
    },

    /// The remote object died before replying.
    #[error("remote object is dead")]
    DeadObject,

    /// The peer sent data that does not follow the expected wire layout.
    #[error("protocol error: {reason}")]
    Protocol {
        /// What was malformed.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Session-level errors
// ---------------------------------------------------------------------------

/// Errors produced while resolving, binding and talking to the vibrator service.
///
/// [`VibratorError::is_fatal`] tells the session controller whether the
/// condition aborts the session (nonzero exit) or is only reported.
#[derive(Debug, Error)]
pub enum VibratorError {
    /// The duration argument is not a positive 32-bit integer.
    ///
    /// Produced before any transport call is made.
    #[error("duration must be a positive integer, got '{input}'")]
    InvalidDuration {
        /// The rejected input, verbatim.
        input: String,
    },

    /// A binder device node could not be opened.
    ///
    /// Never surfaces from the resolver on its own; it is logged and the next
    /// domain is tried.
    #[error("cannot open binder device {device}")]
    ConnectionUnavailable {
        /// Device that failed to open.
        device: DevicePath,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// No domain produced the requested service.
    #[error("vibrator service not found (tried {attempts} domain(s))")]
    ServiceUnavailable {
        /// Number of domains tried before giving up.
        attempts: usize,
    },

    /// A client could not be bound to the resolved endpoint.
    #[error("cannot bind client for {interface}")]
    ClientBindFailure {
        /// Interface the client was being bound to.
        interface: InterfaceName,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// A turn-on request needs a callback object but none was registered.
    #[error("callback object is required by the AIDL dialect but was not registered")]
    CallbackUnavailable,

    /// A transaction was attempted before a dialect was resolved.
    #[error("no interface dialect resolved")]
    InvalidDialect,

    /// The transport reported a non-OK status for a transaction.
    #[error("{operation} transaction failed")]
    TransactionFailed {
        /// Operation that was being performed.
        operation: OperationKind,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// The reply did not contain a readable 32-bit result.
    #[error("{operation} reply carried no result code")]
    DecodeFailure {
        /// Operation whose reply was malformed.
        operation: OperationKind,
    },
}

impl VibratorError {
    /// Returns `true` if the error aborts the session with a failure exit status.
    ///
    /// Argument, resolution and binding failures are fatal. Transaction-level
    /// failures are reported but the session still ends normally.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidDuration { .. }
                | Self::ConnectionUnavailable { .. }
                | Self::ServiceUnavailable { .. }
                | Self::ClientBindFailure { .. }
        )
    }
}
