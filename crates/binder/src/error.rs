//! Errors raised by the binder driver layer.

use std::path::PathBuf;

use thiserror::Error;
use vibrator::TransportError;

/// Failure while talking to the binder driver.
#[derive(Debug, Error)]
pub enum BinderError {
    /// The device node could not be opened.
    #[error("cannot open {path}: {source}")]
    Open {
        /// Device node path.
        path: PathBuf,
        /// OS error.
        #[source]
        source: std::io::Error,
    },

    /// The driver speaks a protocol version this crate does not implement.
    #[error("unsupported binder protocol version {found}")]
    Version {
        /// Version reported by `BINDER_VERSION`.
        found: i32,
    },

    /// The receive buffer could not be mapped.
    #[error("cannot map binder buffer: {0}")]
    Map(#[source] std::io::Error),

    /// An `ioctl` on the device failed.
    #[error("{op} failed: {source}")]
    Ioctl {
        /// Which request failed.
        op: &'static str,
        /// errno.
        #[source]
        source: nix::Error,
    },

    /// The target process died before replying.
    #[error("dead reply")]
    DeadReply,

    /// The driver could not deliver the transaction.
    #[error("failed reply")]
    FailedReply,

    /// The target process is frozen.
    #[error("frozen reply")]
    FrozenReply,

    /// The driver or the remote reported a status code.
    #[error("status {0}")]
    Status(i32),

    /// The driver returned data this crate cannot interpret.
    #[error("malformed driver data: {0}")]
    Malformed(String),
}

impl From<BinderError> for TransportError {
    fn from(err: BinderError) -> Self {
        match err {
            BinderError::DeadReply => TransportError::DeadObject,
            BinderError::Status(code) => TransportError::Status { code },
            BinderError::FailedReply => TransportError::Status {
                code: -libc::EPIPE,
            },
            BinderError::FrozenReply => TransportError::Status {
                code: -libc::EAGAIN,
            },
            BinderError::Malformed(reason) => TransportError::Protocol { reason },
            other @ (BinderError::Open { .. }
            | BinderError::Version { .. }
            | BinderError::Map(_)
            | BinderError::Ioctl { .. }) => TransportError::Unavailable {
                reason: other.to_string(),
            },
        }
    }
}
