//! The transaction engine: one request, one blocking reply, one verdict.
//!
//! Each call builds a fresh request, sends it with the opcode from
//! [`crate::protocol::opcode`], and reads a single `i32` result from the reply.
//! Request and reply are owned by the call and dropped before it returns.

use tracing::{debug, warn};

use crate::protocol::opcode;
use crate::{InterfaceDialect, Operation, Transport, VibratorError};

/// Executes `operation` through `client`.
///
/// Returns `Ok(true)` when the service replied with result code `0`, and
/// `Ok(false)` for any other result code.
///
/// # Errors
///
/// - [`VibratorError::InvalidDialect`] if `dialect` is unresolved.
/// - [`VibratorError::CallbackUnavailable`] for a turn-on under
///   [`InterfaceDialect::ModernAidl`] without a callback.
/// - [`VibratorError::TransactionFailed`] if the transport reports a non-OK status.
/// - [`VibratorError::DecodeFailure`] if the reply carries no result code.
///
/// The first two are detected before any transport call.
pub fn execute<T: Transport>(
    transport: &T,
    client: &T::Client,
    dialect: InterfaceDialect,
    callback: Option<&T::Callback>,
    operation: Operation,
) -> Result<bool, VibratorError> {
    let kind = operation.kind();
    let code = opcode(dialect, kind).ok_or(VibratorError::InvalidDialect)?;

    let callback = if dialect.requires_callback() && matches!(operation, Operation::On(_)) {
        Some(callback.ok_or(VibratorError::CallbackUnavailable)?)
    } else {
        None
    };

    let mut request = transport.new_request(client);
    if let Operation::On(duration) = operation {
        transport.append_int32(&mut request, duration.as_i32());
        if let Some(callback) = callback {
            transport.append_object_ref(&mut request, callback);
        }
    }

    debug!(operation = %kind, %dialect, opcode = %code, "sending transaction");
    let mut reply = transport
        .transact_sync(client, code.as_u32(), request)
        .map_err(|source| {
            warn!(operation = %kind, error = %source, "transaction failed");
            VibratorError::TransactionFailed {
                operation: kind,
                source,
            }
        })?;

    let result = transport
        .read_int32(&mut reply)
        .ok_or(VibratorError::DecodeFailure { operation: kind })?;
    debug!(operation = %kind, result, "transaction replied");

    Ok(result == 0)
}
