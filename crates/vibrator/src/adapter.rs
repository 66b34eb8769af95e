//! Binding a resolved service to a dialect-aware client.

use tracing::{debug, info, warn};

use crate::engine;
use crate::protocol::AIDL_CALLBACK_INTERFACE;
use crate::{
    InterfaceDialect, InterfaceName, NoopCallback, Operation, ResolvedService, Transport,
    VibratorError,
};

/// Everything a session needs to issue vibrator transactions.
///
/// Owns the whole resource chain. Fields drop in declaration order, which is
/// the reverse of acquisition: callback, client, endpoint, connection.
pub struct Binding<T: Transport> {
    callback: Option<T::Callback>,
    client: T::Client,
    endpoint: T::Endpoint,
    connection: T::Connection,
    dialect: InterfaceDialect,
    interface: InterfaceName,
}

impl<T: Transport> Binding<T> {
    /// Dialect the client speaks.
    pub fn dialect(&self) -> InterfaceDialect {
        self.dialect
    }

    /// Interface descriptor the client is bound to.
    pub fn interface(&self) -> &InterfaceName {
        &self.interface
    }

    /// Returns `true` if a callback object was registered.
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Runs `operation` through the transaction engine.
    pub fn execute(&self, transport: &T, operation: Operation) -> Result<bool, VibratorError> {
        engine::execute(
            transport,
            &self.client,
            self.dialect,
            self.callback.as_ref(),
            operation,
        )
    }

    /// Bound client.
    pub fn client(&self) -> &T::Client {
        &self.client
    }

    /// Underlying connection.
    pub fn connection(&self) -> &T::Connection {
        &self.connection
    }

    /// Underlying remote endpoint.
    pub fn endpoint(&self) -> &T::Endpoint {
        &self.endpoint
    }
}

impl<T: Transport> std::fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("dialect", &self.dialect)
            .field("interface", &self.interface)
            .field("has_callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

/// Builds a [`Binding`] for a resolved service.
///
/// Under [`InterfaceDialect::ModernAidl`] a no-op callback object is registered
/// as well. Failing to register it is logged and tolerated here; the engine
/// refuses turn-on requests later if it is missing.
///
/// # Errors
///
/// [`VibratorError::ClientBindFailure`] if the client cannot be bound. The
/// endpoint and connection are released before returning.
pub fn adapt<T: Transport>(
    transport: &T,
    resolved: ResolvedService<T>,
) -> Result<Binding<T>, VibratorError> {
    let ResolvedService {
        endpoint,
        connection,
        dialect,
        interface,
    } = resolved;

    let client = match transport.bind_client(&endpoint, &interface) {
        Ok(client) => client,
        Err(source) => {
            drop(endpoint);
            drop(connection);
            return Err(VibratorError::ClientBindFailure { interface, source });
        }
    };
    debug!(%interface, "client bound");

    let callback = if dialect.requires_callback() {
        let name = InterfaceName::from_static(AIDL_CALLBACK_INTERFACE);
        match transport.register_callback(&connection, &name, Box::new(NoopCallback)) {
            Ok(callback) => Some(callback),
            Err(error) => {
                warn!(
                    callback = %name,
                    %error,
                    "callback registration failed, turn-on will be refused"
                );
                None
            }
        }
    } else {
        None
    };

    info!(%dialect, %interface, "vibrator interface adapted");
    Ok(Binding {
        callback,
        client,
        endpoint,
        connection,
        dialect,
        interface,
    })
}
