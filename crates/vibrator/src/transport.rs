//! The transport port: everything the domain needs from a binder implementation.
//!
//! The domain never opens devices or marshals bytes itself. It sequences calls
//! on a [`Transport`], whose associated handle types own the kernel resources
//! behind them and release those resources when dropped. Dropping is the only
//! release path, so a handle cannot be released twice, and a handle that was
//! never acquired (an empty `Option`) has nothing to release.

use crate::{DevicePath, InstanceSlot, InterfaceName, TransportError};

/// Receiver for transactions sent to a locally registered object.
pub trait CallbackHandler {
    /// Handles one incoming transaction with the given code.
    ///
    /// Returning `Some(status)` makes the transport reply with that status; `None`
    /// replies with an empty parcel (or not at all for one-way calls).
    fn on_transaction(&self, code: u32) -> Option<i32>;
}

/// Callback handler that accepts every transaction and does nothing.
///
/// The AIDL `on()` method insists on a callback binder, but this client never
/// waits for the completion notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCallback;

impl CallbackHandler for NoopCallback {
    fn on_transaction(&self, _code: u32) -> Option<i32> {
        None
    }
}

/// Synchronous binder transport.
///
/// Every method blocks the calling thread until the kernel (or the remote
/// service) answers. No timeouts are applied at this layer.
pub trait Transport {
    /// An open binder device together with its service manager.
    type Connection;
    /// A reference to a remote service object.
    type Endpoint;
    /// An endpoint bound to an interface descriptor.
    type Client;
    /// A local object registered with the driver.
    type Callback;
    /// Request parcel under construction. Starts with the interface header.
    type Request;
    /// Reply parcel being read.
    type Reply;

    /// Opens the binder device at `device`.
    fn open_domain(&self, device: &DevicePath) -> Result<Self::Connection, TransportError>;

    /// Asks the service manager of `connection` for `name/slot`.
    ///
    /// `Ok(None)` means the service manager answered but has no such service.
    fn lookup_service(
        &self,
        connection: &Self::Connection,
        name: &InterfaceName,
        slot: &InstanceSlot,
    ) -> Result<Option<Self::Endpoint>, TransportError>;

    /// Binds `endpoint` to `interface` so requests carry the right header.
    fn bind_client(
        &self,
        endpoint: &Self::Endpoint,
        interface: &InterfaceName,
    ) -> Result<Self::Client, TransportError>;

    /// Registers a local object named `interface` on `connection`.
    fn register_callback(
        &self,
        connection: &Self::Connection,
        interface: &InterfaceName,
        handler: Box<dyn CallbackHandler>,
    ) -> Result<Self::Callback, TransportError>;

    /// Starts a new request addressed through `client`.
    fn new_request(&self, client: &Self::Client) -> Self::Request;

    /// Appends a signed 32-bit integer.
    fn append_int32(&self, request: &mut Self::Request, value: i32);

    /// Appends a strong reference to a local object.
    fn append_object_ref(&self, request: &mut Self::Request, callback: &Self::Callback);

    /// Sends `request` with `code` and waits for the reply.
    fn transact_sync(
        &self,
        client: &Self::Client,
        code: u32,
        request: Self::Request,
    ) -> Result<Self::Reply, TransportError>;

    /// Reads the next signed 32-bit integer, or `None` if the reply is exhausted.
    fn read_int32(&self, reply: &mut Self::Reply) -> Option<i32>;
}
