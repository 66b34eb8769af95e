//! [`vibrator::Transport`] over the Linux binder driver.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, instrument};
use vibrator::{CallbackHandler, DevicePath, InstanceSlot, InterfaceName, Transport, TransportError};

use crate::driver::{Driver, RemoteRef, Reply};
use crate::parcel::Parcel;
use crate::protocol::{RpcProtocol, GET_SERVICE, SERVICE_MANAGER_HANDLE};
use crate::BinderError;

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// An open binder device and the protocol its service manager speaks.
#[derive(Debug)]
pub struct BinderConnection {
    driver: Rc<Driver>,
    protocol: RpcProtocol,
}

impl BinderConnection {
    /// Protocol selected for this device.
    pub fn protocol(&self) -> RpcProtocol {
        self.protocol
    }
}

/// A remote service object returned by the service manager.
#[derive(Debug)]
pub struct BinderEndpoint {
    remote: Rc<RemoteRef>,
    protocol: RpcProtocol,
}

impl BinderEndpoint {
    /// Process-local handle of the service.
    pub fn handle(&self) -> u32 {
        self.remote.handle()
    }
}

/// A service endpoint bound to an interface token.
///
/// Shares the endpoint's reference; the node is released once both are gone.
#[derive(Debug)]
pub struct BinderClient {
    remote: Rc<RemoteRef>,
    protocol: RpcProtocol,
    interface: InterfaceName,
}

/// A local object registered with the driver.
///
/// Dropping it forgets the handler; calls arriving afterwards are refused.
pub struct LocalObject {
    driver: Rc<Driver>,
    id: u64,
    interface: InterfaceName,
}

impl std::fmt::Debug for LocalObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalObject")
            .field("id", &self.id)
            .field("interface", &self.interface)
            .finish()
    }
}

impl Drop for LocalObject {
    fn drop(&mut self) {
        debug!(id = self.id, interface = %self.interface, "unregistering local object");
        self.driver.unregister_local(self.id);
    }
}

/// Request parcel with its interface header already written.
#[derive(Debug)]
pub struct BinderRequest {
    parcel: Parcel,
    protocol: RpcProtocol,
}

impl BinderRequest {
    /// Encoded request.
    pub fn parcel(&self) -> &Parcel {
        &self.parcel
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Binder transport with per-device protocol selection.
///
/// Devices without an explicit entry use [`RpcProtocol::for_device`] with the
/// configured AIDL generation.
#[derive(Debug, Clone, Default)]
pub struct BinderTransport {
    aidl: RpcProtocol,
    devices: HashMap<String, RpcProtocol>,
}

impl BinderTransport {
    /// Creates a transport whose non-`hwbinder` devices speak `aidl`.
    pub fn new(aidl: RpcProtocol) -> Self {
        Self {
            aidl,
            devices: HashMap::new(),
        }
    }

    /// Pins `device` to `protocol`.
    pub fn with_device_protocol(
        mut self,
        device: impl Into<String>,
        protocol: RpcProtocol,
    ) -> Self {
        self.devices.insert(device.into(), protocol);
        self
    }

    /// Protocol used when opening `device`.
    pub fn protocol_for(&self, device: &str) -> RpcProtocol {
        self.devices
            .get(device)
            .copied()
            .unwrap_or_else(|| RpcProtocol::for_device(device, self.aidl))
    }
}

impl Transport for BinderTransport {
    type Connection = BinderConnection;
    type Endpoint = BinderEndpoint;
    type Client = BinderClient;
    type Callback = LocalObject;
    type Request = BinderRequest;
    type Reply = Reply;

    #[instrument(skip(self, device), fields(device = %device))]
    fn open_domain(&self, device: &DevicePath) -> Result<BinderConnection, TransportError> {
        let driver = Driver::open(Path::new(device.as_str()))?;
        let protocol = self.protocol_for(device.as_str());
        debug!(%protocol, "binder domain opened");
        Ok(BinderConnection { driver, protocol })
    }

    #[instrument(skip(self, connection), fields(protocol = %connection.protocol()))]
    fn lookup_service(
        &self,
        connection: &BinderConnection,
        name: &InterfaceName,
        slot: &InstanceSlot,
    ) -> Result<Option<BinderEndpoint>, TransportError> {
        let protocol = connection.protocol();
        let request = protocol.lookup_request(name.as_str(), slot.as_str());
        let mut reply = connection
            .driver
            .transact(SERVICE_MANAGER_HANDLE, GET_SERVICE, 0, &request)?;

        if protocol.lookup_reply_has_status() {
            let status = reply
                .read_i32()
                .ok_or_else(|| BinderError::Malformed("lookup reply without status".into()))?;
            if status != 0 {
                return Err(TransportError::Status { code: status });
            }
        }

        let endpoint = reply.read_remote()?.map(|remote| BinderEndpoint {
            remote: Rc::new(remote),
            protocol,
        });
        debug!(
            handle = ?endpoint.as_ref().map(BinderEndpoint::handle),
            "service manager answered"
        );
        Ok(endpoint)
    }

    fn bind_client(
        &self,
        endpoint: &BinderEndpoint,
        interface: &InterfaceName,
    ) -> Result<BinderClient, TransportError> {
        Ok(BinderClient {
            remote: Rc::clone(&endpoint.remote),
            protocol: endpoint.protocol,
            interface: interface.clone(),
        })
    }

    fn register_callback(
        &self,
        connection: &BinderConnection,
        interface: &InterfaceName,
        handler: Box<dyn CallbackHandler>,
    ) -> Result<LocalObject, TransportError> {
        let id = connection.driver.register_local(handler);
        debug!(id, %interface, "local object registered");
        Ok(LocalObject {
            driver: Rc::clone(&connection.driver),
            id,
            interface: interface.clone(),
        })
    }

    fn new_request(&self, client: &BinderClient) -> BinderRequest {
        let mut parcel = Parcel::new();
        client.protocol.write_header(&mut parcel, client.interface.as_str());
        BinderRequest {
            parcel,
            protocol: client.protocol,
        }
    }

    fn append_int32(&self, request: &mut BinderRequest, value: i32) {
        request.parcel.write_i32(value);
    }

    fn append_object_ref(&self, request: &mut BinderRequest, callback: &LocalObject) {
        request
            .protocol
            .write_local_object(&mut request.parcel, callback.id);
    }

    #[instrument(skip(self, client, request), fields(handle = client.remote.handle()))]
    fn transact_sync(
        &self,
        client: &BinderClient,
        code: u32,
        request: BinderRequest,
    ) -> Result<Reply, TransportError> {
        let remote = &client.remote;
        Ok(remote
            .driver()
            .transact(remote.handle(), code, 0, request.parcel())?)
    }

    fn read_int32(&self, reply: &mut Reply) -> Option<i32> {
        reply.read_i32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_protocols_follow_configuration() {
        let transport = BinderTransport::new(RpcProtocol::Aidl4)
            .with_device_protocol("/dev/vndbinder", RpcProtocol::Aidl2);

        assert_eq!(transport.protocol_for("/dev/hwbinder"), RpcProtocol::Hidl);
        assert_eq!(transport.protocol_for("/dev/binder"), RpcProtocol::Aidl4);
        assert_eq!(transport.protocol_for("/dev/vndbinder"), RpcProtocol::Aidl2);
    }

    #[test]
    fn default_transport_speaks_aidl3() {
        assert_eq!(BinderTransport::default().protocol_for("/dev/binder"), RpcProtocol::Aidl3);
    }

    #[test]
    fn missing_device_is_reported_as_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("binder");
        let device = DevicePath::new(missing.to_string_lossy()).unwrap();

        let err = BinderTransport::default().open_domain(&device).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Unavailable { reason } if reason.contains("cannot open")
        ));
    }
}
