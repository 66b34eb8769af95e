//! Binder driver adapter.
//!
//! Implements the [`vibrator::Transport`] trait directly on top of the Linux
//! binder driver: device `ioctl`s, parcel encoding, and the service-manager
//! protocols of the HIDL (`/dev/hwbinder`) and AIDL (`/dev/binder`) domains.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Kernel structures, reference counting of remote nodes,
//! local callback objects and wire layouts all live here. The [`vibrator`]
//! crate sees only [`vibrator::Transport`].
//!
//! ## Protocols
//!
//! The protocol of each device is selected by configuration:
//!
//! - `hidl`: `hwservicemanager`; C-string interface tokens and scatter-gather
//!   `hidl_string` arguments.
//! - `aidl`, `aidl2`, `aidl3`, `aidl4`: `servicemanager` for Android 9, 10, 11
//!   and 12+ respectively. They differ in the request header and in the
//!   stability marker appended to local objects.
//!
//! Devices whose path contains `hwbinder` default to `hidl`; all others default
//! to `aidl3`.
//!
//! ## Threading
//!
//! Everything here is single-threaded (`Rc`, `RefCell`). The driver is told not
//! to spawn looper threads; incoming calls to local objects are served only
//! while the calling thread waits for a reply.

pub mod driver;
pub mod error;
pub mod parcel;
pub mod protocol;
pub mod sys;
pub mod transport;

pub use driver::{Driver, RemoteRef, Reply};
pub use error::BinderError;
pub use parcel::{FlatObject, Parcel, ParcelReader};
pub use protocol::RpcProtocol;
pub use transport::{
    BinderClient, BinderConnection, BinderEndpoint, BinderRequest, BinderTransport, LocalObject,
};
