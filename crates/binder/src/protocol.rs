//! Service-manager RPC protocols.
//!
//! HIDL and the successive AIDL generations differ in the interface header at
//! the front of every request, in whether the service manager prefixes its
//! `getService` reply with a status word, and in how local objects are
//! annotated. [`RpcProtocol`] captures those differences so the transport can
//! stay generation-agnostic.

use serde::{Deserialize, Serialize};

use crate::parcel::Parcel;

/// `StrictMode` penalty bits sent in the AIDL interface header.
pub const STRICT_MODE_PENALTY_GATHER: i32 = 0x40 << 16;
/// Work source UID meaning "unset" (Android 10+).
pub const UNSET_WORK_SOURCE: i32 = -1;
/// Header marker `'SYST'` (Android 11+).
pub const SYSTEM_HEADER: i32 = 0x5359_5354;
/// Stability level of objects exported to vendor services.
pub const STABILITY_VINTF: i32 = 0x3f;

/// HIDL service manager interface.
pub const HIDL_SERVICE_MANAGER: &str = "android.hidl.manager@1.0::IServiceManager";
/// AIDL service manager interface.
pub const AIDL_SERVICE_MANAGER: &str = "android.os.IServiceManager";

/// `get` (HIDL) / `getService` (AIDL) transaction code.
pub const GET_SERVICE: u32 = 1;
/// Handle of the context manager on every binder device.
pub const SERVICE_MANAGER_HANDLE: u32 = 0;

/// Wire protocol spoken on one binder device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcProtocol {
    /// `hwbinder` HIDL.
    Hidl,
    /// AIDL up to Android 9.
    Aidl,
    /// AIDL on Android 10.
    Aidl2,
    /// AIDL on Android 11.
    #[default]
    Aidl3,
    /// AIDL on Android 12 and later.
    Aidl4,
}

impl RpcProtocol {
    /// Protocol used for a device when nothing is configured for it.
    ///
    /// `hwbinder` nodes speak HIDL; everything else speaks `aidl`.
    pub fn for_device(device: &str, aidl: RpcProtocol) -> Self {
        if device.contains("hwbinder") {
            RpcProtocol::Hidl
        } else {
            aidl
        }
    }

    /// Interface token of the service manager reachable over this protocol.
    pub fn service_manager_interface(self) -> &'static str {
        match self {
            RpcProtocol::Hidl => HIDL_SERVICE_MANAGER,
            _ => AIDL_SERVICE_MANAGER,
        }
    }

    /// Writes the interface header every request begins with.
    pub fn write_header(self, parcel: &mut Parcel, interface: &str) {
        match self {
            RpcProtocol::Hidl => parcel.write_cstring(interface),
            RpcProtocol::Aidl => {
                parcel.write_i32(STRICT_MODE_PENALTY_GATHER);
                parcel.write_string16(interface);
            }
            RpcProtocol::Aidl2 => {
                parcel.write_i32(STRICT_MODE_PENALTY_GATHER);
                parcel.write_i32(UNSET_WORK_SOURCE);
                parcel.write_string16(interface);
            }
            RpcProtocol::Aidl3 | RpcProtocol::Aidl4 => {
                parcel.write_i32(STRICT_MODE_PENALTY_GATHER);
                parcel.write_i32(UNSET_WORK_SOURCE);
                parcel.write_i32(SYSTEM_HEADER);
                parcel.write_string16(interface);
            }
        }
    }

    /// Writes a strong reference to local object `id`.
    pub fn write_local_object(self, parcel: &mut Parcel, id: u64) {
        parcel.write_local_binder(id);
        if self == RpcProtocol::Aidl4 {
            parcel.write_i32(STABILITY_VINTF);
        }
    }

    /// Builds the service-manager request that looks up `interface/slot`.
    pub fn lookup_request(self, interface: &str, slot: &str) -> Parcel {
        let mut parcel = Parcel::new();
        self.write_header(&mut parcel, self.service_manager_interface());
        match self {
            RpcProtocol::Hidl => {
                parcel.write_hidl_string(interface);
                parcel.write_hidl_string(slot);
            }
            _ => parcel.write_string16(&format!("{interface}/{slot}")),
        }
        parcel
    }

    /// Whether the service manager's lookup reply starts with a status word.
    pub fn lookup_reply_has_status(self) -> bool {
        !matches!(self, RpcProtocol::Aidl | RpcProtocol::Aidl2)
    }
}

impl std::fmt::Display for RpcProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RpcProtocol::Hidl => "hidl",
            RpcProtocol::Aidl => "aidl",
            RpcProtocol::Aidl2 => "aidl2",
            RpcProtocol::Aidl3 => "aidl3",
            RpcProtocol::Aidl4 => "aidl4",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parcel::ParcelReader;
    use crate::sys;

    fn header_words(protocol: RpcProtocol) -> Vec<i32> {
        let mut p = Parcel::new();
        protocol.write_header(&mut p, "x");
        let mut r = ParcelReader::new(p.data(), p.offsets());
        std::iter::from_fn(|| r.read_i32()).collect()
    }

    #[test]
    fn hidl_header_is_a_plain_c_string() {
        let mut p = Parcel::new();
        RpcProtocol::Hidl.write_header(&mut p, "android.hardware.vibrator@1.0::IVibrator");
        assert_eq!(&p.data()[..8], b"android.");
        assert_eq!(p.data().len() % 4, 0);
        assert_eq!(p.data()[40], 0);
    }

    #[test]
    fn aidl_headers_grow_with_each_generation() {
        // "x" as String16: length 1, then 'x' + NUL as one padded word.
        let token = [1, i32::from_ne_bytes([b'x', 0, 0, 0])];

        assert_eq!(
            header_words(RpcProtocol::Aidl),
            [&[STRICT_MODE_PENALTY_GATHER][..], &token].concat()
        );
        assert_eq!(
            header_words(RpcProtocol::Aidl2),
            [&[STRICT_MODE_PENALTY_GATHER, -1][..], &token].concat()
        );
        for protocol in [RpcProtocol::Aidl3, RpcProtocol::Aidl4] {
            assert_eq!(
                header_words(protocol),
                [&[STRICT_MODE_PENALTY_GATHER, -1, 0x5359_5354][..], &token].concat()
            );
        }
    }

    #[test]
    fn only_aidl4_marks_local_object_stability() {
        let mut p = Parcel::new();
        RpcProtocol::Aidl3.write_local_object(&mut p, 7);
        assert_eq!(p.data().len(), sys::FLAT_BINDER_OBJECT_SIZE);

        let mut p = Parcel::new();
        RpcProtocol::Aidl4.write_local_object(&mut p, 7);
        assert_eq!(p.data().len(), sys::FLAT_BINDER_OBJECT_SIZE + 4);
        assert_eq!(sys::read_u32(p.data(), sys::FLAT_BINDER_OBJECT_SIZE), 0x3f);
    }

    #[test]
    fn hidl_lookup_uses_scatter_gather_strings() {
        let p = RpcProtocol::Hidl
            .lookup_request("android.hardware.vibrator@1.0::IVibrator", "default");
        assert_eq!(p.offsets().len(), 4);
        assert!(p.buffers_size() > 0);
        assert!(p.data().starts_with(b"android.hidl.manager@1.0::IServiceManager\0"));
    }

    #[test]
    fn aidl_lookup_sends_name_and_slot_joined() {
        let p = RpcProtocol::Aidl.lookup_request("android.hardware.vibrator.IVibrator", "default");
        assert!(p.offsets().is_empty());
        assert_eq!(p.buffers_size(), 0);

        let mut r = ParcelReader::new(p.data(), p.offsets());
        assert_eq!(r.read_i32(), Some(STRICT_MODE_PENALTY_GATHER));
        // Service manager token, then the joined name.
        let token_len = r.read_i32().unwrap();
        assert_eq!(token_len as usize, AIDL_SERVICE_MANAGER.len());
        let name = "android.hardware.vibrator.IVibrator/default";
        let token_bytes = (token_len as usize + 1) * 2;
        let mut r = ParcelReader::at(p.data(), p.offsets(), 8 + ((token_bytes + 3) & !3));
        assert_eq!(r.read_i32(), Some(name.len() as i32));
    }

    #[test]
    fn device_name_selects_default_protocol() {
        assert_eq!(RpcProtocol::for_device("/dev/hwbinder", RpcProtocol::Aidl3), RpcProtocol::Hidl);
        assert_eq!(RpcProtocol::for_device("/dev/binder", RpcProtocol::Aidl4), RpcProtocol::Aidl4);
        assert_eq!(
            RpcProtocol::for_device("/dev/vndbinder", RpcProtocol::default()),
            RpcProtocol::Aidl3
        );
    }

    #[test]
    fn lookup_status_word_depends_on_generation() {
        assert!(RpcProtocol::Hidl.lookup_reply_has_status());
        assert!(!RpcProtocol::Aidl.lookup_reply_has_status());
        assert!(!RpcProtocol::Aidl2.lookup_reply_has_status());
        assert!(RpcProtocol::Aidl3.lookup_reply_has_status());
    }
}
