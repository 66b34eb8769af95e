//! Wire-level constants of the two vibrator interface generations.
//!
//! | Dialect | Device | On | Off | On payload |
//! |---------|--------|----|-----|------------|
//! | HIDL 1.0 | `/dev/hwbinder` | 1 | 2 | `int32` duration |
//! | AIDL | `/dev/binder` | 3 | 2 | `int32` duration, callback binder |
//!
//! Off is `2` in both generations. That is a coincidence of the two interface
//! definitions, not a shared code: the table is always keyed by dialect first.

use serde::{Deserialize, Serialize};

use crate::{DevicePath, DurationMs, InstanceSlot, InterfaceDialect, InterfaceName};

/// Default HIDL binder device.
pub const HIDL_DEVICE: &str = "/dev/hwbinder";
/// Default AIDL binder device.
pub const AIDL_DEVICE: &str = "/dev/binder";

/// HIDL vibrator interface descriptor.
pub const HIDL_INTERFACE: &str = "android.hardware.vibrator@1.0::IVibrator";
/// AIDL vibrator interface descriptor.
pub const AIDL_INTERFACE: &str = "android.hardware.vibrator.IVibrator";
/// Descriptor of the completion callback passed to AIDL `on()`.
pub const AIDL_CALLBACK_INTERFACE: &str = "android.hardware.vibrator.IVibratorCallback";
/// Instance slot both generations register under.
pub const DEFAULT_SLOT: &str = "default";

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Logical operation without its payload. Used as the opcode table key and in
/// error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Turn the actuator on.
    On,
    /// Turn the actuator off.
    Off,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::On => "on",
            Self::Off => "off",
        })
    }
}

/// A request to the vibrator service, with its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Vibrate for the given duration.
    On(DurationMs),
    /// Stop vibrating.
    Off,
}

impl Operation {
    /// Returns the payload-free kind of this operation.
    pub fn kind(self) -> OperationKind {
        match self {
            Self::On(_) => OperationKind::On,
            Self::Off => OperationKind::Off,
        }
    }
}

// ---------------------------------------------------------------------------
// Opcode table
// ---------------------------------------------------------------------------

/// Transaction code sent with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Opcode(u32);

impl Opcode {
    /// Returns the raw transaction code.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Looks up the transaction code for `kind` under `dialect`.
///
/// Returns `None` for [`InterfaceDialect::None`].
pub fn opcode(dialect: InterfaceDialect, kind: OperationKind) -> Option<Opcode> {
    let code = match (dialect, kind) {
        (InterfaceDialect::LegacyHidl, OperationKind::On) => 1,
        (InterfaceDialect::LegacyHidl, OperationKind::Off) => 2,
        (InterfaceDialect::ModernAidl, OperationKind::On) => 3,
        (InterfaceDialect::ModernAidl, OperationKind::Off) => 2,
        (InterfaceDialect::None, _) => return None,
    };
    Some(Opcode(code))
}

// ---------------------------------------------------------------------------
// Domains
// ---------------------------------------------------------------------------

/// One place the vibrator service may live: a binder device plus the name it is
/// registered under there, tagged with the dialect it speaks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Dialect spoken by a service found in this domain.
    pub dialect: InterfaceDialect,
    /// Binder device node to open.
    pub device: DevicePath,
    /// Interface descriptor to look up and bind.
    pub interface: InterfaceName,
    /// Instance slot to look up.
    pub slot: InstanceSlot,
}

/// Builds the search list: HIDL first, AIDL second.
///
/// Only the device paths are adjustable; the order and names are fixed.
pub fn search_order(hidl_device: DevicePath, aidl_device: DevicePath) -> [Domain; 2] {
    [
        Domain {
            dialect: InterfaceDialect::LegacyHidl,
            device: hidl_device,
            interface: InterfaceName::from_static(HIDL_INTERFACE),
            slot: InstanceSlot::from_static(DEFAULT_SLOT),
        },
        Domain {
            dialect: InterfaceDialect::ModernAidl,
            device: aidl_device,
            interface: InterfaceName::from_static(AIDL_INTERFACE),
            slot: InstanceSlot::from_static(DEFAULT_SLOT),
        },
    ]
}

/// [`search_order`] with the standard device nodes.
pub fn default_search_order() -> [Domain; 2] {
    search_order(
        DevicePath::from_static(HIDL_DEVICE),
        DevicePath::from_static(AIDL_DEVICE),
    )
}
