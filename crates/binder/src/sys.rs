//! Kernel ABI of the binder driver (`include/uapi/linux/android/binder.h`).
//!
//! Only the 64-bit layout (`binder_uintptr_t` = `u64`, protocol version 8) is
//! supported. Command payloads are serialized by hand in native byte order
//! rather than transmuted from `repr(C)` structs; only the two structs passed
//! directly to `ioctl` are `repr(C)`.

use std::os::fd::RawFd;

/// Protocol version reported by `BINDER_VERSION` on 64-bit kernels.
pub const PROTOCOL_VERSION: i32 = 8;

// ---------------------------------------------------------------------------
// ioctl structs
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Debug, Default)]
pub struct BinderWriteRead {
    pub write_size: u64,
    pub write_consumed: u64,
    pub write_buffer: u64,
    pub read_size: u64,
    pub read_consumed: u64,
    pub read_buffer: u64,
}

#[repr(C)]
#[derive(Debug, Default)]
pub struct BinderVersion {
    pub protocol_version: i32,
}

nix::ioctl_readwrite!(binder_write_read, b'b', 1, BinderWriteRead);
nix::ioctl_write_ptr!(binder_set_max_threads, b'b', 5, u32);
nix::ioctl_readwrite!(binder_version, b'b', 9, BinderVersion);

/// Runs `BINDER_WRITE_READ` on `fd`.
pub fn write_read(fd: RawFd, bwr: &mut BinderWriteRead) -> nix::Result<()> {
    // SAFETY: `bwr` is a valid, exclusively borrowed `binder_write_read`; the
    // buffers it points at are kept alive by the caller for the duration of the call.
    unsafe { binder_write_read(fd, bwr) }.map(drop)
}

/// Queries the driver protocol version.
pub fn version(fd: RawFd) -> nix::Result<i32> {
    let mut v = BinderVersion::default();
    // SAFETY: `v` is a valid `binder_version` the kernel writes into.
    unsafe { binder_version(fd, &mut v) }?;
    Ok(v.protocol_version)
}

/// Sets the number of looper threads the driver may ask this process to spawn.
pub fn set_max_threads(fd: RawFd, count: u32) -> nix::Result<()> {
    // SAFETY: the kernel only reads the `u32` behind the pointer.
    unsafe { binder_set_max_threads(fd, &count) }.map(drop)
}

// ---------------------------------------------------------------------------
// Command codes
// ---------------------------------------------------------------------------

const IOC_NONE: u32 = 0;
const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const fn ioc(dir: u32, ty: u8, nr: u32, size: usize) -> u32 {
    (dir << 30) | ((size as u32) << 16) | ((ty as u32) << 8) | nr
}

/// Payload size encoded in a command code.
pub const fn payload_size(cmd: u32) -> usize {
    ((cmd >> 16) & 0x3fff) as usize
}

/// Size of `binder_transaction_data`.
pub const TRANSACTION_DATA_SIZE: usize = 64;
/// Size of `binder_transaction_data_sg`.
pub const TRANSACTION_DATA_SG_SIZE: usize = TRANSACTION_DATA_SIZE + 8;
/// Size of `binder_ptr_cookie`.
const PTR_COOKIE_SIZE: usize = 16;

pub const BC_TRANSACTION: u32 = ioc(IOC_WRITE, b'c', 0, TRANSACTION_DATA_SIZE);
pub const BC_REPLY: u32 = ioc(IOC_WRITE, b'c', 1, TRANSACTION_DATA_SIZE);
pub const BC_FREE_BUFFER: u32 = ioc(IOC_WRITE, b'c', 3, 8);
pub const BC_INCREFS: u32 = ioc(IOC_WRITE, b'c', 4, 4);
pub const BC_ACQUIRE: u32 = ioc(IOC_WRITE, b'c', 5, 4);
pub const BC_RELEASE: u32 = ioc(IOC_WRITE, b'c', 6, 4);
pub const BC_DECREFS: u32 = ioc(IOC_WRITE, b'c', 7, 4);
pub const BC_INCREFS_DONE: u32 = ioc(IOC_WRITE, b'c', 8, PTR_COOKIE_SIZE);
pub const BC_ACQUIRE_DONE: u32 = ioc(IOC_WRITE, b'c', 9, PTR_COOKIE_SIZE);
pub const BC_TRANSACTION_SG: u32 = ioc(IOC_WRITE, b'c', 17, TRANSACTION_DATA_SG_SIZE);

pub const BR_ERROR: u32 = ioc(IOC_READ, b'r', 0, 4);
pub const BR_OK: u32 = ioc(IOC_NONE, b'r', 1, 0);
pub const BR_TRANSACTION: u32 = ioc(IOC_READ, b'r', 2, TRANSACTION_DATA_SIZE);
pub const BR_REPLY: u32 = ioc(IOC_READ, b'r', 3, TRANSACTION_DATA_SIZE);
pub const BR_DEAD_REPLY: u32 = ioc(IOC_NONE, b'r', 5, 0);
pub const BR_TRANSACTION_COMPLETE: u32 = ioc(IOC_NONE, b'r', 6, 0);
pub const BR_INCREFS: u32 = ioc(IOC_READ, b'r', 7, PTR_COOKIE_SIZE);
pub const BR_ACQUIRE: u32 = ioc(IOC_READ, b'r', 8, PTR_COOKIE_SIZE);
pub const BR_RELEASE: u32 = ioc(IOC_READ, b'r', 9, PTR_COOKIE_SIZE);
pub const BR_DECREFS: u32 = ioc(IOC_READ, b'r', 10, PTR_COOKIE_SIZE);
pub const BR_NOOP: u32 = ioc(IOC_NONE, b'r', 12, 0);
pub const BR_SPAWN_LOOPER: u32 = ioc(IOC_NONE, b'r', 13, 0);
pub const BR_FAILED_REPLY: u32 = ioc(IOC_NONE, b'r', 17, 0);
pub const BR_FROZEN_REPLY: u32 = ioc(IOC_NONE, b'r', 18, 0);

// ---------------------------------------------------------------------------
// Transaction flags and object types
// ---------------------------------------------------------------------------

pub const TF_ONE_WAY: u32 = 0x01;
pub const TF_STATUS_CODE: u32 = 0x08;
pub const TF_ACCEPT_FDS: u32 = 0x10;

const fn pack_chars(c1: u8, c2: u8, c3: u8, c4: u8) -> u32 {
    ((c1 as u32) << 24) | ((c2 as u32) << 16) | ((c3 as u32) << 8) | (c4 as u32)
}

pub const BINDER_TYPE_BINDER: u32 = pack_chars(b's', b'b', b'*', 0x85);
pub const BINDER_TYPE_HANDLE: u32 = pack_chars(b's', b'h', b'*', 0x85);
pub const BINDER_TYPE_PTR: u32 = pack_chars(b'p', b't', b'*', 0x85);

/// Size of `flat_binder_object`.
pub const FLAT_BINDER_OBJECT_SIZE: usize = 24;
/// Size of `binder_buffer_object`.
pub const BUFFER_OBJECT_SIZE: usize = 40;

pub const FLAT_BINDER_FLAG_PRIORITY_MASK: u32 = 0xff;
pub const FLAT_BINDER_FLAG_ACCEPTS_FDS: u32 = 0x100;
pub const BINDER_BUFFER_FLAG_HAS_PARENT: u32 = 0x01;

// ---------------------------------------------------------------------------
// binder_transaction_data
// ---------------------------------------------------------------------------

/// Decoded `binder_transaction_data`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionData {
    /// Handle (outgoing) or node pointer (incoming).
    pub target: u64,
    pub cookie: u64,
    pub code: u32,
    pub flags: u32,
    pub sender_pid: i32,
    pub sender_euid: u32,
    pub data_size: u64,
    pub offsets_size: u64,
    pub buffer: u64,
    pub offsets: u64,
}

impl TransactionData {
    /// Appends the kernel layout of `self` to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.target.to_ne_bytes());
        out.extend_from_slice(&self.cookie.to_ne_bytes());
        out.extend_from_slice(&self.code.to_ne_bytes());
        out.extend_from_slice(&self.flags.to_ne_bytes());
        out.extend_from_slice(&self.sender_pid.to_ne_bytes());
        out.extend_from_slice(&self.sender_euid.to_ne_bytes());
        out.extend_from_slice(&self.data_size.to_ne_bytes());
        out.extend_from_slice(&self.offsets_size.to_ne_bytes());
        out.extend_from_slice(&self.buffer.to_ne_bytes());
        out.extend_from_slice(&self.offsets.to_ne_bytes());
    }

    /// Decodes the kernel layout. Returns `None` if `bytes` is too short.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < TRANSACTION_DATA_SIZE {
            return None;
        }
        Some(Self {
            target: read_u64(bytes, 0),
            cookie: read_u64(bytes, 8),
            code: read_u32(bytes, 16),
            flags: read_u32(bytes, 20),
            sender_pid: read_u32(bytes, 24) as i32,
            sender_euid: read_u32(bytes, 28),
            data_size: read_u64(bytes, 32),
            offsets_size: read_u64(bytes, 40),
            buffer: read_u64(bytes, 48),
            offsets: read_u64(bytes, 56),
        })
    }
}

/// Reads a native-endian `u32` at `at`. Callers check bounds.
pub(crate) fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&bytes[at..at + 4]);
    u32::from_ne_bytes(b)
}

/// Reads a native-endian `u64` at `at`. Callers check bounds.
pub(crate) fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&bytes[at..at + 8]);
    u64::from_ne_bytes(b)
}
