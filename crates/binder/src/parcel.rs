//! Parcel encoding: the byte container carried by a binder transaction.
//!
//! A parcel is a 4-byte aligned data area plus an offsets table listing where
//! kernel objects (binders, handles, scatter-gather buffers) sit inside it. HIDL
//! parcels additionally own the out-of-line buffers their buffer objects point
//! at; those must outlive the `ioctl` that sends the parcel, which is why the
//! parcel keeps them in boxed slices that never move.

use crate::sys::{
    self, BINDER_BUFFER_FLAG_HAS_PARENT, BINDER_TYPE_BINDER, BINDER_TYPE_HANDLE, BINDER_TYPE_PTR,
    BUFFER_OBJECT_SIZE, FLAT_BINDER_FLAG_ACCEPTS_FDS, FLAT_BINDER_FLAG_PRIORITY_MASK,
    FLAT_BINDER_OBJECT_SIZE,
};

/// Size of the in-memory `hidl_string` struct.
const HIDL_STRING_SIZE: usize = 16;
/// Priority bits HIDL and AIDL set on local objects.
const LOCAL_OBJECT_FLAGS: u32 =
    (0x7f & FLAT_BINDER_FLAG_PRIORITY_MASK) | FLAT_BINDER_FLAG_ACCEPTS_FDS;

fn align4(n: usize) -> usize {
    (n + 3) & !3
}

fn align8(n: usize) -> usize {
    (n + 7) & !7
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Outgoing parcel.
#[derive(Debug, Default)]
pub struct Parcel {
    data: Vec<u8>,
    offsets: Vec<u64>,
    buffers: Vec<Box<[u8]>>,
    buffers_size: u64,
}

impl Parcel {
    /// Creates an empty parcel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialized data area.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Object offsets into [`Parcel::data`].
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Total aligned size of out-of-line buffers (`buffers_size` of an SG transaction).
    pub fn buffers_size(&self) -> u64 {
        self.buffers_size
    }

    fn pad_to_4(&mut self) {
        let padded = align4(self.data.len());
        self.data.resize(padded, 0);
    }

    /// Appends a signed 32-bit integer.
    pub fn write_i32(&mut self, value: i32) {
        self.data.extend_from_slice(&value.to_ne_bytes());
    }

    /// Appends an unsigned 32-bit integer.
    pub fn write_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_ne_bytes());
    }

    /// Appends a NUL-terminated 8-bit string, padded to 4 bytes.
    pub fn write_cstring(&mut self, value: &str) {
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        self.pad_to_4();
    }

    /// Appends a length-prefixed, NUL-terminated UTF-16 string, padded to 4 bytes.
    pub fn write_string16(&mut self, value: &str) {
        let units: Vec<u16> = value.encode_utf16().collect();
        self.write_i32(units.len() as i32);
        for unit in units.iter().copied().chain(std::iter::once(0)) {
            self.data.extend_from_slice(&unit.to_ne_bytes());
        }
        self.pad_to_4();
    }

    /// Appends a strong reference to the local object identified by `id`.
    ///
    /// `id` is used both as node pointer and cookie; the kernel treats them as
    /// opaque keys and hands them back in incoming transactions.
    pub fn write_local_binder(&mut self, id: u64) {
        self.offsets.push(self.data.len() as u64);
        self.write_u32(BINDER_TYPE_BINDER);
        self.write_u32(LOCAL_OBJECT_FLAGS);
        self.data.extend_from_slice(&id.to_ne_bytes());
        self.data.extend_from_slice(&id.to_ne_bytes());
    }

    /// Appends a HIDL `hidl_string` as a parent buffer plus an embedded data buffer.
    pub fn write_hidl_string(&mut self, value: &str) {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        let text: Box<[u8]> = bytes.into_boxed_slice();

        let mut header = Vec::with_capacity(HIDL_STRING_SIZE);
        header.extend_from_slice(&(text.as_ptr() as u64).to_ne_bytes());
        header.extend_from_slice(&(value.len() as u32).to_ne_bytes());
        // mOwnsBuffer = false, then padding.
        header.extend_from_slice(&[0u8; 4]);
        let header: Box<[u8]> = header.into_boxed_slice();

        let parent = self.offsets.len() as u64;
        self.write_buffer_object(&header, None);
        self.write_buffer_object(&text, Some((parent, 0)));
        self.buffers.push(header);
        self.buffers.push(text);
    }

    fn write_buffer_object(&mut self, buffer: &[u8], parent: Option<(u64, u64)>) {
        self.offsets.push(self.data.len() as u64);
        let (flags, parent_index, parent_offset) = match parent {
            Some((index, offset)) => (BINDER_BUFFER_FLAG_HAS_PARENT, index, offset),
            None => (0, 0, 0),
        };
        let start = self.data.len();
        self.write_u32(BINDER_TYPE_PTR);
        self.write_u32(flags);
        self.data
            .extend_from_slice(&(buffer.as_ptr() as u64).to_ne_bytes());
        self.data
            .extend_from_slice(&(buffer.len() as u64).to_ne_bytes());
        self.data.extend_from_slice(&parent_index.to_ne_bytes());
        self.data.extend_from_slice(&parent_offset.to_ne_bytes());
        debug_assert_eq!(self.data.len() - start, BUFFER_OBJECT_SIZE);
        self.buffers_size += align8(buffer.len()) as u64;
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// A binder object read from a parcel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlatObject {
    /// Null binder.
    Null,
    /// Reference to a remote node.
    Handle(u32),
    /// One of this process's own nodes.
    Local(u64),
}

/// Sequential reader over received parcel data.
#[derive(Debug, Clone)]
pub struct ParcelReader<'a> {
    data: &'a [u8],
    offsets: &'a [u64],
    pos: usize,
}

impl<'a> ParcelReader<'a> {
    /// Creates a reader over `data` whose objects sit at `offsets`.
    pub fn new(data: &'a [u8], offsets: &'a [u64]) -> Self {
        Self {
            data,
            offsets,
            pos: 0,
        }
    }

    /// Creates a reader that resumes at byte `pos`.
    pub fn at(data: &'a [u8], offsets: &'a [u64], pos: usize) -> Self {
        Self {
            data,
            offsets,
            pos: pos.min(data.len()),
        }
    }

    /// Current read position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Reads a signed 32-bit integer.
    pub fn read_i32(&mut self) -> Option<i32> {
        self.read_u32().map(|v| v as i32)
    }

    /// Reads an unsigned 32-bit integer.
    pub fn read_u32(&mut self) -> Option<u32> {
        if self.remaining() < 4 {
            return None;
        }
        let v = sys::read_u32(self.data, self.pos);
        self.pos += 4;
        Some(v)
    }

    /// Reads a flat binder object.
    ///
    /// Non-null objects must be listed in the offsets table, otherwise the data
    /// was not translated by the kernel. Null binders are written without an
    /// offset entry.
    pub fn read_object(&mut self) -> Option<FlatObject> {
        if self.remaining() < FLAT_BINDER_OBJECT_SIZE {
            return None;
        }
        let kind = sys::read_u32(self.data, self.pos);
        let value = sys::read_u64(self.data, self.pos + 8);
        let object = match kind {
            BINDER_TYPE_BINDER if value == 0 => FlatObject::Null,
            _ if !self.offsets.contains(&(self.pos as u64)) => return None,
            BINDER_TYPE_HANDLE => FlatObject::Handle(value as u32),
            BINDER_TYPE_BINDER => FlatObject::Local(value),
            _ => return None,
        };
        self.pos += FLAT_BINDER_OBJECT_SIZE;
        Some(object)
    }

    /// Handles of every remote object listed in the offsets table.
    pub fn handles(&self) -> Vec<u32> {
        self.offsets
            .iter()
            .filter_map(|&off| {
                let at = usize::try_from(off).ok()?;
                if at + FLAT_BINDER_OBJECT_SIZE > self.data.len() {
                    return None;
                }
                (sys::read_u32(self.data, at) == BINDER_TYPE_HANDLE)
                    .then(|| sys::read_u64(self.data, at + 8) as u32)
            })
            .collect()
    }
}
