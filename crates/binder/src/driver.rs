//! Synchronous client for one binder device.
//!
//! A [`Driver`] owns the device file descriptor and the receive mapping the
//! kernel copies replies into. It never enters the looper: the only thread that
//! reads from the driver is the one waiting for a reply, so incoming calls to
//! local objects are only seen (and answered) while a transaction is pending.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs::File;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use nix::errno::Errno;
use tracing::{debug, trace, warn};
use vibrator::CallbackHandler;

use crate::parcel::{FlatObject, Parcel, ParcelReader};
use crate::sys::{self, TransactionData};
use crate::BinderError;

/// Size of the receive mapping, as used by libbinder.
const VM_SIZE: usize = (1 << 20) - 2 * 4096;
/// Size of the read buffer for driver return commands.
const READ_BUFFER_SIZE: usize = 256;

// ---------------------------------------------------------------------------
// Receive mapping
// ---------------------------------------------------------------------------

struct Mapping {
    addr: *mut libc::c_void,
    len: usize,
}

impl Mapping {
    fn new(fd: RawFd, len: usize) -> Result<Self, BinderError> {
        // SAFETY: a fresh private read-only mapping of the binder fd; the kernel
        // owns its contents and we only read ranges it reports to us.
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ,
                libc::MAP_PRIVATE | libc::MAP_NORESERVE,
                fd,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(BinderError::Map(std::io::Error::last_os_error()));
        }
        Ok(Self { addr, len })
    }
}

/// Read access to reply data the kernel placed in this process.
trait ReceiveBuffer {
    /// Copies `len` bytes at user address `at`, or `None` if the range is not
    /// inside the buffer.
    fn copy(&self, at: u64, len: u64) -> Option<Vec<u8>>;
}

impl ReceiveBuffer for Mapping {
    fn copy(&self, at: u64, len: u64) -> Option<Vec<u8>> {
        let start = self.addr as u64;
        let end = start + self.len as u64;
        if len == 0 {
            return Some(Vec::new());
        }
        if at < start || at.checked_add(len)? > end {
            return None;
        }
        // SAFETY: bounds-checked against the live mapping above.
        let bytes = unsafe { std::slice::from_raw_parts(at as usize as *const u8, len as usize) };
        Some(bytes.to_vec())
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: `addr`/`len` describe a mapping created in `Mapping::new`.
        unsafe {
            libc::munmap(self.addr, self.len);
        }
    }
}

// ---------------------------------------------------------------------------
// Outgoing command batch
// ---------------------------------------------------------------------------

/// Commands to write on the next `BINDER_WRITE_READ`, plus any reply bodies
/// they point at.
#[derive(Default)]
struct Commands {
    bytes: Vec<u8>,
    bodies: Vec<Box<[u8]>>,
}

impl Commands {
    fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn push(&mut self, cmd: u32, payload: &[u8]) {
        debug_assert_eq!(sys::payload_size(cmd), payload.len());
        self.bytes.extend_from_slice(&cmd.to_ne_bytes());
        self.bytes.extend_from_slice(payload);
    }

    fn handle_ref(&mut self, cmd: u32, handle: u32) {
        self.push(cmd, &handle.to_ne_bytes());
    }

    fn free_buffer(&mut self, buffer: u64) {
        self.push(sys::BC_FREE_BUFFER, &buffer.to_ne_bytes());
    }

    fn reply(&mut self, body: Box<[u8]>) {
        let tr = TransactionData {
            data_size: body.len() as u64,
            buffer: body.as_ptr() as u64,
            ..Default::default()
        };
        let mut payload = Vec::with_capacity(sys::TRANSACTION_DATA_SIZE);
        tr.encode(&mut payload);
        self.push(sys::BC_REPLY, &payload);
        self.bodies.push(body);
    }
}

/// Reply contents copied out of the receive mapping.
#[derive(Debug, Default)]
struct Received {
    data: Vec<u8>,
    offsets: Vec<u64>,
    pinned: Vec<u32>,
}

// ---------------------------------------------------------------------------
// Local objects
// ---------------------------------------------------------------------------

/// Handlers of the local objects registered on one driver, keyed by node id.
struct LocalObjects {
    handlers: RefCell<HashMap<u64, Box<dyn CallbackHandler>>>,
    next_id: Cell<u64>,
}

impl Default for LocalObjects {
    fn default() -> Self {
        Self {
            handlers: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
        }
    }
}

impl LocalObjects {
    fn insert(&self, handler: Box<dyn CallbackHandler>) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.handlers.borrow_mut().insert(id, handler);
        id
    }

    fn remove(&self, id: u64) {
        self.handlers.borrow_mut().remove(&id);
    }

    /// Serves one incoming transaction and queues its reply.
    fn dispatch(&self, tr: &TransactionData, cmds: &mut Commands) {
        let status = match self.handlers.borrow().get(&tr.cookie) {
            Some(handler) => handler.on_transaction(tr.code),
            None => {
                warn!(cookie = tr.cookie, code = tr.code, "transaction for unknown local object");
                Some(-libc::ENOENT)
            }
        };
        cmds.free_buffer(tr.buffer);
        let oneway = tr.flags & sys::TF_ONE_WAY != 0;
        if !oneway {
            let body: Box<[u8]> = match status {
                Some(status) => Box::new(status.to_ne_bytes()),
                None => Box::new([]),
            };
            cmds.reply(body);
        }
        debug!(code = tr.code, oneway, "incoming call handled");
    }
}

// ---------------------------------------------------------------------------
// Return command processing
// ---------------------------------------------------------------------------

/// Interprets one read buffer of driver return commands.
///
/// Commands the driver expects in response are queued on `cmds`. Returns the
/// outcome of the pending transaction once the buffer settles it.
fn process(
    buf: &[u8],
    oneway: bool,
    memory: &impl ReceiveBuffer,
    locals: &LocalObjects,
    cmds: &mut Commands,
) -> Option<Result<Received, BinderError>> {
    let mut outcome = None;
    let mut at = 0;
    while at + 4 <= buf.len() {
        let cmd = sys::read_u32(buf, at);
        at += 4;
        let size = sys::payload_size(cmd);
        if at + size > buf.len() {
            return Some(Err(BinderError::Malformed(format!(
                "command {cmd:#x} truncated"
            ))));
        }
        let payload = &buf[at..at + size];
        at += size;

        match cmd {
            sys::BR_NOOP | sys::BR_OK | sys::BR_SPAWN_LOOPER => {}
            sys::BR_RELEASE | sys::BR_DECREFS => {}
            sys::BR_TRANSACTION_COMPLETE => {
                if oneway {
                    outcome = Some(Ok(Received::default()));
                }
            }
            sys::BR_INCREFS => cmds.push(sys::BC_INCREFS_DONE, payload),
            sys::BR_ACQUIRE => cmds.push(sys::BC_ACQUIRE_DONE, payload),
            sys::BR_REPLY => {
                let Some(tr) = TransactionData::decode(payload) else {
                    return Some(Err(BinderError::Malformed("short BR_REPLY".into())));
                };
                outcome = Some(take_reply(&tr, memory, cmds));
            }
            sys::BR_TRANSACTION => {
                let Some(tr) = TransactionData::decode(payload) else {
                    return Some(Err(BinderError::Malformed("short BR_TRANSACTION".into())));
                };
                locals.dispatch(&tr, cmds);
            }
            sys::BR_DEAD_REPLY => outcome = Some(Err(BinderError::DeadReply)),
            sys::BR_FAILED_REPLY => outcome = Some(Err(BinderError::FailedReply)),
            sys::BR_FROZEN_REPLY => outcome = Some(Err(BinderError::FrozenReply)),
            sys::BR_ERROR => {
                outcome = Some(Err(BinderError::Status(sys::read_u32(payload, 0) as i32)))
            }
            other => trace!(cmd = other, "ignoring driver command"),
        }
    }
    outcome
}

/// Copies a reply out of the receive buffer, pins its handles and frees it.
fn take_reply(
    tr: &TransactionData,
    memory: &impl ReceiveBuffer,
    cmds: &mut Commands,
) -> Result<Received, BinderError> {
    let data = memory.copy(tr.buffer, tr.data_size);
    let offsets = memory.copy(tr.offsets, tr.offsets_size);
    let (Some(data), Some(offsets)) = (data, offsets) else {
        cmds.free_buffer(tr.buffer);
        return Err(BinderError::Malformed(
            "reply buffer outside the receive mapping".into(),
        ));
    };
    let offsets: Vec<u64> = offsets
        .chunks_exact(8)
        .map(|c| sys::read_u64(c, 0))
        .collect();

    if tr.flags & sys::TF_STATUS_CODE != 0 {
        cmds.free_buffer(tr.buffer);
        let status = ParcelReader::new(&data, &[])
            .read_i32()
            .unwrap_or(-libc::EBADMSG);
        return Err(BinderError::Status(status));
    }

    let pinned = ParcelReader::new(&data, &offsets).handles();
    for &handle in &pinned {
        cmds.handle_ref(sys::BC_INCREFS, handle);
        cmds.handle_ref(sys::BC_ACQUIRE, handle);
    }
    cmds.free_buffer(tr.buffer);
    trace!(size = data.len(), handles = pinned.len(), "BR_REPLY");
    Ok(Received {
        data,
        offsets,
        pinned,
    })
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// An open binder device.
pub struct Driver {
    // Unmapped before the descriptor is closed.
    map: Mapping,
    file: File,
    path: PathBuf,
    locals: LocalObjects,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("path", &self.path)
            .field("fd", &self.file.as_raw_fd())
            .finish_non_exhaustive()
    }
}

impl Driver {
    /// Opens `path`, checks the protocol version and maps the receive buffer.
    pub fn open(path: &Path) -> Result<Rc<Self>, BinderError> {
        let file = File::options()
            .read(true)
            .write(true)
            .custom_flags(libc::O_CLOEXEC)
            .open(path)
            .map_err(|source| BinderError::Open {
                path: path.to_owned(),
                source,
            })?;
        let fd = file.as_raw_fd();

        let found = sys::version(fd).map_err(|source| BinderError::Ioctl {
            op: "BINDER_VERSION",
            source,
        })?;
        if found != sys::PROTOCOL_VERSION {
            return Err(BinderError::Version { found });
        }
        sys::set_max_threads(fd, 0).map_err(|source| BinderError::Ioctl {
            op: "BINDER_SET_MAX_THREADS",
            source,
        })?;
        let map = Mapping::new(fd, VM_SIZE)?;

        debug!(device = %path.display(), "binder device opened");
        Ok(Rc::new(Self {
            map,
            file,
            path: path.to_owned(),
            locals: LocalObjects::default(),
        }))
    }

    /// Device node this driver was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Registers a local object and returns the id used as its node pointer.
    pub fn register_local(&self, handler: Box<dyn CallbackHandler>) -> u64 {
        self.locals.insert(handler)
    }

    /// Forgets a local object. Later incoming calls to it are refused.
    pub fn unregister_local(&self, id: u64) {
        self.locals.remove(id);
    }

    /// Drops the strong and weak reference held on `handle`.
    pub fn release_handle(&self, handle: u32) {
        let mut cmds = Commands::default();
        cmds.handle_ref(sys::BC_RELEASE, handle);
        cmds.handle_ref(sys::BC_DECREFS, handle);
        if let Err(error) = self.flush(&cmds) {
            warn!(handle, %error, "failed to release binder handle");
        }
    }

    /// Sends `parcel` to `handle` and blocks until the reply arrives.
    ///
    /// Remote handles contained in the reply are pinned before the kernel
    /// buffer is freed, so they stay valid for as long as the [`Reply`] (or a
    /// [`RemoteRef`] taken from it) lives.
    pub fn transact(
        self: &Rc<Self>,
        handle: u32,
        code: u32,
        flags: u32,
        parcel: &Parcel,
    ) -> Result<Reply, BinderError> {
        let data = parcel.data();
        let offsets = parcel.offsets();
        let tr = TransactionData {
            target: u64::from(handle),
            code,
            flags: flags | sys::TF_ACCEPT_FDS,
            data_size: data.len() as u64,
            offsets_size: (offsets.len() * std::mem::size_of::<u64>()) as u64,
            buffer: data.as_ptr() as u64,
            offsets: offsets.as_ptr() as u64,
            ..Default::default()
        };

        let mut payload = Vec::with_capacity(sys::TRANSACTION_DATA_SG_SIZE);
        tr.encode(&mut payload);
        let mut cmds = Commands::default();
        if parcel.buffers_size() > 0 {
            payload.extend_from_slice(&parcel.buffers_size().to_ne_bytes());
            cmds.push(sys::BC_TRANSACTION_SG, &payload);
        } else {
            cmds.push(sys::BC_TRANSACTION, &payload);
        }

        trace!(handle, code, size = data.len(), "BC_TRANSACTION");
        self.flush(&cmds)?;

        let received = self.wait_for_reply(flags & sys::TF_ONE_WAY != 0)?;
        Ok(Reply {
            driver: Rc::clone(self),
            data: received.data,
            offsets: received.offsets,
            pos: 0,
            pinned: received.pinned,
        })
    }

    fn flush(&self, cmds: &Commands) -> Result<(), BinderError> {
        if cmds.is_empty() {
            return Ok(());
        }
        self.write_read(&cmds.bytes, None).map(drop)
    }

    fn write_read(&self, write: &[u8], read: Option<&mut [u8]>) -> Result<usize, BinderError> {
        let (read_buffer, read_size) = match read {
            Some(buf) => (buf.as_mut_ptr() as u64, buf.len() as u64),
            None => (0, 0),
        };
        let mut bwr = sys::BinderWriteRead {
            write_size: write.len() as u64,
            write_buffer: write.as_ptr() as u64,
            read_size,
            read_buffer,
            ..Default::default()
        };
        loop {
            match sys::write_read(self.file.as_raw_fd(), &mut bwr) {
                Ok(()) => {}
                Err(Errno::EINTR) => continue,
                Err(source) => {
                    return Err(BinderError::Ioctl {
                        op: "BINDER_WRITE_READ",
                        source,
                    })
                }
            }
            if bwr.write_consumed >= bwr.write_size {
                return Ok(bwr.read_consumed as usize);
            }
        }
    }

    /// Reads driver commands until the pending transaction completes.
    fn wait_for_reply(&self, oneway: bool) -> Result<Received, BinderError> {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            let n = self.write_read(&[], Some(&mut buf))?.min(buf.len());
            let mut cmds = Commands::default();
            let outcome = process(&buf[..n], oneway, &self.map, &self.locals, &mut cmds);
            self.flush(&cmds)?;
            if let Some(outcome) = outcome {
                return outcome;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reply and remote references
// ---------------------------------------------------------------------------

/// A strong reference to a remote node, released on drop.
pub struct RemoteRef {
    driver: Rc<Driver>,
    handle: u32,
}

impl RemoteRef {
    /// Wraps an already-acquired `handle`.
    fn adopt(driver: Rc<Driver>, handle: u32) -> Self {
        Self { driver, handle }
    }

    /// Process-local handle of the node.
    pub fn handle(&self) -> u32 {
        self.handle
    }

    /// Driver the handle belongs to.
    pub fn driver(&self) -> &Rc<Driver> {
        &self.driver
    }
}

impl std::fmt::Debug for RemoteRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRef")
            .field("device", &self.driver.path())
            .field("handle", &self.handle)
            .finish()
    }
}

impl Drop for RemoteRef {
    fn drop(&mut self) {
        trace!(handle = self.handle, "releasing remote reference");
        self.driver.release_handle(self.handle);
    }
}

/// A received reply.
///
/// Handles the reply carried are pinned until taken with
/// [`Reply::read_remote`] or until the reply is dropped.
pub struct Reply {
    driver: Rc<Driver>,
    data: Vec<u8>,
    offsets: Vec<u64>,
    pos: usize,
    pinned: Vec<u32>,
}

impl Reply {
    fn reader(&self) -> ParcelReader<'_> {
        ParcelReader::at(&self.data, &self.offsets, self.pos)
    }

    /// Reads the next signed 32-bit integer.
    pub fn read_i32(&mut self) -> Option<i32> {
        let mut r = self.reader();
        let v = r.read_i32()?;
        self.pos = r.position();
        Some(v)
    }

    /// Reads the next binder object as a remote reference.
    ///
    /// Returns `Ok(None)` for a null binder.
    pub fn read_remote(&mut self) -> Result<Option<RemoteRef>, BinderError> {
        let mut r = self.reader();
        let object = r
            .read_object()
            .ok_or_else(|| BinderError::Malformed("expected a binder object".into()))?;
        self.pos = r.position();
        match object {
            FlatObject::Null => Ok(None),
            FlatObject::Handle(handle) => {
                let idx = self
                    .pinned
                    .iter()
                    .position(|&h| h == handle)
                    .ok_or_else(|| BinderError::Malformed(format!("handle {handle} not pinned")))?;
                self.pinned.swap_remove(idx);
                Ok(Some(RemoteRef::adopt(Rc::clone(&self.driver), handle)))
            }
            FlatObject::Local(id) => Err(BinderError::Malformed(format!(
                "reply returned local object {id:#x}"
            ))),
        }
    }
}

impl Drop for Reply {
    fn drop(&mut self) {
        for handle in self.pinned.drain(..) {
            self.driver.release_handle(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibrator::NoopCallback;

    const BASE: u64 = 0x7000_0000;

    /// Receive buffer backed by a vector that pretends to live at `BASE`.
    struct Memory(Vec<u8>);

    impl ReceiveBuffer for Memory {
        fn copy(&self, at: u64, len: u64) -> Option<Vec<u8>> {
            if len == 0 {
                return Some(Vec::new());
            }
            let start = usize::try_from(at.checked_sub(BASE)?).ok()?;
            let end = start.checked_add(usize::try_from(len).ok()?)?;
            self.0.get(start..end).map(<[u8]>::to_vec)
        }
    }

    fn stream(commands: &[(u32, Vec<u8>)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (cmd, payload) in commands {
            out.extend_from_slice(&cmd.to_ne_bytes());
            out.extend_from_slice(payload);
        }
        out
    }

    fn encoded(tr: TransactionData) -> Vec<u8> {
        let mut out = Vec::new();
        tr.encode(&mut out);
        out
    }

    fn written(cmds: &Commands) -> Vec<(u32, Vec<u8>)> {
        let b = &cmds.bytes;
        let mut out = Vec::new();
        let mut at = 0;
        while at < b.len() {
            let cmd = sys::read_u32(b, at);
            let size = sys::payload_size(cmd);
            out.push((cmd, b[at + 4..at + 4 + size].to_vec()));
            at += 4 + size;
        }
        out
    }

    fn run(
        buf: &[u8],
        oneway: bool,
        memory: &Memory,
        locals: &LocalObjects,
    ) -> (Option<Result<Received, BinderError>>, Commands) {
        let mut cmds = Commands::default();
        let outcome = process(buf, oneway, memory, locals, &mut cmds);
        (outcome, cmds)
    }

    /// Reply parcel: status 0 followed by a handle object for `handle`.
    fn reply_with_handle(handle: u32) -> (Memory, TransactionData) {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0i32.to_ne_bytes());
        bytes.extend_from_slice(&sys::BINDER_TYPE_HANDLE.to_ne_bytes());
        bytes.extend_from_slice(&0u32.to_ne_bytes());
        bytes.extend_from_slice(&u64::from(handle).to_ne_bytes());
        bytes.extend_from_slice(&0u64.to_ne_bytes());
        let data_size = bytes.len() as u64;
        bytes.extend_from_slice(&4u64.to_ne_bytes());
        let tr = TransactionData {
            data_size,
            offsets_size: 8,
            buffer: BASE,
            offsets: BASE + data_size,
            ..Default::default()
        };
        (Memory(bytes), tr)
    }

    #[test]
    fn ref_count_requests_are_acknowledged() {
        let ptr_cookie: Vec<u8> = (1..=16).collect();
        let buf = stream(&[
            (sys::BR_INCREFS, ptr_cookie.clone()),
            (sys::BR_ACQUIRE, ptr_cookie.clone()),
        ]);
        let (outcome, cmds) = run(&buf, false, &Memory(Vec::new()), &LocalObjects::default());

        assert!(outcome.is_none());
        assert_eq!(
            written(&cmds),
            vec![
                (sys::BC_INCREFS_DONE, ptr_cookie.clone()),
                (sys::BC_ACQUIRE_DONE, ptr_cookie),
            ]
        );
    }

    #[test]
    fn reply_handles_are_pinned_before_the_buffer_is_freed() {
        let (memory, tr) = reply_with_handle(5);
        let buf = stream(&[
            (sys::BR_NOOP, Vec::new()),
            (sys::BR_TRANSACTION_COMPLETE, Vec::new()),
            (sys::BR_REPLY, encoded(tr)),
        ]);
        let (outcome, cmds) = run(&buf, false, &memory, &LocalObjects::default());

        let received = outcome.unwrap().unwrap();
        assert_eq!(received.pinned, vec![5]);
        assert_eq!(received.offsets, vec![4]);
        assert_eq!(received.data.len(), 28);
        assert_eq!(
            written(&cmds),
            vec![
                (sys::BC_INCREFS, 5u32.to_ne_bytes().to_vec()),
                (sys::BC_ACQUIRE, 5u32.to_ne_bytes().to_vec()),
                (sys::BC_FREE_BUFFER, BASE.to_ne_bytes().to_vec()),
            ]
        );
    }

    #[test]
    fn status_code_reply_becomes_a_status_error() {
        let memory = Memory((-22i32).to_ne_bytes().to_vec());
        let tr = TransactionData {
            flags: sys::TF_STATUS_CODE,
            data_size: 4,
            buffer: BASE,
            ..Default::default()
        };
        let buf = stream(&[(sys::BR_REPLY, encoded(tr))]);
        let (outcome, cmds) = run(&buf, false, &memory, &LocalObjects::default());

        assert!(matches!(outcome, Some(Err(BinderError::Status(-22)))));
        assert_eq!(
            written(&cmds),
            vec![(sys::BC_FREE_BUFFER, BASE.to_ne_bytes().to_vec())]
        );
    }

    #[test]
    fn reply_outside_the_receive_buffer_is_malformed_but_still_freed() {
        let tr = TransactionData {
            data_size: 4,
            buffer: 0x10,
            ..Default::default()
        };
        let buf = stream(&[(sys::BR_REPLY, encoded(tr))]);
        let (outcome, cmds) = run(&buf, false, &Memory(vec![0; 4]), &LocalObjects::default());

        assert!(matches!(outcome, Some(Err(BinderError::Malformed(_)))));
        assert_eq!(
            written(&cmds),
            vec![(sys::BC_FREE_BUFFER, 0x10u64.to_ne_bytes().to_vec())]
        );
    }

    #[test]
    fn call_to_unknown_local_object_is_answered_with_enoent() {
        let tr = TransactionData {
            cookie: 99,
            code: 1,
            buffer: 0x50,
            ..Default::default()
        };
        let buf = stream(&[(sys::BR_TRANSACTION, encoded(tr))]);
        let (outcome, cmds) = run(&buf, false, &Memory(Vec::new()), &LocalObjects::default());

        assert!(outcome.is_none());
        let written = written(&cmds);
        assert_eq!(written.len(), 2);
        assert_eq!(written[0], (sys::BC_FREE_BUFFER, 0x50u64.to_ne_bytes().to_vec()));
        assert_eq!(written[1].0, sys::BC_REPLY);
        let reply = TransactionData::decode(&written[1].1).unwrap();
        assert_eq!(reply.data_size, 4);
        assert_eq!(&cmds.bodies[0][..], &(-libc::ENOENT).to_ne_bytes()[..]);
    }

    #[test]
    fn call_to_registered_callback_gets_an_empty_reply() {
        let locals = LocalObjects::default();
        let id = locals.insert(Box::new(NoopCallback));
        let tr = TransactionData {
            cookie: id,
            code: 1,
            buffer: 0x50,
            ..Default::default()
        };
        let buf = stream(&[(sys::BR_TRANSACTION, encoded(tr))]);
        let (_, cmds) = run(&buf, false, &Memory(Vec::new()), &locals);

        let written = written(&cmds);
        assert_eq!(written[1].0, sys::BC_REPLY);
        assert_eq!(TransactionData::decode(&written[1].1).unwrap().data_size, 0);
    }

    #[test]
    fn oneway_incoming_call_is_freed_without_a_reply() {
        let locals = LocalObjects::default();
        let id = locals.insert(Box::new(NoopCallback));
        let tr = TransactionData {
            cookie: id,
            flags: sys::TF_ONE_WAY,
            buffer: 0x50,
            ..Default::default()
        };
        let buf = stream(&[(sys::BR_TRANSACTION, encoded(tr))]);
        let (_, cmds) = run(&buf, false, &Memory(Vec::new()), &locals);

        assert_eq!(
            written(&cmds),
            vec![(sys::BC_FREE_BUFFER, 0x50u64.to_ne_bytes().to_vec())]
        );
    }

    #[test]
    fn removed_local_object_is_no_longer_served() {
        let locals = LocalObjects::default();
        let id = locals.insert(Box::new(NoopCallback));
        locals.remove(id);
        let tr = TransactionData {
            cookie: id,
            ..Default::default()
        };
        let buf = stream(&[(sys::BR_TRANSACTION, encoded(tr))]);
        let (_, cmds) = run(&buf, false, &Memory(Vec::new()), &locals);

        assert_eq!(&cmds.bodies[0][..], &(-libc::ENOENT).to_ne_bytes()[..]);
    }

    #[test]
    fn truncated_command_is_malformed() {
        let mut buf = sys::BR_REPLY.to_ne_bytes().to_vec();
        buf.extend_from_slice(&[0u8; 10]);
        let (outcome, _) = run(&buf, false, &Memory(Vec::new()), &LocalObjects::default());
        assert!(matches!(outcome, Some(Err(BinderError::Malformed(_)))));
    }

    #[test]
    fn transaction_complete_settles_only_oneway_calls() {
        let buf = stream(&[(sys::BR_TRANSACTION_COMPLETE, Vec::new())]);
        let memory = Memory(Vec::new());
        let locals = LocalObjects::default();

        assert!(run(&buf, false, &memory, &locals).0.is_none());
        let received = run(&buf, true, &memory, &locals).0.unwrap().unwrap();
        assert!(received.data.is_empty());
        assert!(received.pinned.is_empty());
    }

    #[test]
    fn failure_returns_map_onto_errors() {
        let memory = Memory(Vec::new());
        let locals = LocalObjects::default();
        let outcome = |cmd: u32, payload: Vec<u8>| {
            run(&stream(&[(cmd, payload)]), false, &memory, &locals).0
        };

        assert!(matches!(
            outcome(sys::BR_DEAD_REPLY, Vec::new()),
            Some(Err(BinderError::DeadReply))
        ));
        assert!(matches!(
            outcome(sys::BR_FAILED_REPLY, Vec::new()),
            Some(Err(BinderError::FailedReply))
        ));
        assert!(matches!(
            outcome(sys::BR_FROZEN_REPLY, Vec::new()),
            Some(Err(BinderError::FrozenReply))
        ));
        assert!(matches!(
            outcome(sys::BR_ERROR, (-1i32).to_ne_bytes().to_vec()),
            Some(Err(BinderError::Status(-1)))
        ));
    }

    #[test]
    fn commands_are_written_back_to_back() {
        let mut cmds = Commands::default();
        cmds.handle_ref(sys::BC_INCREFS, 3);
        cmds.handle_ref(sys::BC_ACQUIRE, 3);
        cmds.free_buffer(0x1000);

        let b = &cmds.bytes;
        assert_eq!(b.len(), 3 * 4 + 4 + 4 + 8);
        assert_eq!(sys::read_u32(b, 0), sys::BC_INCREFS);
        assert_eq!(sys::read_u32(b, 4), 3);
        assert_eq!(sys::read_u32(b, 8), sys::BC_ACQUIRE);
        assert_eq!(sys::read_u32(b, 16), sys::BC_FREE_BUFFER);
        assert_eq!(sys::read_u64(b, 20), 0x1000);
    }

    #[test]
    fn reply_body_outlives_the_command_batch_entry() {
        let mut cmds = Commands::default();
        cmds.reply(Box::new(0i32.to_ne_bytes()));

        assert_eq!(sys::read_u32(&cmds.bytes, 0), sys::BC_REPLY);
        let tr = TransactionData::decode(&cmds.bytes[4..]).unwrap();
        assert_eq!(tr.data_size, 4);
        assert_eq!(tr.buffer, cmds.bodies[0].as_ptr() as u64);
        assert_eq!(tr.offsets_size, 0);
    }

    #[test]
    fn opening_a_non_binder_file_fails_the_version_check() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = Driver::open(file.path()).unwrap_err();
        assert!(matches!(err, BinderError::Ioctl { op: "BINDER_VERSION", .. }));
    }

    #[test]
    fn opening_a_missing_device_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hwbinder");
        match Driver::open(&path) {
            Err(BinderError::Open { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
