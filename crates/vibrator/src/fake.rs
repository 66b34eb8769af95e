//! Recording in-memory transport used by the unit tests of this crate.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use crate::{
    CallbackHandler, Delay, DevicePath, InstanceSlot, InterfaceName, Transport, TransportError,
};

/// Something the transport was asked to do, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open(String),
    OpenFailed(String),
    Lookup(String),
    Bind(String),
    BindFailed(String),
    Register(String),
    RegisterFailed(String),
    Transact { code: u32, args: Vec<Arg> },
    Sleep(Duration),
    ReleaseCallback(String),
    ReleaseClient(String),
    ReleaseEndpoint(String),
    ReleaseConnection(String),
}

/// A value appended to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Int(i32),
    Object(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainBehavior {
    /// Device opens and has the service.
    Serving,
    /// Device opens but the service is not registered.
    Empty,
    /// Device opens but lookups fail at the transport level.
    Broken,
    /// Device cannot be opened.
    Closed,
}

/// Scripted result of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Value(i32),
    NoPayload,
    Status(i32),
}

#[derive(Default)]
struct Shared {
    events: RefCell<Vec<Event>>,
    live: Cell<usize>,
}

impl Shared {
    fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    fn acquire(&self) {
        self.live.set(self.live.get() + 1);
    }

    fn release(&self, event: Event) {
        self.live.set(self.live.get() - 1);
        self.push(event);
    }
}

pub struct FakeTransport {
    shared: Rc<Shared>,
    domains: HashMap<String, DomainBehavior>,
    bind_fails: bool,
    register_fails: bool,
    replies: RefCell<VecDeque<Reply>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            shared: Rc::default(),
            domains: HashMap::new(),
            bind_fails: false,
            register_fails: false,
            replies: RefCell::default(),
        }
    }

    pub fn with_domain(mut self, device: &str, behavior: DomainBehavior) -> Self {
        self.domains.insert(device.to_owned(), behavior);
        self
    }

    pub fn failing_bind(mut self) -> Self {
        self.bind_fails = true;
        self
    }

    pub fn failing_register(mut self) -> Self {
        self.register_fails = true;
        self
    }

    /// Queues replies for the next transactions. Unscripted transactions answer 0.
    pub fn with_replies(self, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.replies.borrow_mut().extend(replies);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.shared.events.borrow().clone()
    }

    pub fn transactions(&self) -> Vec<(u32, Vec<Arg>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Transact { code, args } => Some((code, args)),
                _ => None,
            })
            .collect()
    }

    /// Number of handles acquired and not yet dropped.
    pub fn open_handles(&self) -> usize {
        self.shared.live.get()
    }

    pub fn delay(&self) -> FakeDelay {
        FakeDelay {
            shared: Rc::clone(&self.shared),
        }
    }

    fn behavior(&self, device: &str) -> DomainBehavior {
        self.domains
            .get(device)
            .copied()
            .unwrap_or(DomainBehavior::Closed)
    }
}

macro_rules! handle {
    ($name:ident, $release:ident) => {
        pub struct $name {
            label: String,
            shared: Rc<Shared>,
        }

        impl $name {
            fn new(label: &str, shared: &Rc<Shared>) -> Self {
                shared.acquire();
                Self {
                    label: label.to_owned(),
                    shared: Rc::clone(shared),
                }
            }

            /// Device the handle was obtained on.
            pub fn label(&self) -> &str {
                &self.label
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                self.shared
                    .release(Event::$release(std::mem::take(&mut self.label)));
            }
        }
    };
}

handle!(FakeConnection, ReleaseConnection);
handle!(FakeEndpoint, ReleaseEndpoint);
handle!(FakeClient, ReleaseClient);
handle!(FakeCallback, ReleaseCallback);

pub struct FakeRequest {
    args: Vec<Arg>,
}

pub struct FakeReply {
    value: Option<i32>,
}

impl Transport for FakeTransport {
    type Connection = FakeConnection;
    type Endpoint = FakeEndpoint;
    type Client = FakeClient;
    type Callback = FakeCallback;
    type Request = FakeRequest;
    type Reply = FakeReply;

    fn open_domain(&self, device: &DevicePath) -> Result<FakeConnection, TransportError> {
        if self.behavior(device.as_str()) == DomainBehavior::Closed {
            self.shared.push(Event::OpenFailed(device.to_string()));
            return Err(TransportError::Unavailable {
                reason: "no such device".into(),
            });
        }
        self.shared.push(Event::Open(device.to_string()));
        Ok(FakeConnection::new(device.as_str(), &self.shared))
    }

    fn lookup_service(
        &self,
        connection: &FakeConnection,
        name: &InterfaceName,
        slot: &InstanceSlot,
    ) -> Result<Option<FakeEndpoint>, TransportError> {
        self.shared.push(Event::Lookup(format!("{name}/{slot}")));
        match self.behavior(&connection.label) {
            DomainBehavior::Serving => Ok(Some(FakeEndpoint::new(&connection.label, &self.shared))),
            DomainBehavior::Empty => Ok(None),
            DomainBehavior::Broken | DomainBehavior::Closed => {
                Err(TransportError::Status { code: -32 })
            }
        }
    }

    fn bind_client(
        &self,
        _endpoint: &FakeEndpoint,
        interface: &InterfaceName,
    ) -> Result<FakeClient, TransportError> {
        if self.bind_fails {
            self.shared.push(Event::BindFailed(interface.to_string()));
            return Err(TransportError::Unavailable {
                reason: "bind refused".into(),
            });
        }
        self.shared.push(Event::Bind(interface.to_string()));
        Ok(FakeClient::new(interface.as_str(), &self.shared))
    }

    fn register_callback(
        &self,
        _connection: &FakeConnection,
        interface: &InterfaceName,
        handler: Box<dyn CallbackHandler>,
    ) -> Result<FakeCallback, TransportError> {
        if self.register_fails {
            self.shared.push(Event::RegisterFailed(interface.to_string()));
            return Err(TransportError::Unavailable {
                reason: "no local objects".into(),
            });
        }
        assert_eq!(handler.on_transaction(1), None);
        self.shared.push(Event::Register(interface.to_string()));
        Ok(FakeCallback::new(interface.as_str(), &self.shared))
    }

    fn new_request(&self, _client: &FakeClient) -> FakeRequest {
        FakeRequest { args: Vec::new() }
    }

    fn append_int32(&self, request: &mut FakeRequest, value: i32) {
        request.args.push(Arg::Int(value));
    }

    fn append_object_ref(&self, request: &mut FakeRequest, callback: &FakeCallback) {
        request.args.push(Arg::Object(callback.label.clone()));
    }

    fn transact_sync(
        &self,
        _client: &FakeClient,
        code: u32,
        request: FakeRequest,
    ) -> Result<FakeReply, TransportError> {
        self.shared.push(Event::Transact {
            code,
            args: request.args,
        });
        match self.replies.borrow_mut().pop_front().unwrap_or(Reply::Value(0)) {
            Reply::Value(v) => Ok(FakeReply { value: Some(v) }),
            Reply::NoPayload => Ok(FakeReply { value: None }),
            Reply::Status(code) => Err(TransportError::Status { code }),
        }
    }

    fn read_int32(&self, reply: &mut FakeReply) -> Option<i32> {
        reply.value.take()
    }
}

/// Delay that records the requested interval instead of sleeping.
pub struct FakeDelay {
    shared: Rc<Shared>,
}

impl Delay for FakeDelay {
    fn sleep(&self, duration: Duration) {
        self.shared.push(Event::Sleep(duration));
    }
}
