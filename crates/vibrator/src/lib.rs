//! Vibrator HAL client domain.
//!
//! Finds the vibrator service on whichever binder domain hosts it, binds a
//! client that speaks that domain's interface generation, and runs the
//! turn-on / wait / turn-off transaction sequence. The kernel transport is
//! supplied by an implementation of [`Transport`]; this crate never touches a
//! device itself.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; the `binder` crate defines *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype names (`InterfaceName`, `DevicePath`, `SessionId`, etc.) |
//! | [`types`] | Value types (`DurationMs`, `InterfaceDialect`, `Timestamp`) |
//! | [`errors`] | `VibratorError` taxonomy and the port-level `TransportError` |
//! | [`protocol`] | Opcode table, domain search order, well-known names |
//! | [`transport`] | The `Transport` port trait and callback handler |
//! | [`resolver`] | Ordered probing of binder domains |
//! | [`adapter`] | Client binding and callback registration |
//! | [`engine`] | Request encoding, synchronous dispatch, reply decoding |
//! | [`session`] | On → wait → off sequencing and teardown |

pub mod adapter;
pub mod engine;
pub mod errors;
pub mod identifiers;
pub mod protocol;
pub mod resolver;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(test)]
mod fake;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use adapter::{adapt, Binding};
pub use errors::{TransportError, VibratorError};
pub use identifiers::{DevicePath, EmptyIdentifier, InstanceSlot, InterfaceName, SessionId};
pub use protocol::{default_search_order, search_order, Domain, Opcode, Operation, OperationKind};
pub use resolver::{resolve, ResolvedService};
pub use session::{
    teardown, Delay, Outcome, Session, SessionEvents, SessionReport, SessionState, ThreadSleep,
};
pub use transport::{CallbackHandler, NoopCallback, Transport};
pub use types::{DurationMs, InterfaceDialect, Timestamp};
