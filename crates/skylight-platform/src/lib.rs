//! OS-level plumbing for the skylight surface runtime.
//!
//! This crate holds the platform seam the surface state machine is written
//! against:
//! - [`Owned`], a scope-owned raw handle (value + release closure),
//! - [`Platform`], the syscall surface for cross-process binary event
//!   objects (create/duplicate/signal/clear), and
//! - [`Reactor`], an event-loop wait registration that fires a callback on
//!   the owning thread when an event signals.
//!
//! The [`sim`] module provides in-process implementations of both traits so
//! the surface lifecycle can be exercised without a real kernel or event
//! loop. They live in non-test code so downstream crates can drive them
//! from their own tests.
#![forbid(unsafe_code)]

pub mod event;
pub mod owned;
pub mod reactor;
pub mod sim;

pub use event::{EventHandle, Platform, PlatformError};
pub use owned::Owned;
pub use reactor::{Reactor, WaitId};
pub use sim::{SimPlatform, SimPlatformFailures, SimReactor};
