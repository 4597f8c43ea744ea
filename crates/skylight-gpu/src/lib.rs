//! GPU driver call surface for the skylight surface runtime.
//!
//! The surface state machine never talks to a concrete driver; it is
//! written against [`GpuDriver`], a synchronous primitive-call seam
//! (image/memory/semaphore/fence create & destroy, buffer-collection
//! import and constraint negotiation). Every call reports failure through
//! [`DriverError`] rather than panicking, matching drivers that return a
//! distinguished non-success result code from each entry point.
//!
//! [`sim::SimDriver`] is an in-process implementation with per-call
//! failure injection, used to exercise setup unwind paths and the frame
//! reset cycle without real hardware.
#![forbid(unsafe_code)]

pub mod driver;
pub mod sim;
pub mod types;

pub use driver::{DriverError, DriverResult, GpuDriver};
pub use sim::{SimCounters, SimDriver, SimFailures};
pub use types::{
    CollectionHandle, CollectionProperties, CollectionToken, FenceHandle, ImageHandle, ImageSpec,
    ImageTiling, ImageUsage, MemoryHandle, MemoryRequirements, PixelFormat, SemaphoreHandle,
};
