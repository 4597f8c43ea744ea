use thiserror::Error;

/// Raw handle to a cross-process binary event object.
///
/// Duplicated handles refer to the same underlying signal state, mirroring
/// reference-counted kernel handle semantics: signaling through one handle
/// is observable through every duplicate, and the object stays alive until
/// the last handle is closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventHandle(pub u32);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PlatformError {
    #[error("stale or invalid event handle")]
    BadHandle,

    #[error("out of handle table entries")]
    NoResources,
}

/// Syscall surface for event objects.
///
/// All calls are synchronous and run on the owning thread; failure is
/// reported through [`PlatformError`], never by panicking.
pub trait Platform {
    /// Create a new event object in the unsignaled state.
    fn create_event(&self) -> Result<EventHandle, PlatformError>;

    /// Duplicate a handle with identical rights. The duplicate shares
    /// signal state with the original.
    fn duplicate_event(&self, event: EventHandle) -> Result<EventHandle, PlatformError>;

    /// Assert the event's signal.
    fn signal_event(&self, event: EventHandle) -> Result<(), PlatformError>;

    /// Re-arm the event to the unsignaled state.
    fn clear_event(&self, event: EventHandle) -> Result<(), PlatformError>;

    /// Non-blocking poll of the signal state. Unknown handles read as
    /// unsignaled.
    fn is_signaled(&self, event: EventHandle) -> bool;

    /// Close a handle. Closing the last handle destroys the object;
    /// closing an unknown handle is a no-op.
    fn close_event(&self, event: EventHandle);
}
