use crate::event::EventHandle;

/// Identifies one outstanding wait registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WaitId(pub u64);

/// Event-loop wait registration.
///
/// A registration fires its callback at most once, on the owning thread,
/// when the watched event signals; to observe the next trigger the owner
/// must register again. Cancelling an already-fired (or unknown) wait is a
/// no-op, so owners can cancel unconditionally during teardown.
pub trait Reactor {
    fn register(&self, event: EventHandle, callback: Box<dyn FnOnce()>) -> WaitId;

    fn cancel(&self, id: WaitId);
}
