//! In-process simulations of the platform seam.
//!
//! [`SimPlatform`] models kernel event objects as shared signal cells so
//! duplicated handles observe each other's signals, with per-call failure
//! injection to exercise flush and reset degradation paths. [`SimReactor`]
//! models a single-threaded dispatcher: registrations accumulate until the
//! test pumps it, at which point due callbacks fire exactly once.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::event::{EventHandle, Platform, PlatformError};
use crate::reactor::{Reactor, WaitId};

/// Shared signal state behind one event object (possibly many handles).
type SignalCell = Rc<std::cell::Cell<bool>>;

/// Which calls should fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimPlatformFailures {
    pub create_event: bool,
    pub duplicate_event: bool,
    pub clear_event: bool,
}

#[derive(Default)]
struct PlatformState {
    next_handle: u32,
    events: HashMap<u32, SignalCell>,
    failures: SimPlatformFailures,
    /// `Some(n)`: allow `n` more successful duplications, fail the rest.
    duplicates_until_failure: Option<u32>,
}

/// Simulated event-object table.
#[derive(Default)]
pub struct SimPlatform {
    state: RefCell<PlatformState>,
}

impl SimPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live handles, for leak assertions in tests.
    pub fn live_handles(&self) -> usize {
        self.state.borrow().events.len()
    }

    pub fn set_failures(&self, failures: SimPlatformFailures) {
        self.state.borrow_mut().failures = failures;
    }

    /// Let `successes` more duplications succeed, then fail every later
    /// one, for exercising partial-duplication unwind.
    pub fn fail_duplicate_events_after(&self, successes: u32) {
        self.state.borrow_mut().duplicates_until_failure = Some(successes);
    }

    fn cell(&self, event: EventHandle) -> Result<SignalCell, PlatformError> {
        self.state
            .borrow()
            .events
            .get(&event.0)
            .cloned()
            .ok_or(PlatformError::BadHandle)
    }
}

impl Platform for SimPlatform {
    fn create_event(&self) -> Result<EventHandle, PlatformError> {
        let mut state = self.state.borrow_mut();
        if state.failures.create_event {
            return Err(PlatformError::NoResources);
        }
        state.next_handle += 1;
        let handle = state.next_handle;
        state
            .events
            .insert(handle, Rc::new(std::cell::Cell::new(false)));
        Ok(EventHandle(handle))
    }

    fn duplicate_event(&self, event: EventHandle) -> Result<EventHandle, PlatformError> {
        let cell = self.cell(event)?;
        let mut state = self.state.borrow_mut();
        if state.failures.duplicate_event {
            return Err(PlatformError::NoResources);
        }
        if let Some(remaining) = state.duplicates_until_failure.as_mut() {
            if *remaining == 0 {
                return Err(PlatformError::NoResources);
            }
            *remaining -= 1;
        }
        state.next_handle += 1;
        let handle = state.next_handle;
        state.events.insert(handle, cell);
        Ok(EventHandle(handle))
    }

    fn signal_event(&self, event: EventHandle) -> Result<(), PlatformError> {
        self.cell(event)?.set(true);
        Ok(())
    }

    fn clear_event(&self, event: EventHandle) -> Result<(), PlatformError> {
        if self.state.borrow().failures.clear_event {
            return Err(PlatformError::BadHandle);
        }
        self.cell(event)?.set(false);
        Ok(())
    }

    fn is_signaled(&self, event: EventHandle) -> bool {
        self.cell(event).map(|cell| cell.get()).unwrap_or(false)
    }

    fn close_event(&self, event: EventHandle) {
        self.state.borrow_mut().events.remove(&event.0);
    }
}

struct PendingWait {
    id: WaitId,
    event: EventHandle,
    callback: Box<dyn FnOnce()>,
}

#[derive(Default)]
struct ReactorState {
    next_id: u64,
    waits: Vec<PendingWait>,
}

/// Simulated single-threaded dispatcher.
pub struct SimReactor {
    platform: Rc<SimPlatform>,
    state: RefCell<ReactorState>,
}

impl SimReactor {
    pub fn new(platform: Rc<SimPlatform>) -> Self {
        Self {
            platform,
            state: RefCell::new(ReactorState::default()),
        }
    }

    /// Fire every registration whose event is currently signaled.
    ///
    /// Registrations are consumed before their callbacks run, so a callback
    /// may register a new wait (or cancel others) without deadlocking the
    /// dispatcher. Returns the number of callbacks fired.
    pub fn pump(&self) -> usize {
        let due: Vec<PendingWait> = {
            let mut state = self.state.borrow_mut();
            let mut due = Vec::new();
            let mut remaining = Vec::new();
            for wait in state.waits.drain(..) {
                if self.platform.is_signaled(wait.event) {
                    due.push(wait);
                } else {
                    remaining.push(wait);
                }
            }
            state.waits = remaining;
            due
        };

        let fired = due.len();
        for wait in due {
            (wait.callback)();
        }
        fired
    }

    pub fn pending_waits(&self) -> usize {
        self.state.borrow().waits.len()
    }
}

impl Reactor for SimReactor {
    fn register(&self, event: EventHandle, callback: Box<dyn FnOnce()>) -> WaitId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = WaitId(state.next_id);
        state.waits.push(PendingWait {
            id,
            event,
            callback,
        });
        id
    }

    fn cancel(&self, id: WaitId) {
        self.state.borrow_mut().waits.retain(|wait| wait.id != id);
    }
}
