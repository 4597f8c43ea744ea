//! Compositor session command seam.
//!
//! The remote compositor consumes an enqueue-style command interface:
//! buffer-collection registration, image-resource creation/release, and
//! per-frame acquire/release fence events. Commands are fire-and-forget
//! from the surface's point of view; delivery and batching belong to the
//! session implementation.

use std::cell::RefCell;

use skylight_gpu::CollectionToken;
use skylight_platform::EventHandle;

use crate::SurfaceSize;

/// Session-scoped id of a registered buffer collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// Session-scoped id of a compositor resource (the image).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceId(pub u32);

pub trait CompositorSession {
    /// Hand the compositor its token for the shared collection.
    fn register_buffer_collection(&self, buffer: BufferId, token: CollectionToken);

    /// Drop the compositor's registration of the collection. Independent
    /// of image-resource release; either may happen without the other.
    fn deregister_buffer_collection(&self, buffer: BufferId);

    fn alloc_resource_id(&self) -> ResourceId;

    /// Enqueue creation of an image resource over buffer `index` of the
    /// registered collection.
    fn enqueue_create_image(
        &self,
        resource: ResourceId,
        size: SurfaceSize,
        buffer: BufferId,
        index: u32,
    );

    fn enqueue_release_resource(&self, resource: ResourceId);

    /// Enqueue the frame's acquire fence. Ownership of the (duplicated)
    /// event handle transfers to the session.
    fn enqueue_acquire_fence(&self, event: EventHandle);

    /// Enqueue the frame's release fence. Ownership of the (duplicated)
    /// event handle transfers to the session.
    fn enqueue_release_fence(&self, event: EventHandle);
}

/// One recorded session command, in enqueue order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    RegisterBufferCollection {
        buffer: BufferId,
        token: CollectionToken,
    },
    DeregisterBufferCollection {
        buffer: BufferId,
    },
    CreateImage {
        resource: ResourceId,
        size: SurfaceSize,
        buffer: BufferId,
        index: u32,
    },
    ReleaseResource {
        resource: ResourceId,
    },
    AcquireFence {
        event: EventHandle,
    },
    ReleaseFence {
        event: EventHandle,
    },
}

#[derive(Default)]
struct RecordingState {
    next_resource_id: u32,
    commands: Vec<SessionCommand>,
}

/// Session that records every enqueued command, for tests.
#[derive(Default)]
pub struct RecordingSession {
    state: RefCell<RecordingState>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<SessionCommand> {
        self.state.borrow().commands.clone()
    }

    pub fn take_commands(&self) -> Vec<SessionCommand> {
        std::mem::take(&mut self.state.borrow_mut().commands)
    }

    /// Event handle of the most recently enqueued release fence.
    pub fn last_release_fence(&self) -> Option<EventHandle> {
        self.state
            .borrow()
            .commands
            .iter()
            .rev()
            .find_map(|command| match command {
                SessionCommand::ReleaseFence { event } => Some(*event),
                _ => None,
            })
    }

    fn record(&self, command: SessionCommand) {
        self.state.borrow_mut().commands.push(command);
    }
}

impl CompositorSession for RecordingSession {
    fn register_buffer_collection(&self, buffer: BufferId, token: CollectionToken) {
        self.record(SessionCommand::RegisterBufferCollection { buffer, token });
    }

    fn deregister_buffer_collection(&self, buffer: BufferId) {
        self.record(SessionCommand::DeregisterBufferCollection { buffer });
    }

    fn alloc_resource_id(&self) -> ResourceId {
        let mut state = self.state.borrow_mut();
        state.next_resource_id += 1;
        ResourceId(state.next_resource_id)
    }

    fn enqueue_create_image(
        &self,
        resource: ResourceId,
        size: SurfaceSize,
        buffer: BufferId,
        index: u32,
    ) {
        self.record(SessionCommand::CreateImage {
            resource,
            size,
            buffer,
            index,
        });
    }

    fn enqueue_release_resource(&self, resource: ResourceId) {
        self.record(SessionCommand::ReleaseResource { resource });
    }

    fn enqueue_acquire_fence(&self, event: EventHandle) {
        self.record(SessionCommand::AcquireFence { event });
    }

    fn enqueue_release_fence(&self, event: EventHandle) {
        self.record(SessionCommand::ReleaseFence { event });
    }
}
