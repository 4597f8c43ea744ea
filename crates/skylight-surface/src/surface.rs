//! Surface state machine.
//!
//! States: Uninitialized → Valid/Idle → Write-Pending → Submitted →
//! (release event signals) → Reset → Idle, or Invalid, which is terminal
//! and reachable from any state on allocation or fence failure.
//!
//! Everything runs on one control thread. The only asynchronous element
//! is the reactor-driven wait on the release event: when the compositor
//! signals it, the reactor invokes the reset sequence as a callback on the
//! owning thread's event loop. The pending completion callback is invoked
//! last, after surface state is fully reset and no borrow is held, so it
//! may safely recycle or destroy this surface.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use skylight_gpu::{CollectionHandle, FenceHandle, GpuDriver, MemoryHandle, SemaphoreHandle};
use skylight_platform::{Owned, Platform, Reactor, WaitId};

use crate::alloc::BufferAllocator;
use crate::error::SetupError;
use crate::fence::FencePair;
use crate::image::{compatible_memory_type_index, create_shared_image, SharedImage};
use crate::paint::{PaintBackend, PaintSurface, RenderTargetDesc};
use crate::session::{BufferId, CompositorSession, ResourceId};
use crate::SurfaceSize;

/// Number of recent sizes kept for the recycling pool's reuse scoring.
pub const SIZE_HISTORY_LEN: usize = 3;

/// External collaborators the surface is constructed against.
#[derive(Clone)]
pub struct SurfaceContext {
    pub platform: Rc<dyn Platform>,
    pub reactor: Rc<dyn Reactor>,
    pub driver: Rc<dyn GpuDriver>,
    pub allocator: Rc<dyn BufferAllocator>,
    pub session: Rc<dyn CompositorSession>,
    pub paint: Rc<dyn PaintBackend>,
}

/// A single GPU-backed drawable surface registered with the compositor.
pub struct CompositorSurface {
    core: Rc<RefCell<SurfaceCore>>,
}

struct SurfaceCore {
    ctx: SurfaceContext,
    valid: bool,
    // GPU resources release in declaration order on drop:
    // image → memory → collection → fence pair → command fence.
    image: Option<SharedImage>,
    memory: Option<Owned<MemoryHandle>>,
    collection: Option<Owned<CollectionHandle>>,
    fences: Option<FencePair>,
    command_fence: Option<Owned<FenceHandle>>,
    submission_outstanding: bool,
    paint_surface: Option<Rc<dyn PaintSurface>>,
    buffer_id: Option<BufferId>,
    image_id: Option<ResourceId>,
    wait: Option<WaitId>,
    age: u64,
    size_history: [SurfaceSize; SIZE_HISTORY_LEN],
    size_history_index: usize,
    pending_writes_callback: Option<Box<dyn FnOnce()>>,
}

impl CompositorSurface {
    /// Allocate the surface in one transaction: negotiate the shared
    /// collection, create and bind the image, bind the drawing surface,
    /// create fences, register compositor resources, then run the initial
    /// reset to arm the release wait.
    ///
    /// On any failure the surface is returned permanently invalid; the
    /// resources acquired before the failing step are released when it is
    /// dropped. Callers discard and recreate rather than retry in place.
    pub fn new(ctx: SurfaceContext, size: SurfaceSize, buffer_id: BufferId) -> Self {
        let core = Rc::new(RefCell::new(SurfaceCore::new(ctx)));

        let setup = core.borrow_mut().setup(size, buffer_id);
        match setup {
            Ok(()) => {
                // The initial reset may still demote the surface to
                // invalid if the fence events cannot be armed.
                core.borrow_mut().valid = true;
                run_reset(&core);
            }
            Err(err) => {
                tracing::error!(%err, "surface setup failed; surface is invalid");
            }
        }

        Self { core }
    }

    pub fn is_valid(&self) -> bool {
        self.core.borrow().valid
    }

    /// Requested pixel size, or [`SurfaceSize::EMPTY`] once invalid.
    pub fn size(&self) -> SurfaceSize {
        self.core.borrow().current_size()
    }

    /// The bound drawing surface, or `None` once invalid.
    pub fn paint_surface(&self) -> Option<Rc<dyn PaintSurface>> {
        let core = self.core.borrow();
        if !core.valid {
            return None;
        }
        core.paint_surface.clone()
    }

    /// Compositor resource id of the image, once registered.
    pub fn image_id(&self) -> Option<ResourceId> {
        self.core.borrow().image_id
    }

    /// Session buffer id the collection was registered under.
    pub fn buffer_id(&self) -> Option<BufferId> {
        self.core.borrow().buffer_id
    }

    /// Semaphore the producer's GPU work must wait on before writing.
    /// Recreated every reset cycle; fetch it fresh each frame.
    pub fn acquire_semaphore(&self) -> Option<SemaphoreHandle> {
        let core = self.core.borrow();
        core.fences
            .as_ref()
            .and_then(|fences| fences.acquire_semaphore.as_ref())
            .map(|semaphore| semaphore.raw())
    }

    /// Fence the producer signals from its frame submission; reset waits
    /// on it before the image memory may be reused.
    pub fn command_fence(&self) -> Option<FenceHandle> {
        let core = self.core.borrow();
        core.command_fence.as_ref().map(|fence| fence.raw())
    }

    /// Note that GPU work signalling [`Self::command_fence`] is in flight.
    pub fn mark_submission(&self) {
        self.core.borrow_mut().submission_outstanding = true;
    }

    /// Record the current size into the history ring and bump the age.
    /// Returns the new age: frames sat idle since the last fence flush.
    pub fn advance_and_get_age(&self) -> u64 {
        let mut core = self.core.borrow_mut();
        let size = core.current_size();
        let index = core.size_history_index;
        core.size_history[index] = size;
        core.size_history_index = (index + 1) % SIZE_HISTORY_LEN;
        core.age += 1;
        core.age
    }

    /// Recently observed sizes, for the recycling pool.
    pub fn size_history(&self) -> [SurfaceSize; SIZE_HISTORY_LEN] {
        self.core.borrow().size_history
    }

    /// Duplicate both fence events and enqueue them with the session as
    /// this frame's acquire/release fences, then zero the age. Returns
    /// false (without enqueuing anything) when duplication fails.
    pub fn flush_session_acquire_and_release_events(&self) -> bool {
        let mut core = self.core.borrow_mut();
        let (acquire_raw, release_raw) = match core.fences.as_ref() {
            Some(fences) => (fences.acquire_event.raw(), fences.release_event.raw()),
            None => return false,
        };

        let acquire = match core.ctx.platform.duplicate_event(acquire_raw) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(%err, "failed to duplicate acquire fence event");
                return false;
            }
        };
        let release = match core.ctx.platform.duplicate_event(release_raw) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(%err, "failed to duplicate release fence event");
                core.ctx.platform.close_event(acquire);
                return false;
            }
        };

        core.ctx.session.enqueue_acquire_fence(acquire);
        core.ctx.session.enqueue_release_fence(release);
        core.age = 0;
        true
    }

    /// Register a callback for when the compositor has finished reading
    /// the previously submitted frame.
    ///
    /// At most one callback may be outstanding: registering a second one
    /// before the first has fired is a caller contract violation and
    /// panics immediately. On an invalid surface the callback runs right
    /// away, since no compositor read can be pending.
    pub fn signal_writes_finished(&self, on_writes_committed: impl FnOnce() + 'static) {
        let immediate: Option<Box<dyn FnOnce()>> = {
            let mut core = self.core.borrow_mut();
            if core.valid {
                assert!(
                    core.pending_writes_callback.is_none(),
                    "attempted to signal a write on the surface when the previous write \
                     has not yet been acknowledged by the compositor"
                );
                core.pending_writes_callback = Some(Box::new(on_writes_committed));
                None
            } else {
                Some(Box::new(on_writes_committed))
            }
        };
        if let Some(callback) = immediate {
            callback();
        }
    }
}

/// Run the reset sequence, invoking the pending completion callback (if
/// any) only after the borrow on surface state has been released.
fn run_reset(core: &Rc<RefCell<SurfaceCore>>) {
    let callback = {
        let weak = Rc::downgrade(core);
        core.borrow_mut().reset(weak)
    };
    if let Some(callback) = callback {
        callback();
    }
}

impl SurfaceCore {
    fn new(ctx: SurfaceContext) -> Self {
        Self {
            ctx,
            valid: false,
            image: None,
            memory: None,
            collection: None,
            fences: None,
            command_fence: None,
            submission_outstanding: false,
            paint_surface: None,
            buffer_id: None,
            image_id: None,
            wait: None,
            age: 0,
            size_history: [SurfaceSize::EMPTY; SIZE_HISTORY_LEN],
            size_history_index: 0,
            pending_writes_callback: None,
        }
    }

    fn current_size(&self) -> SurfaceSize {
        if !self.valid {
            return SurfaceSize::EMPTY;
        }
        self.paint_surface
            .as_ref()
            .map(|surface| surface.size())
            .unwrap_or(SurfaceSize::EMPTY)
    }

    fn setup(&mut self, size: SurfaceSize, buffer_id: BufferId) -> Result<(), SetupError> {
        if size.is_empty() {
            return Err(SetupError::EmptySize);
        }

        // Two views of one collection: ours goes to the driver, the
        // duplicate to the compositor. Sync before anyone redeems theirs.
        let local_token = self.ctx.allocator.allocate_collection()?;
        let session_token = self.ctx.allocator.duplicate_token(local_token)?;
        self.ctx.allocator.sync_token(local_token)?;

        self.ctx
            .session
            .register_buffer_collection(buffer_id, session_token);
        self.buffer_id = Some(buffer_id);

        let collection_raw = self
            .ctx
            .driver
            .import_buffer_collection(local_token)
            .map_err(|err| {
                tracing::error!(%err, "failed to import buffer collection");
                err
            })?;
        self.collection = Some({
            let driver = self.ctx.driver.clone();
            Owned::new(collection_raw, move |handle| {
                driver.destroy_buffer_collection(handle)
            })
        });

        let image = create_shared_image(&self.ctx.driver, collection_raw, size)?;

        let properties = self
            .ctx
            .driver
            .collection_properties(collection_raw)
            .map_err(|err| {
                tracing::error!(%err, "failed to query buffer collection properties");
                err
            })?;
        let memory_type_index =
            compatible_memory_type_index(&image.requirements, properties.memory_type_bits)
                .ok_or_else(|| {
                    tracing::error!(
                        image_bits = image.requirements.memory_type_bits,
                        collection_bits = properties.memory_type_bits,
                        "buffer collection negotiation produced no usable memory type"
                    );
                    SetupError::NoCompatibleMemoryType
                })?;

        let memory_raw = self
            .ctx
            .driver
            .allocate_collection_memory(
                collection_raw,
                0,
                image.requirements.size,
                memory_type_index,
            )
            .map_err(|err| {
                tracing::error!(
                    %err,
                    size = image.requirements.size,
                    "failed to allocate device memory"
                );
                err
            })?;
        self.memory = Some({
            let driver = self.ctx.driver.clone();
            Owned::new(memory_raw, move |handle| driver.free_memory(handle))
        });

        self.ctx
            .driver
            .bind_image_memory(image.image.raw(), memory_raw, 0)
            .map_err(|err| {
                tracing::error!(%err, "failed to bind image memory");
                err
            })?;

        let target = RenderTargetDesc {
            image: image.image.raw(),
            memory: memory_raw,
            allocation_size: image.requirements.size,
            size,
            format: image.spec.format,
            tiling: image.spec.tiling,
            usage: image.spec.usage,
            mip_levels: image.spec.mip_levels,
        };
        self.image = Some(image);

        self.paint_surface = Some(
            self.ctx
                .paint
                .bind_render_target(&target)
                .ok_or(SetupError::PaintBinding)?,
        );

        self.fences = Some(FencePair::create(&self.ctx.platform, &self.ctx.driver)?);
        self.command_fence = Some({
            let raw = self.ctx.driver.create_fence()?;
            let driver = self.ctx.driver.clone();
            Owned::new(raw, move |handle| driver.destroy_fence(handle))
        });

        let image_id = self.ctx.session.alloc_resource_id();
        self.ctx
            .session
            .enqueue_create_image(image_id, size, buffer_id, 0);
        self.image_id = Some(image_id);

        Ok(())
    }

    /// The reset sequence, in order:
    /// (a) re-arm both fence events to unsignaled (invalidating the
    ///     surface if that fails),
    /// (b) wait out the command fence if a submission is outstanding,
    /// (c) reset the command fence,
    /// (d) recreate the acquire semaphore (one-shot import),
    /// (e) re-register the wait on the release event,
    /// (f) hand back the pending completion callback for the caller to
    ///     invoke once all borrows are released.
    fn reset(&mut self, core: Weak<RefCell<SurfaceCore>>) -> Option<Box<dyn FnOnce()>> {
        let Some(fences) = self.fences.as_mut() else {
            return self.pending_writes_callback.take();
        };

        if self
            .ctx
            .platform
            .clear_event(fences.acquire_event.raw())
            .is_err()
            || self
                .ctx
                .platform
                .clear_event(fences.release_event.raw())
                .is_err()
        {
            self.valid = false;
            tracing::error!("could not re-arm surface fences; the surface is no longer valid");
        }

        if let Some(fence) = self.command_fence.as_ref() {
            if self.submission_outstanding {
                if let Err(err) = self.ctx.driver.wait_for_fence(fence.raw(), u64::MAX) {
                    tracing::error!(%err, "wait for outstanding command fence failed");
                }
                self.submission_outstanding = false;
            }
            if let Err(err) = self.ctx.driver.reset_fence(fence.raw()) {
                tracing::error!(%err, "failed to reset command fence");
            }
        }

        // Recreate rather than reuse: the semaphore's event import is
        // one-shot and must not survive a wait.
        fences.recreate_acquire_semaphore(&self.ctx.platform, &self.ctx.driver);

        let release = fences.release_event.raw();
        self.wait = Some(self.ctx.reactor.register(
            release,
            Box::new(move || {
                if let Some(core) = core.upgrade() {
                    run_reset(&core);
                }
            }),
        ));

        self.pending_writes_callback.take()
    }
}

impl Drop for SurfaceCore {
    fn drop(&mut self) {
        // Image resource and collection registration are independent;
        // release whichever subset setup actually acquired.
        if let Some(image_id) = self.image_id {
            self.ctx.session.enqueue_release_resource(image_id);
        }
        if let Some(buffer_id) = self.buffer_id {
            self.ctx.session.deregister_buffer_collection(buffer_id);
        }
        // No callback may fire on a destroyed surface.
        if let Some(wait) = self.wait.take() {
            self.ctx.reactor.cancel(wait);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylight_gpu::{SimDriver, SimFailures};
    use skylight_platform::{SimPlatform, SimPlatformFailures, SimReactor};
    use std::cell::Cell;

    use crate::alloc::SimAllocator;
    use crate::paint::SimPaintBackend;
    use crate::session::{RecordingSession, SessionCommand};

    struct Harness {
        platform: Rc<SimPlatform>,
        reactor: Rc<SimReactor>,
        driver: Rc<SimDriver>,
        allocator: Rc<SimAllocator>,
        session: Rc<RecordingSession>,
        paint: Rc<SimPaintBackend>,
    }

    impl Harness {
        fn new() -> Self {
            let platform = Rc::new(SimPlatform::new());
            let reactor = Rc::new(SimReactor::new(platform.clone()));
            Self {
                platform,
                reactor,
                driver: Rc::new(SimDriver::new()),
                allocator: Rc::new(SimAllocator::new()),
                session: Rc::new(RecordingSession::new()),
                paint: Rc::new(SimPaintBackend::new()),
            }
        }

        fn ctx(&self) -> SurfaceContext {
            SurfaceContext {
                platform: self.platform.clone(),
                reactor: self.reactor.clone(),
                driver: self.driver.clone(),
                allocator: self.allocator.clone(),
                session: self.session.clone(),
                paint: self.paint.clone(),
            }
        }

        fn surface(&self, width: u32, height: u32) -> CompositorSurface {
            CompositorSurface::new(self.ctx(), SurfaceSize::new(width, height), BufferId(1))
        }

        /// Signal the release fence the compositor holds (the duplicate
        /// enqueued by the last flush).
        fn signal_release(&self) {
            let event = self
                .session
                .last_release_fence()
                .expect("no release fence flushed");
            self.platform.signal_event(event).unwrap();
        }
    }

    #[test]
    fn valid_surface_reports_requested_size() {
        let h = Harness::new();
        let surface = h.surface(640, 480);

        assert!(surface.is_valid());
        assert_eq!(surface.size(), SurfaceSize::new(640, 480));
        assert_eq!(
            surface.paint_surface().unwrap().size(),
            SurfaceSize::new(640, 480)
        );
        assert_eq!(h.paint.bound_targets()[0].size, SurfaceSize::new(640, 480));
    }

    #[test]
    fn paint_binding_refusal_fails_setup() {
        let h = Harness::new();
        h.paint.refuse_bindings();
        let surface = h.surface(8, 8);

        assert!(!surface.is_valid());
        assert!(h.paint.bound_targets().is_empty());
        drop(surface);
        // Everything acquired before the refusal is still released.
        assert_eq!(h.driver.live_images(), 0);
        assert_eq!(h.driver.live_memory(), 0);
        assert_eq!(h.driver.live_collections(), 0);
    }

    #[test]
    fn empty_size_leaves_surface_invalid() {
        let h = Harness::new();
        let surface = h.surface(0, 100);

        assert!(!surface.is_valid());
        assert_eq!(surface.size(), SurfaceSize::EMPTY);
        assert!(surface.paint_surface().is_none());
        assert!(!surface.flush_session_acquire_and_release_events());
    }

    #[test]
    fn construction_registers_collection_then_image() {
        let h = Harness::new();
        let surface = h.surface(32, 32);

        let commands = h.session.commands();
        assert!(matches!(
            commands[0],
            SessionCommand::RegisterBufferCollection {
                buffer: BufferId(1),
                ..
            }
        ));
        assert_eq!(
            commands[1],
            SessionCommand::CreateImage {
                resource: surface.image_id().unwrap(),
                size: SurfaceSize::new(32, 32),
                buffer: BufferId(1),
                index: 0,
            }
        );
        // Construction armed the release wait.
        assert_eq!(h.reactor.pending_waits(), 1);
    }

    #[test]
    fn age_advances_until_flush_resets_it() {
        let h = Harness::new();
        let surface = h.surface(8, 8);

        assert_eq!(surface.advance_and_get_age(), 1);
        assert_eq!(surface.advance_and_get_age(), 2);
        assert_eq!(surface.advance_and_get_age(), 3);

        assert!(surface.flush_session_acquire_and_release_events());
        assert_eq!(surface.advance_and_get_age(), 1);
    }

    #[test]
    fn size_history_records_and_wraps() {
        let h = Harness::new();
        let surface = h.surface(8, 8);
        assert_eq!(surface.size_history(), [SurfaceSize::EMPTY; SIZE_HISTORY_LEN]);

        surface.advance_and_get_age();
        surface.advance_and_get_age();
        let history = surface.size_history();
        assert_eq!(history[0], SurfaceSize::new(8, 8));
        assert_eq!(history[1], SurfaceSize::new(8, 8));
        assert_eq!(history[2], SurfaceSize::EMPTY);

        surface.advance_and_get_age();
        surface.advance_and_get_age();
        assert_eq!(surface.size_history(), [SurfaceSize::new(8, 8); SIZE_HISTORY_LEN]);
    }

    #[test]
    fn flush_enqueues_duplicated_fence_events() {
        let h = Harness::new();
        let surface = h.surface(8, 8);
        h.session.take_commands();

        assert!(surface.flush_session_acquire_and_release_events());
        let commands = h.session.commands();
        let (acquire, release) = match (&commands[0], &commands[1]) {
            (
                SessionCommand::AcquireFence { event: acquire },
                SessionCommand::ReleaseFence { event: release },
            ) => (*acquire, *release),
            other => panic!("unexpected commands: {other:?}"),
        };
        assert_ne!(acquire, release);
        // Duplicates share signal state with the surface's own events:
        // signaling the session's release handle is what wakes the wait.
        h.platform.signal_event(release).unwrap();
        assert_eq!(h.reactor.pump(), 1);
    }

    #[test]
    fn failed_duplication_aborts_the_flush_without_leaking() {
        let h = Harness::new();
        let surface = h.surface(8, 8);
        h.session.take_commands();
        let live = h.platform.live_handles();

        h.platform.set_failures(SimPlatformFailures {
            duplicate_event: true,
            ..SimPlatformFailures::default()
        });
        assert!(!surface.flush_session_acquire_and_release_events());
        assert!(h.session.commands().is_empty());
        assert_eq!(h.platform.live_handles(), live);
        // A failed flush is retryable; the surface stays valid.
        assert!(surface.is_valid());

        h.platform.set_failures(SimPlatformFailures::default());
        assert!(surface.flush_session_acquire_and_release_events());
    }

    #[test]
    fn flush_closes_the_acquire_duplicate_when_the_release_one_fails() {
        let h = Harness::new();
        let surface = h.surface(8, 8);
        h.session.take_commands();
        let live = h.platform.live_handles();

        h.platform.fail_duplicate_events_after(1);
        assert!(!surface.flush_session_acquire_and_release_events());
        assert!(h.session.commands().is_empty());
        assert_eq!(h.platform.live_handles(), live);
    }

    #[test]
    fn clear_failure_during_reset_degrades_to_invalid() {
        let h = Harness::new();
        let surface = h.surface(8, 8);

        let committed = Rc::new(Cell::new(false));
        let flag = committed.clone();
        surface.signal_writes_finished(move || flag.set(true));
        assert!(surface.flush_session_acquire_and_release_events());

        h.platform.set_failures(SimPlatformFailures {
            clear_event: true,
            ..SimPlatformFailures::default()
        });
        h.signal_release();
        assert_eq!(h.reactor.pump(), 1);

        // Reset ran to completion: no panic, the callback still fired,
        // and the surface degraded to invalid.
        assert!(committed.get());
        assert!(!surface.is_valid());
        assert_eq!(surface.size(), SurfaceSize::EMPTY);
    }

    #[test]
    #[should_panic(expected = "previous write")]
    fn double_write_signal_is_a_fatal_contract_violation() {
        let h = Harness::new();
        let surface = h.surface(8, 8);
        surface.signal_writes_finished(|| {});
        surface.signal_writes_finished(|| {});
    }

    #[test]
    fn write_signal_on_invalid_surface_runs_immediately() {
        let h = Harness::new();
        let surface = h.surface(0, 0);

        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        surface.signal_writes_finished(move || flag.set(true));
        assert!(ran.get());

        // And a second registration is fine: nothing is pending.
        surface.signal_writes_finished(|| {});
    }

    #[test]
    fn release_signal_resets_and_fires_exactly_one_callback() {
        let h = Harness::new();
        let surface = h.surface(16, 16);

        let committed = Rc::new(Cell::new(0u32));
        let counter = committed.clone();
        surface.signal_writes_finished(move || counter.set(counter.get() + 1));
        assert!(surface.flush_session_acquire_and_release_events());

        h.signal_release();
        assert_eq!(h.reactor.pump(), 1);
        assert_eq!(committed.get(), 1);
        assert!(surface.is_valid());

        // Next cycle with no registered callback: reset still runs, no
        // crash, counter untouched.
        assert!(surface.flush_session_acquire_and_release_events());
        h.signal_release();
        assert_eq!(h.reactor.pump(), 1);
        assert_eq!(committed.get(), 1);
    }

    #[test]
    fn reset_recreates_the_acquire_semaphore() {
        let h = Harness::new();
        let surface = h.surface(8, 8);
        let before = h.driver.counters();
        let old_semaphore = surface.acquire_semaphore().unwrap();

        assert!(surface.flush_session_acquire_and_release_events());
        h.signal_release();
        assert_eq!(h.reactor.pump(), 1);

        let after = h.driver.counters();
        assert_eq!(after.semaphores_imported, before.semaphores_imported + 1);
        assert_eq!(after.semaphores_destroyed, before.semaphores_destroyed + 1);
        assert_ne!(surface.acquire_semaphore().unwrap(), old_semaphore);
    }

    #[test]
    fn reset_waits_command_fence_only_when_submission_outstanding() {
        let h = Harness::new();
        let surface = h.surface(8, 8);
        let waits_before = h.driver.counters().fence_waits;

        // Cycle without a submission: no wait.
        assert!(surface.flush_session_acquire_and_release_events());
        h.signal_release();
        h.reactor.pump();
        assert_eq!(h.driver.counters().fence_waits, waits_before);

        // Cycle with an outstanding submission: exactly one wait.
        surface.mark_submission();
        assert!(surface.flush_session_acquire_and_release_events());
        h.signal_release();
        h.reactor.pump();
        assert_eq!(h.driver.counters().fence_waits, waits_before + 1);
    }

    #[test]
    fn disjoint_memory_types_fail_setup_deterministically() {
        let h = Harness::new();
        h.driver.set_memory_type_bits(0b0011, 0b1100);
        let surface = h.surface(8, 8);

        assert!(!surface.is_valid());
        assert_eq!(surface.size(), SurfaceSize::EMPTY);
        assert_eq!(h.driver.live_memory(), 0);
    }

    #[test]
    fn failed_setup_releases_only_what_was_acquired() {
        let h = Harness::new();
        h.driver.set_failures(SimFailures {
            create_collection_image: true,
            ..SimFailures::default()
        });
        let surface = h.surface(8, 8);
        assert!(!surface.is_valid());
        drop(surface);

        // The collection was registered before the failure, so it is
        // deregistered; no image resource was ever created or released.
        let commands = h.session.take_commands();
        assert!(commands.iter().any(|command| matches!(
            command,
            SessionCommand::DeregisterBufferCollection { buffer: BufferId(1) }
        )));
        assert!(!commands
            .iter()
            .any(|command| matches!(command, SessionCommand::ReleaseResource { .. })));
        assert_eq!(h.driver.live_collections(), 0);
        assert_eq!(h.driver.live_images(), 0);
    }

    #[test]
    fn allocator_failure_never_touches_the_session() {
        let h = Harness::new();
        h.allocator.fail_allocation();
        let surface = h.surface(8, 8);
        assert!(!surface.is_valid());
        drop(surface);
        assert!(h.session.commands().is_empty());
    }

    #[test]
    fn drop_releases_compositor_resources_and_cancels_the_wait() {
        let h = Harness::new();
        let surface = h.surface(8, 8);
        let image_id = surface.image_id().unwrap();
        h.session.take_commands();
        assert_eq!(h.reactor.pending_waits(), 1);

        drop(surface);

        assert_eq!(
            h.session.take_commands(),
            vec![
                SessionCommand::ReleaseResource { resource: image_id },
                SessionCommand::DeregisterBufferCollection { buffer: BufferId(1) },
            ]
        );
        assert_eq!(h.reactor.pending_waits(), 0);
        assert_eq!(h.driver.live_images(), 0);
        assert_eq!(h.driver.live_memory(), 0);
        assert_eq!(h.driver.live_collections(), 0);
        assert_eq!(h.driver.live_semaphores(), 0);
        assert_eq!(h.driver.live_fences(), 0);
    }

    #[test]
    fn completion_callback_may_destroy_the_surface() {
        let h = Harness::new();
        let slot = Rc::new(RefCell::new(Some(h.surface(8, 8))));

        {
            let surface = slot.borrow();
            let surface = surface.as_ref().unwrap();
            let slot = Rc::clone(&slot);
            surface.signal_writes_finished(move || {
                slot.borrow_mut().take();
            });
            assert!(surface.flush_session_acquire_and_release_events());
        }

        h.signal_release();
        assert_eq!(h.reactor.pump(), 1);
        assert!(slot.borrow().is_none());
        // The re-armed wait was cancelled by destruction.
        assert_eq!(h.reactor.pending_waits(), 0);
    }
}
