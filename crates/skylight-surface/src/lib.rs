//! Lifecycle of a single GPU-backed drawable surface shared with a remote
//! window compositor.
//!
//! One [`CompositorSurface`] owns one shared image: GPU memory imported
//! from a cross-process buffer collection, a drawing-library binding over
//! that image, an acquire/release fence pair wired to the compositor
//! session, and the frame-reuse state machine that keeps the renderer and
//! the compositor from touching the buffer at the same time.
//!
//! Frame cycle:
//! 1. the renderer paints into [`CompositorSurface::paint_surface`],
//! 2. registers a completion callback via
//!    [`CompositorSurface::signal_writes_finished`],
//! 3. flushes duplicated acquire/release fence events to the session with
//!    [`CompositorSurface::flush_session_acquire_and_release_events`],
//! 4. when the compositor signals the release event, the surface resets
//!    its fences for reuse and fires the completion callback.
//!
//! All collaborators are trait seams ([`GpuDriver`][skylight_gpu::GpuDriver],
//! [`CompositorSession`], [`BufferAllocator`], [`PaintBackend`],
//! [`Platform`][skylight_platform::Platform] and
//! [`Reactor`][skylight_platform::Reactor]); nothing in this crate talks to
//! real hardware or a real compositor.
#![forbid(unsafe_code)]

pub mod alloc;
pub mod error;
pub mod fence;
pub mod image;
pub mod paint;
pub mod session;
pub mod surface;

pub use alloc::{AllocatorError, BufferAllocator, SimAllocator};
pub use error::SetupError;
pub use fence::FencePair;
pub use image::SharedImage;
pub use paint::{PaintBackend, PaintSurface, RenderTargetDesc, SimPaintBackend};
pub use session::{
    BufferId, CompositorSession, RecordingSession, ResourceId, SessionCommand,
};
pub use surface::{CompositorSurface, SurfaceContext, SIZE_HISTORY_LEN};

/// Pixel dimensions of a drawable surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub const EMPTY: Self = SurfaceSize {
        width: 0,
        height: 0,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
