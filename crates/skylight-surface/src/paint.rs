//! Drawing-library seam.
//!
//! The 2D drawing library is an opaque sink: it accepts a fully bound GPU
//! render target and hands back a paint surface the renderer draws
//! through. Canvas and flush APIs stay on the library's side of the seam.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use skylight_gpu::{ImageHandle, ImageTiling, ImageUsage, MemoryHandle, PixelFormat};

use crate::SurfaceSize;

/// Everything the drawing library needs to wrap the shared image as a
/// render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderTargetDesc {
    pub image: ImageHandle,
    pub memory: MemoryHandle,
    pub allocation_size: u64,
    pub size: SurfaceSize,
    pub format: PixelFormat,
    pub tiling: ImageTiling,
    pub usage: ImageUsage,
    pub mip_levels: u32,
}

/// A bound drawable surface. The consumer obtains its canvas from the
/// drawing library directly; this crate only tracks identity and size.
pub trait PaintSurface {
    fn size(&self) -> SurfaceSize;
}

pub trait PaintBackend {
    /// Wrap a bound render target as a drawable surface. `None` means the
    /// library rejected the target (unsupported layout/format); setup
    /// treats that as a failure.
    fn bind_render_target(&self, desc: &RenderTargetDesc) -> Option<Rc<dyn PaintSurface>>;
}

struct SimPaintSurface {
    size: SurfaceSize,
}

impl PaintSurface for SimPaintSurface {
    fn size(&self) -> SurfaceSize {
        self.size
    }
}

/// Backend that accepts every target (unless told to refuse) and records
/// what was bound.
#[derive(Default)]
pub struct SimPaintBackend {
    refuse: Cell<bool>,
    bound: RefCell<Vec<RenderTargetDesc>>,
}

impl SimPaintBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_bindings(&self) {
        self.refuse.set(true);
    }

    pub fn bound_targets(&self) -> Vec<RenderTargetDesc> {
        self.bound.borrow().clone()
    }
}

impl PaintBackend for SimPaintBackend {
    fn bind_render_target(&self, desc: &RenderTargetDesc) -> Option<Rc<dyn PaintSurface>> {
        if self.refuse.get() {
            return None;
        }
        self.bound.borrow_mut().push(*desc);
        Some(Rc::new(SimPaintSurface { size: desc.size }))
    }
}
