use bitflags::bitflags;

/// Opaque cross-process token identifying a negotiated shared-buffer
/// collection. Both this process and the compositor session redeem their
/// own token; neither side's release invalidates the other's view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CollectionToken(pub u64);

/// Driver handle to an imported buffer collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CollectionHandle(pub u64);

/// Driver handle to a GPU image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub u64);

/// Driver handle to a device memory allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemoryHandle(pub u64);

/// Driver handle to a GPU semaphore.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SemaphoreHandle(pub u64);

/// Driver handle to a GPU fence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FenceHandle(pub u64);

/// Color formats the drawable surface can be allocated with.
///
/// `*Srgb` variants share the byte layout of their unorm counterparts;
/// only the sampling/encode interpretation differs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8Unorm,
    Bgra8Unorm,
    Rgba8UnormSrgb,
    Bgra8UnormSrgb,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgba8Unorm | Self::Bgra8Unorm | Self::Rgba8UnormSrgb | Self::Bgra8UnormSrgb => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageTiling {
    Optimal,
    Linear,
}

bitflags! {
    /// Usage bits requested for the shared image.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ImageUsage: u32 {
        const COLOR_ATTACHMENT = 1 << 0;
        const TRANSFER_SRC = 1 << 1;
        const TRANSFER_DST = 1 << 2;
        const SAMPLED = 1 << 3;
    }
}

/// Image creation descriptor, also used to register collection constraints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSpec {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub tiling: ImageTiling,
    pub usage: ImageUsage,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: u32,
}

/// Driver-reported memory requirements for an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryRequirements {
    pub size: u64,
    pub alignment: u64,
    /// Bitmask of memory types the image can be bound to.
    pub memory_type_bits: u32,
}

/// Properties of a finalized buffer collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollectionProperties {
    /// Bitmask of memory types the collection's buffers can live in.
    pub memory_type_bits: u32,
}
