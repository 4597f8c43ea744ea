use skylight_gpu::DriverError;
use skylight_platform::PlatformError;
use thiserror::Error;

use crate::alloc::AllocatorError;

/// Why surface setup failed.
///
/// Any of these leaves the surface permanently invalid: resources acquired
/// before the failing step are released when the surface is dropped, and
/// the caller is expected to discard the surface and construct a new one
/// rather than retry in place.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("requested surface size is empty")]
    EmptySize,

    #[error("buffer allocation service failed: {0}")]
    Allocator(#[from] AllocatorError),

    #[error("driver call failed: {0}")]
    Driver(#[from] DriverError),

    #[error("no memory type satisfies both the image and the collection")]
    NoCompatibleMemoryType,

    #[error("event object call failed: {0}")]
    Platform(#[from] PlatformError),

    #[error("drawing library refused the render target")]
    PaintBinding,
}
