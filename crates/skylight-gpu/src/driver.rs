use skylight_platform::EventHandle;
use thiserror::Error;

use crate::types::{
    CollectionHandle, CollectionProperties, CollectionToken, FenceHandle, ImageHandle, ImageSpec,
    MemoryHandle, MemoryRequirements, SemaphoreHandle,
};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    #[error("out of device memory")]
    OutOfDeviceMemory,

    #[error("out of host memory")]
    OutOfHostMemory,

    #[error("device lost")]
    DeviceLost,

    #[error("stale or invalid handle passed to driver call")]
    InvalidHandle,

    #[error("driver call failed: {0}")]
    Failed(&'static str),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Synchronous GPU driver primitives consumed by the surface lifecycle.
///
/// Destroy calls are infallible and tolerate handles the driver no longer
/// knows about, so teardown can release whatever subset of resources a
/// partially failed setup acquired.
pub trait GpuDriver {
    /// Redeem a collection token for a driver-side collection handle.
    /// The token is consumed whether or not the import succeeds.
    fn import_buffer_collection(&self, token: CollectionToken) -> DriverResult<CollectionHandle>;

    /// Release this process's view of the collection. The allocation
    /// service keeps the underlying buffers alive while other participants
    /// still hold their own views.
    fn destroy_buffer_collection(&self, collection: CollectionHandle);

    /// Register the image constraints this surface needs into the
    /// collection so the allocation service can finalize a mutually
    /// compatible buffer layout. Must be called before images are created
    /// against the collection; constraint registration can change the
    /// requirements the driver reports for those images.
    fn set_collection_image_constraints(
        &self,
        collection: CollectionHandle,
        spec: &ImageSpec,
    ) -> DriverResult<()>;

    /// Query the finalized collection's memory properties.
    fn collection_properties(&self, collection: CollectionHandle)
        -> DriverResult<CollectionProperties>;

    /// Create an image backed by buffer `index` of the collection.
    fn create_collection_image(
        &self,
        collection: CollectionHandle,
        index: u32,
        spec: &ImageSpec,
    ) -> DriverResult<ImageHandle>;

    fn destroy_image(&self, image: ImageHandle);

    fn image_memory_requirements(&self, image: ImageHandle) -> DriverResult<MemoryRequirements>;

    /// Allocate device memory imported from buffer `index` of the
    /// collection, using one of the memory types permitted by both the
    /// image and the collection.
    fn allocate_collection_memory(
        &self,
        collection: CollectionHandle,
        index: u32,
        size: u64,
        memory_type_index: u32,
    ) -> DriverResult<MemoryHandle>;

    fn free_memory(&self, memory: MemoryHandle);

    fn bind_image_memory(
        &self,
        image: ImageHandle,
        memory: MemoryHandle,
        offset: u64,
    ) -> DriverResult<()>;

    /// Create a semaphore whose payload is imported from `event`.
    ///
    /// On success the driver takes ownership of the (already duplicated)
    /// event handle; on failure the caller still owns it and must close
    /// it. The import is one-shot: once the semaphore has been waited on
    /// it cannot be reused, so frame cycles destroy it and import a fresh
    /// duplicate.
    fn import_event_semaphore(&self, event: EventHandle) -> DriverResult<SemaphoreHandle>;

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle);

    /// Create a fence in the unsignaled state.
    fn create_fence(&self) -> DriverResult<FenceHandle>;

    fn destroy_fence(&self, fence: FenceHandle);

    /// Block until the fence signals or `timeout_ns` elapses.
    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> DriverResult<()>;

    /// Return a signaled fence to the unsignaled state.
    fn reset_fence(&self, fence: FenceHandle) -> DriverResult<()>;
}
