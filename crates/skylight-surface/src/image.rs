//! Shared image resource: one GPU image created against a cross-process
//! buffer collection.

use std::rc::Rc;

use skylight_gpu::{
    CollectionHandle, GpuDriver, ImageHandle, ImageSpec, ImageTiling, ImageUsage,
    MemoryRequirements, PixelFormat,
};
use skylight_platform::Owned;

use crate::error::SetupError;
use crate::SurfaceSize;

/// Format every drawable surface is allocated with.
pub const SURFACE_FORMAT: PixelFormat = PixelFormat::Rgba8Unorm;

/// Usage bits requested for the shared image.
// TODO: trim to the usages the drawing library actually needs.
pub const SURFACE_USAGE: ImageUsage = ImageUsage::COLOR_ATTACHMENT
    .union(ImageUsage::TRANSFER_SRC)
    .union(ImageUsage::TRANSFER_DST)
    .union(ImageUsage::SAMPLED);

/// A GPU image plus the descriptors needed to bind and wrap it.
pub struct SharedImage {
    pub image: Owned<ImageHandle>,
    pub spec: ImageSpec,
    pub requirements: MemoryRequirements,
}

pub fn image_spec_for_size(size: SurfaceSize) -> ImageSpec {
    ImageSpec {
        width: size.width,
        height: size.height,
        format: SURFACE_FORMAT,
        tiling: ImageTiling::Optimal,
        usage: SURFACE_USAGE,
        mip_levels: 1,
        array_layers: 1,
        samples: 1,
    }
}

/// Create the surface's image against a negotiated collection.
///
/// Constraints are registered before the image is created and queried:
/// constraint registration can change the memory requirements the driver
/// reports, so the order is part of the contract with the allocation
/// service.
pub fn create_shared_image(
    driver: &Rc<dyn GpuDriver>,
    collection: CollectionHandle,
    size: SurfaceSize,
) -> Result<SharedImage, SetupError> {
    if size.is_empty() {
        return Err(SetupError::EmptySize);
    }

    let spec = image_spec_for_size(size);

    driver
        .set_collection_image_constraints(collection, &spec)
        .map_err(|err| {
            tracing::error!(%err, "failed to set buffer collection image constraints");
            err
        })?;

    let raw = driver
        .create_collection_image(collection, 0, &spec)
        .map_err(|err| {
            tracing::error!(
                %err,
                width = size.width,
                height = size.height,
                "failed to create shared image"
            );
            err
        })?;
    let image = {
        let driver = driver.clone();
        Owned::new(raw, move |handle| driver.destroy_image(handle))
    };

    let requirements = driver.image_memory_requirements(raw).map_err(|err| {
        tracing::error!(%err, "failed to query image memory requirements");
        err
    })?;

    Ok(SharedImage {
        image,
        spec,
        requirements,
    })
}

/// Pick the lowest memory type allowed by both the image and the
/// collection, or `None` when the negotiation produced no overlap.
pub fn compatible_memory_type_index(
    requirements: &MemoryRequirements,
    collection_bits: u32,
) -> Option<u32> {
    let bits = requirements.memory_type_bits & collection_bits;
    if bits == 0 {
        return None;
    }
    Some(bits.trailing_zeros())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylight_gpu::{CollectionToken, SimDriver};

    fn sim_collection(driver: &SimDriver) -> CollectionHandle {
        driver.import_buffer_collection(CollectionToken(1)).unwrap()
    }

    #[test]
    fn empty_size_is_rejected_before_any_driver_call() {
        let driver = Rc::new(SimDriver::new());
        let collection = sim_collection(&driver);
        let dyn_driver: Rc<dyn GpuDriver> = driver.clone();

        let result = create_shared_image(&dyn_driver, collection, SurfaceSize::EMPTY);
        assert!(matches!(result, Err(SetupError::EmptySize)));
        assert_eq!(driver.counters().constraint_calls, 0);
    }

    #[test]
    fn constraints_are_registered_before_creation() {
        let driver = Rc::new(SimDriver::new());
        let collection = sim_collection(&driver);
        let dyn_driver: Rc<dyn GpuDriver> = driver.clone();

        // SimDriver refuses image creation on collections without
        // constraints, so success here proves the ordering.
        let shared = create_shared_image(&dyn_driver, collection, SurfaceSize::new(16, 8)).unwrap();
        assert_eq!(shared.requirements.size, 16 * 8 * 4);
        assert_eq!(shared.spec.width, 16);
        assert_eq!(driver.counters().constraint_calls, 1);
    }

    #[test]
    fn image_is_destroyed_when_dropped() {
        let driver = Rc::new(SimDriver::new());
        let collection = sim_collection(&driver);
        let dyn_driver: Rc<dyn GpuDriver> = driver.clone();

        let shared = create_shared_image(&dyn_driver, collection, SurfaceSize::new(4, 4)).unwrap();
        assert_eq!(driver.live_images(), 1);
        drop(shared);
        assert_eq!(driver.live_images(), 0);
    }

    #[test]
    fn memory_type_intersection_picks_lowest_bit() {
        let requirements = MemoryRequirements {
            size: 0,
            alignment: 0,
            memory_type_bits: 0b1100,
        };
        assert_eq!(compatible_memory_type_index(&requirements, 0b1000), Some(3));
        assert_eq!(compatible_memory_type_index(&requirements, 0b1100), Some(2));
        assert_eq!(compatible_memory_type_index(&requirements, 0b0011), None);
    }
}
