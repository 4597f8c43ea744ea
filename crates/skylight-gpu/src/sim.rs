//! Simulated GPU driver.
//!
//! [`SimDriver`] keeps a handle table per object kind, enforces the
//! constraint-before-create ordering the real negotiation path depends on,
//! and lets tests inject a failure into any individual call to exercise
//! setup unwind behavior. Fences complete immediately on wait; headless
//! execution has no work in flight to wait for.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use skylight_platform::EventHandle;

use crate::driver::{DriverError, DriverResult, GpuDriver};
use crate::types::{
    CollectionHandle, CollectionProperties, CollectionToken, FenceHandle, ImageHandle, ImageSpec,
    MemoryHandle, MemoryRequirements, SemaphoreHandle,
};

/// Which calls should fail, and with what.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimFailures {
    pub import_buffer_collection: bool,
    pub set_collection_image_constraints: bool,
    pub collection_properties: bool,
    pub create_collection_image: bool,
    pub image_memory_requirements: bool,
    pub allocate_collection_memory: bool,
    pub bind_image_memory: bool,
    pub import_event_semaphore: bool,
    pub create_fence: bool,
    pub reset_fence: bool,
}

/// Call counters tests can assert against.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimCounters {
    pub semaphores_imported: u64,
    pub semaphores_destroyed: u64,
    pub fence_waits: u64,
    pub fence_resets: u64,
    pub constraint_calls: u64,
}

struct CollectionState {
    constraints: Option<ImageSpec>,
}

struct State {
    next_handle: u64,
    collections: HashMap<u64, CollectionState>,
    images: HashMap<u64, ImageSpec>,
    memory: HashSet<u64>,
    semaphores: HashMap<u64, EventHandle>,
    fences: HashSet<u64>,
    failures: SimFailures,
    counters: SimCounters,
    /// Memory types the driver reports for images (requirements side).
    image_memory_type_bits: u32,
    /// Memory types the collection reports (properties side).
    collection_memory_type_bits: u32,
}

pub struct SimDriver {
    state: RefCell<State>,
}

impl Default for SimDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimDriver {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State {
                next_handle: 0,
                collections: HashMap::new(),
                images: HashMap::new(),
                memory: HashSet::new(),
                semaphores: HashMap::new(),
                fences: HashSet::new(),
                failures: SimFailures::default(),
                counters: SimCounters::default(),
                image_memory_type_bits: 0b0111,
                collection_memory_type_bits: 0b0110,
            }),
        }
    }

    pub fn set_failures(&self, failures: SimFailures) {
        self.state.borrow_mut().failures = failures;
    }

    /// Configure the memory-type masks reported by the driver (image
    /// requirements) and the collection (properties). Disjoint masks model
    /// a failed negotiation.
    pub fn set_memory_type_bits(&self, image_bits: u32, collection_bits: u32) {
        let mut state = self.state.borrow_mut();
        state.image_memory_type_bits = image_bits;
        state.collection_memory_type_bits = collection_bits;
    }

    pub fn counters(&self) -> SimCounters {
        self.state.borrow().counters
    }

    /// Event handle backing the most recently imported semaphore.
    pub fn semaphore_event(&self, semaphore: SemaphoreHandle) -> Option<EventHandle> {
        self.state.borrow().semaphores.get(&semaphore.0).copied()
    }

    pub fn live_images(&self) -> usize {
        self.state.borrow().images.len()
    }

    pub fn live_memory(&self) -> usize {
        self.state.borrow().memory.len()
    }

    pub fn live_collections(&self) -> usize {
        self.state.borrow().collections.len()
    }

    pub fn live_semaphores(&self) -> usize {
        self.state.borrow().semaphores.len()
    }

    pub fn live_fences(&self) -> usize {
        self.state.borrow().fences.len()
    }

    fn next_handle(state: &mut State) -> u64 {
        state.next_handle += 1;
        state.next_handle
    }
}

impl GpuDriver for SimDriver {
    fn import_buffer_collection(&self, _token: CollectionToken) -> DriverResult<CollectionHandle> {
        let mut state = self.state.borrow_mut();
        if state.failures.import_buffer_collection {
            return Err(DriverError::Failed("import_buffer_collection"));
        }
        let handle = Self::next_handle(&mut state);
        state
            .collections
            .insert(handle, CollectionState { constraints: None });
        Ok(CollectionHandle(handle))
    }

    fn destroy_buffer_collection(&self, collection: CollectionHandle) {
        self.state.borrow_mut().collections.remove(&collection.0);
    }

    fn set_collection_image_constraints(
        &self,
        collection: CollectionHandle,
        spec: &ImageSpec,
    ) -> DriverResult<()> {
        let mut state = self.state.borrow_mut();
        state.counters.constraint_calls += 1;
        if state.failures.set_collection_image_constraints {
            return Err(DriverError::Failed("set_collection_image_constraints"));
        }
        let entry = state
            .collections
            .get_mut(&collection.0)
            .ok_or(DriverError::InvalidHandle)?;
        entry.constraints = Some(*spec);
        Ok(())
    }

    fn collection_properties(
        &self,
        collection: CollectionHandle,
    ) -> DriverResult<CollectionProperties> {
        let state = self.state.borrow();
        if state.failures.collection_properties {
            return Err(DriverError::Failed("collection_properties"));
        }
        if !state.collections.contains_key(&collection.0) {
            return Err(DriverError::InvalidHandle);
        }
        Ok(CollectionProperties {
            memory_type_bits: state.collection_memory_type_bits,
        })
    }

    fn create_collection_image(
        &self,
        collection: CollectionHandle,
        _index: u32,
        spec: &ImageSpec,
    ) -> DriverResult<ImageHandle> {
        let mut state = self.state.borrow_mut();
        if state.failures.create_collection_image {
            return Err(DriverError::Failed("create_collection_image"));
        }
        let entry = state
            .collections
            .get(&collection.0)
            .ok_or(DriverError::InvalidHandle)?;
        if entry.constraints.is_none() {
            // The allocation service cannot finalize a layout for an image
            // whose constraints were never registered.
            return Err(DriverError::Failed(
                "create_collection_image before constraints were set",
            ));
        }
        let handle = Self::next_handle(&mut state);
        state.images.insert(handle, *spec);
        Ok(ImageHandle(handle))
    }

    fn destroy_image(&self, image: ImageHandle) {
        self.state.borrow_mut().images.remove(&image.0);
    }

    fn image_memory_requirements(&self, image: ImageHandle) -> DriverResult<MemoryRequirements> {
        let state = self.state.borrow();
        if state.failures.image_memory_requirements {
            return Err(DriverError::Failed("image_memory_requirements"));
        }
        let spec = state.images.get(&image.0).ok_or(DriverError::InvalidHandle)?;
        let size = u64::from(spec.width)
            * u64::from(spec.height)
            * u64::from(spec.format.bytes_per_pixel());
        Ok(MemoryRequirements {
            size,
            alignment: 4096,
            memory_type_bits: state.image_memory_type_bits,
        })
    }

    fn allocate_collection_memory(
        &self,
        collection: CollectionHandle,
        _index: u32,
        _size: u64,
        memory_type_index: u32,
    ) -> DriverResult<MemoryHandle> {
        let mut state = self.state.borrow_mut();
        if state.failures.allocate_collection_memory {
            return Err(DriverError::OutOfDeviceMemory);
        }
        if !state.collections.contains_key(&collection.0) {
            return Err(DriverError::InvalidHandle);
        }
        if state.collection_memory_type_bits & (1 << memory_type_index) == 0 {
            return Err(DriverError::Failed("memory type not in collection mask"));
        }
        let handle = Self::next_handle(&mut state);
        state.memory.insert(handle);
        Ok(MemoryHandle(handle))
    }

    fn free_memory(&self, memory: MemoryHandle) {
        self.state.borrow_mut().memory.remove(&memory.0);
    }

    fn bind_image_memory(
        &self,
        image: ImageHandle,
        memory: MemoryHandle,
        _offset: u64,
    ) -> DriverResult<()> {
        let state = self.state.borrow();
        if state.failures.bind_image_memory {
            return Err(DriverError::Failed("bind_image_memory"));
        }
        if !state.images.contains_key(&image.0) || !state.memory.contains(&memory.0) {
            return Err(DriverError::InvalidHandle);
        }
        Ok(())
    }

    fn import_event_semaphore(&self, event: EventHandle) -> DriverResult<SemaphoreHandle> {
        let mut state = self.state.borrow_mut();
        if state.failures.import_event_semaphore {
            return Err(DriverError::Failed("import_event_semaphore"));
        }
        let handle = Self::next_handle(&mut state);
        state.semaphores.insert(handle, event);
        state.counters.semaphores_imported += 1;
        Ok(SemaphoreHandle(handle))
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        let mut state = self.state.borrow_mut();
        if state.semaphores.remove(&semaphore.0).is_some() {
            state.counters.semaphores_destroyed += 1;
        }
    }

    fn create_fence(&self) -> DriverResult<FenceHandle> {
        let mut state = self.state.borrow_mut();
        if state.failures.create_fence {
            return Err(DriverError::OutOfHostMemory);
        }
        let handle = Self::next_handle(&mut state);
        state.fences.insert(handle);
        Ok(FenceHandle(handle))
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        self.state.borrow_mut().fences.remove(&fence.0);
    }

    fn wait_for_fence(&self, fence: FenceHandle, _timeout_ns: u64) -> DriverResult<()> {
        let mut state = self.state.borrow_mut();
        if !state.fences.contains(&fence.0) {
            return Err(DriverError::InvalidHandle);
        }
        // Headless shortcut: submitted work completes immediately.
        state.counters.fence_waits += 1;
        Ok(())
    }

    fn reset_fence(&self, fence: FenceHandle) -> DriverResult<()> {
        let mut state = self.state.borrow_mut();
        state.counters.fence_resets += 1;
        if state.failures.reset_fence {
            return Err(DriverError::Failed("reset_fence"));
        }
        if !state.fences.contains(&fence.0) {
            return Err(DriverError::InvalidHandle);
        }
        Ok(())
    }
}
