//! Acquire/release fence pair.
//!
//! Two unsignaled event objects signal "client may write" (acquire) and
//! "compositor has released" (release). The GPU waits on the acquire side
//! through a semaphore imported from a duplicate of the acquire event.
//! That import is one-shot: a semaphore that has been waited on cannot be
//! reused, so every reset cycle destroys it and imports a fresh duplicate.

use std::rc::Rc;

use skylight_gpu::{GpuDriver, SemaphoreHandle};
use skylight_platform::{EventHandle, Owned, Platform};

use crate::error::SetupError;

pub struct FencePair {
    pub acquire_event: Owned<EventHandle>,
    pub release_event: Owned<EventHandle>,
    pub acquire_semaphore: Option<Owned<SemaphoreHandle>>,
}

impl FencePair {
    /// Create both events (unsignaled) and the initial acquire semaphore.
    pub fn create(
        platform: &Rc<dyn Platform>,
        driver: &Rc<dyn GpuDriver>,
    ) -> Result<FencePair, SetupError> {
        let acquire_event = create_owned_event(platform)?;
        let acquire_semaphore = semaphore_from_event(platform, driver, acquire_event.raw())?;
        let release_event = create_owned_event(platform)?;
        Ok(FencePair {
            acquire_event,
            release_event,
            acquire_semaphore: Some(acquire_semaphore),
        })
    }

    /// Destroy the previous acquire semaphore and import a new one from a
    /// fresh duplicate of the acquire event. Returns false when the import
    /// fails; the pair is left without a semaphore in that case.
    pub fn recreate_acquire_semaphore(
        &mut self,
        platform: &Rc<dyn Platform>,
        driver: &Rc<dyn GpuDriver>,
    ) -> bool {
        // Drop first: the one-shot payload must never be reused.
        self.acquire_semaphore = None;
        match semaphore_from_event(platform, driver, self.acquire_event.raw()) {
            Ok(semaphore) => {
                self.acquire_semaphore = Some(semaphore);
                true
            }
            Err(err) => {
                tracing::error!(%err, "failed to recreate acquire semaphore");
                false
            }
        }
    }
}

fn create_owned_event(platform: &Rc<dyn Platform>) -> Result<Owned<EventHandle>, SetupError> {
    let raw = platform.create_event()?;
    let platform = platform.clone();
    Ok(Owned::new(raw, move |handle| platform.close_event(handle)))
}

/// Duplicate `event` and import the duplicate into a new GPU semaphore.
///
/// On import failure the duplicate is closed here; the driver only takes
/// ownership of the handle when it succeeds.
pub fn semaphore_from_event(
    platform: &Rc<dyn Platform>,
    driver: &Rc<dyn GpuDriver>,
    event: EventHandle,
) -> Result<Owned<SemaphoreHandle>, SetupError> {
    let duplicate = platform.duplicate_event(event).map_err(|err| {
        tracing::error!(%err, "failed to duplicate semaphore event");
        err
    })?;

    match driver.import_event_semaphore(duplicate) {
        Ok(raw) => {
            let driver = driver.clone();
            Ok(Owned::new(raw, move |handle| {
                driver.destroy_semaphore(handle)
            }))
        }
        Err(err) => {
            tracing::error!(%err, "failed to import event into semaphore");
            platform.close_event(duplicate);
            Err(err.into())
        }
    }
}
