//! Shared-buffer allocation negotiation seam.
//!
//! The allocation service owns buffer negotiation across processes; this
//! crate only needs tokens from it: one redeemed by the GPU driver, one
//! handed to the compositor session. Both sides release their views
//! independently (the service reference-counts the underlying collection).

use std::cell::RefCell;

use skylight_gpu::CollectionToken;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorError {
    #[error("allocation service unavailable")]
    Unavailable,

    #[error("token protocol error: {0}")]
    Protocol(&'static str),
}

pub trait BufferAllocator {
    /// Negotiate a new shared collection and return its token.
    fn allocate_collection(&self) -> Result<CollectionToken, AllocatorError>;

    /// Mint an additional token for the same collection, for handing to
    /// another participant.
    fn duplicate_token(&self, token: CollectionToken) -> Result<CollectionToken, AllocatorError>;

    /// Block until previously minted duplicates are known to the service,
    /// so other participants can redeem theirs immediately.
    fn sync_token(&self, token: CollectionToken) -> Result<(), AllocatorError>;
}

/// Counter-based allocator for tests.
#[derive(Default)]
pub struct SimAllocator {
    state: RefCell<SimAllocatorState>,
}

#[derive(Default)]
struct SimAllocatorState {
    next_token: u64,
    fail_allocate: bool,
}

impl SimAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_allocation(&self) {
        self.state.borrow_mut().fail_allocate = true;
    }
}

impl BufferAllocator for SimAllocator {
    fn allocate_collection(&self) -> Result<CollectionToken, AllocatorError> {
        let mut state = self.state.borrow_mut();
        if state.fail_allocate {
            return Err(AllocatorError::Unavailable);
        }
        state.next_token += 1;
        Ok(CollectionToken(state.next_token))
    }

    fn duplicate_token(&self, token: CollectionToken) -> Result<CollectionToken, AllocatorError> {
        let _ = token;
        let mut state = self.state.borrow_mut();
        state.next_token += 1;
        Ok(CollectionToken(state.next_token))
    }

    fn sync_token(&self, _token: CollectionToken) -> Result<(), AllocatorError> {
        Ok(())
    }
}
