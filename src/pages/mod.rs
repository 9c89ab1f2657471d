//! Presentation-independent state and mutations for each console page.
//!
//! A page core owns its drafts and talks to the backend; whatever renders it
//! (the CLI here, anything else later) only calls these operations and reads
//! state back. State sits behind a lock that is never held across an await,
//! so requests for different resources can be in flight at the same time.

pub mod create_vector;
pub mod edit_points;

use std::sync::atomic::{ AtomicU64, Ordering };

pub use create_vector::{ CreateVectorPage, SchemaState, SubmitState };
pub use edit_points::{ EditPointsPage, SaveOutcome };

/// Monotonic tags for requests against one resource. Only the response to the
/// most recently issued request may update state.
#[derive(Debug, Default)]
pub struct RequestSequence {
    latest: AtomicU64,
}

impl RequestSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_latest(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }
}
