//! Incremental, resumable synchronization of the remote listening history
//! into the local store.

mod checkpoint;
mod duplicates;
mod error;
mod fetcher;
mod retry_policy;
mod traversal;

#[cfg(test)]
pub(crate) mod test_support;

pub use checkpoint::CheckpointStore;
pub use duplicates::{DuplicateDetector, DuplicateReport};
pub use error::{SyncError, TraversalError};
pub use fetcher::{DuplicateCheck, FetchOptions, FetchOrchestrator, FetchResult};
pub use retry_policy::RetryPolicy;
pub use traversal::{TraversalEngine, TraversalState};
