use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraversalError {
    #[error("advance called on a completed traversal")]
    AlreadyComplete,

    #[error(transparent)]
    Remote(anyhow::Error),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("checkpoint belongs to {found}, expected {expected}; remove it to continue")]
    CheckpointMismatch { expected: String, found: String },

    #[error("failed to read checkpoint: {0:#}")]
    CheckpointRead(anyhow::Error),

    #[error("failed to write checkpoint: {0:#}")]
    CheckpointWrite(anyhow::Error),

    #[error("store error: {0:#}")]
    Store(anyhow::Error),

    #[error(transparent)]
    Traversal(#[from] TraversalError),
}
