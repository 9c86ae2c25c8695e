use store_object::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PermissionError {
    #[error("Permission source lookup failed: {0}")]
    Store(#[from] StoreError),

    #[error("Full invalidation is not supported by the layered cache; invalidate by user or group")]
    InvalidateAllUnsupported,

    #[error("Invalidation queue is full")]
    QueueFull,

    #[error("Invalidation dispatcher is closed")]
    DispatcherClosed,
}
