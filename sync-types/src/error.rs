//! Error types for WriterLink wire handling.

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire frames.
#[derive(Debug, Error)]
pub enum SyncError {
    /// MessagePack serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    /// Frame exceeds the maximum allowed size
    #[error("frame too large: {size} bytes (limit: {limit} bytes)")]
    FrameTooLarge {
        /// Actual size of the frame.
        size: usize,
        /// Maximum allowed size.
        limit: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::FrameTooLarge {
            size: 2048,
            limit: 1024,
        };
        assert_eq!(
            err.to_string(),
            "frame too large: 2048 bytes (limit: 1024 bytes)"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncError>();
    }
}
