use thiserror::Error;

/// Failures surfaced by [`crate::storage::ConversationStore`].
///
/// A missing record is not an error: lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be opened (path, permissions, schema version).
    #[error("conversation store unavailable: {0}")]
    StoreUnavailable(String),

    /// A write transaction was aborted; nothing from it was kept.
    #[error("failed to write conversation: {0}")]
    WriteFailed(#[source] sqlx::Error),

    #[error("failed to read conversations: {0}")]
    ReadFailed(#[source] sqlx::Error),

    #[error("malformed import text: {0}")]
    ImportParseFailed(#[source] serde_json::Error),

    #[error("failed to serialize conversations for export: {0}")]
    ExportFailed(#[source] serde_json::Error),
}
