use crate::errors::Result;
use crate::model::SensorReading;
use async_trait::async_trait;

/// Identifier assigned to a reading by the backing store
pub type RecordId = i64;

/// Storage seam used by the HTTP handlers.
///
/// Implementations must be safe to share across concurrently running requests
/// without extra locking by the caller.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Writes one reading. No batching, no retry.
    async fn insert(&self, reading: &SensorReading) -> Result<RecordId>;

    /// Returns the reading with the greatest timestamp for `device_id`, if any.
    /// Which row wins a tie on that timestamp is left to the backend.
    async fn find_latest(&self, device_id: &str) -> Result<Option<SensorReading>>;
}
