//! Store port - local profile cache abstraction

use crate::domain::result::StoreError;
use crate::domain::{IngestBatch, User};

/// Durable cache of users and friends
///
/// Writes are whole batches: either every entity in a batch becomes visible or
/// none does. Reads never observe a half-applied batch.
pub trait UserStore: Send + Sync {
    /// Atomically upsert users and friends and replace the batch users' memberships
    ///
    /// Every membership must reference a user of the batch and a friend that
    /// is in the batch or already stored; otherwise nothing is written and
    /// `StoreError::ConstraintViolation` is returned.
    fn insert_batch(&self, batch: &IngestBatch) -> Result<(), StoreError>;

    /// All users in first-insertion order, each with friends in list order
    fn query_all_users(&self) -> Result<Vec<User>, StoreError>;

    /// Look up a single user by external id
    fn get_user(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Subset of `ids` that already exist in the store
    fn existing_user_ids(&self, ids: &[String]) -> Result<Vec<String>, StoreError>;
}
