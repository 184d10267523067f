//! Profile source port - where fetched users come from

use async_trait::async_trait;

use crate::domain::result::FetchError;
use crate::domain::TransferUser;

/// Remote profile feed
///
/// Implementations perform a single retrieval per call with no retries and no
/// side effects beyond the network call.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Source name used in logs (e.g., "http")
    fn name(&self) -> &str;

    /// Fetch and decode the full list of users, in feed order
    async fn fetch(&self) -> Result<Vec<TransferUser>, FetchError>;
}
