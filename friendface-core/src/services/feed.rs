//! Live user feed
//!
//! Holds the latest committed snapshot of all cached users. Subscribers are
//! woken only after a batch commits, never in the middle of one.

use std::sync::Arc;

use tokio::sync::watch;

use crate::domain::result::StoreError;
use crate::domain::User;
use crate::ports::UserStore;

pub type UserSnapshot = Arc<Vec<User>>;

pub struct UserFeed {
    sender: watch::Sender<UserSnapshot>,
}

impl UserFeed {
    /// Empty feed; call `publish` to load the current store contents
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Arc::new(Vec::new()));
        Self { sender }
    }

    /// Feed seeded with whatever the store holds right now
    pub fn from_store(store: &dyn UserStore) -> Result<Self, StoreError> {
        let feed = Self::new();
        feed.publish(store)?;
        Ok(feed)
    }

    pub fn subscribe(&self) -> watch::Receiver<UserSnapshot> {
        self.sender.subscribe()
    }

    /// The snapshot last published
    pub fn current(&self) -> UserSnapshot {
        self.sender.borrow().clone()
    }

    /// Re-query the store and push the result to all subscribers
    pub fn publish(&self, store: &dyn UserStore) -> Result<UserSnapshot, StoreError> {
        let snapshot = Arc::new(store.query_all_users()?);
        // send_replace never fails, even with no receivers alive
        self.sender.send_replace(snapshot.clone());
        Ok(snapshot)
    }
}

impl Default for UserFeed {
    fn default() -> Self {
        Self::new()
    }
}
