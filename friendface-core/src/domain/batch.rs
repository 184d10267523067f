//! Normalized ingest batch: the unit the store commits atomically

use serde::Serialize;

use super::user::{Friend, UserRecord};

/// A user's membership of one friend, with its position in the user's list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Membership {
    pub user_id: String,
    pub friend_id: String,
    pub position: i32,
}

/// Users, friends and memberships produced by one ingest
///
/// Users and friends are unique by id within a batch. Each user in the batch
/// owns exactly the memberships listed here; any previous memberships of that
/// user are replaced when the batch is committed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestBatch {
    pub users: Vec<UserRecord>,
    pub friends: Vec<Friend>,
    pub edges: Vec<Membership>,
}

impl IngestBatch {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.friends.is_empty() && self.edges.is_empty()
    }
}
