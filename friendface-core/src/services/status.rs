//! Status service - cache contents and sync history

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::adapters::duckdb::{DuckDbRepository, SyncRun};

pub struct StatusService {
    repository: Arc<DuckDbRepository>,
}

impl StatusService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    pub fn get_status(&self) -> Result<StatusSummary> {
        Ok(StatusSummary {
            total_users: self.repository.count_users()?,
            total_friends: self.repository.count_friends()?,
            total_memberships: self.repository.count_memberships()?,
            db_size_bytes: self.repository.get_db_size()?,
            last_sync: self.repository.last_sync_run()?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_users: i64,
    pub total_friends: i64,
    pub total_memberships: i64,
    pub db_size_bytes: u64,
    /// Most recent committed sync, if any
    pub last_sync: Option<SyncRun>,
}
