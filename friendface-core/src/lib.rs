//! FriendFace Core - fetch, normalize and cache user profiles
//!
//! This crate implements the profile pipeline following hexagonal architecture:
//!
//! - **domain**: Core entities (User, Friend), wire objects and read views
//! - **ports**: Trait definitions for external dependencies (UserStore, ProfileSource)
//! - **services**: Sync/ingest, live feed, status, doctor, event log
//! - **adapters**: Concrete implementations (DuckDB, HTTP)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::duckdb::DuckDbRepository;
use adapters::http::HttpProfileSource;
use config::Config;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, FetchError, IngestError, StoreError};
pub use domain::{Friend, FriendView, TransferFriend, TransferUser, User};

/// File name of the profile cache inside the data directory
pub const DB_FILENAME: &str = "friendface.duckdb";

/// Main context for FriendFace operations
///
/// Built once per process and passed to whatever drives the pipeline. It
/// owns the cache handle, the live feed and every service.
pub struct FriendFaceContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub feed: Arc<UserFeed>,
    pub sync_service: SyncService,
    pub status_service: StatusService,
    pub doctor_service: DoctorService,
}

impl FriendFaceContext {
    /// Open the cache in `data_dir`, migrate it and wire up the HTTP source
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;
        let source = Arc::new(HttpProfileSource::new(&config.endpoint)?);
        Self::with_source(data_dir, config, source)
    }

    /// Same as `new` with a caller-supplied profile source
    pub fn with_source(
        data_dir: &Path,
        config: Config,
        source: Arc<dyn ports::ProfileSource>,
    ) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;

        let repository = Arc::new(DuckDbRepository::new(&data_dir.join(DB_FILENAME))?);
        repository.ensure_schema()?;

        let feed = Arc::new(UserFeed::from_store(repository.as_ref())?);

        let sync_service = SyncService::new(source, Arc::clone(&repository), Arc::clone(&feed));
        let status_service = StatusService::new(Arc::clone(&repository));
        let doctor_service = DoctorService::new(Arc::clone(&repository));

        Ok(Self {
            config,
            repository,
            feed,
            sync_service,
            status_service,
            doctor_service,
        })
    }

    /// Record sync events in the given event log
    pub fn with_logger(mut self, logger: Arc<LoggingService>) -> Self {
        self.sync_service = self.sync_service.with_logger(logger);
        self
    }

    /// All cached users in first-insertion order
    pub fn users(&self) -> std::result::Result<Vec<User>, StoreError> {
        self.repository.query_all_users()
    }

    pub fn user(&self, id: &str) -> std::result::Result<Option<User>, StoreError> {
        self.repository.get_user(id)
    }
}
