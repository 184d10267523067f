//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod doctor;
pub mod feed;
pub mod logging;
pub mod migration;
mod status;
pub mod sync;

pub use doctor::{CheckResult, DoctorResult, DoctorService, DoctorSummary};
pub use feed::{UserFeed, UserSnapshot};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use status::{StatusService, StatusSummary};
pub use sync::{ingest, plan_batch, IngestReport, SyncResult, SyncService};
