//! Database migrations - embedded SQL files
//!
//! Migrations are compiled into the binary at build time using include_str!.
//! Each migration is a tuple of (name, sql_content), applied in order and
//! recorded in `sys_migrations` of the database they belong to.
//!
//! IMPORTANT: When adding a new migration:
//! 1. Create the SQL file: NNN_description.sql (under `logs/` for the event log)
//! 2. Add an entry to the matching list, in order

/// Name of the bootstrap migration every set starts with
pub const BOOTSTRAP_MIGRATION: &str = "000_migrations.sql";

/// Profile cache (`friendface.duckdb`) migrations
pub const MIGRATIONS: &[(&str, &str)] = &[
    (BOOTSTRAP_MIGRATION, include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
    ("002_sync_runs.sql", include_str!("002_sync_runs.sql")),
];

/// Event log (`logs.duckdb`) migrations
pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    (BOOTSTRAP_MIGRATION, include_str!("logs/000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("logs/001_initial_schema.sql")),
];
