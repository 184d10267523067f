//! Doctor service - cache health checks

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use serde_json::json;

use crate::adapters::duckdb::DuckDbRepository;

pub struct DoctorService {
    repository: Arc<DuckDbRepository>,
}

impl DoctorService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Run all health checks
    pub fn run_checks(&self) -> Result<DoctorResult> {
        let mut checks = BTreeMap::new();

        let pending = self.repository.pending_migrations()?;
        checks.insert(
            "schema_migrations".to_string(),
            CheckResult {
                status: if pending.is_empty() { "pass" } else { "warning" }.to_string(),
                message: if pending.is_empty() {
                    "Cache schema is up to date".to_string()
                } else {
                    format!("{} migration(s) not applied", pending.len())
                },
                details: if pending.is_empty() {
                    None
                } else {
                    Some(pending.iter().map(|m| json!({ "migration": m })).collect())
                },
            },
        );

        // Memberships pointing at missing rows break relationship integrity
        let dangling = self.repository.check_dangling_memberships()?;
        checks.insert(
            "dangling_memberships".to_string(),
            CheckResult {
                status: if dangling.is_empty() { "pass" } else { "error" }.to_string(),
                message: if dangling.is_empty() {
                    "All memberships reference existing users and friends".to_string()
                } else {
                    format!("{} membership(s) reference missing rows", dangling.len())
                },
                details: if dangling.is_empty() {
                    None
                } else {
                    Some(dangling.iter().map(|d| json!({ "membership": d })).collect())
                },
            },
        );

        // Friends outlive their memberships, so this is informational only
        let orphaned = self.repository.count_orphaned_friends()?;
        checks.insert(
            "orphaned_friends".to_string(),
            CheckResult {
                status: "pass".to_string(),
                message: if orphaned == 0 {
                    "Every friend is listed by at least one user".to_string()
                } else {
                    format!("{} friend(s) are no longer listed by any user", orphaned)
                },
                details: if orphaned == 0 {
                    None
                } else {
                    Some(vec![json!({ "orphaned_count": orphaned })])
                },
            },
        );

        let empty_ids = self.repository.count_users_with_empty_id()?;
        checks.insert(
            "empty_user_ids".to_string(),
            CheckResult {
                status: if empty_ids == 0 { "pass" } else { "error" }.to_string(),
                message: if empty_ids == 0 {
                    "All users have an id".to_string()
                } else {
                    format!("{} user(s) have an empty id", empty_ids)
                },
                details: None,
            },
        );

        let passed = checks.values().filter(|c| c.status == "pass").count() as i64;
        let warnings = checks.values().filter(|c| c.status == "warning").count() as i64;
        let errors = checks.values().filter(|c| c.status == "error").count() as i64;

        Ok(DoctorResult {
            checks,
            summary: DoctorSummary {
                passed,
                warnings,
                errors,
            },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorResult {
    pub checks: BTreeMap<String, CheckResult>,
    pub summary: DoctorSummary,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
pub struct DoctorSummary {
    pub passed: i64,
    pub warnings: i64,
    pub errors: i64,
}
