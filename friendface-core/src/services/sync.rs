//! Sync service - fetch the profile feed and ingest it into the cache

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::adapters::duckdb::{DuckDbRepository, SyncRun};
use crate::domain::result::{Error, IngestError, Result, StoreError};
use crate::domain::view::{join_tags, tag_round_trips};
use crate::domain::{Friend, IngestBatch, Membership, TransferUser, UserRecord};
use crate::ports::{ProfileSource, UserStore};
use crate::services::feed::UserFeed;
use crate::services::logging::{LogEvent, LoggingService};

/// Outcome of one ingest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Distinct users written
    pub users_ingested: usize,
    /// Users that did not exist before this ingest
    pub users_new: usize,
    /// Distinct friends written
    pub friends_ingested: usize,
    pub memberships: usize,
    /// Repeated user ids folded into their first occurrence
    pub duplicates_collapsed: usize,
    pub warnings: Vec<String>,
}

/// Normalize fetched users into one store batch
///
/// Users keep feed order. A repeated user id keeps the position of its first
/// occurrence and takes the data of its last; the replaced occurrences
/// contribute nothing else to the batch. Friends are shared by id; the last
/// name seen wins. Returns the batch, any warnings and the number of
/// collapsed duplicates.
pub fn plan_batch(
    users: &[TransferUser],
) -> std::result::Result<(IngestBatch, Vec<String>, usize), IngestError> {
    // Collapse repeated ids first so only surviving entries reach the batch
    let mut survivors: Vec<(usize, &TransferUser, i16)> = Vec::with_capacity(users.len());
    let mut user_index: HashMap<&str, usize> = HashMap::new();
    let mut duplicates = 0;

    for (seen, user) in users.iter().enumerate() {
        let age = i16::try_from(user.age).map_err(|_| IngestError::FieldOverflow {
            user_id: user.id.clone(),
            field: "age",
            value: user.age,
        })?;

        match user_index.get(user.id.as_str()) {
            Some(&i) => {
                survivors[i] = (seen, user, age);
                duplicates += 1;
            }
            None => {
                user_index.insert(user.id.as_str(), survivors.len());
                survivors.push((seen, user, age));
            }
        }
    }

    let mut records: Vec<UserRecord> = Vec::with_capacity(survivors.len());
    let mut edges: Vec<Membership> = Vec::new();
    let mut friends: Vec<Friend> = Vec::new();
    // Friend id -> (slot in `friends`, feed position of the name it holds)
    let mut friend_index: HashMap<&str, (usize, usize)> = HashMap::new();
    let mut warnings = Vec::new();

    for (seen, user, age) in survivors {
        for tag in &user.tags {
            if !tag_round_trips(tag) {
                warnings.push(format!(
                    "user {}: tag {:?} will not survive the ',' join",
                    user.id, tag
                ));
            }
        }

        records.push(UserRecord {
            id: user.id.clone(),
            is_active: user.is_active,
            name: Some(user.name.clone()),
            age,
            company: Some(user.company.clone()),
            email: Some(user.email.clone()),
            address: Some(user.address.clone()),
            about: Some(user.about.clone()),
            registered: Some(user.registered),
            tags: Some(join_tags(&user.tags)),
        });

        let first_edge = edges.len();
        for friend in &user.friends {
            if edges[first_edge..].iter().any(|e| e.friend_id == friend.id) {
                warnings.push(format!(
                    "user {}: friend {} listed more than once, keeping the first",
                    user.id, friend.id
                ));
                continue;
            }

            match friend_index.get_mut(friend.id.as_str()) {
                Some((slot, named_at)) => {
                    // A later feed entry's name wins over an earlier one
                    if seen >= *named_at {
                        friends[*slot].name = Some(friend.name.clone());
                        *named_at = seen;
                    }
                }
                None => {
                    friend_index.insert(friend.id.as_str(), (friends.len(), seen));
                    friends.push(Friend::new(friend.id.clone(), Some(friend.name.clone())));
                }
            }

            edges.push(Membership {
                user_id: user.id.clone(),
                friend_id: friend.id.clone(),
                position: (edges.len() - first_edge) as i32,
            });
        }
    }

    let batch = IngestBatch {
        users: records,
        friends,
        edges,
    };
    Ok((batch, warnings, duplicates))
}

/// Convert fetched users into cache entities and commit them as one batch
///
/// An empty input is a successful no-op that never touches the store.
pub fn ingest(
    users: &[TransferUser],
    store: &dyn UserStore,
) -> std::result::Result<IngestReport, IngestError> {
    if users.is_empty() {
        return Ok(IngestReport::default());
    }

    let (batch, warnings, duplicates_collapsed) = plan_batch(users)?;

    let ids: Vec<String> = batch.users.iter().map(|u| u.id.clone()).collect();
    let existing = store.existing_user_ids(&ids)?;

    store.insert_batch(&batch)?;

    for warning in &warnings {
        warn!(%warning, "lossy ingest");
    }

    let report = IngestReport {
        users_ingested: batch.users.len(),
        users_new: batch.users.len() - existing.len(),
        friends_ingested: batch.friends.len(),
        memberships: batch.edges.len(),
        duplicates_collapsed,
        warnings,
    };
    info!(
        users = report.users_ingested,
        new = report.users_new,
        friends = report.friends_ingested,
        "ingest committed"
    );
    Ok(report)
}

/// Result of one sync run
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub run_id: String,
    pub source: String,
    pub started_at: String,
    pub finished_at: String,
    #[serde(flatten)]
    pub report: IngestReport,
}

/// Single-flight fetch + ingest pipeline
///
/// Only one sync runs at a time; a second caller waits for the first to
/// finish and then performs its own fetch.
pub struct SyncService {
    source: Arc<dyn ProfileSource>,
    repository: Arc<DuckDbRepository>,
    feed: Arc<UserFeed>,
    logger: Option<Arc<LoggingService>>,
    in_flight: Mutex<()>,
}

impl SyncService {
    pub fn new(
        source: Arc<dyn ProfileSource>,
        repository: Arc<DuckDbRepository>,
        feed: Arc<UserFeed>,
    ) -> Self {
        Self {
            source,
            repository,
            feed,
            logger: None,
            in_flight: Mutex::new(()),
        }
    }

    /// Record sync events in the event log
    pub fn with_logger(mut self, logger: Arc<LoggingService>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Fetch the feed, commit it and publish the new snapshot
    ///
    /// On any failure the cache and the published snapshot are left as they
    /// were and the error is returned.
    pub async fn sync(&self) -> Result<SyncResult> {
        let _guard = self.in_flight.lock().await;

        let source = self.source.name().to_string();
        let started_at = Utc::now();
        self.log(LogEvent::new("sync_started").with_source(&source));
        info!(%source, "sync started");

        match self.run().await {
            Ok(report) => {
                let finished_at = Utc::now();
                let run = SyncRun {
                    run_id: Uuid::new_v4().to_string(),
                    source: source.clone(),
                    started_at: started_at.to_rfc3339(),
                    finished_at: finished_at.to_rfc3339(),
                    users_ingested: report.users_ingested as i64,
                    users_new: report.users_new as i64,
                    friends_ingested: report.friends_ingested as i64,
                    warning_count: report.warnings.len() as i64,
                };

                // The batch is already committed; a missing history row is not a failed sync
                if report.users_ingested > 0 {
                    if let Err(e) = self.repository.record_sync_run(&run) {
                        warn!(error = %e, "failed to record sync run");
                    }
                }

                self.log(LogEvent::new("sync_completed").with_source(&source));
                info!(
                    %source,
                    users = report.users_ingested,
                    warnings = report.warnings.len(),
                    "sync completed"
                );

                Ok(SyncResult {
                    run_id: run.run_id,
                    source,
                    started_at: run.started_at,
                    finished_at: run.finished_at,
                    report,
                })
            }
            Err(e) => {
                self.log(
                    LogEvent::new("sync_failed")
                        .with_source(&source)
                        .with_error(e.to_string())
                        .with_error_details(failure_stage(&e)),
                );
                warn!(%source, error = %e, "sync failed");
                Err(e)
            }
        }
    }

    async fn run(&self) -> Result<IngestReport> {
        let users = self.source.fetch().await?;

        let repository = Arc::clone(&self.repository);
        let report = tokio::task::spawn_blocking(move || ingest(&users, repository.as_ref()))
            .await
            .map_err(|e| {
                IngestError::PersistenceFailed(StoreError::io(format!(
                    "ingest task failed: {}",
                    e
                )))
            })??;

        if report.users_ingested > 0 {
            self.feed.publish(self.repository.as_ref())?;
        }

        Ok(report)
    }

    fn log(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            if let Err(e) = logger.log(event) {
                warn!(error = %e, "failed to write event log");
            }
        }
    }
}

fn failure_stage(err: &Error) -> &'static str {
    match err {
        Error::Fetch(_) => "fetch",
        Error::Ingest(_) => "ingest",
        Error::Store(_) => "publish",
        _ => "sync",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::FetchError;
    use crate::domain::TransferFriend;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn transfer(id: &str, name: &str, tags: &[&str], friends: &[(&str, &str)]) -> TransferUser {
        TransferUser {
            id: id.to_string(),
            is_active: true,
            name: name.to_string(),
            age: 30,
            company: "Imkan".to_string(),
            email: format!("{}@imkan.com", id),
            address: "907 Nelson Street".to_string(),
            about: "About".to_string(),
            registered: Utc.with_ymd_and_hms(2015, 11, 10, 1, 47, 18).unwrap(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            friends: friends
                .iter()
                .map(|(id, name)| TransferFriend {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .collect(),
        }
    }

    fn repo() -> Arc<DuckDbRepository> {
        let repo = DuckDbRepository::in_memory().unwrap();
        repo.ensure_schema().unwrap();
        Arc::new(repo)
    }

    struct StubSource {
        result: std::result::Result<Vec<TransferUser>, FetchError>,
        delay_ms: u64,
        active: AtomicUsize,
        max_active: AtomicUsize,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn new(result: std::result::Result<Vec<TransferUser>, FetchError>) -> Self {
            Self {
                result,
                delay_ms: 0,
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProfileSource for StubSource {
        fn name(&self) -> &str {
            "stub"
        }

        async fn fetch(&self) -> std::result::Result<Vec<TransferUser>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    #[test]
    fn test_plan_batch_flattens_tags_and_wires_friends() {
        let users = vec![transfer("1", "Ann", &["x", "y"], &[("f1", "Bob"), ("f2", "Cat")])];
        let (batch, warnings, duplicates) = plan_batch(&users).unwrap();

        assert!(warnings.is_empty());
        assert_eq!(duplicates, 0);
        assert_eq!(batch.users[0].tags.as_deref(), Some("x,y"));
        assert_eq!(batch.friends.len(), 2);
        let positions: Vec<_> = batch
            .edges
            .iter()
            .map(|e| (e.friend_id.as_str(), e.position))
            .collect();
        assert_eq!(positions, vec![("f1", 0), ("f2", 1)]);
    }

    #[test]
    fn test_plan_batch_age_overflow() {
        let mut user = transfer("big", "Old", &[], &[]);
        user.age = 40000;
        let err = plan_batch(&[user]).unwrap_err();
        assert_eq!(
            err,
            IngestError::FieldOverflow {
                user_id: "big".to_string(),
                field: "age",
                value: 40000
            }
        );
    }

    #[test]
    fn test_plan_batch_age_bounds() {
        let mut low = transfer("low", "Low", &[], &[]);
        low.age = i16::MIN as i64;
        let mut high = transfer("high", "High", &[], &[]);
        high.age = i16::MAX as i64;
        let (batch, _, _) = plan_batch(&[low, high]).unwrap();
        assert_eq!(batch.users[0].age, i16::MIN);
        assert_eq!(batch.users[1].age, i16::MAX);

        let mut under = transfer("under", "Under", &[], &[]);
        under.age = i16::MIN as i64 - 1;
        assert!(plan_batch(&[under]).is_err());
    }

    #[test]
    fn test_plan_batch_duplicate_user_last_wins_first_position() {
        let users = vec![
            transfer("1", "Ann", &[], &[("f1", "Bob")]),
            transfer("2", "Eve", &[], &[]),
            transfer("1", "Annie", &[], &[("f2", "Dan")]),
        ];
        let (batch, _, duplicates) = plan_batch(&users).unwrap();

        assert_eq!(duplicates, 1);
        let ids: Vec<_> = batch.users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(batch.users[0].name.as_deref(), Some("Annie"));
        assert_eq!(batch.edges.len(), 1);
        assert_eq!(batch.edges[0].friend_id, "f2");
    }

    #[test]
    fn test_plan_batch_replaced_duplicate_leaves_no_trace() {
        let users = vec![
            transfer("1", "Ann", &["a,b"], &[("f1", "Stale"), ("f1", "Stale")]),
            transfer("2", "Eve", &[], &[("f2", "Dan")]),
            transfer("1", "Annie", &["x"], &[("f2", "Daniel")]),
        ];
        let (batch, warnings, duplicates) = plan_batch(&users).unwrap();

        assert_eq!(duplicates, 1);
        assert!(warnings.is_empty());
        // f1 only appeared in the replaced entry, so no row is written for it
        assert_eq!(batch.friends, vec![Friend::new("f2", Some("Daniel".to_string()))]);
        let edges: Vec<_> = batch
            .edges
            .iter()
            .map(|e| (e.user_id.as_str(), e.friend_id.as_str(), e.position))
            .collect();
        assert_eq!(edges, vec![("1", "f2", 0), ("2", "f2", 0)]);
    }

    #[test]
    fn test_plan_batch_shares_friends_across_users() {
        let users = vec![
            transfer("1", "Ann", &[], &[("f1", "Bob")]),
            transfer("2", "Eve", &[], &[("f1", "Robert")]),
        ];
        let (batch, _, _) = plan_batch(&users).unwrap();
        assert_eq!(batch.friends, vec![Friend::new("f1", Some("Robert".to_string()))]);
        assert_eq!(batch.edges.len(), 2);
    }

    #[test]
    fn test_plan_batch_warns_on_lossy_tags() {
        let users = vec![transfer("1", "Ann", &["a,b", ""], &[])];
        let (batch, warnings, _) = plan_batch(&users).unwrap();
        assert_eq!(warnings.len(), 2);
        assert_eq!(batch.users[0].tags.as_deref(), Some("a,b,"));
    }

    #[test]
    fn test_plan_batch_repeated_friend_in_one_list() {
        let users = vec![transfer("1", "Ann", &[], &[("f1", "Bob"), ("f1", "Bob")])];
        let (batch, warnings, _) = plan_batch(&users).unwrap();
        assert_eq!(batch.edges.len(), 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_ingest_empty_is_noop() {
        let repo = repo();
        let report = ingest(&[], repo.as_ref()).unwrap();
        assert_eq!(report, IngestReport::default());
        assert_eq!(repo.count_users().unwrap(), 0);
    }

    #[test]
    fn test_ingest_counts_new_users() {
        let repo = repo();
        let first = ingest(&[transfer("1", "Ann", &[], &[])], repo.as_ref()).unwrap();
        assert_eq!(first.users_new, 1);

        let second = ingest(
            &[transfer("1", "Ann", &[], &[]), transfer("2", "Eve", &[], &[])],
            repo.as_ref(),
        )
        .unwrap();
        assert_eq!(second.users_ingested, 2);
        assert_eq!(second.users_new, 1);
    }

    #[test]
    fn test_ingest_overflow_leaves_store_untouched() {
        let repo = repo();
        let mut bad = transfer("2", "Old", &[], &[]);
        bad.age = 40000;
        let users = vec![transfer("1", "Ann", &[], &[("f1", "Bob")]), bad];

        assert!(matches!(
            ingest(&users, repo.as_ref()),
            Err(IngestError::FieldOverflow { .. })
        ));
        assert_eq!(repo.count_users().unwrap(), 0);
        assert_eq!(repo.count_friends().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sync_publishes_after_commit() {
        let repo = repo();
        let feed = Arc::new(UserFeed::new());
        let mut rx = feed.subscribe();
        let source = Arc::new(StubSource::new(Ok(vec![transfer(
            "1",
            "Ann",
            &["x"],
            &[("f1", "Bob")],
        )])));
        let service = SyncService::new(source, repo.clone(), feed.clone());

        let result = service.sync().await.unwrap();
        assert_eq!(result.source, "stub");
        assert_eq!(result.report.users_ingested, 1);

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);
        assert_eq!(
            repo.last_sync_run().unwrap().map(|r| r.run_id),
            Some(result.run_id)
        );
    }

    #[tokio::test]
    async fn test_sync_fetch_failure_changes_nothing() {
        let repo = repo();
        let feed = Arc::new(UserFeed::new());
        let rx = feed.subscribe();
        let source = Arc::new(StubSource::new(Err(FetchError::Decode("bad".to_string()))));
        let service = SyncService::new(source, repo.clone(), feed);

        let err = service.sync().await.unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError::Decode(_))));
        assert_eq!(repo.count_users().unwrap(), 0);
        assert!(repo.last_sync_run().unwrap().is_none());
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_sync_is_single_flight() {
        let repo = repo();
        let feed = Arc::new(UserFeed::new());
        let mut stub = StubSource::new(Ok(vec![transfer("1", "Ann", &[], &[])]));
        stub.delay_ms = 50;
        let source = Arc::new(stub);
        let service = SyncService::new(source.clone(), repo.clone(), feed);

        let (a, b) = tokio::join!(service.sync(), service.sync());
        a.unwrap();
        b.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(source.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(repo.count_users().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sync_logs_events() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(
            LoggingService::new(dir.path(), crate::services::EntryPoint::Library, "test").unwrap(),
        );
        let source = Arc::new(StubSource::new(Err(FetchError::Status(500))));
        let service =
            SyncService::new(source, repo(), Arc::new(UserFeed::new())).with_logger(logger.clone());

        assert!(service.sync().await.is_err());

        let events: Vec<_> = logger
            .get_recent(10)
            .unwrap()
            .into_iter()
            .map(|e| e.event)
            .collect();
        assert!(events.contains(&"sync_started".to_string()));
        assert!(events.contains(&"sync_failed".to_string()));

        let errors = logger.get_errors(10).unwrap();
        assert_eq!(errors[0].error_details.as_deref(), Some("fetch"));
        assert_eq!(errors[0].source.as_deref(), Some("stub"));
    }

    #[tokio::test]
    async fn test_sync_over_http() {
        use crate::adapters::feed_mock::{MockFeedConfig, MockFeedServer};
        use crate::adapters::http::HttpProfileSource;

        let server = MockFeedServer::start(MockFeedConfig::default()).unwrap();
        let source = Arc::new(HttpProfileSource::new(&server.url()).unwrap());
        let repo = repo();
        let service = SyncService::new(source, repo.clone(), Arc::new(UserFeed::new()));

        let result = service.sync().await.unwrap();
        assert_eq!(result.source, "http");
        assert_eq!(result.report.users_ingested, 3);

        let users = repo.query_all_users().unwrap();
        let ids: Vec<_> = users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["user-1", "user-2", "user-3"]);
        assert_eq!(users[2].friends.len(), 2);
    }
}
