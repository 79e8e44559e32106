use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::{ReviewStore, StoreError};
use crate::feature::{Feature, FeatureId, FeatureStatus};
use crate::review::{
    Decision, DetailDocument, Finding, Iteration, IterationHistory, PendingReview, ReviewSpec,
    ReviewStatus, attempt_location, detail_location,
};

/// Async-safe handle to the review database.
///
/// Wraps `ReviewDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O never
/// ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<ReviewDb>>,
}

impl DbHandle {
    pub fn new(db: ReviewDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&ReviewDb) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| StoreError::Io(anyhow!("DB lock poisoned: {}", e)))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct ReviewDb {
    conn: Connection,
}

impl ReviewDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> anyhow::Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON; PRAGMA synchronous = FULL;")
            .context("Failed to configure SQLite")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS features (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    status TEXT NOT NULL DEFAULT 'backlog',
                    version INTEGER NOT NULL DEFAULT 1,
                    review_status TEXT,
                    current_iteration INTEGER NOT NULL DEFAULT 0,
                    max_iterations INTEGER,
                    pending TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS iterations (
                    feature_id INTEGER NOT NULL REFERENCES features(id),
                    number INTEGER NOT NULL,
                    completed_at TEXT NOT NULL,
                    reviewer TEXT NOT NULL,
                    decision TEXT NOT NULL,
                    commit_hash TEXT NOT NULL,
                    diff TEXT NOT NULL,
                    findings TEXT NOT NULL DEFAULT '[]',
                    summary TEXT NOT NULL DEFAULT '',
                    rationale TEXT,
                    detail_ref TEXT,
                    PRIMARY KEY (feature_id, number)
                );

                CREATE TABLE IF NOT EXISTS iteration_details (
                    feature_id INTEGER NOT NULL REFERENCES features(id),
                    iteration INTEGER NOT NULL,
                    location TEXT NOT NULL,
                    body TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (feature_id, iteration)
                );

                CREATE TABLE IF NOT EXISTS attempt_outputs (
                    feature_id INTEGER NOT NULL REFERENCES features(id),
                    iteration INTEGER NOT NULL,
                    location TEXT NOT NULL,
                    body TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (feature_id, iteration)
                );

                CREATE TRIGGER IF NOT EXISTS iterations_no_update
                BEFORE UPDATE ON iterations
                BEGIN
                    SELECT RAISE(ABORT, 'iterations are append-only');
                END;

                CREATE TRIGGER IF NOT EXISTS iterations_no_delete
                BEFORE DELETE ON iterations
                BEGIN
                    SELECT RAISE(ABORT, 'iterations are append-only');
                END;

                CREATE INDEX IF NOT EXISTS idx_features_status ON features(status);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    pub fn create_feature(&self, title: &str, description: &str) -> Result<Feature, StoreError> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO features (title, description, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![title, description, FeatureStatus::Backlog.as_str(), now],
            )
            .context("Failed to insert feature")?;
        let id = self.conn.last_insert_rowid();
        self.get_feature(id)
    }

    pub fn list_features(&self) -> Result<Vec<Feature>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM features ORDER BY id")
            .context("Failed to prepare feature list")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .context("Failed to list features")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read feature ids")?;
        ids.into_iter().map(|id| self.get_feature(id)).collect()
    }

    pub fn get_feature(&self, id: FeatureId) -> Result<Feature, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, title, description, status, version, review_status,
                        current_iteration, max_iterations, pending, created_at, updated_at
                 FROM features WHERE id = ?1",
                params![id],
                |row| {
                    Ok(FeatureRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        description: row.get(2)?,
                        status: row.get(3)?,
                        version: row.get(4)?,
                        review_status: row.get(5)?,
                        current_iteration: row.get(6)?,
                        max_iterations: row.get(7)?,
                        pending: row.get(8)?,
                        created_at: row.get(9)?,
                        updated_at: row.get(10)?,
                    })
                },
            )
            .optional()
            .context("Failed to query feature")?
            .ok_or(StoreError::NotFound(id))?;

        let iterations = if row.review_status.is_some() {
            self.get_iterations(id)?
        } else {
            IterationHistory::new()
        };
        Ok(row.into_feature(iterations)?)
    }

    fn get_iterations(&self, feature_id: FeatureId) -> Result<IterationHistory, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT number, completed_at, reviewer, decision, commit_hash, diff, findings,
                        summary, rationale, detail_ref
                 FROM iterations WHERE feature_id = ?1 ORDER BY number",
            )
            .context("Failed to prepare iteration query")?;
        let rows = stmt
            .query_map(params![feature_id], |row| {
                Ok(IterationRow {
                    number: row.get(0)?,
                    completed_at: row.get(1)?,
                    reviewer: row.get(2)?,
                    decision: row.get(3)?,
                    commit_hash: row.get(4)?,
                    diff: row.get(5)?,
                    findings: row.get(6)?,
                    summary: row.get(7)?,
                    rationale: row.get(8)?,
                    detail_ref: row.get(9)?,
                })
            })
            .context("Failed to query iterations")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read iteration rows")?;

        let records = rows
            .into_iter()
            .map(IterationRow::into_iteration)
            .collect::<anyhow::Result<Vec<_>>>()?;
        let history = IterationHistory::try_from(records)
            .map_err(|e| anyhow!("Corrupt iteration history for feature {}: {}", feature_id, e))?;
        Ok(history)
    }

    fn current_version(&self, id: FeatureId) -> Result<Option<u64>, StoreError> {
        let version = self
            .conn
            .query_row(
                "SELECT version FROM features WHERE id = ?1",
                params![id],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .context("Failed to read feature version")?;
        Ok(version.map(|v| v as u64))
    }

    pub fn save_feature(&self, feature: &Feature, expected_version: u64) -> Result<u64, StoreError> {
        let review = feature.review.as_ref();
        let pending = review
            .and_then(|r| r.pending.as_ref())
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to serialize pending review")?;

        let updated = self
            .conn
            .execute(
                "UPDATE features
                 SET title = ?1, description = ?2, status = ?3, review_status = ?4,
                     max_iterations = ?5, pending = ?6, version = version + 1, updated_at = ?7
                 WHERE id = ?8 AND version = ?9",
                params![
                    feature.title,
                    feature.description,
                    feature.status.as_str(),
                    review.map(|r| r.status.as_str()),
                    review.map(|r| r.max_iterations()),
                    pending,
                    Utc::now().to_rfc3339(),
                    feature.id,
                    expected_version as i64,
                ],
            )
            .context("Failed to update feature")?;

        if updated == 0 {
            return match self.current_version(feature.id)? {
                None => Err(StoreError::NotFound(feature.id)),
                Some(actual) => Err(StoreError::VersionConflict {
                    feature_id: feature.id,
                    expected: expected_version,
                    actual,
                }),
            };
        }
        Ok(expected_version + 1)
    }

    pub fn append_iteration(
        &self,
        feature_id: FeatureId,
        iteration: &Iteration,
        expected_number: u32,
    ) -> Result<u64, StoreError> {
        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        let (current, max, review_status): (u32, Option<u32>, Option<String>) = tx
            .query_row(
                "SELECT current_iteration, max_iterations, review_status
                 FROM features WHERE id = ?1",
                params![feature_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .context("Failed to read feature for append")?
            .ok_or(StoreError::NotFound(feature_id))?;

        let (Some(max), Some(_)) = (max, review_status) else {
            return Err(anyhow!("Feature {} has no review spec", feature_id).into());
        };

        let next = current + 1;
        if expected_number != next || iteration.number() != expected_number {
            return Err(StoreError::OutOfOrder {
                feature_id,
                expected: next,
                actual: expected_number.max(iteration.number()),
            });
        }
        if expected_number > max {
            return Err(StoreError::CapExceeded {
                feature_id,
                max_iterations: max,
            });
        }

        let findings =
            serde_json::to_string(iteration.findings()).context("Failed to serialize findings")?;
        tx.execute(
            "INSERT INTO iterations (feature_id, number, completed_at, reviewer, decision,
                                     commit_hash, diff, findings, summary, rationale, detail_ref)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                feature_id,
                iteration.number(),
                iteration.completed_at().to_rfc3339(),
                iteration.reviewer(),
                iteration.decision().as_str(),
                iteration.commit(),
                iteration.diff(),
                findings,
                iteration.summary(),
                iteration.rationale(),
                iteration.detail_ref(),
            ],
        )
        .context("Failed to insert iteration")?;

        tx.execute(
            "UPDATE features
             SET current_iteration = ?1, pending = NULL, version = version + 1, updated_at = ?2
             WHERE id = ?3",
            params![expected_number, Utc::now().to_rfc3339(), feature_id],
        )
        .context("Failed to advance iteration counter")?;

        let version: i64 = tx
            .query_row(
                "SELECT version FROM features WHERE id = ?1",
                params![feature_id],
                |row| row.get(0),
            )
            .context("Failed to read new version")?;

        tx.commit().context("Failed to commit iteration append")?;
        Ok(version as u64)
    }

    pub fn persist_iteration_detail(
        &self,
        feature_id: FeatureId,
        iteration: u32,
        body: &str,
    ) -> Result<String, StoreError> {
        if self.current_version(feature_id)?.is_none() {
            return Err(StoreError::NotFound(feature_id));
        }
        let location = detail_location(feature_id, iteration);
        self.conn
            .execute(
                "INSERT OR REPLACE INTO iteration_details
                     (feature_id, iteration, location, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![feature_id, iteration, location, body, Utc::now().to_rfc3339()],
            )
            .context("Failed to write iteration detail")?;
        Ok(location)
    }

    pub fn get_iteration_details(
        &self,
        feature_id: FeatureId,
    ) -> Result<Vec<DetailDocument>, StoreError> {
        self.read_documents(
            "SELECT iteration, location, body FROM iteration_details
             WHERE feature_id = ?1 ORDER BY iteration",
            feature_id,
        )
    }

    /// Record what the implementation attempt reviewed as `iteration` printed.
    /// A retried attempt replaces the earlier output.
    pub fn persist_attempt_output(
        &self,
        feature_id: FeatureId,
        iteration: u32,
        output: &str,
    ) -> Result<String, StoreError> {
        if self.current_version(feature_id)?.is_none() {
            return Err(StoreError::NotFound(feature_id));
        }
        let location = attempt_location(feature_id, iteration);
        self.conn
            .execute(
                "INSERT OR REPLACE INTO attempt_outputs
                     (feature_id, iteration, location, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![feature_id, iteration, location, output, Utc::now().to_rfc3339()],
            )
            .context("Failed to write attempt output")?;
        Ok(location)
    }

    pub fn get_attempt_outputs(
        &self,
        feature_id: FeatureId,
    ) -> Result<Vec<DetailDocument>, StoreError> {
        self.read_documents(
            "SELECT iteration, location, body FROM attempt_outputs
             WHERE feature_id = ?1 ORDER BY iteration",
            feature_id,
        )
    }

    fn read_documents(
        &self,
        sql: &str,
        feature_id: FeatureId,
    ) -> Result<Vec<DetailDocument>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .context("Failed to prepare document query")?;
        let docs = stmt
            .query_map(params![feature_id], |row| {
                Ok(DetailDocument {
                    iteration: row.get(0)?,
                    location: row.get(1)?,
                    body: row.get(2)?,
                })
            })
            .context("Failed to query documents")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read documents")?;
        Ok(docs)
    }
}

/// [`ReviewStore`] backed by SQLite.
#[derive(Clone)]
pub struct SqliteStore {
    db: DbHandle,
}

impl SqliteStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            db: DbHandle::new(ReviewDb::new(path)?),
        })
    }

    pub fn new_in_memory() -> anyhow::Result<Self> {
        Ok(Self {
            db: DbHandle::new(ReviewDb::new_in_memory()?),
        })
    }

    pub fn handle(&self) -> &DbHandle {
        &self.db
    }
}

#[async_trait]
impl ReviewStore for SqliteStore {
    async fn create_feature(&self, title: &str, description: &str) -> Result<Feature, StoreError> {
        let title = title.to_string();
        let description = description.to_string();
        self.db
            .call(move |db| db.create_feature(&title, &description))
            .await
    }

    async fn list_features(&self) -> Result<Vec<Feature>, StoreError> {
        self.db.call(|db| db.list_features()).await
    }

    async fn load_feature(&self, id: FeatureId) -> Result<Feature, StoreError> {
        self.db.call(move |db| db.get_feature(id)).await
    }

    async fn save_feature(
        &self,
        feature: &Feature,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let feature = feature.clone();
        self.db
            .call(move |db| db.save_feature(&feature, expected_version))
            .await
    }

    async fn append_iteration(
        &self,
        feature_id: FeatureId,
        iteration: Iteration,
        expected_number: u32,
    ) -> Result<u64, StoreError> {
        self.db
            .call(move |db| db.append_iteration(feature_id, &iteration, expected_number))
            .await
    }

    async fn persist_iteration_detail(
        &self,
        feature_id: FeatureId,
        iteration_number: u32,
        document: &str,
    ) -> Result<String, StoreError> {
        let document = document.to_string();
        self.db
            .call(move |db| db.persist_iteration_detail(feature_id, iteration_number, &document))
            .await
    }

    async fn load_iteration_details(
        &self,
        feature_id: FeatureId,
    ) -> Result<Vec<DetailDocument>, StoreError> {
        self.db
            .call(move |db| db.get_iteration_details(feature_id))
            .await
    }

    async fn persist_attempt_output(
        &self,
        feature_id: FeatureId,
        iteration_number: u32,
        output: &str,
    ) -> Result<String, StoreError> {
        let output = output.to_string();
        self.db
            .call(move |db| db.persist_attempt_output(feature_id, iteration_number, &output))
            .await
    }

    async fn load_attempt_outputs(
        &self,
        feature_id: FeatureId,
    ) -> Result<Vec<DetailDocument>, StoreError> {
        self.db
            .call(move |db| db.get_attempt_outputs(feature_id))
            .await
    }
}

fn parse_timestamp(s: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid timestamp '{}'", s))?
        .with_timezone(&Utc))
}

/// Intermediate row struct for features.
struct FeatureRow {
    id: i64,
    title: String,
    description: String,
    status: String,
    version: i64,
    review_status: Option<String>,
    current_iteration: u32,
    max_iterations: Option<u32>,
    pending: Option<String>,
    created_at: String,
    updated_at: String,
}

impl FeatureRow {
    fn into_feature(self, iterations: IterationHistory) -> anyhow::Result<Feature> {
        let status = FeatureStatus::from_str(&self.status)
            .map_err(|e| anyhow!(e))
            .context("Failed to parse feature status")?;

        let review = match self.review_status {
            Some(ref s) => {
                let review_status = ReviewStatus::from_str(s)
                    .map_err(|e| anyhow!(e))
                    .context("Failed to parse review status")?;
                if iterations.len() as u32 != self.current_iteration {
                    anyhow::bail!(
                        "Feature {} records {} iterations but has {}",
                        self.id,
                        self.current_iteration,
                        iterations.len()
                    );
                }
                let pending: Option<PendingReview> = self
                    .pending
                    .as_deref()
                    .map(serde_json::from_str)
                    .transpose()
                    .context("Failed to parse pending review")?;
                let max = self
                    .max_iterations
                    .context("Review spec without max_iterations")?;
                Some(ReviewSpec::from_parts(review_status, max, iterations, pending))
            }
            None => None,
        };

        Ok(Feature {
            id: self.id,
            title: self.title,
            description: self.description,
            status,
            review,
            version: self.version as u64,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

/// Intermediate row struct for iterations.
struct IterationRow {
    number: u32,
    completed_at: String,
    reviewer: String,
    decision: String,
    commit_hash: String,
    diff: String,
    findings: String,
    summary: String,
    rationale: Option<String>,
    detail_ref: Option<String>,
}

impl IterationRow {
    fn into_iteration(self) -> anyhow::Result<Iteration> {
        let decision = Decision::from_str(&self.decision)
            .map_err(|e| anyhow!(e))
            .context("Failed to parse iteration decision")?;
        let findings: Vec<Finding> =
            serde_json::from_str(&self.findings).context("Failed to parse findings JSON")?;
        let iteration = Iteration::builder(self.number, decision)
            .completed_at(parse_timestamp(&self.completed_at)?)
            .reviewer(self.reviewer)
            .commit(self.commit_hash, self.diff)
            .findings(findings)
            .summary(self.summary)
            .rationale(self.rationale)
            .build();
        Ok(match self.detail_ref {
            Some(r) => iteration.with_detail_ref(r),
            None => iteration,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::{FindingCategory, FindingSeverity};

    fn db_with_feature() -> (ReviewDb, Feature) {
        let db = ReviewDb::new_in_memory().unwrap();
        let feature = db.create_feature("Login", "OAuth login").unwrap();
        (db, feature)
    }

    /// Give the feature a review spec so iterations can be appended.
    fn open_review(db: &ReviewDb, feature: &Feature) -> Feature {
        let mut f = feature.clone();
        f.status = FeatureStatus::CodeReview;
        f.review = Some(ReviewSpec::new(3));
        db.save_feature(&f, feature.version).unwrap();
        db.get_feature(f.id).unwrap()
    }

    fn iteration(number: u32, decision: Decision) -> Iteration {
        Iteration::builder(number, decision)
            .reviewer("claude")
            .commit(format!("sha{}", number), "+x")
            .findings(vec![
                Finding::new(FindingCategory::Code, FindingSeverity::Error, "t", "d")
                    .with_file("src/a.rs")
                    .with_line(3),
            ])
            .summary("s")
            .rationale(Some("r".into()))
            .build()
    }

    #[test]
    fn test_create_database_and_run_migrations() {
        let db = ReviewDb::new_in_memory().unwrap();
        let table_count: i32 = db
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table'
                 AND name IN ('features', 'iterations', 'iteration_details', 'attempt_outputs')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(table_count, 4);
        // Idempotent
        db.run_migrations().unwrap();
    }

    #[test]
    fn test_create_feature_starts_in_backlog() {
        let (_db, feature) = db_with_feature();
        assert_eq!(feature.status, FeatureStatus::Backlog);
        assert_eq!(feature.version, 1);
        assert!(feature.review.is_none());
        assert_eq!(feature.current_iteration(), 0);
    }

    #[test]
    fn test_get_missing_feature_is_not_found() {
        let db = ReviewDb::new_in_memory().unwrap();
        assert!(matches!(db.get_feature(99), Err(StoreError::NotFound(99))));
    }

    #[test]
    fn test_save_feature_compare_and_swap() {
        let (db, feature) = db_with_feature();
        let mut f = feature.clone();
        f.status = FeatureStatus::InProgress;

        let v2 = db.save_feature(&f, 1).unwrap();
        assert_eq!(v2, 2);
        assert_eq!(db.get_feature(f.id).unwrap().status, FeatureStatus::InProgress);

        // Stale writer loses
        f.status = FeatureStatus::Completed;
        let err = db.save_feature(&f, 1).unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        assert_eq!(db.get_feature(f.id).unwrap().status, FeatureStatus::InProgress);
    }

    #[test]
    fn test_save_missing_feature_is_not_found() {
        let (db, mut feature) = db_with_feature();
        feature.id = 42;
        assert!(matches!(
            db.save_feature(&feature, 1),
            Err(StoreError::NotFound(42))
        ));
    }

    #[test]
    fn test_save_feature_persists_pending_slot() {
        let (db, feature) = db_with_feature();
        let mut f = feature.clone();
        let mut spec = ReviewSpec::new(3);
        spec.status = ReviewStatus::Reviewing;
        spec.pending = Some(PendingReview {
            iteration: 1,
            commit: Some(crate::review::CommitInfo {
                hash: "abc".into(),
                diff: "+y".into(),
            }),
            base: None,
            claimed_at: Utc::now(),
        });
        f.review = Some(spec);
        db.save_feature(&f, 1).unwrap();

        let loaded = db.get_feature(f.id).unwrap();
        let pending = loaded.review.unwrap().pending.unwrap();
        assert_eq!(pending.iteration, 1);
        assert_eq!(pending.commit.unwrap().hash, "abc");
    }

    #[test]
    fn test_append_iteration_in_order() {
        let (db, feature) = db_with_feature();
        let f = open_review(&db, &feature);

        let v = db.append_iteration(f.id, &iteration(1, Decision::Rejected), 1).unwrap();
        assert_eq!(v, f.version + 1);

        let loaded = db.get_feature(f.id).unwrap();
        assert_eq!(loaded.current_iteration(), 1);
        assert_eq!(loaded.version, v);
        let spec = loaded.review.unwrap();
        assert!(spec.pending.is_none());
        let stored = spec.iterations().get(1).unwrap();
        assert_eq!(stored.decision(), Decision::Rejected);
        assert_eq!(stored.commit(), "sha1");
        assert_eq!(stored.findings()[0].location().as_deref(), Some("src/a.rs:3"));
    }

    #[test]
    fn test_append_iteration_rejects_duplicates_and_gaps() {
        let (db, feature) = db_with_feature();
        let f = open_review(&db, &feature);
        db.append_iteration(f.id, &iteration(1, Decision::Rejected), 1).unwrap();

        let dup = db.append_iteration(f.id, &iteration(1, Decision::Rejected), 1);
        assert!(matches!(
            dup,
            Err(StoreError::OutOfOrder {
                expected: 2,
                actual: 1,
                ..
            })
        ));
        let gap = db.append_iteration(f.id, &iteration(3, Decision::Rejected), 3);
        assert!(matches!(gap, Err(StoreError::OutOfOrder { expected: 2, .. })));
        assert_eq!(db.get_feature(f.id).unwrap().current_iteration(), 1);
    }

    #[test]
    fn test_append_iteration_enforces_cap() {
        let (db, feature) = db_with_feature();
        let f = open_review(&db, &feature);
        for n in 1..=3 {
            db.append_iteration(f.id, &iteration(n, Decision::Rejected), n).unwrap();
        }
        let err = db.append_iteration(f.id, &iteration(4, Decision::Rejected), 4);
        assert!(matches!(err, Err(StoreError::CapExceeded { max_iterations: 3, .. })));
        assert_eq!(db.get_feature(f.id).unwrap().current_iteration(), 3);
    }

    #[test]
    fn test_append_without_review_spec_fails() {
        let (db, feature) = db_with_feature();
        let err = db.append_iteration(feature.id, &iteration(1, Decision::Approved), 1);
        assert!(matches!(err, Err(StoreError::Io(_))));
    }

    #[test]
    fn test_iteration_reads_back_identically() {
        let (db, feature) = db_with_feature();
        let f = open_review(&db, &feature);
        let original = iteration(1, Decision::Rejected).with_detail_ref("feature/1/iteration/1");
        db.append_iteration(f.id, &original, 1).unwrap();

        let first = db.get_feature(f.id).unwrap();
        let second = db.get_feature(f.id).unwrap();
        let a = first.review.unwrap().iterations().get(1).cloned().unwrap();
        let b = second.review.unwrap().iterations().get(1).cloned().unwrap();
        assert_eq!(a, original);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_iterations_table_is_append_only() {
        let (db, feature) = db_with_feature();
        let f = open_review(&db, &feature);
        db.append_iteration(f.id, &iteration(1, Decision::Rejected), 1).unwrap();

        let update = db.conn.execute(
            "UPDATE iterations SET decision = 'approved' WHERE feature_id = ?1",
            params![f.id],
        );
        assert!(update.is_err());
        let delete = db
            .conn
            .execute("DELETE FROM iterations WHERE feature_id = ?1", params![f.id]);
        assert!(delete.is_err());
    }

    #[test]
    fn test_save_feature_does_not_touch_history() {
        let (db, feature) = db_with_feature();
        let f = open_review(&db, &feature);
        db.append_iteration(f.id, &iteration(1, Decision::Rejected), 1).unwrap();

        // A caller holding a spec with no iterations cannot erase history.
        let mut stale = db.get_feature(f.id).unwrap();
        let version = stale.version;
        stale.review = Some(ReviewSpec::new(3));
        db.save_feature(&stale, version).unwrap();
        assert_eq!(db.get_feature(f.id).unwrap().current_iteration(), 1);
    }

    #[test]
    fn test_persist_and_load_details() {
        let (db, feature) = db_with_feature();
        let loc = db.persist_iteration_detail(feature.id, 1, "# doc 1").unwrap();
        assert_eq!(loc, "feature/1/iteration/1");
        db.persist_iteration_detail(feature.id, 2, "# doc 2").unwrap();

        let docs = db.get_iteration_details(feature.id).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].body, "# doc 1");
        assert_eq!(docs[1].iteration, 2);

        assert!(matches!(
            db.persist_iteration_detail(77, 1, "x"),
            Err(StoreError::NotFound(77))
        ));
    }

    #[test]
    fn test_attempt_outputs_are_kept_apart_from_details() {
        let (db, feature) = db_with_feature();
        db.persist_iteration_detail(feature.id, 1, "# review").unwrap();
        db.persist_attempt_output(feature.id, 1, "first try").unwrap();
        let loc = db.persist_attempt_output(feature.id, 1, "retried").unwrap();
        assert_eq!(loc, "feature/1/iteration/1/implementation");

        let outputs = db.get_attempt_outputs(feature.id).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].body, "retried");
        assert_eq!(db.get_iteration_details(feature.id).unwrap()[0].body, "# review");

        assert!(matches!(
            db.persist_attempt_output(77, 1, "x"),
            Err(StoreError::NotFound(77))
        ));
    }

    #[test]
    fn test_list_features_in_id_order() {
        let db = ReviewDb::new_in_memory().unwrap();
        db.create_feature("a", "").unwrap();
        db.create_feature("b", "").unwrap();
        let titles: Vec<String> = db
            .list_features()
            .unwrap()
            .into_iter()
            .map(|f| f.title)
            .collect();
        assert_eq!(titles, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_sqlite_store_async_round_trip() {
        let store = SqliteStore::new_in_memory().unwrap();
        let f = store.create_feature("Async", "desc").await.unwrap();
        let loaded = store.load_feature(f.id).await.unwrap();
        assert_eq!(loaded, f);
        assert!(matches!(
            store.load_feature(f.id + 1).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
