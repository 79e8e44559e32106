//! Phase implementations for [`ReviewOrchestrator`].

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::ReviewOrchestrator;
use crate::errors::{AgentError, CommitError, ReviewError};
use crate::events::ReviewEvent;
use crate::feature::{Feature, FeatureId, FeatureStatus};
use crate::review::{
    CommitBase, CommitInfo, ContextBuilder, Decision, DetailDocument, Iteration, PendingReview,
    ReviewHistory, ReviewSpec, ReviewStatus, render_detail,
};

/// Where a review phase left the feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "next_status", rename_all = "snake_case")]
pub enum Outcome {
    /// Approved; the feature moved to the resolved forward status.
    Approved(FeatureStatus),
    /// Rejected or failed with attempts left; back to `in_progress`.
    Rejected,
    /// The cap was reached without approval; automation halted.
    CapReached,
}

/// Result of one completed review phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub feature_id: FeatureId,
    pub iteration: u32,
    pub decision: Decision,
    pub outcome: Outcome,
    pub findings: usize,
    pub detail_ref: Option<String>,
}

/// What `recover` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Recovery {
    NothingToDo,
    /// An interrupted claim was released; its commit (if any) is kept for
    /// the next phase.
    ReleasedClaim { iteration: u32, commit_kept: bool },
    /// The last appended iteration's decision was applied to the status.
    ReappliedDecision { iteration: u32, outcome: Outcome },
}

impl ReviewOrchestrator {
    // ── Queries ───────────────────────────────────────────────────────

    /// Create a feature in `backlog`.
    pub async fn intake(&self, title: &str, description: &str) -> Result<Feature, ReviewError> {
        let feature = self
            .store
            .create_feature(title, description)
            .await
            .map_err(|e| ReviewError::from_store(0, e))?;
        info!(feature_id = feature.id, title = %feature.title, "Feature added to backlog");
        Ok(feature)
    }

    pub async fn list(&self) -> Result<Vec<Feature>, ReviewError> {
        self.store
            .list_features()
            .await
            .map_err(|e| ReviewError::from_store(0, e))
    }

    pub async fn status(&self, feature_id: FeatureId) -> Result<Feature, ReviewError> {
        self.load(feature_id).await
    }

    /// Read-only projection of the feature's review history.
    pub async fn history(&self, feature_id: FeatureId) -> Result<ReviewHistory, ReviewError> {
        let feature = self.load(feature_id).await?;
        Ok(ReviewHistory::from(&feature))
    }

    pub async fn iteration_detail(
        &self,
        feature_id: FeatureId,
        iteration: u32,
    ) -> Result<Option<DetailDocument>, ReviewError> {
        let docs = self
            .store
            .load_iteration_details(feature_id)
            .await
            .map_err(|e| ReviewError::from_store(feature_id, e))?;
        Ok(docs.into_iter().find(|d| d.iteration == iteration))
    }

    /// Context for the next implementation attempt: the feature alone
    /// before any review, the accumulated fix context afterwards.
    pub async fn implementation_context(
        &self,
        feature_id: FeatureId,
    ) -> Result<String, ReviewError> {
        let feature = self.load(feature_id).await?;
        let details = self.details_for_context(feature_id).await;
        let attempts = self.attempts_for_context(feature_id).await;
        Ok(ContextBuilder::new(&feature)
            .with_details(&details)
            .with_attempt_outputs(&attempts)
            .implementation_context())
    }

    // ── Transitions ───────────────────────────────────────────────────

    /// Move a feature from `backlog` to `in_progress`.
    pub async fn begin_implementation(&self, feature_id: FeatureId) -> Result<Feature, ReviewError> {
        let mut feature = self.load(feature_id).await?;
        if feature.status != FeatureStatus::Backlog {
            return Err(ReviewError::InvalidState {
                feature_id,
                status: feature.status,
                expected: FeatureStatus::Backlog,
            });
        }
        let expected = feature.version;
        feature.status = FeatureStatus::InProgress;
        feature.version = self.save(&feature, expected).await?;
        info!(feature_id, "Implementation started");
        Ok(feature)
    }

    /// Implementation reported completion: commit, review, decide.
    pub async fn on_implementation_complete(
        &self,
        feature_id: FeatureId,
    ) -> Result<PhaseReport, ReviewError> {
        let feature = self.load(feature_id).await?;
        self.review_phase(feature).await
    }

    /// Like [`on_implementation_complete`](Self::on_implementation_complete),
    /// but rejects the signal if the feature changed since the caller
    /// observed `expected_version`.
    pub async fn on_implementation_complete_at(
        &self,
        feature_id: FeatureId,
        expected_version: u64,
    ) -> Result<PhaseReport, ReviewError> {
        let feature = self.load(feature_id).await?;
        if feature.version != expected_version {
            debug!(
                feature_id,
                expected_version,
                actual = feature.version,
                "Stale completion signal"
            );
            return Err(ReviewError::ConcurrencyConflict { feature_id });
        }
        self.review_phase(feature).await
    }

    /// Halt automation: mark the review failed and return the feature to
    /// `in_progress` without starting another review.
    pub async fn on_max_iterations_reached(&self, feature_id: FeatureId) -> Result<(), ReviewError> {
        let mut feature = self.load(feature_id).await?;
        if feature.is_halted() && feature.status == FeatureStatus::InProgress {
            debug!(feature_id, "Already halted");
            return Ok(());
        }
        let expected = feature.version;
        let max_iterations = self.settings.max_iterations;
        let spec = feature
            .review
            .get_or_insert_with(|| ReviewSpec::new(max_iterations));
        spec.status = ReviewStatus::Failed;
        spec.pending = None;
        let max_iterations = spec.max_iterations();
        let iteration = spec.current_iteration();
        feature.status = FeatureStatus::InProgress;
        self.save(&feature, expected).await?;

        warn!(
            feature_id,
            iteration, max_iterations, "Review cap reached; manual intervention required"
        );
        self.events.publish(ReviewEvent::MaxIterationsReached {
            feature_id,
            iteration,
            max_iterations,
        });
        Ok(())
    }

    /// Run one implementation attempt and then its review.
    pub async fn run_implementation(&self, feature_id: FeatureId) -> Result<PhaseReport, ReviewError> {
        let mut feature = self.load(feature_id).await?;
        if feature.status == FeatureStatus::Backlog {
            feature = self.begin_implementation(feature_id).await?;
        }
        self.check_can_review(&feature).await?;
        if self.take_cancel(feature_id) {
            return Err(ReviewError::Cancelled(feature_id));
        }

        let details = self.details_for_context(feature_id).await;
        let attempts = self.attempts_for_context(feature_id).await;
        let context = ContextBuilder::new(&feature)
            .with_details(&details)
            .with_attempt_outputs(&attempts)
            .implementation_context();
        let iteration = feature.current_iteration() + 1;
        info!(feature_id, iteration, "Invoking agent for implementation");
        self.events.publish(ReviewEvent::progress(
            feature_id,
            iteration,
            "implementing",
            format!("{} chars of context", context.len()),
        ));

        let timeout = self.settings.implement_timeout;
        let result = tokio::time::timeout(timeout, self.agent.implement(&context))
            .await
            .unwrap_or(Err(AgentError::Timeout(timeout)));
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                warn!(feature_id, error = %e, "Implementation attempt failed");
                return Err(ReviewError::ExternalCallFailure {
                    feature_id,
                    message: e.to_string(),
                });
            }
        };
        self.persist_attempt_output(feature_id, iteration, &output).await;

        self.on_implementation_complete_at(feature_id, feature.version)
            .await
    }

    /// Alternate implementation and review until approved or halted.
    pub async fn drive(&self, feature_id: FeatureId) -> Result<PhaseReport, ReviewError> {
        loop {
            let report = self.run_implementation(feature_id).await?;
            match report.outcome {
                Outcome::Rejected => {
                    info!(
                        feature_id,
                        iteration = report.iteration,
                        "Rejected; starting next attempt"
                    );
                }
                Outcome::Approved(_) | Outcome::CapReached => return Ok(report),
            }
        }
    }

    /// Reconcile a feature left in `code_review` by an interrupted process.
    pub async fn recover(&self, feature_id: FeatureId) -> Result<Recovery, ReviewError> {
        if self.is_in_flight(feature_id) {
            return Err(ReviewError::ConcurrencyConflict { feature_id });
        }
        let mut feature = self.load(feature_id).await?;
        if feature.status != FeatureStatus::CodeReview {
            return Ok(Recovery::NothingToDo);
        }
        let expected = feature.version;
        let Some(spec) = feature.review.as_mut() else {
            feature.status = FeatureStatus::InProgress;
            self.save(&feature, expected).await?;
            return Ok(Recovery::NothingToDo);
        };

        let next = spec.next_iteration();
        if let Some(pending) = spec.pending.as_ref().filter(|p| p.iteration == next) {
            let iteration = pending.iteration;
            let commit_kept = pending.commit.is_some();
            spec.status = status_before_claim(spec);
            feature.status = FeatureStatus::InProgress;
            self.save(&feature, expected).await?;
            info!(feature_id, iteration, commit_kept, "Released interrupted claim");
            return Ok(Recovery::ReleasedClaim {
                iteration,
                commit_kept,
            });
        }

        spec.pending = None;
        let Some(latest) = spec.latest().cloned() else {
            spec.status = ReviewStatus::Pending;
            feature.status = FeatureStatus::InProgress;
            self.save(&feature, expected).await?;
            return Ok(Recovery::NothingToDo);
        };

        let outcome = self.apply_decision(&mut feature, latest.decision());
        self.save(&feature, expected).await?;
        info!(
            feature_id,
            iteration = latest.number(),
            decision = %latest.decision(),
            "Re-applied last review decision"
        );
        self.publish_decision(&feature, &latest, outcome);
        Ok(Recovery::ReappliedDecision {
            iteration: latest.number(),
            outcome,
        })
    }

    // ── Review phase ──────────────────────────────────────────────────

    async fn review_phase(&self, feature: Feature) -> Result<PhaseReport, ReviewError> {
        let feature_id = feature.id;
        self.check_can_review(&feature).await?;
        if self.take_cancel(feature_id) {
            return Err(ReviewError::Cancelled(feature_id));
        }

        // Claim: first durable write of the phase. A racing phase loses here.
        let prior_status = feature
            .review
            .as_ref()
            .map(|s| s.status)
            .unwrap_or_default();
        let number = feature.current_iteration() + 1;
        let slot = feature
            .review
            .as_ref()
            .and_then(|s| s.pending.as_ref())
            .filter(|p| p.iteration == number);
        let reused = slot.and_then(|p| p.commit.clone());
        let base = match slot.and_then(|p| p.base.clone()) {
            Some(base) => Some(base),
            None if reused.is_none() => self.observe_base(feature_id).await,
            None => None,
        };

        let mut claimed = feature.clone();
        let max_iterations = self.settings.max_iterations;
        let spec = claimed
            .review
            .get_or_insert_with(|| ReviewSpec::new(max_iterations));
        spec.status = ReviewStatus::Reviewing;
        spec.pending = Some(PendingReview {
            iteration: number,
            commit: reused.clone(),
            base: base.clone(),
            claimed_at: Utc::now(),
        });
        claimed.status = FeatureStatus::CodeReview;
        claimed.version = self.save(&claimed, feature.version).await?;
        let _in_flight = self.track(feature_id);

        info!(feature_id, iteration = number, "Review phase started");
        self.events.publish(ReviewEvent::Started {
            feature_id,
            iteration: number,
        });

        if self.take_cancel(feature_id) {
            self.release_claim(claimed, prior_status).await;
            return Err(ReviewError::Cancelled(feature_id));
        }

        // Commit, or reuse the commit an interrupted attempt already made.
        // A failed commit keeps the slot and its base for the retry.
        let commit = match reused {
            Some(commit) => {
                info!(feature_id, hash = %commit.hash, "Reusing commit from interrupted attempt");
                commit
            }
            None => match self.commit(&claimed, number, base.as_ref()).await {
                Ok(commit) => {
                    if let Some(pending) = claimed.review.as_mut().and_then(|s| s.pending.as_mut())
                    {
                        pending.commit = Some(commit.clone());
                    }
                    let expected = claimed.version;
                    claimed.version = self.save(&claimed, expected).await?;
                    commit
                }
                Err(e) => {
                    warn!(feature_id, iteration = number, error = %e, "Commit failed");
                    self.events.publish(ReviewEvent::progress(
                        feature_id,
                        number,
                        "commit_failed",
                        e.to_string(),
                    ));
                    self.release_claim(claimed, prior_status).await;
                    return Err(ReviewError::ExternalCallFailure {
                        feature_id,
                        message: e.to_string(),
                    });
                }
            },
        };
        self.events.publish(ReviewEvent::progress(
            feature_id,
            number,
            "committed",
            commit.hash.clone(),
        ));

        if self.take_cancel(feature_id) {
            self.release_claim(claimed, prior_status).await;
            return Err(ReviewError::Cancelled(feature_id));
        }

        // Review. Every failure past this point is recorded, not retried.
        let iteration = self.review_iteration(&claimed, number, &commit).await;

        let iteration = match self.persist_detail(&claimed, &iteration).await {
            Some(location) => iteration.with_detail_ref(location),
            None => iteration,
        };

        let version = self
            .store
            .append_iteration(feature_id, iteration.clone(), number)
            .await
            .map_err(|e| ReviewError::from_store(feature_id, e))?;
        debug!(feature_id, iteration = number, version, "Iteration appended");

        // Decide. The appended history is reloaded so the cap check sees it.
        let mut current = self.load(feature_id).await?;
        if current.version != version {
            return Err(ReviewError::ConcurrencyConflict { feature_id });
        }
        let outcome = self.apply_decision(&mut current, iteration.decision());
        self.save(&current, version).await?;

        info!(
            feature_id,
            iteration = number,
            decision = %iteration.decision(),
            status = %current.status,
            "Review phase completed"
        );
        self.publish_decision(&current, &iteration, outcome);

        Ok(PhaseReport {
            feature_id,
            iteration: number,
            decision: iteration.decision(),
            outcome,
            findings: iteration.findings().len(),
            detail_ref: iteration.detail_ref().map(str::to_string),
        })
    }

    /// Refuse to enter review unless the feature is `in_progress` and has
    /// attempts left. At the cap the halt marker is written first.
    async fn check_can_review(&self, feature: &Feature) -> Result<(), ReviewError> {
        let feature_id = feature.id;
        let spec = feature.review.as_ref();
        if let Some(spec) = spec
            && spec.is_halted()
        {
            return Err(ReviewError::IterationCapExceeded {
                feature_id,
                max_iterations: spec.max_iterations(),
            });
        }
        // Another phase holds the claim.
        if feature.status == FeatureStatus::CodeReview {
            return Err(ReviewError::ConcurrencyConflict { feature_id });
        }
        if feature.status != FeatureStatus::InProgress {
            return Err(ReviewError::InvalidState {
                feature_id,
                status: feature.status,
                expected: FeatureStatus::InProgress,
            });
        }
        if let Some(spec) = spec
            && spec.at_cap()
        {
            let max_iterations = spec.max_iterations();
            self.on_max_iterations_reached(feature_id).await?;
            return Err(ReviewError::IterationCapExceeded {
                feature_id,
                max_iterations,
            });
        }
        Ok(())
    }

    /// HEAD before this phase commits. `None` if it could not be read, in
    /// which case a commit lost to a timeout cannot be recovered.
    async fn observe_base(&self, feature_id: FeatureId) -> Option<CommitBase> {
        let timeout = self.settings.commit_timeout;
        let head = tokio::time::timeout(timeout, self.commits.head(&self.settings.workdir))
            .await
            .unwrap_or(Err(CommitError::Timeout(timeout)));
        match head {
            Ok(head) => Some(CommitBase { head }),
            Err(e) => {
                warn!(feature_id, error = %e, "Could not read HEAD before commit");
                None
            }
        }
    }

    /// Commit the working tree. With a known base the result covers
    /// everything since it, including a commit that completed after an
    /// earlier attempt gave up on it.
    async fn commit(
        &self,
        feature: &Feature,
        iteration: u32,
        base: Option<&CommitBase>,
    ) -> Result<CommitInfo, CommitError> {
        let message = format!(
            "forge-review: {} (feature {}, iteration {})",
            feature.title, feature.id, iteration
        );
        let timeout = self.settings.commit_timeout;
        let workdir = &self.settings.workdir;
        let made = tokio::time::timeout(timeout, self.commits.commit_and_diff(workdir, &message))
            .await
            .unwrap_or(Err(CommitError::Timeout(timeout)));

        let Some(base) = base else {
            return made;
        };
        if matches!(made, Err(CommitError::Timeout(_) | CommitError::Io(_))) {
            return made;
        }

        let span = tokio::time::timeout(
            timeout,
            self.commits.changes_since(workdir, base.head.as_deref()),
        )
        .await
        .unwrap_or(Err(CommitError::Timeout(timeout)));
        match (made, span) {
            (Err(CommitError::NoChanges), Ok(Some(span))) => {
                info!(
                    feature_id = feature.id,
                    hash = %span.hash,
                    "Adopting commit made after an earlier attempt timed out"
                );
                Ok(span)
            }
            (Ok(_), Ok(Some(span))) => Ok(span),
            (made, Ok(_)) => made,
            (made, Err(e)) => {
                warn!(feature_id = feature.id, error = %e, "Could not diff against commit base");
                made
            }
        }
    }

    /// Invoke the reviewer and turn whatever comes back into an iteration.
    async fn review_iteration(&self, feature: &Feature, number: u32, commit: &CommitInfo) -> Iteration {
        let feature_id = feature.id;
        let details = self.details_for_context(feature_id).await;
        let context = ContextBuilder::new(feature)
            .with_details(&details)
            .review_context(&commit.hash, &commit.diff);
        self.events.publish(ReviewEvent::progress(
            feature_id,
            number,
            "reviewing",
            format!("{} chars of context", context.len()),
        ));

        let timeout = self.settings.review_timeout;
        let raw = tokio::time::timeout(timeout, self.agent.review(&context))
            .await
            .unwrap_or(Err(AgentError::Timeout(timeout)));

        let builder = Iteration::builder(number, Decision::Failed)
            .reviewer(self.agent.identity())
            .commit(commit.hash.clone(), commit.diff.clone());
        let failure = match raw {
            Ok(raw) => match self.parser.parse_review_decision(&raw) {
                Ok(parsed) => {
                    return Iteration::builder(number, parsed.decision)
                        .reviewer(self.agent.identity())
                        .commit(commit.hash.clone(), commit.diff.clone())
                        .findings(parsed.findings)
                        .summary(parsed.summary)
                        .rationale(parsed.rationale)
                        .build();
                }
                Err(e) => ReviewError::UnparsableResponse {
                    feature_id,
                    message: e.to_string(),
                },
            },
            Err(e) => ReviewError::ExternalCallFailure {
                feature_id,
                message: e.to_string(),
            },
        };

        warn!(feature_id, iteration = number, error = %failure, "Review produced no verdict");
        builder
            .summary("Review did not produce a verdict")
            .rationale(Some(failure.to_string()))
            .build()
    }

    /// Persist the detail document. Failure is logged and surfaced as a
    /// progress event; it never blocks the transition.
    async fn persist_detail(&self, feature: &Feature, iteration: &Iteration) -> Option<String> {
        let document = render_detail(feature.id, &feature.title, iteration);
        match self
            .store
            .persist_iteration_detail(feature.id, iteration.number(), &document)
            .await
        {
            Ok(location) => Some(location),
            Err(e) => {
                warn!(
                    feature_id = feature.id,
                    iteration = iteration.number(),
                    error = %e,
                    "Failed to persist review detail"
                );
                self.events.publish(ReviewEvent::progress(
                    feature.id,
                    iteration.number(),
                    "detail_failed",
                    e.to_string(),
                ));
                None
            }
        }
    }

    /// Keep the attempt's output for the next fix context. Failure is logged
    /// and surfaced as a progress event, like a lost detail document.
    async fn persist_attempt_output(&self, feature_id: FeatureId, iteration: u32, output: &str) {
        match self
            .store
            .persist_attempt_output(feature_id, iteration, output)
            .await
        {
            Ok(location) => debug!(feature_id, iteration, %location, "Attempt output recorded"),
            Err(e) => {
                warn!(feature_id, iteration, error = %e, "Failed to record attempt output");
                self.events.publish(ReviewEvent::progress(
                    feature_id,
                    iteration,
                    "output_failed",
                    e.to_string(),
                ));
            }
        }
    }

    /// Set statuses for `decision` on a feature whose history already
    /// contains the decided iteration.
    fn apply_decision(&self, feature: &mut Feature, decision: Decision) -> Outcome {
        let next_status = if decision.is_approved() {
            let resolved = self.pipeline.next_status_after_approval(feature);
            if resolved.is_forward() {
                Some(resolved)
            } else {
                warn!(
                    feature_id = feature.id,
                    resolved = %resolved,
                    "Pipeline resolved a non-forward status; using waiting_approval"
                );
                Some(FeatureStatus::WaitingApproval)
            }
        } else {
            None
        };

        let Some(spec) = feature.review.as_mut() else {
            return Outcome::Rejected;
        };
        spec.pending = None;
        match next_status {
            Some(next) => {
                spec.status = ReviewStatus::Approved;
                feature.status = next;
                Outcome::Approved(next)
            }
            None if spec.at_cap() => {
                spec.status = ReviewStatus::Failed;
                feature.status = FeatureStatus::InProgress;
                Outcome::CapReached
            }
            None => {
                spec.status = ReviewStatus::Rejected;
                feature.status = FeatureStatus::InProgress;
                Outcome::Rejected
            }
        }
    }

    fn publish_decision(&self, feature: &Feature, iteration: &Iteration, outcome: Outcome) {
        let feature_id = feature.id;
        let number = iteration.number();
        let findings_count = iteration.findings().len();
        self.events.publish(ReviewEvent::Completed {
            feature_id,
            iteration: number,
            decision: iteration.decision(),
            findings_count,
        });
        match iteration.decision() {
            Decision::Approved => {
                if let Outcome::Approved(next_status) = outcome {
                    self.events.publish(ReviewEvent::Approved {
                        feature_id,
                        iteration: number,
                        next_status,
                    });
                }
            }
            Decision::Rejected => self.events.publish(ReviewEvent::Rejected {
                feature_id,
                iteration: number,
                findings_count,
                rationale: iteration.rationale().map(str::to_string),
            }),
            Decision::Failed => self.events.publish(ReviewEvent::Failed {
                feature_id,
                iteration: number,
                reason: iteration
                    .rationale()
                    .unwrap_or("review failed")
                    .to_string(),
            }),
        }
        if outcome == Outcome::CapReached {
            let max_iterations = feature
                .review
                .as_ref()
                .map(|s| s.max_iterations())
                .unwrap_or(number);
            warn!(
                feature_id,
                max_iterations, "Review cap reached; manual intervention required"
            );
            self.events.publish(ReviewEvent::MaxIterationsReached {
                feature_id,
                iteration: number,
                max_iterations,
            });
        }
    }

    /// Return a claimed feature to `in_progress`. Failures are logged; the
    /// claim is then left for `recover`.
    async fn release_claim(&self, mut feature: Feature, prior_status: ReviewStatus) {
        let feature_id = feature.id;
        let expected = feature.version;
        feature.status = FeatureStatus::InProgress;
        if let Some(spec) = feature.review.as_mut() {
            spec.status = prior_status;
        }
        match self.save(&feature, expected).await {
            Ok(_) => debug!(feature_id, "Claim released"),
            Err(e) => warn!(feature_id, error = %e, "Failed to release claim"),
        }
    }

    async fn details_for_context(&self, feature_id: FeatureId) -> Vec<DetailDocument> {
        match self.store.load_iteration_details(feature_id).await {
            Ok(details) => details,
            Err(e) => {
                warn!(feature_id, error = %e, "Could not load review details for context");
                Vec::new()
            }
        }
    }

    async fn attempts_for_context(&self, feature_id: FeatureId) -> Vec<DetailDocument> {
        match self.store.load_attempt_outputs(feature_id).await {
            Ok(outputs) => outputs,
            Err(e) => {
                warn!(feature_id, error = %e, "Could not load attempt outputs for context");
                Vec::new()
            }
        }
    }

    async fn load(&self, feature_id: FeatureId) -> Result<Feature, ReviewError> {
        self.store
            .load_feature(feature_id)
            .await
            .map_err(|e| ReviewError::from_store(feature_id, e))
    }

    async fn save(&self, feature: &Feature, expected_version: u64) -> Result<u64, ReviewError> {
        self.store
            .save_feature(feature, expected_version)
            .await
            .map_err(|e| ReviewError::from_store(feature.id, e))
    }
}

/// Review status a released claim falls back to.
fn status_before_claim(spec: &ReviewSpec) -> ReviewStatus {
    match spec.latest().map(|it| it.decision()) {
        None => ReviewStatus::Pending,
        Some(Decision::Approved) => ReviewStatus::Approved,
        Some(Decision::Rejected | Decision::Failed) => ReviewStatus::Rejected,
    }
}
