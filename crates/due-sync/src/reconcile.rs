//! Due date reconciliation for a single parent record.
//!
//! One run searches the three work order categories in concurrent tasks,
//! waits for all of them, reduces each to a single date and then patches the parent.
//! The patch is never issued before every search has settled.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, error, info, warn, Instrument};

use crate::client::RecordStore;
use crate::config::{PatchMode, ReconcilePolicy, SearchFailurePolicy};
use crate::dates::{add_one_day, extract_dates, reduce};
use crate::error::WebhookError;
use crate::models::{Category, DueDates, ParentId, ParentUpdate, ReconcileSummary};
use crate::query::child_search;

/// Source of the reference instant for nearest-to-now reduction.
pub type Clock = fn() -> DateTime<Utc>;

/// Runs reconciliations against a [`RecordStore`].
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    policy: ReconcilePolicy,
    clock: Clock,
}

impl Reconciler {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, policy: ReconcilePolicy) -> Self {
        Self {
            store,
            policy,
            clock: Utc::now,
        }
    }

    /// Replace the clock (tests pin "now" with this).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn policy(&self) -> &ReconcilePolicy {
        &self.policy
    }

    /// Reconcile the due dates of `parent_id`.
    pub async fn reconcile(&self, parent_id: &ParentId) -> Result<ReconcileSummary, WebhookError> {
        let date_sets = self.collect_all(parent_id).await?;

        let now = (self.clock)();
        let mut dates = DueDates::default();
        for (category, set) in Category::ALL.into_iter().zip(date_sets) {
            let mut picked = reduce(self.policy.nearest_date, &set, now);
            if self.policy.shift_due_dates {
                picked = picked.map(|d| add_one_day(&d).unwrap_or(d));
            }
            debug!(
                %parent_id,
                %category,
                candidates = set.len(),
                picked = ?picked,
                "Reduced due dates"
            );
            dates.set(category, picked);
        }

        let update = match self.policy.patch_mode {
            PatchMode::Sparse => ParentUpdate::sparse(parent_id, &dates),
            PatchMode::Full => ParentUpdate::full(parent_id, &dates),
        };

        match self.store.update_parent(&update).await {
            Ok(body) => {
                debug!(%parent_id, response = %body, "Update result");
            }
            Err(source) => {
                error!(
                    %parent_id,
                    status = ?source.status(),
                    body = source.body().unwrap_or_default(),
                    error = %source,
                    "Parent update failed"
                );
                return Err(WebhookError::UpdateFailed {
                    parent_id: parent_id.clone(),
                    source,
                });
            }
        }

        info!(
            %parent_id,
            maintenance = ?dates.maintenance,
            calibration = ?dates.calibration,
            requalification = ?dates.requalification,
            "Parent due dates updated"
        );

        Ok(ReconcileSummary::new(parent_id.clone(), dates))
    }

    /// Fan out one search task per category and join on all of them.
    ///
    /// Results are returned in [`Category::ALL`] order. A task that panics or
    /// is cancelled is fatal regardless of the search failure policy.
    async fn collect_all(&self, parent_id: &ParentId) -> Result<Vec<Vec<String>>, WebhookError> {
        let tasks = Category::ALL.map(|category| {
            let store = Arc::clone(&self.store);
            let parent_id = parent_id.clone();
            tokio::spawn(
                async move { collect_dates(store.as_ref(), &parent_id, category).await }
                    .in_current_span(),
            )
        });
        let joined = join_all(tasks).await;

        let mut sets = Vec::with_capacity(joined.len());
        for (category, outcome) in Category::ALL.into_iter().zip(joined) {
            let result = outcome.map_err(|e| {
                error!(%parent_id, %category, error = %e, "Search task did not complete");
                WebhookError::UnexpectedFailure(format!("{category} search task failed: {e}"))
            })?;

            match result {
                Ok(set) => sets.push(set),
                Err(err) => {
                    let (status, body) = match &err {
                        WebhookError::SearchFailed { source, .. } => {
                            (source.status(), source.body().unwrap_or_default())
                        }
                        _ => (None, ""),
                    };
                    match self.policy.search_failure {
                        SearchFailurePolicy::Tolerant => {
                            warn!(
                                %parent_id,
                                %category,
                                status = ?status,
                                body,
                                error = %err,
                                "Search failed, treating category as empty"
                            );
                            sets.push(Vec::new());
                        }
                        SearchFailurePolicy::Strict => {
                            error!(
                                %parent_id,
                                %category,
                                status = ?status,
                                body,
                                error = %err,
                                "Search failed"
                            );
                            return Err(err);
                        }
                    }
                }
            }
        }
        Ok(sets)
    }
}

/// Search one category and extract its due dates.
async fn collect_dates(
    store: &dyn RecordStore,
    parent_id: &ParentId,
    category: Category,
) -> Result<Vec<String>, WebhookError> {
    let aql = child_search(parent_id, category);
    let response = store
        .search(&aql)
        .await
        .map_err(|source| WebhookError::SearchFailed { category, source })?;
    Ok(extract_dates(response.records(), category.field()))
}
