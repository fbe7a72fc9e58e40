use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use garde::Validate;

use crate::models::commit::{BatchResult, CommitOutcome};
use crate::models::draft::{Draft, DraftMeal, DraftStockItem};
use crate::models::payload::{MealLogResponse, MealPayload, StockPayload};
use crate::services::api::{ApiError, PantryApi};
use crate::services::queue::DraftQueue;

/// A draft kind that knows its create call.
#[async_trait]
pub trait Persist: Draft + Send + Sync {
    /// Issue the single create request for this draft. Meals return the log response.
    async fn create(&self, api: &dyn PantryApi, user_id: &str) -> Result<Option<MealLogResponse>, ApiError>;
}

#[async_trait]
impl Persist for DraftStockItem {
    async fn create(&self, api: &dyn PantryApi, user_id: &str) -> Result<Option<MealLogResponse>, ApiError> {
        api.create_stock(&StockPayload::from_draft(user_id, self)).await?;
        Ok(None)
    }
}

#[async_trait]
impl Persist for DraftMeal {
    async fn create(&self, api: &dyn PantryApi, user_id: &str) -> Result<Option<MealLogResponse>, ApiError> {
        let response = api.create_meal(&MealPayload::from_draft(user_id, self)).await?;
        Ok(Some(response))
    }
}

/// Writes reviewed drafts to the backend.
pub struct BatchCommitter {
    api: Arc<dyn PantryApi>,
    user_id: String,
    concurrency: usize,
}

impl BatchCommitter {
    pub fn new(api: Arc<dyn PantryApi>, user_id: impl Into<String>, concurrency: usize) -> Self {
        Self {
            api,
            user_id: user_id.into(),
            concurrency: concurrency.max(1),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Create every queued draft plus the active one (if filled), one request each,
    /// at most `concurrency` in flight.
    ///
    /// Validation failures abort before any request. Write failures do not: the
    /// returned [`BatchResult`] records each entry, and nothing already written is undone.
    pub async fn commit<D: Persist>(&self, queue: &DraftQueue<D>) -> Result<BatchResult, CommitError> {
        let entries = queue.commit_entries();
        let included_active = queue.active().is_filled();

        if entries.is_empty() {
            tracing::debug!("Nothing to commit");
            return Ok(BatchResult::default());
        }
        validate_entries(&entries)?;

        let api = self.api.as_ref();
        let user_id = self.user_id.as_str();

        let outcomes: Vec<CommitOutcome> = stream::iter(entries.iter().enumerate())
            .map(|(index, draft)| async move {
                match draft.create(api, user_id).await {
                    Ok(meal_log) => {
                        let mut outcome = CommitOutcome::succeeded(index, draft.label());
                        outcome.meal_log = meal_log;
                        outcome
                    }
                    Err(e) => {
                        tracing::warn!(index, label = %draft.label(), error = %e, "Draft write failed");
                        CommitOutcome::failed(index, draft.label(), e.to_string())
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let result = BatchResult::from_outcomes(outcomes, included_active);
        record_metrics(&result);
        tracing::info!(
            total = result.total(),
            succeeded = result.succeeded,
            failed = result.failed,
            "Batch commit finished"
        );
        Ok(result)
    }

    /// Send all stock drafts in one `POST /stock/batch`. Every entry shares the outcome.
    pub async fn commit_stock_bulk(&self, queue: &DraftQueue<DraftStockItem>) -> Result<BatchResult, CommitError> {
        let entries = queue.commit_entries();
        let included_active = queue.active().is_filled();

        if entries.is_empty() {
            return Ok(BatchResult::default());
        }
        validate_entries(&entries)?;

        let payloads: Vec<StockPayload> = entries
            .iter()
            .map(|d| StockPayload::from_draft(&self.user_id, d))
            .collect();

        let outcome = self.api.create_stock_batch(&payloads).await;
        let outcomes = entries
            .iter()
            .enumerate()
            .map(|(index, draft)| match &outcome {
                Ok(()) => CommitOutcome::succeeded(index, draft.label()),
                Err(e) => CommitOutcome::failed(index, draft.label(), e.to_string()),
            })
            .collect();

        if let Err(e) = &outcome {
            tracing::error!(count = entries.len(), error = %e, "Bulk stock write failed");
        }

        let result = BatchResult::from_outcomes(outcomes, included_active);
        record_metrics(&result);
        Ok(result)
    }

    /// Edit mode: overwrite one existing stock row. Never batched.
    pub async fn update_stock(&self, stock_id: &str, draft: &DraftStockItem) -> Result<(), CommitError> {
        validate_entries(std::slice::from_ref(draft))?;
        self.api
            .update_stock(stock_id, &StockPayload::from_draft(&self.user_id, draft))
            .await?;
        tracing::info!(stock_id = %stock_id, item = %draft.item_name, "Stock item updated");
        Ok(())
    }

    /// Edit mode: overwrite one existing meal. Never batched.
    pub async fn update_meal(&self, meal_id: &str, draft: &DraftMeal) -> Result<(), CommitError> {
        validate_entries(std::slice::from_ref(draft))?;
        self.api
            .update_meal(meal_id, &MealPayload::from_draft(&self.user_id, draft))
            .await?;
        tracing::info!(meal_id = %meal_id, meal = %draft.name, "Meal updated");
        Ok(())
    }
}

fn validate_entries<D: Draft>(entries: &[D]) -> Result<(), CommitError> {
    for (index, draft) in entries.iter().enumerate() {
        if let Err(report) = draft.validate() {
            let label = if draft.label().trim().is_empty() {
                format!("entry {}", index + 1)
            } else {
                draft.label().to_string()
            };
            tracing::warn!(index, label = %label, errors = %report, "Draft failed validation");
            return Err(CommitError::Validation {
                index,
                label,
                message: report.to_string(),
            });
        }
    }
    Ok(())
}

fn record_metrics(result: &BatchResult) {
    metrics::counter!("ingest_commit_writes_total", "outcome" => "ok").increment(result.succeeded as u64);
    metrics::counter!("ingest_commit_writes_total", "outcome" => "failed").increment(result.failed as u64);
}

fn describe_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(label, error)| format!("{} ({})", label, error))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("{label} is invalid: {message}")]
    Validation {
        index: usize,
        label: String,
        message: String,
    },

    #[error("{failed} of {} writes failed: {}", .succeeded + .failed, describe_failures(.failures))]
    Partial {
        succeeded: usize,
        failed: usize,
        /// `(label, error)` for each failed entry.
        failures: Vec<(String, String)>,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}
