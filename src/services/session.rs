use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::IngestConfig;
use crate::models::commit::BatchResult;
use crate::models::draft::{DraftMeal, DraftStockItem, Ingredient};
use crate::services::api::{ApiError, PantryApi};
use crate::services::commit::{BatchCommitter, CommitError};
use crate::services::compress::CompressionSettings;
use crate::services::extraction::{Extraction, ScanMode};
use crate::services::leftovers;
use crate::services::queue::DraftQueue;
use crate::services::upload::{PollPolicy, UploadClient, UploadError};

/// Result of committing the meal queue.
#[derive(Debug, Clone)]
pub struct MealCommitReport {
    pub batch: BatchResult,
    /// Replenishment drafts seeded into the stock queue.
    pub suggestions: Vec<DraftStockItem>,
}

/// One review session: a stock queue and a meal queue plus the clients that fill and
/// drain them. Dropping the session discards every uncommitted draft.
pub struct IngestSession {
    api: Arc<dyn PantryApi>,
    uploader: UploadClient,
    committer: BatchCommitter,
    pub stock: DraftQueue<DraftStockItem>,
    pub meals: DraftQueue<DraftMeal>,
}

impl IngestSession {
    pub fn new(api: Arc<dyn PantryApi>, user_id: &str, config: &IngestConfig) -> Self {
        Self::with_settings(
            api,
            user_id,
            config.poll_policy(),
            config.compression(),
            config.commit_concurrency,
        )
    }

    pub fn with_settings(
        api: Arc<dyn PantryApi>,
        user_id: &str,
        policy: PollPolicy,
        compression: CompressionSettings,
        commit_concurrency: usize,
    ) -> Self {
        Self {
            uploader: UploadClient::new(Arc::clone(&api), user_id, policy, compression),
            committer: BatchCommitter::new(Arc::clone(&api), user_id, commit_concurrency),
            api,
            stock: DraftQueue::new(),
            meals: DraftQueue::new(),
        }
    }

    pub fn uploader(&self) -> &UploadClient {
        &self.uploader
    }

    pub fn committer(&self) -> &BatchCommitter {
        &self.committer
    }

    /// Analyze a photo and seed the matching queue. Returns how many drafts arrived.
    pub async fn scan(
        &mut self,
        image: &[u8],
        file_name: &str,
        mode: ScanMode,
        cancel: &CancellationToken,
    ) -> Result<usize, UploadError> {
        match self.uploader.analyze(image, file_name, mode, cancel).await? {
            Extraction::Stock(drafts) => {
                let count = drafts.len();
                self.stock.seed(drafts);
                tracing::info!(count, mode = %mode, "Stock drafts ready for review");
                Ok(count)
            }
            Extraction::Meal(draft) => {
                self.meals.seed(vec![draft]);
                tracing::info!(mode = %mode, "Meal draft ready for review");
                Ok(1)
            }
        }
    }

    /// Prefill the active meal draft from the backend's estimator.
    pub async fn estimate_meal(&mut self, meal_name: &str) -> Result<(), ApiError> {
        let estimate = self.api.estimate_meal(meal_name).await?;
        let mut draft = estimate.into_draft(meal_name);
        draft.meal_type = self.meals.active().meal_type;
        draft.meal_source = self.meals.active().meal_source;
        self.meals.set_active(draft);
        Ok(())
    }

    /// Commit the stock queue. Written entries leave the queue; failed ones stay.
    pub async fn commit_stock(&mut self) -> Result<BatchResult, CommitError> {
        let result = self.committer.commit(&self.stock).await?;
        self.stock.retain_failed(&result);
        Ok(result)
    }

    /// Commit the meal queue, then suggest replenishment for ingredients of
    /// successfully logged home-cooked meals that are not in stock.
    pub async fn commit_meals(&mut self) -> Result<MealCommitReport, CommitError> {
        let entries = self.meals.commit_entries();
        let result = self.committer.commit(&self.meals).await?;

        let consumed: Vec<Ingredient> = result
            .outcomes
            .iter()
            .filter(|o| o.ok)
            .filter_map(|o| entries.get(o.index))
            .filter(|meal| leftovers::applies_to(meal))
            .flat_map(|meal| meal.ingredients_used.iter().cloned())
            .collect();

        self.meals.retain_failed(&result);

        let suggestions = if consumed.is_empty() {
            Vec::new()
        } else {
            self.suggest_replenishment(&consumed).await
        };

        if !suggestions.is_empty() {
            tracing::info!(count = suggestions.len(), "Seeding replenishment suggestions");
            self.stock.seed(suggestions.clone());
        }

        Ok(MealCommitReport {
            batch: result,
            suggestions,
        })
    }

    async fn suggest_replenishment(&self, consumed: &[Ingredient]) -> Vec<DraftStockItem> {
        let known: Vec<String> = match self.api.list_stock(self.committer.user_id()).await {
            Ok(records) => records.into_iter().map(|r| r.item_name).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not load stock names, skipping leftover suggestions");
                return Vec::new();
            }
        };

        let candidates = leftovers::infer_leftovers(consumed, &known);
        let mut seen = HashSet::new();
        leftovers::replenishment_drafts(&candidates)
            .into_iter()
            .filter(|d| seen.insert(d.item_name.to_lowercase()))
            .collect()
    }
}
