use serde::Serialize;

use crate::models::payload::MealLogResponse;

/// Outcome of one write in a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitOutcome {
    /// Position in the commit list (queue order, active entry last).
    pub index: usize,
    pub label: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_log: Option<MealLogResponse>,
}

impl CommitOutcome {
    pub fn succeeded(index: usize, label: impl Into<String>) -> Self {
        Self {
            index,
            label: label.into(),
            ok: true,
            error: None,
            meal_log: None,
        }
    }

    pub fn failed(index: usize, label: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            index,
            label: label.into(),
            ok: false,
            error: Some(error.into()),
            meal_log: None,
        }
    }
}

/// Aggregated per-entry results of a batch commit. Not transactional: successful
/// entries stay written even when others fail.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    pub outcomes: Vec<CommitOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    /// Whether the active slot was part of the commit list (always the last entry).
    pub included_active: bool,
}

impl BatchResult {
    pub fn from_outcomes(mut outcomes: Vec<CommitOutcome>, included_active: bool) -> Self {
        outcomes.sort_by_key(|o| o.index);
        let succeeded = outcomes.iter().filter(|o| o.ok).count();
        let failed = outcomes.len() - succeeded;
        Self {
            outcomes,
            succeeded,
            failed,
            included_active,
        }
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &CommitOutcome> {
        self.outcomes.iter().filter(|o| !o.ok)
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures().map(|o| o.index).collect()
    }

    /// Surface a blocking error when any entry failed.
    pub fn ensure_success(&self) -> Result<(), crate::services::commit::CommitError> {
        if self.is_success() {
            return Ok(());
        }
        Err(crate::services::commit::CommitError::Partial {
            succeeded: self.succeeded,
            failed: self.failed,
            failures: self
                .failures()
                .map(|o| (o.label.clone(), o.error.clone().unwrap_or_default()))
                .collect(),
        })
    }
}
