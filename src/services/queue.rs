use crate::models::commit::BatchResult;
use crate::models::draft::Draft;

/// Messages that drive a [`DraftQueue`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent<D> {
    EnqueueActive,
    LoadFromQueue(usize),
    RemoveFromQueue(usize),
    Seed(Vec<D>),
    ReplaceActive(D),
    Reset,
}

/// Review queue for one draft kind: an ordered list of parked drafts plus the single
/// active draft bound to the edit form.
///
/// Queued entries are snapshots. The only way to edit one is to swap it back into the
/// active slot with [`DraftQueue::load_from_queue`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftQueue<D: Draft> {
    active: D,
    queue: Vec<D>,
}

impl<D: Draft> DraftQueue<D> {
    pub fn new() -> Self {
        Self {
            active: D::default(),
            queue: Vec::new(),
        }
    }

    pub fn active(&self) -> &D {
        &self.active
    }

    pub fn active_mut(&mut self) -> &mut D {
        &mut self.active
    }

    pub fn set_active(&mut self, draft: D) {
        self.active = draft;
    }

    pub fn queued(&self) -> &[D] {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when there is nothing to commit.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty() && !self.active.is_filled()
    }

    /// Park the active draft at the end of the queue and clear the form.
    /// Returns false (and does nothing) when the active draft has no name.
    pub fn enqueue_active(&mut self) -> bool {
        if !self.active.is_filled() {
            return false;
        }
        let snapshot = std::mem::take(&mut self.active);
        tracing::debug!(label = %snapshot.label(), position = self.queue.len(), "Draft queued");
        self.queue.push(snapshot);
        true
    }

    /// Swap queued entry `index` into the active slot.
    ///
    /// A filled active draft is appended first. Appending never shifts existing
    /// positions, so `index` still names the entry the caller picked.
    pub fn load_from_queue(&mut self, index: usize) -> Result<(), QueueError> {
        let len = self.queue.len();
        if index >= len {
            return Err(QueueError::IndexOutOfRange { index, len });
        }

        if self.active.is_filled() {
            self.queue.push(self.active.clone());
        }
        self.active = self.queue[index].clone();
        self.queue.remove(index);
        Ok(())
    }

    /// Drop queued entry `index`; later entries shift down by one.
    pub fn remove_from_queue(&mut self, index: usize) -> Result<D, QueueError> {
        let len = self.queue.len();
        if index >= len {
            return Err(QueueError::IndexOutOfRange { index, len });
        }
        Ok(self.queue.remove(index))
    }

    /// Load a batch of extracted drafts: the last one becomes active, the rest are
    /// queued in their original order. A filled active draft is queued ahead of them.
    pub fn seed(&mut self, drafts: Vec<D>) {
        let mut drafts = drafts;
        let Some(last) = drafts.pop() else {
            return;
        };

        if self.active.is_filled() {
            self.queue.push(std::mem::take(&mut self.active));
        }
        let seeded = drafts.len() + 1;
        self.queue.extend(drafts);
        self.active = last;
        tracing::debug!(seeded, queued = self.queue.len(), "Drafts seeded");
    }

    /// Everything a commit would write: the queue in order, then the active draft if filled.
    pub fn commit_entries(&self) -> Vec<D> {
        let mut entries = self.queue.clone();
        if self.active.is_filled() {
            entries.push(self.active.clone());
        }
        entries
    }

    /// Prune after a commit built from [`DraftQueue::commit_entries`]: written entries
    /// go away, failed ones stay queued for a retry.
    pub fn retain_failed(&mut self, result: &BatchResult) {
        let queued = self.queue.len();
        let mut kept = Vec::with_capacity(result.failed);
        let mut active_failed = false;

        for outcome in result.failures() {
            if outcome.index < queued {
                kept.push(self.queue[outcome.index].clone());
            } else if result.included_active && outcome.index == queued {
                active_failed = true;
            }
        }

        self.queue = kept;
        if result.included_active && !active_failed {
            self.active = D::default();
        }
    }

    /// Clear both the queue and the active slot.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.active = D::default();
    }

    pub fn dispatch(&mut self, event: QueueEvent<D>) -> Result<(), QueueError> {
        match event {
            QueueEvent::EnqueueActive => {
                self.enqueue_active();
            }
            QueueEvent::LoadFromQueue(index) => self.load_from_queue(index)?,
            QueueEvent::RemoveFromQueue(index) => {
                self.remove_from_queue(index)?;
            }
            QueueEvent::Seed(drafts) => self.seed(drafts),
            QueueEvent::ReplaceActive(draft) => self.set_active(draft),
            QueueEvent::Reset => self.reset(),
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("No queued draft at position {index} (queue holds {len})")]
    IndexOutOfRange { index: usize, len: usize },
}
