use tracing::{info, warn};

use crate::domain::SelectedArtifact;
use crate::error::CatalogError;
use crate::storage::{LocalStorage, SELECTION_KEY};

/// Artifacts a visitor has queued for bulk download.
///
/// Every mutation is written through to [`LocalStorage`] before returning, so
/// a new process rehydrates exactly the set the previous one left behind.
/// Views receive the store by reference; nothing reaches it through globals.
#[derive(Debug)]
pub struct SelectionStore {
    storage: LocalStorage,
    items: Vec<SelectedArtifact>,
}

impl SelectionStore {
    /// Rehydrates the persisted selection. A missing, unreadable or corrupted
    /// entry yields an empty selection.
    pub fn load(storage: LocalStorage) -> Self {
        let items = match storage.get_item(SELECTION_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<SelectedArtifact>>(&raw) {
                Ok(items) => dedup_by_id(items),
                Err(err) => {
                    warn!(error = %err, "discarding unreadable selection cache");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(error = %err, "selection cache not readable");
                Vec::new()
            }
        };
        Self { storage, items }
    }

    pub fn current(&self) -> &[SelectedArtifact] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    pub fn ids(&self) -> Vec<u64> {
        self.items.iter().map(|item| item.id).collect()
    }

    /// Removes the artifact if it is selected, appends it otherwise. Returns
    /// whether the artifact is selected afterwards.
    pub fn toggle(&mut self, artifact: SelectedArtifact) -> Result<bool, CatalogError> {
        let mut next = self.items.clone();
        let selected = if let Some(index) = self.position(artifact.id) {
            next.remove(index);
            false
        } else {
            next.push(artifact);
            true
        };
        self.persist(&next)?;
        self.items = next;
        info!(count = self.items.len(), selected, "selection toggled");
        Ok(selected)
    }

    /// Returns whether an entry was removed; an absent id is a no-op.
    pub fn remove_by_id(&mut self, id: u64) -> Result<bool, CatalogError> {
        let Some(index) = self.position(id) else {
            return Ok(false);
        };
        let mut next = self.items.clone();
        next.remove(index);
        self.persist(&next)?;
        self.items = next;
        info!(id, count = self.items.len(), "artifact removed from selection");
        Ok(true)
    }

    /// Empties the selection and deletes the persisted entry.
    pub fn clear(&mut self) -> Result<(), CatalogError> {
        self.storage.remove_item(SELECTION_KEY)?;
        self.items.clear();
        info!("selection cleared");
        Ok(())
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    // Memory only changes after the write succeeds.
    fn persist(&self, items: &[SelectedArtifact]) -> Result<(), CatalogError> {
        let payload = serde_json::to_string(items)
            .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        self.storage.set_item(SELECTION_KEY, &payload)
    }
}

fn dedup_by_id(items: Vec<SelectedArtifact>) -> Vec<SelectedArtifact> {
    let mut unique: Vec<SelectedArtifact> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.iter().any(|existing| existing.id == item.id) {
            unique.push(item);
        }
    }
    unique
}
