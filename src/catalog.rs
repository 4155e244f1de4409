use tracing::{debug, info};

use crate::api::{ArtifactDetail, ArtifactPage, ArtifactQuery, CatalogApi};
use crate::domain::SelectedArtifact;
use crate::error::CatalogError;
use crate::selection::SelectionStore;

/// Result of activating an artifact card in the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardAction {
    /// Selection mode is on; carries whether the artifact is now selected.
    Toggled(bool),
    /// Selection mode is off; the artifact detail should be opened.
    OpenDetail(u64),
}

/// Paginated, filterable artifact listing.
#[derive(Debug, Default)]
pub struct CatalogView {
    query: ArtifactQuery,
    page: Option<ArtifactPage>,
    selection_mode: bool,
    panel_open: bool,
}

impl CatalogView {
    pub fn new(query: ArtifactQuery) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    pub fn query(&self) -> &ArtifactQuery {
        &self.query
    }

    pub fn page(&self) -> Option<&ArtifactPage> {
        self.page.as_ref()
    }

    /// Replaces the filters and rewinds to the first page.
    pub fn set_filters(&mut self, query: ArtifactQuery) {
        self.query = ArtifactQuery { page: None, ..query };
    }

    pub fn load<A: CatalogApi>(&mut self, api: &A) -> Result<&ArtifactPage, CatalogError> {
        let page = api.list_artifacts(&self.query)?;
        debug!(
            page = page.current_page,
            total = page.total,
            "artifact page loaded"
        );
        Ok(self.page.insert(page))
    }

    /// Loads the following page; returns `None` on the last page.
    pub fn next_page<A: CatalogApi>(
        &mut self,
        api: &A,
    ) -> Result<Option<&ArtifactPage>, CatalogError> {
        let Some(current) = &self.page else {
            return self.load(api).map(Some);
        };
        if current.current_page >= current.total_pages {
            return Ok(None);
        }
        self.query.page = Some(current.current_page + 1);
        self.load(api).map(Some)
    }

    /// Loads the preceding page; returns `None` on the first page.
    pub fn previous_page<A: CatalogApi>(
        &mut self,
        api: &A,
    ) -> Result<Option<&ArtifactPage>, CatalogError> {
        let current = self.page.as_ref().map(|page| page.current_page).unwrap_or(1);
        if current <= 1 {
            return Ok(None);
        }
        self.query.page = Some(current - 1);
        self.load(api).map(Some)
    }

    pub fn selection_mode(&self) -> bool {
        self.selection_mode
    }

    /// Leaving selection mode also closes the selection panel.
    pub fn set_selection_mode(&mut self, enabled: bool) {
        self.selection_mode = enabled;
        if !enabled {
            self.panel_open = false;
        }
    }

    pub fn panel_open(&self) -> bool {
        self.panel_open
    }

    pub fn set_panel_open(&mut self, open: bool) {
        self.panel_open = open;
    }

    pub fn activate(
        &self,
        store: &mut SelectionStore,
        artifact: &SelectedArtifact,
    ) -> Result<CardAction, CatalogError> {
        if self.selection_mode {
            store.toggle(artifact.clone()).map(CardAction::Toggled)
        } else {
            Ok(CardAction::OpenDetail(artifact.id))
        }
    }
}

/// What the detail view shows first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visualization {
    Model,
    Image(usize),
}

#[derive(Debug)]
pub struct ArtifactDetailView {
    detail: ArtifactDetail,
    selected: bool,
    visualization: Visualization,
}

impl ArtifactDetailView {
    pub fn load<A: CatalogApi>(
        api: &A,
        id: u64,
        store: &SelectionStore,
    ) -> Result<Self, CatalogError> {
        let detail = api.artifact(id)?;
        let visualization = initial_visualization(&detail);
        Ok(Self {
            selected: store.contains(detail.id),
            detail,
            visualization,
        })
    }

    pub fn detail(&self) -> &ArtifactDetail {
        &self.detail
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn visualization(&self) -> Visualization {
        self.visualization
    }

    pub fn show_model(&mut self) -> bool {
        if self.detail.model.object.is_empty() {
            return false;
        }
        self.visualization = Visualization::Model;
        true
    }

    pub fn show_image(&mut self, index: usize) -> bool {
        if index >= self.detail.images.len() {
            return false;
        }
        self.visualization = Visualization::Image(index);
        true
    }

    /// Adds the artifact to the selection or removes it; returns the new
    /// membership.
    pub fn toggle_selection(&mut self, store: &mut SelectionStore) -> Result<bool, CatalogError> {
        self.selected = if store.contains(self.detail.id) {
            store.remove_by_id(self.detail.id)?;
            false
        } else {
            store.toggle(self.detail.snapshot())?
        };
        info!(id = self.detail.id, selected = self.selected, "detail selection changed");
        Ok(self.selected)
    }
}

pub fn initial_visualization(detail: &ArtifactDetail) -> Visualization {
    if detail.model.object.is_empty() {
        Visualization::Image(0)
    } else {
        Visualization::Model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ArtifactModel;

    fn detail(object: &str, images: usize) -> ArtifactDetail {
        ArtifactDetail {
            id: 8,
            attributes: Default::default(),
            thumbnail: String::new(),
            model: ArtifactModel {
                object: object.to_string(),
                ..ArtifactModel::default()
            },
            images: (0..images).map(|i| format!("/media/images/8-{i}.jpg")).collect(),
        }
    }

    #[test]
    fn model_is_shown_first_when_present() {
        assert_eq!(
            initial_visualization(&detail("/media/models/8.obj", 2)),
            Visualization::Model
        );
        assert_eq!(initial_visualization(&detail("", 2)), Visualization::Image(0));
    }

    #[test]
    fn leaving_selection_mode_closes_panel() {
        let mut view = CatalogView::default();
        view.set_selection_mode(true);
        view.set_panel_open(true);
        view.set_selection_mode(false);
        assert!(!view.panel_open());
    }

    #[test]
    fn new_filters_rewind_to_first_page() {
        let mut view = CatalogView::new(ArtifactQuery {
            page: Some(4),
            ..ArtifactQuery::default()
        });
        view.set_filters(ArtifactQuery {
            culture: Some("Diaguita".to_string()),
            page: Some(4),
            ..ArtifactQuery::default()
        });
        assert_eq!(view.query().page, None);
        assert_eq!(view.query().culture.as_deref(), Some("Diaguita"));
    }
}
