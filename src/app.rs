use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::api::{
    ArtifactDetail, ArtifactPage, ArtifactQuery, AuthApi, CatalogApi, DuplicateMatch,
    RequestDetail, RequestSummary,
};
use crate::artifact_editor::{ArtifactEdit, ArtifactForm};
use crate::bulk_loading::{BulkLoadState, BulkLoader, DuplicateReview};
use crate::catalog::{ArtifactDetailView, CatalogView, Visualization};
use crate::domain::{ItemStatus, RequestStatus, Resolution, SelectedArtifact};
use crate::error::CatalogError;
use crate::request_panel::{DownloadReceipt, RequestForm, RequestPanel, RequestReceipt};
use crate::selection::SelectionStore;
use crate::storage::{LocalStorage, TOKEN_KEY};
use crate::triage::{TriageSession, filter_requests};

#[derive(Debug, Clone, Copy)]
pub enum ProgressSinkKind {
    Download,
    Upload,
    Request,
    BulkLoad,
    Triage,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactInfo {
    pub artifact: ArtifactDetail,
    pub selected: bool,
    pub visualization: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedArtifact {
    pub created: bool,
    pub artifact: ArtifactDetail,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionResult {
    pub count: usize,
    pub items: Vec<SelectedArtifact>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionChange {
    pub id: u64,
    pub selected: bool,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    #[serde(flatten)]
    pub receipt: DownloadReceipt,
    pub saved_at: String,
    pub selection_kept: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkLoadResult {
    pub reviewed: usize,
    pub matches: Vec<DuplicateMatch>,
    pub cancelled: bool,
    pub outcome: BulkLoadState,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestListResult {
    pub status: Option<RequestStatus>,
    pub requests: Vec<RequestSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestInfo {
    pub request: RequestDetail,
    pub editable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationResult {
    pub pending: u64,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResult {
    pub authenticated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResult {
    pub message: String,
}

/// How accepted items are chosen when a request is triaged from the command
/// line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptItems {
    All,
    Only(Vec<u64>),
}

/// Operator decisions for a duplicate review.
///
/// `None` cancels the review; otherwise the listed resolutions are applied
/// on top of the `replace` defaults.
pub type DuplicateDecision = Option<Vec<(u64, Resolution)>>;

/// Decisions taken from command-line flags. Without any flag the review is
/// cancelled rather than accepted with the defaults.
#[derive(Debug, Clone, Default)]
pub struct FixedResolutions {
    pub per_artifact: HashMap<u64, Resolution>,
    pub fallback: Option<Resolution>,
    pub cancel: bool,
}

impl FixedResolutions {
    pub fn decide(&self, review: &DuplicateReview) -> DuplicateDecision {
        if self.cancel || (self.per_artifact.is_empty() && self.fallback.is_none()) {
            return None;
        }
        Some(
            review
                .matches
                .iter()
                .filter_map(|entry| {
                    let id = entry.new_artifact.id;
                    self.per_artifact
                        .get(&id)
                        .copied()
                        .or(self.fallback)
                        .map(|resolution| (id, resolution))
                })
                .collect(),
        )
    }
}

/// Command façade shared by the CLI and the terminal UI.
#[derive(Clone)]
pub struct App<C> {
    api: C,
    storage: LocalStorage,
    download_dir: PathBuf,
    authenticated: bool,
}

impl<C: CatalogApi + AuthApi> App<C> {
    pub fn new(api: C, storage: LocalStorage, download_dir: PathBuf, authenticated: bool) -> Self {
        Self {
            api,
            storage,
            download_dir,
            authenticated,
        }
    }

    pub fn api(&self) -> &C {
        &self.api
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn selection(&self) -> SelectionStore {
        SelectionStore::load(self.storage.clone())
    }

    pub fn list_artifacts(
        &self,
        query: ArtifactQuery,
        sink: &dyn ProgressSink,
    ) -> Result<ArtifactPage, CatalogError> {
        phase(sink, "Resolve", "loading catalog page");
        let mut view = CatalogView::new(query);
        let page = timed(sink, || view.load(&self.api).cloned())?;
        phase(
            sink,
            "Done",
            &format!("page {} of {}", page.current_page, page.total_pages.max(1)),
        );
        Ok(page)
    }

    pub fn show_artifact(&self, id: u64, sink: &dyn ProgressSink) -> Result<ArtifactInfo, CatalogError> {
        phase(sink, "Resolve", &format!("artifact {id}"));
        let store = self.selection();
        let view = timed(sink, || ArtifactDetailView::load(&self.api, id, &store))?;
        let visualization = match view.visualization() {
            Visualization::Model => "model".to_string(),
            Visualization::Image(index) => format!("image {index}"),
        };
        Ok(ArtifactInfo {
            selected: view.is_selected(),
            artifact: view.detail().clone(),
            visualization,
        })
    }

    /// Staff only. The stored artifact is fetched again after the upload.
    pub fn create_artifact(
        &self,
        form: &ArtifactForm,
        sink: &dyn ProgressSink,
    ) -> Result<SavedArtifact, CatalogError> {
        self.save_artifact(None, form, sink)
    }

    /// Prefills the form from the stored artifact, applies `edit` and sends
    /// the whole form back.
    pub fn edit_artifact(
        &self,
        id: u64,
        edit: ArtifactEdit,
        sink: &dyn ProgressSink,
    ) -> Result<SavedArtifact, CatalogError> {
        if !self.authenticated {
            return Err(CatalogError::AuthenticationRequired);
        }
        phase(sink, "Resolve", &format!("artifact {id}"));
        let current = timed(sink, || self.api.artifact(id))?;
        let mut form = ArtifactForm::from_detail(&current);
        form.apply(edit);
        self.save_artifact(Some(id), &form, sink)
    }

    fn save_artifact(
        &self,
        id: Option<u64>,
        form: &ArtifactForm,
        sink: &dyn ProgressSink,
    ) -> Result<SavedArtifact, CatalogError> {
        if !self.authenticated {
            return Err(CatalogError::AuthenticationRequired);
        }
        form.validate()?;
        phase(
            sink,
            "Request",
            &format!("uploading {} file(s)", form.uploads().len()),
        );
        let saved = timed(sink, || match id {
            Some(id) => self.api.update_artifact(id, form),
            None => self.api.create_artifact(form),
        })?;
        phase(sink, "Verify", &format!("reloading artifact {saved}"));
        let artifact = timed(sink, || self.api.artifact(saved))?;
        tracing::info!(id = saved, created = id.is_none(), "artifact saved");
        phase(sink, "Done", &format!("artifact {saved} saved"));
        Ok(SavedArtifact {
            created: id.is_none(),
            artifact,
        })
    }

    pub fn selection_list(&self) -> SelectionResult {
        let store = self.selection();
        SelectionResult {
            count: store.len(),
            items: store.current().to_vec(),
        }
    }

    /// Toggles an artifact by id. Adding needs its snapshot, so the detail is
    /// fetched unless the artifact is already selected.
    pub fn selection_toggle(
        &self,
        id: u64,
        sink: &dyn ProgressSink,
    ) -> Result<SelectionChange, CatalogError> {
        let mut store = self.selection();
        let selected = if store.contains(id) {
            store.remove_by_id(id)?;
            false
        } else {
            phase(sink, "Resolve", &format!("artifact {id}"));
            let detail = timed(sink, || self.api.artifact(id))?;
            store.toggle(detail.snapshot())?
        };
        Ok(SelectionChange {
            id,
            selected,
            count: store.len(),
        })
    }

    pub fn selection_remove(&self, id: u64) -> Result<SelectionChange, CatalogError> {
        let mut store = self.selection();
        store.remove_by_id(id)?;
        Ok(SelectionChange {
            id,
            selected: false,
            count: store.len(),
        })
    }

    pub fn selection_clear(&self) -> Result<SelectionResult, CatalogError> {
        let mut store = self.selection();
        let mut panel = RequestPanel::new(&self.api, &mut store, self.authenticated);
        panel.undo()?;
        Ok(SelectionResult {
            count: 0,
            items: Vec::new(),
        })
    }

    pub fn download(
        &self,
        dest_dir: Option<&Path>,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadResult, CatalogError> {
        let dest_dir = dest_dir.unwrap_or(&self.download_dir);
        let mut store = self.selection();
        let count = store.len();
        let panel = RequestPanel::new(&self.api, &mut store, self.authenticated);
        phase(sink, "Request", &format!("requesting {count} artifact(s)"));
        let receipt = timed(sink, || panel.download_now(dest_dir))?;
        phase(sink, "Store", &format!("saved {}", receipt.path.display()));
        Ok(DownloadResult {
            receipt,
            saved_at: chrono::Utc::now().to_rfc3339(),
            selection_kept: store.len(),
        })
    }

    pub fn submit_request(
        &self,
        form: &RequestForm,
        sink: &dyn ProgressSink,
    ) -> Result<RequestReceipt, CatalogError> {
        let mut store = self.selection();
        let panel = RequestPanel::new(&self.api, &mut store, self.authenticated);
        phase(sink, "Request", "sending download request");
        timed(sink, || panel.submit_request(form))
    }

    /// Uploads a bulk load; a duplicate review is settled by `decide` before
    /// the resolution is sent.
    pub fn bulk_load<D>(
        &self,
        spreadsheet: &Path,
        archive: &Path,
        decide: D,
        sink: &dyn ProgressSink,
    ) -> Result<BulkLoadResult, CatalogError>
    where
        D: FnOnce(&DuplicateReview) -> DuplicateDecision,
    {
        let mut loader = BulkLoader::new(&self.api);
        phase(sink, "Request", "uploading spreadsheet and archive");
        timed(sink, || loader.submit(spreadsheet, archive).map(|_| ()))?;

        let Some(review) = loader.review() else {
            return Ok(BulkLoadResult {
                reviewed: 0,
                matches: Vec::new(),
                cancelled: false,
                outcome: loader.state().clone(),
            });
        };
        let matches = review.matches.clone();
        let reviewed = matches.len();
        phase(sink, "Verify", &format!("{reviewed} possible duplicate(s)"));
        let Some(decisions) = decide(review) else {
            loader.cancel_review()?;
            return Ok(BulkLoadResult {
                reviewed,
                matches,
                cancelled: true,
                outcome: loader.state().clone(),
            });
        };
        for (id, resolution) in decisions {
            loader.set_resolution(id, resolution)?;
        }
        phase(sink, "Request", "sending duplicate resolution");
        timed(sink, || loader.submit_resolution().map(|_| ()))?;
        Ok(BulkLoadResult {
            reviewed,
            matches,
            cancelled: false,
            outcome: loader.state().clone(),
        })
    }

    pub fn requests(
        &self,
        status: Option<RequestStatus>,
        sink: &dyn ProgressSink,
    ) -> Result<RequestListResult, CatalogError> {
        phase(sink, "Resolve", "loading download requests");
        let all = timed(sink, || self.api.requests())?;
        Ok(RequestListResult {
            status,
            requests: filter_requests(&all, status).into_iter().cloned().collect(),
        })
    }

    pub fn request_detail(&self, id: u64, sink: &dyn ProgressSink) -> Result<RequestInfo, CatalogError> {
        phase(sink, "Resolve", &format!("request {id}"));
        let session = timed(sink, || TriageSession::load(&self.api, id))?;
        Ok(RequestInfo {
            editable: session.is_editable(),
            request: RequestDetail {
                requests: session.items().to_vec(),
                ..session.detail().clone()
            },
        })
    }

    pub fn accept_request(
        &self,
        id: u64,
        items: AcceptItems,
        comment: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<RequestInfo, CatalogError> {
        let mut session = TriageSession::load(&self.api, id)?;
        match items {
            AcceptItems::All => session.accept_all()?,
            AcceptItems::Only(ids) => {
                for item in ids {
                    let current = session
                        .items()
                        .iter()
                        .find(|entry| entry.id == item)
                        .map(|entry| entry.status);
                    if current != Some(ItemStatus::Accepted) {
                        session.toggle(item)?;
                    }
                }
            }
        }
        phase(sink, "Request", &format!("submitting triage for request {id}"));
        let detail = timed(sink, || session.accept_selected(comment).cloned())?;
        Ok(RequestInfo {
            editable: detail.status == RequestStatus::Pending,
            request: detail,
        })
    }

    pub fn reject_request(
        &self,
        id: u64,
        comment: &str,
        sink: &dyn ProgressSink,
    ) -> Result<RequestInfo, CatalogError> {
        let mut session = TriageSession::load(&self.api, id)?;
        phase(sink, "Request", &format!("rejecting request {id}"));
        let detail = timed(sink, || session.reject_all(comment).cloned())?;
        Ok(RequestInfo {
            editable: detail.status == RequestStatus::Pending,
            request: detail,
        })
    }

    pub fn notifications(&self) -> Result<NotificationResult, CatalogError> {
        if !self.authenticated {
            return Err(CatalogError::AuthenticationRequired);
        }
        let pending = self.api.pending_request_count()?;
        Ok(NotificationResult {
            pending,
            message: (pending > 0).then(|| format!("{pending} pending request(s)")),
        })
    }

    pub fn login(&self, username: &str, password: &str) -> Result<SessionResult, CatalogError> {
        let token = self.api.login(username, password)?;
        self.storage.set_item(TOKEN_KEY, &token)?;
        tracing::info!(username, "logged in");
        Ok(SessionResult {
            authenticated: true,
        })
    }

    pub fn logout(&self) -> Result<SessionResult, CatalogError> {
        self.storage.remove_item(TOKEN_KEY)?;
        tracing::info!("logged out");
        Ok(SessionResult {
            authenticated: false,
        })
    }

    pub fn password_reset(&self, email: &str) -> Result<MessageResult, CatalogError> {
        let message = self.api.request_password_reset(email.trim())?;
        Ok(MessageResult { message })
    }

    pub fn password_confirm(
        &self,
        uidb64: &str,
        token: &str,
        new_password: &str,
    ) -> Result<MessageResult, CatalogError> {
        if new_password.is_empty() {
            return Err(CatalogError::MissingField("new password"));
        }
        let message = self
            .api
            .confirm_password_reset(uidb64, token, new_password)?;
        Ok(MessageResult { message })
    }
}

fn phase(sink: &dyn ProgressSink, phase: &str, message: &str) {
    sink.event(ProgressEvent {
        message: format!("phase={phase}; {message}"),
        elapsed: None,
    });
}

fn timed<T>(
    sink: &dyn ProgressSink,
    call: impl FnOnce() -> Result<T, CatalogError>,
) -> Result<T, CatalogError> {
    sink.event(ProgressEvent {
        message: "catalog.request".to_string(),
        elapsed: None,
    });
    let start = Instant::now();
    let result = call();
    let elapsed = start.elapsed();
    sink.event(ProgressEvent {
        message: format!("catalog.response latency_ms={}", elapsed.as_millis()),
        elapsed: Some(elapsed),
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NewArtifactRow;

    fn review(ids: &[u64]) -> DuplicateReview {
        DuplicateReview {
            detail: String::new(),
            matches: ids
                .iter()
                .map(|id| DuplicateMatch {
                    new_artifact: NewArtifactRow {
                        id: *id,
                        status: Some(Resolution::Replace),
                        fields: Default::default(),
                    },
                    match_artifact: id + 50,
                })
                .collect(),
            temp_dir: "tmp/x".to_string(),
        }
    }

    #[test]
    fn fixed_resolutions_prefer_explicit_entries() {
        let fixed = FixedResolutions {
            per_artifact: HashMap::from([(2, Resolution::New)]),
            fallback: Some(Resolution::Keep),
            cancel: false,
        };
        assert_eq!(
            fixed.decide(&review(&[1, 2])),
            Some(vec![(1, Resolution::Keep), (2, Resolution::New)])
        );
    }

    #[test]
    fn fixed_resolutions_cancel() {
        let fixed = FixedResolutions {
            cancel: true,
            ..FixedResolutions::default()
        };
        assert_eq!(fixed.decide(&review(&[1])), None);
    }

    #[test]
    fn fixed_resolutions_without_flags_cancel() {
        assert_eq!(FixedResolutions::default().decide(&review(&[1])), None);
    }
}
