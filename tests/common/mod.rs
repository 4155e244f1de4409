#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use heritage_catalog::api::{
    ArtifactDetail, ArtifactModel, ArtifactPage, ArtifactQuery, AuthApi, BulkDownloadRequest,
    BulkLoadResponse, BulkRequestReceipt, CatalogApi, DuplicateResolution, RequestDetail,
    RequestItem, RequestSummary, TriageUpdate,
};
use heritage_catalog::artifact_editor::ArtifactForm;
use heritage_catalog::domain::{
    ArtifactAttributes, ItemStatus, NamedValue, RequestStatus, SelectedArtifact,
};
use heritage_catalog::error::CatalogError;
use heritage_catalog::storage::LocalStorage;

/// Canned failure a mock endpoint can be primed with.
#[derive(Debug, Clone)]
pub enum Failure {
    Status {
        status: u16,
        detail: String,
        errors: Vec<String>,
    },
    Network(String),
}

impl Failure {
    pub fn bad_request(detail: &str, errors: &[&str]) -> Self {
        Failure::Status {
            status: 400,
            detail: detail.to_string(),
            errors: errors.iter().map(|error| error.to_string()).collect(),
        }
    }

    fn into_error(self) -> CatalogError {
        match self {
            Failure::Status {
                status,
                detail,
                errors,
            } => CatalogError::Status {
                status,
                detail,
                errors,
            },
            Failure::Network(message) => CatalogError::Http(message),
        }
    }
}

/// In-memory catalog server. Every call is appended to `calls` so tests can
/// assert on count and order.
#[derive(Default)]
pub struct MockCatalog {
    pub calls: Mutex<Vec<String>>,
    pub artifacts: HashMap<u64, ArtifactDetail>,
    pub created_id: Option<u64>,
    pub save_failure: Option<Failure>,
    pub saved_forms: Mutex<Vec<(Option<u64>, ArtifactForm)>>,
    pub institutions: Vec<NamedValue>,
    pub bulk_request_id: Option<u64>,
    pub create_failure: Option<Failure>,
    pub download_failure: Option<Failure>,
    pub archive_entries: Vec<&'static str>,
    pub bulk_requests: Mutex<Vec<BulkDownloadRequest>>,
    pub upload_responses: Mutex<VecDeque<Result<BulkLoadResponse, Failure>>>,
    pub resolutions: Mutex<Vec<DuplicateResolution>>,
    pub resolution_responses: Mutex<VecDeque<Result<BulkLoadResponse, Failure>>>,
    pub requests: Mutex<HashMap<u64, RequestDetail>>,
    pub updates: Mutex<Vec<(u64, TriageUpdate)>>,
    pub pending: u64,
    pub password: Option<&'static str>,
}

impl MockCatalog {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn with_artifacts(ids: &[u64]) -> Self {
        Self {
            artifacts: ids.iter().map(|id| (*id, artifact_detail(*id))).collect(),
            ..Self::default()
        }
    }

    pub fn with_request(mut self, detail: RequestDetail) -> Self {
        self.requests.get_mut().unwrap().insert(detail.id, detail);
        self
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

impl CatalogApi for MockCatalog {
    fn list_artifacts(&self, query: &ArtifactQuery) -> Result<ArtifactPage, CatalogError> {
        self.record(format!("GET artifact page={}", query.page.unwrap_or(1)));
        let mut data: Vec<SelectedArtifact> = self
            .artifacts
            .values()
            .map(ArtifactDetail::snapshot)
            .collect();
        data.sort_by_key(|artifact| artifact.id);
        Ok(ArtifactPage {
            current_page: query.page.unwrap_or(1),
            total: data.len() as u64,
            per_page: 20,
            total_pages: 2,
            data,
            ..ArtifactPage::default()
        })
    }

    fn artifact(&self, id: u64) -> Result<ArtifactDetail, CatalogError> {
        self.record(format!("GET artifact/{id}"));
        self.artifacts
            .get(&id)
            .cloned()
            .ok_or(CatalogError::ArtifactNotFound(id))
    }

    fn create_artifact(&self, form: &ArtifactForm) -> Result<u64, CatalogError> {
        self.record("POST artifact/upload");
        self.saved_forms.lock().unwrap().push((None, form.clone()));
        if let Some(failure) = &self.save_failure {
            return Err(failure.clone().into_error());
        }
        self.created_id
            .ok_or_else(|| CatalogError::Decode("created artifact has no id".to_string()))
    }

    fn update_artifact(&self, id: u64, form: &ArtifactForm) -> Result<u64, CatalogError> {
        self.record(format!("PUT artifact/{id}/upload"));
        self.saved_forms.lock().unwrap().push((Some(id), form.clone()));
        if let Some(failure) = &self.save_failure {
            return Err(failure.clone().into_error());
        }
        if !self.artifacts.contains_key(&id) {
            return Err(CatalogError::ArtifactNotFound(id));
        }
        Ok(id)
    }

    fn institutions(&self) -> Result<Vec<NamedValue>, CatalogError> {
        self.record("GET institutions");
        Ok(self.institutions.clone())
    }

    fn create_bulk_request(
        &self,
        request: &BulkDownloadRequest,
    ) -> Result<BulkRequestReceipt, CatalogError> {
        self.record("POST artifact/bulkdownloading");
        self.bulk_requests.lock().unwrap().push(request.clone());
        if let Some(failure) = &self.create_failure {
            return Err(failure.clone().into_error());
        }
        Ok(BulkRequestReceipt {
            detail: "Solicitud registrada".to_string(),
            bulk_request_id: self.bulk_request_id,
        })
    }

    fn download_bulk_archive(
        &self,
        bulk_request_id: u64,
        destination: &Path,
    ) -> Result<(), CatalogError> {
        self.record(format!("GET artifact/bulkdownloading/{bulk_request_id}"));
        if let Some(failure) = &self.download_failure {
            return Err(failure.clone().into_error());
        }
        let file = File::create(destination).unwrap();
        let mut zip = ZipWriter::new(file);
        for name in &self.archive_entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(b"artifact data").unwrap();
        }
        zip.finish().unwrap();
        Ok(())
    }

    fn upload_bulk_load(
        &self,
        _spreadsheet: &Path,
        _archive: &Path,
    ) -> Result<BulkLoadResponse, CatalogError> {
        self.record("POST artifact/bulkloading");
        self.upload_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(BulkLoadResponse::default()))
            .map_err(Failure::into_error)
    }

    fn resolve_duplicates(
        &self,
        resolution: &DuplicateResolution,
    ) -> Result<BulkLoadResponse, CatalogError> {
        self.record("PUT artifact/bulkloading");
        self.resolutions.lock().unwrap().push(resolution.clone());
        self.resolution_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(BulkLoadResponse::default()))
            .map_err(Failure::into_error)
    }

    fn requests(&self) -> Result<Vec<RequestSummary>, CatalogError> {
        self.record("GET artifact/request");
        let mut summaries: Vec<RequestSummary> = self
            .requests
            .lock()
            .unwrap()
            .values()
            .map(|detail| RequestSummary {
                id: detail.id,
                name: detail.name.clone(),
                email: detail.email.clone(),
                request_count: detail.requests.len() as u64,
                status: detail.status,
            })
            .collect();
        summaries.sort_by_key(|summary| summary.id);
        Ok(summaries)
    }

    fn request(&self, id: u64) -> Result<RequestDetail, CatalogError> {
        self.record(format!("GET artifact/request/{id}"));
        self.requests
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| CatalogError::Status {
                status: 404,
                detail: "Not found.".to_string(),
                errors: Vec::new(),
            })
    }

    /// Applies the item statuses and recomputes the aggregate the way the
    /// server does.
    fn update_request(&self, id: u64, update: &TriageUpdate) -> Result<(), CatalogError> {
        self.record(format!("PUT artifact/request/{id}"));
        self.updates.lock().unwrap().push((id, update.clone()));
        let mut requests = self.requests.lock().unwrap();
        let detail = requests.get_mut(&id).ok_or(CatalogError::Status {
            status: 404,
            detail: "Not found.".to_string(),
            errors: Vec::new(),
        })?;
        detail.requests = update.requests.clone();
        let accepted = detail
            .requests
            .iter()
            .filter(|item| item.status == ItemStatus::Accepted)
            .count();
        detail.status = if accepted == 0 {
            RequestStatus::Rejected
        } else if accepted == detail.requests.len() {
            RequestStatus::Accepted
        } else {
            RequestStatus::PartiallyAccepted
        };
        detail.comments = Some(update.message.clone());
        Ok(())
    }

    fn pending_request_count(&self) -> Result<u64, CatalogError> {
        self.record("GET artifact/request/pending");
        Ok(self.pending)
    }
}

impl AuthApi for MockCatalog {
    fn login(&self, username: &str, password: &str) -> Result<String, CatalogError> {
        self.record("POST auth");
        if self.password == Some(password) {
            Ok(format!("token-{username}"))
        } else {
            Err(CatalogError::Status {
                status: 400,
                detail: "Unable to log in with provided credentials.".to_string(),
                errors: Vec::new(),
            })
        }
    }

    fn request_password_reset(&self, email: &str) -> Result<String, CatalogError> {
        self.record(format!("POST auth/password-reset {email}"));
        Ok("Password reset email sent".to_string())
    }

    fn confirm_password_reset(
        &self,
        uidb64: &str,
        _token: &str,
        _new_password: &str,
    ) -> Result<String, CatalogError> {
        self.record(format!("POST auth/password-reset/{uidb64}"));
        Ok("Password updated".to_string())
    }
}

pub fn artifact_detail(id: u64) -> ArtifactDetail {
    ArtifactDetail {
        id,
        attributes: ArtifactAttributes {
            culture: Some(NamedValue {
                id: 1,
                value: "Diaguita".to_string(),
            }),
            shape: Some(NamedValue {
                id: 2,
                value: "Vasija".to_string(),
            }),
            tags: Vec::new(),
            description: format!("pieza {id}"),
        },
        thumbnail: format!("thumbnails/{id}.jpg"),
        model: ArtifactModel {
            object: format!("models/{id}.obj"),
            material: format!("models/{id}.mtl"),
            texture: format!("models/{id}.jpg"),
        },
        images: vec![format!("images/{id}-1.jpg")],
    }
}

pub fn snapshot(id: u64) -> SelectedArtifact {
    artifact_detail(id).snapshot()
}

pub fn request_item(id: u64, artifact: u64, status: ItemStatus) -> RequestItem {
    RequestItem {
        id,
        artifact: Some(artifact),
        status,
        description: None,
        thumbnail: None,
        extra: Default::default(),
    }
}

pub fn pending_request(id: u64, items: usize) -> RequestDetail {
    RequestDetail {
        id,
        name: "Ana Rojas".to_string(),
        email: "ana@example.cl".to_string(),
        status: RequestStatus::Pending,
        comments: None,
        requests: (1..=items as u64)
            .map(|item| request_item(item, 100 + item, ItemStatus::Pending))
            .collect(),
    }
}

pub fn temp_storage() -> (tempfile::TempDir, LocalStorage) {
    let temp = tempfile::tempdir().unwrap();
    let root = camino::Utf8PathBuf::from_path_buf(temp.path().join("storage")).unwrap();
    (temp, LocalStorage::new_with_root(root))
}
