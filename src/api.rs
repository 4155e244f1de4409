use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::artifact_editor::ArtifactForm;
use crate::domain::{
    ArtifactAttributes, ItemStatus, NamedValue, RequestStatus, Resolution, SelectedArtifact,
};
use crate::error::CatalogError;

/// Filter and pagination parameters of the artifact listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactQuery {
    pub query: Option<String>,
    pub culture: Option<String>,
    pub shape: Option<String>,
    pub tags: Vec<String>,
    pub page: Option<u32>,
}

impl ArtifactQuery {
    /// Query-string pairs in the form the listing endpoint expects.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(query) = self.query.as_deref().filter(|value| !value.trim().is_empty()) {
            params.push(("query", query.trim().to_string()));
        }
        if let Some(culture) = self.culture.as_deref().filter(|value| !value.is_empty()) {
            params.push(("culture", culture.to_string()));
        }
        if let Some(shape) = self.shape.as_deref().filter(|value| !value.is_empty()) {
            params.push(("shape", shape.to_string()));
        }
        if !self.tags.is_empty() {
            params.push(("tags", self.tags.join(",")));
        }
        if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }
        params
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableFilters {
    #[serde(default)]
    pub cultures: Vec<Option<String>>,
    #[serde(default)]
    pub shapes: Vec<Option<String>>,
    #[serde(default)]
    pub tags: Vec<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPage {
    #[serde(default = "first_page")]
    pub current_page: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub data: Vec<SelectedArtifact>,
    #[serde(default)]
    pub filters: AvailableFilters,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactModel {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub texture: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDetail {
    pub id: u64,
    #[serde(default)]
    pub attributes: ArtifactAttributes,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub model: ArtifactModel,
    #[serde(default)]
    pub images: Vec<String>,
}

impl ArtifactDetail {
    pub fn snapshot(&self) -> SelectedArtifact {
        SelectedArtifact {
            id: self.id,
            attributes: self.attributes.clone(),
            thumbnail: self.thumbnail.clone(),
        }
    }
}

/// Body of `POST /artifact/bulkdownloading`.
///
/// The authenticated variant only carries the artifact ids; the anonymous
/// variant carries the requester's identity as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkDownloadRequest {
    #[serde(rename = "fullName", skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rut: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    pub artifacts: Vec<u64>,
    pub authenticated: bool,
}

impl BulkDownloadRequest {
    pub fn authenticated(artifacts: Vec<u64>) -> Self {
        Self {
            full_name: None,
            rut: None,
            email: None,
            institution: None,
            comments: None,
            artifacts,
            authenticated: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRequestReceipt {
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub bulk_request_id: Option<u64>,
}

/// Uploaded row the server believes may duplicate an existing artifact.
///
/// Only `id` and `status` are interpreted here; the remaining row fields are
/// carried through untouched so the resolution PUT echoes them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewArtifactRow {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Resolution>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub new_artifact: NewArtifactRow,
    pub match_artifact: u64,
}

impl DuplicateMatch {
    pub fn resolution(&self) -> Resolution {
        self.new_artifact.status.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkLoadResponse {
    #[serde(default)]
    pub detail: String,
    #[serde(default, rename = "posible_matches", alias = "possible_matches")]
    pub possible_matches: Vec<DuplicateMatch>,
    #[serde(default)]
    pub temp_dir: Option<String>,
}

/// Body of `PUT /artifact/bulkloading`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateResolution {
    pub detail: String,
    #[serde(rename = "posible_matches")]
    pub possible_matches: Vec<DuplicateMatch>,
    pub temp_dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub request_count: u64,
    pub status: RequestStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestItem {
    pub id: u64,
    #[serde(default)]
    pub artifact: Option<u64>,
    pub status: ItemStatus,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDetail {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub status: RequestStatus,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub requests: Vec<RequestItem>,
}

/// Body of `PUT /artifact/request/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriageUpdate {
    pub requests: Vec<RequestItem>,
    pub message: String,
}

/// Artifact catalog endpoints under `/api/catalog`.
pub trait CatalogApi {
    fn list_artifacts(&self, query: &ArtifactQuery) -> Result<ArtifactPage, CatalogError>;
    fn artifact(&self, id: u64) -> Result<ArtifactDetail, CatalogError>;
    /// Returns the id the server assigned.
    fn create_artifact(&self, form: &ArtifactForm) -> Result<u64, CatalogError>;
    fn update_artifact(&self, id: u64, form: &ArtifactForm) -> Result<u64, CatalogError>;
    fn institutions(&self) -> Result<Vec<NamedValue>, CatalogError>;
    fn create_bulk_request(
        &self,
        request: &BulkDownloadRequest,
    ) -> Result<BulkRequestReceipt, CatalogError>;
    fn download_bulk_archive(
        &self,
        bulk_request_id: u64,
        destination: &Path,
    ) -> Result<(), CatalogError>;
    fn upload_bulk_load(
        &self,
        spreadsheet: &Path,
        archive: &Path,
    ) -> Result<BulkLoadResponse, CatalogError>;
    fn resolve_duplicates(
        &self,
        resolution: &DuplicateResolution,
    ) -> Result<BulkLoadResponse, CatalogError>;
    fn requests(&self) -> Result<Vec<RequestSummary>, CatalogError>;
    fn request(&self, id: u64) -> Result<RequestDetail, CatalogError>;
    fn update_request(&self, id: u64, update: &TriageUpdate) -> Result<(), CatalogError>;
    fn pending_request_count(&self) -> Result<u64, CatalogError>;
}

/// Session and account-recovery endpoints.
pub trait AuthApi {
    fn login(&self, username: &str, password: &str) -> Result<String, CatalogError>;
    fn request_password_reset(&self, email: &str) -> Result<String, CatalogError>;
    fn confirm_password_reset(
        &self,
        uidb64: &str,
        token: &str,
        new_password: &str,
    ) -> Result<String, CatalogError>;
}
