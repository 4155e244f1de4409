use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::api::{BulkDownloadRequest, CatalogApi};
use crate::domain::{Email, NamedValue, Rut, SelectedArtifact};
use crate::error::CatalogError;
use crate::fs_util;
use crate::selection::SelectionStore;

pub const REQUEST_CONFIRMATION: &str =
    "Request sent. You will receive an email when the download is ready.";

/// Raw input of the anonymous download request form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestForm {
    pub full_name: String,
    pub rut: String,
    pub email: String,
    /// Confirmation field; when present it must equal `email`.
    pub repeat_email: Option<String>,
    /// Institution id or name, as typed.
    pub institution: String,
    pub comments: String,
}

/// Form fields that passed local validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedForm {
    pub full_name: String,
    pub rut: Rut,
    pub email: Email,
    pub institution: String,
    pub comments: String,
}

impl RequestForm {
    /// Checks everything that can be checked without the server, in the order
    /// a visitor sees the messages: required fields, email confirmation,
    /// email syntax, RUT.
    pub fn validate(&self) -> Result<ValidatedForm, CatalogError> {
        for (value, field) in [
            (&self.full_name, "full name"),
            (&self.rut, "RUT"),
            (&self.email, "email"),
            (&self.institution, "institution"),
        ] {
            if value.trim().is_empty() {
                return Err(CatalogError::MissingField(field));
            }
        }
        if let Some(repeat) = &self.repeat_email
            && repeat != &self.email
        {
            return Err(CatalogError::EmailMismatch);
        }
        let email: Email = self.email.parse()?;
        let rut: Rut = self.rut.parse()?;
        Ok(ValidatedForm {
            full_name: self.full_name.trim().to_string(),
            rut,
            email,
            institution: self.institution.trim().to_string(),
            comments: self.comments.trim().to_string(),
        })
    }
}

/// Finds an institution by numeric id or by case-insensitive name.
pub fn resolve_institution<'a>(
    institutions: &'a [NamedValue],
    input: &str,
) -> Result<&'a NamedValue, CatalogError> {
    let input = input.trim();
    let by_id = input.parse::<u64>().ok();
    institutions
        .iter()
        .find(|institution| {
            Some(institution.id) == by_id || institution.value.eq_ignore_ascii_case(input)
        })
        .ok_or_else(|| CatalogError::UnknownInstitution(input.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadReceipt {
    pub bulk_request_id: u64,
    pub path: PathBuf,
    pub files: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestReceipt {
    pub detail: String,
    pub artifacts: usize,
    pub message: String,
}

/// Selection side panel: direct download, anonymous request and undo.
pub struct RequestPanel<'a, A> {
    api: &'a A,
    store: &'a mut SelectionStore,
    authenticated: bool,
}

impl<'a, A: CatalogApi> RequestPanel<'a, A> {
    pub fn new(api: &'a A, store: &'a mut SelectionStore, authenticated: bool) -> Self {
        Self {
            api,
            store,
            authenticated,
        }
    }

    pub fn items(&self) -> &[SelectedArtifact] {
        self.store.current()
    }

    pub fn can_undo(&self) -> bool {
        !self.store.is_empty()
    }

    /// Two-phase download for logged-in users: register the request, then
    /// fetch its archive into `dest_dir`. The selection is left untouched
    /// whatever the outcome.
    pub fn download_now(&self, dest_dir: &Path) -> Result<DownloadReceipt, CatalogError> {
        if !self.authenticated {
            return Err(CatalogError::AuthenticationRequired);
        }
        let ids = self.selected_ids()?;
        let receipt = self
            .api
            .create_bulk_request(&BulkDownloadRequest::authenticated(ids))?;
        let bulk_request_id = receipt.bulk_request_id.ok_or_else(|| {
            CatalogError::Decode("bulk download response without bulk_request_id".to_string())
        })?;
        info!(bulk_request_id, "bulk download registered");

        let staging = fs_util::staging_file(dest_dir, ".bulk-download")?;
        self.api
            .download_bulk_archive(bulk_request_id, staging.path())?;
        let files = fs_util::validate_zip(staging.path())?;
        let target = dest_dir.join(format!("bulk-download-{bulk_request_id}.zip"));
        let path = fs_util::persist(staging, &target)?;
        info!(bulk_request_id, files, path = %path.display(), "bulk download saved");
        Ok(DownloadReceipt {
            bulk_request_id,
            path,
            files,
        })
    }

    /// Anonymous request. Local validation runs first and nothing is sent
    /// when it fails.
    pub fn submit_request(&self, form: &RequestForm) -> Result<RequestReceipt, CatalogError> {
        let ids = self.selected_ids()?;
        let validated = form.validate()?;
        let institutions = self.api.institutions()?;
        let institution = resolve_institution(&institutions, &validated.institution)?;

        let body = BulkDownloadRequest {
            full_name: Some(validated.full_name),
            rut: Some(validated.rut.to_string()),
            email: Some(validated.email.to_string()),
            institution: Some(institution.id),
            comments: Some(validated.comments),
            artifacts: ids,
            authenticated: false,
        };
        let receipt = self.api.create_bulk_request(&body)?;
        info!(artifacts = body.artifacts.len(), "download request submitted");
        Ok(RequestReceipt {
            detail: receipt.detail,
            artifacts: body.artifacts.len(),
            message: REQUEST_CONFIRMATION.to_string(),
        })
    }

    pub fn undo(&mut self) -> Result<(), CatalogError> {
        self.store.clear()
    }

    fn selected_ids(&self) -> Result<Vec<u64>, CatalogError> {
        if self.store.is_empty() {
            return Err(CatalogError::EmptySelection);
        }
        Ok(self.store.ids())
    }
}
