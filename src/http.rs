use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::multipart::Form;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::api::{
    ArtifactDetail, ArtifactPage, ArtifactQuery, AuthApi, BulkDownloadRequest, BulkLoadResponse,
    BulkRequestReceipt, CatalogApi, DuplicateResolution, RequestDetail, RequestSummary,
    TriageUpdate,
};
use crate::artifact_editor::ArtifactForm;
use crate::config::ClientConfig;
use crate::domain::NamedValue;
use crate::error::CatalogError;

/// `{ "data": ... }` envelope used by most catalog endpoints.
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    token: String,
}

/// Blocking client for the catalog REST backend.
///
/// Requests are sent once; failures are reported to the caller, who decides
/// whether to try again.
#[derive(Clone)]
pub struct CatalogHttpClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl CatalogHttpClient {
    pub fn new(config: &ClientConfig, token: Option<String>) -> Result<Self, CatalogError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("heritage-catalog/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| CatalogError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| CatalogError::Http(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            token,
        })
    }

    pub fn catalog_url(&self, path: &str) -> String {
        format!("{}/api/catalog/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn auth_url(&self) -> String {
        format!("{}/api/auth/", self.base_url)
    }

    fn builder(&self, method: Method, url: &str) -> RequestBuilder {
        debug!(%method, url, "catalog request");
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn send(builder: RequestBuilder) -> Result<Response, CatalogError> {
        let response = builder
            .send()
            .map_err(|err| CatalogError::Http(err.to_string()))?;
        debug!(status = response.status().as_u16(), "catalog response");
        Self::handle_status(response)
    }

    fn handle_status(response: Response) -> Result<Response, CatalogError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let text = response.text().unwrap_or_default();
        Err(status_error(status, &text))
    }

    fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, CatalogError> {
        response
            .json()
            .map_err(|err| CatalogError::Decode(err.to_string()))
    }

    fn read_message(response: Response) -> Result<String, CatalogError> {
        let body: MessageBody = Self::read_json(response)?;
        Ok(body.message.or(body.detail).unwrap_or_default())
    }
}

/// Builds a [`CatalogError::Status`] from an error body, keeping the server's
/// wording: `detail` (or `error`/`message`) and the per-row `errores` list.
pub fn status_error(status: u16, body: &str) -> CatalogError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let detail = parsed
        .as_ref()
        .and_then(|value| {
            ["detail", "error", "message"]
                .iter()
                .find_map(|key| value.get(key).and_then(|value| value.as_str()))
        })
        .map(|value| value.to_string())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                StatusCode::from_u16(status)
                    .ok()
                    .and_then(|code| code.canonical_reason())
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                trimmed.to_string()
            }
        });
    let errors = parsed
        .as_ref()
        .and_then(|value| value.get("errores"))
        .and_then(|value| value.as_array())
        .map(|items| {
            items
                .iter()
                .map(|item| match item.as_str() {
                    Some(text) => text.to_string(),
                    None => item.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    CatalogError::Status {
        status,
        detail,
        errors,
    }
}

fn artifact_multipart(form: &ArtifactForm) -> Result<Form, CatalogError> {
    let mut body = Form::new();
    for (name, value) in form.text_fields() {
        body = body.text(name, value);
    }
    for (name, path) in form.uploads() {
        body = body
            .file(name, path)
            .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
    }
    Ok(body)
}

fn saved_id(data: &Value) -> Option<u64> {
    data.get("id").and_then(Value::as_u64)
}

impl CatalogApi for CatalogHttpClient {
    fn list_artifacts(&self, query: &ArtifactQuery) -> Result<ArtifactPage, CatalogError> {
        let url = self.catalog_url("artifacts");
        let response = Self::send(self.builder(Method::GET, &url).query(&query.to_params()))?;
        Self::read_json(response)
    }

    fn artifact(&self, id: u64) -> Result<ArtifactDetail, CatalogError> {
        let url = self.catalog_url(&format!("artifact/{id}"));
        match Self::send(self.builder(Method::GET, &url)) {
            Ok(response) => Self::read_json(response),
            Err(CatalogError::Status { status: 404, .. }) => Err(CatalogError::ArtifactNotFound(id)),
            Err(err) => Err(err),
        }
    }

    fn create_artifact(&self, form: &ArtifactForm) -> Result<u64, CatalogError> {
        let url = self.catalog_url("artifact/upload");
        let body = artifact_multipart(form)?;
        let response = Self::send(self.builder(Method::POST, &url).multipart(body))?;
        let envelope: DataEnvelope<Value> = Self::read_json(response)?;
        saved_id(&envelope.data)
            .ok_or_else(|| CatalogError::Decode("created artifact has no id".to_string()))
    }

    fn update_artifact(&self, id: u64, form: &ArtifactForm) -> Result<u64, CatalogError> {
        let url = self.catalog_url(&format!("artifact/{id}/upload"));
        let body = artifact_multipart(form)?;
        let response = match Self::send(self.builder(Method::PUT, &url).multipart(body)) {
            Ok(response) => response,
            Err(CatalogError::Status { status: 404, .. }) => {
                return Err(CatalogError::ArtifactNotFound(id));
            }
            Err(err) => return Err(err),
        };
        let envelope: DataEnvelope<Value> = Self::read_json(response)?;
        Ok(saved_id(&envelope.data).unwrap_or(id))
    }

    fn institutions(&self) -> Result<Vec<NamedValue>, CatalogError> {
        let url = self.catalog_url("institutions");
        let response = Self::send(self.builder(Method::GET, &url))?;
        let envelope: DataEnvelope<Vec<NamedValue>> = Self::read_json(response)?;
        Ok(envelope.data)
    }

    fn create_bulk_request(
        &self,
        request: &BulkDownloadRequest,
    ) -> Result<BulkRequestReceipt, CatalogError> {
        let url = self.catalog_url("artifact/bulkdownloading");
        let response = Self::send(self.builder(Method::POST, &url).json(request))?;
        Self::read_json(response)
    }

    fn download_bulk_archive(
        &self,
        bulk_request_id: u64,
        destination: &Path,
    ) -> Result<(), CatalogError> {
        let url = self.catalog_url(&format!("artifact/{bulk_request_id}/bulkdownloading"));
        let mut response = Self::send(self.builder(Method::GET, &url))?;
        let mut file =
            File::create(destination).map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| CatalogError::Http(err.to_string()))?;
        Ok(())
    }

    fn upload_bulk_load(
        &self,
        spreadsheet: &Path,
        archive: &Path,
    ) -> Result<BulkLoadResponse, CatalogError> {
        let url = self.catalog_url("artifact/bulkloading");
        let form = Form::new()
            .file("excel", spreadsheet)
            .map_err(|err| CatalogError::Filesystem(err.to_string()))?
            .file("zip", archive)
            .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        let response = Self::send(self.builder(Method::POST, &url).multipart(form))?;
        Self::read_json(response)
    }

    fn resolve_duplicates(
        &self,
        resolution: &DuplicateResolution,
    ) -> Result<BulkLoadResponse, CatalogError> {
        let url = self.catalog_url("artifact/bulkloading");
        let response = Self::send(self.builder(Method::PUT, &url).json(resolution))?;
        Self::read_json(response)
    }

    fn requests(&self) -> Result<Vec<RequestSummary>, CatalogError> {
        let url = self.catalog_url("artifact/requests");
        let response = Self::send(self.builder(Method::GET, &url))?;
        let envelope: DataEnvelope<Vec<RequestSummary>> = Self::read_json(response)?;
        Ok(envelope.data)
    }

    fn request(&self, id: u64) -> Result<RequestDetail, CatalogError> {
        let url = self.catalog_url(&format!("artifact/request/{id}"));
        let response = Self::send(self.builder(Method::GET, &url))?;
        let envelope: DataEnvelope<RequestDetail> = Self::read_json(response)?;
        Ok(envelope.data)
    }

    fn update_request(&self, id: u64, update: &TriageUpdate) -> Result<(), CatalogError> {
        let url = self.catalog_url(&format!("artifact/request/{id}"));
        Self::send(self.builder(Method::PUT, &url).json(update))?;
        Ok(())
    }

    fn pending_request_count(&self) -> Result<u64, CatalogError> {
        let url = self.catalog_url("artifact/requests/notification");
        let response = Self::send(self.builder(Method::GET, &url))?;
        let envelope: DataEnvelope<u64> = Self::read_json(response)?;
        Ok(envelope.data)
    }
}

impl AuthApi for CatalogHttpClient {
    fn login(&self, username: &str, password: &str) -> Result<String, CatalogError> {
        let url = self.auth_url();
        let body = serde_json::json!({ "username": username, "password": password });
        let response = Self::send(self.client.post(&url).json(&body))?;
        let token: TokenBody = Self::read_json(response)?;
        Ok(token.token)
    }

    fn request_password_reset(&self, email: &str) -> Result<String, CatalogError> {
        let url = self.catalog_url("password-reset/");
        let body = serde_json::json!({ "email": email });
        let response = Self::send(self.client.post(&url).json(&body))?;
        Self::read_message(response)
    }

    fn confirm_password_reset(
        &self,
        uidb64: &str,
        token: &str,
        new_password: &str,
    ) -> Result<String, CatalogError> {
        let url = self.catalog_url("password-reset-confirm/");
        let body = serde_json::json!({
            "uidb64": uidb64,
            "token": token,
            "new_password": new_password,
        });
        let response = Self::send(self.client.post(&url).json(&body))?;
        Self::read_message(response)
    }
}
