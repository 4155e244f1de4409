use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CatalogError {
    #[error("invalid RUT: {0}")]
    #[diagnostic(help("enter the RUT without dots, e.g. 12345678-5"))]
    InvalidRut(String),

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("email addresses do not match")]
    EmailMismatch,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("unknown institution: {0}")]
    UnknownInstitution(String),

    #[error("no artifacts selected")]
    EmptySelection,

    #[error("this action requires a logged-in session")]
    #[diagnostic(help("run `catalog login` first"))]
    AuthenticationRequired,

    #[error("a comment is required to reject a request")]
    CommentRequired,

    #[error("comment exceeds {max} characters")]
    CommentTooLong { max: usize },

    #[error("description exceeds {max} characters")]
    DescriptionTooLong { max: usize },

    #[error("request {id} is already {status}")]
    RequestNotPending { id: u64, status: String },

    #[error("request {request} has no item {item}")]
    UnknownRequestItem { request: u64, item: u64 },

    #[error("no duplicate review in progress")]
    NoDuplicateReview,

    #[error("no duplicate match for artifact {0}")]
    UnknownMatch(u64),

    #[error("invalid duplicate resolution: {0}")]
    InvalidResolution(String),

    #[error("missing file: {0}")]
    MissingFile(PathBuf),

    #[error("artifact not found: {0}")]
    ArtifactNotFound(u64),

    #[error("could not reach the catalog server: {0}")]
    Http(String),

    #[error("{detail}")]
    Status {
        status: u16,
        detail: String,
        errors: Vec<String>,
    },

    #[error("unexpected response from the catalog server: {0}")]
    Decode(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid storage key: {0}")]
    InvalidStorageKey(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("downloaded file is not a valid zip archive: {0}")]
    InvalidArchive(String),
}

impl CatalogError {
    /// True for errors raised before anything was sent to the server.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CatalogError::InvalidRut(_)
                | CatalogError::InvalidEmail(_)
                | CatalogError::EmailMismatch
                | CatalogError::MissingField(_)
                | CatalogError::UnknownInstitution(_)
                | CatalogError::CommentRequired
                | CatalogError::CommentTooLong { .. }
                | CatalogError::DescriptionTooLong { .. }
        )
    }
}
