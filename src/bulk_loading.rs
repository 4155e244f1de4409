use std::mem;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::api::{BulkLoadResponse, CatalogApi, DuplicateMatch, DuplicateResolution};
use crate::domain::Resolution;
use crate::error::CatalogError;
use crate::fs_util;

/// Possible duplicates awaiting an operator decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateReview {
    pub detail: String,
    pub matches: Vec<DuplicateMatch>,
    pub temp_dir: String,
}

impl DuplicateReview {
    /// Every match starts as `replace`, whatever the server sent.
    fn new(detail: String, mut matches: Vec<DuplicateMatch>, temp_dir: String) -> Self {
        for entry in &mut matches {
            entry.new_artifact.status = Some(Resolution::Replace);
        }
        Self {
            detail,
            matches,
            temp_dir,
        }
    }

    pub fn set_resolution(
        &mut self,
        new_artifact: u64,
        resolution: Resolution,
    ) -> Result<(), CatalogError> {
        let entry = self
            .matches
            .iter_mut()
            .find(|entry| entry.new_artifact.id == new_artifact)
            .ok_or(CatalogError::UnknownMatch(new_artifact))?;
        entry.new_artifact.status = Some(resolution);
        Ok(())
    }

    fn into_request(self) -> DuplicateResolution {
        DuplicateResolution {
            detail: self.detail,
            possible_matches: self.matches,
            temp_dir: self.temp_dir,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BulkLoadState {
    #[default]
    Idle,
    Submitting,
    Success {
        detail: String,
    },
    ValidationError {
        detail: String,
        errors: Vec<String>,
    },
    DuplicateReview(DuplicateReview),
}

/// Drives a spreadsheet + archive upload through duplicate review.
pub struct BulkLoader<'a, A> {
    api: &'a A,
    state: BulkLoadState,
}

impl<'a, A: CatalogApi> BulkLoader<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self {
            api,
            state: BulkLoadState::Idle,
        }
    }

    pub fn state(&self) -> &BulkLoadState {
        &self.state
    }

    pub fn review(&self) -> Option<&DuplicateReview> {
        match &self.state {
            BulkLoadState::DuplicateReview(review) => Some(review),
            _ => None,
        }
    }

    pub fn review_mut(&mut self) -> Option<&mut DuplicateReview> {
        match &mut self.state {
            BulkLoadState::DuplicateReview(review) => Some(review),
            _ => None,
        }
    }

    /// Uploads both files. HTTP errors land in `ValidationError`; transport
    /// failures are returned and the loader goes back to `Idle`.
    pub fn submit(
        &mut self,
        spreadsheet: &Path,
        archive: &Path,
    ) -> Result<&BulkLoadState, CatalogError> {
        fs_util::require_file(spreadsheet)?;
        fs_util::require_file(archive)?;

        self.state = BulkLoadState::Submitting;
        info!(spreadsheet = %spreadsheet.display(), archive = %archive.display(), "uploading bulk load");
        match self.api.upload_bulk_load(spreadsheet, archive) {
            Ok(response) => match outcome(response) {
                Ok(state) => self.state = state,
                Err(err) => {
                    self.state = BulkLoadState::Idle;
                    return Err(err);
                }
            },
            Err(CatalogError::Status { detail, errors, .. }) => {
                self.state = BulkLoadState::ValidationError { detail, errors };
            }
            Err(err) => {
                self.state = BulkLoadState::Idle;
                return Err(err);
            }
        }
        self.log_state();
        Ok(&self.state)
    }

    pub fn set_resolution(
        &mut self,
        new_artifact: u64,
        resolution: Resolution,
    ) -> Result<(), CatalogError> {
        self.review_mut()
            .ok_or(CatalogError::NoDuplicateReview)?
            .set_resolution(new_artifact, resolution)
    }

    /// Sends the reviewed list back. On a transport failure the review is
    /// restored so it can be sent again.
    pub fn submit_resolution(&mut self) -> Result<&BulkLoadState, CatalogError> {
        let review = match mem::replace(&mut self.state, BulkLoadState::Submitting) {
            BulkLoadState::DuplicateReview(review) => review,
            other => {
                self.state = other;
                return Err(CatalogError::NoDuplicateReview);
            }
        };

        let request = review.clone().into_request();
        match self.api.resolve_duplicates(&request) {
            Ok(response) => match outcome(response) {
                Ok(state) => self.state = state,
                Err(err) => {
                    self.state = BulkLoadState::DuplicateReview(review);
                    return Err(err);
                }
            },
            Err(CatalogError::Status { detail, errors, .. }) => {
                self.state = BulkLoadState::ValidationError { detail, errors };
            }
            Err(err) => {
                warn!(error = %err, "duplicate resolution not delivered");
                self.state = BulkLoadState::DuplicateReview(review);
                return Err(err);
            }
        }
        self.log_state();
        Ok(&self.state)
    }

    /// Drops the review locally; the server is not contacted.
    pub fn cancel_review(&mut self) -> Result<(), CatalogError> {
        if self.review().is_none() {
            return Err(CatalogError::NoDuplicateReview);
        }
        self.state = BulkLoadState::Idle;
        info!("duplicate review cancelled");
        Ok(())
    }

    fn log_state(&self) {
        match &self.state {
            BulkLoadState::Success { .. } => info!("bulk load completed"),
            BulkLoadState::ValidationError { errors, .. } => {
                info!(errors = errors.len(), "bulk load rejected")
            }
            BulkLoadState::DuplicateReview(review) => {
                info!(matches = review.matches.len(), "bulk load needs duplicate review")
            }
            BulkLoadState::Idle | BulkLoadState::Submitting => {}
        }
    }
}

fn outcome(response: BulkLoadResponse) -> Result<BulkLoadState, CatalogError> {
    if response.possible_matches.is_empty() {
        return Ok(BulkLoadState::Success {
            detail: response.detail,
        });
    }
    let temp_dir = response.temp_dir.ok_or_else(|| {
        CatalogError::Decode("duplicate matches without temp_dir".to_string())
    })?;
    Ok(BulkLoadState::DuplicateReview(DuplicateReview::new(
        response.detail,
        response.possible_matches,
        temp_dir,
    )))
}
