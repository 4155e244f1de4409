use tracing::info;

use crate::api::{CatalogApi, RequestDetail, RequestItem, RequestSummary, TriageUpdate};
use crate::domain::{ItemStatus, RequestStatus};
use crate::error::CatalogError;

pub const MAX_COMMENT_CHARS: usize = 500;

pub fn filter_requests(
    requests: &[RequestSummary],
    status: Option<RequestStatus>,
) -> Vec<&RequestSummary> {
    requests
        .iter()
        .filter(|request| status.is_none_or(|status| request.status == status))
        .collect()
}

/// Administrator's view of one download request.
///
/// Item statuses edited here are only a draft; after every submission the
/// request is fetched again and the server's answer replaces the draft.
pub struct TriageSession<'a, A> {
    api: &'a A,
    detail: RequestDetail,
    draft: Vec<RequestItem>,
}

impl<'a, A: CatalogApi> TriageSession<'a, A> {
    pub fn load(api: &'a A, id: u64) -> Result<Self, CatalogError> {
        let detail = api.request(id)?;
        let draft = draft_items(&detail);
        Ok(Self { api, detail, draft })
    }

    pub fn detail(&self) -> &RequestDetail {
        &self.detail
    }

    pub fn items(&self) -> &[RequestItem] {
        &self.draft
    }

    /// Items can only be triaged while the request is still pending.
    pub fn is_editable(&self) -> bool {
        self.detail.status == RequestStatus::Pending
    }

    /// Flips one item between accepted and rejected.
    pub fn toggle(&mut self, item: u64) -> Result<ItemStatus, CatalogError> {
        self.ensure_editable()?;
        let request = self.detail.id;
        let entry = self
            .draft
            .iter_mut()
            .find(|entry| entry.id == item)
            .ok_or(CatalogError::UnknownRequestItem { request, item })?;
        entry.status = match entry.status {
            ItemStatus::Accepted => ItemStatus::Rejected,
            ItemStatus::Pending | ItemStatus::Rejected => ItemStatus::Accepted,
        };
        Ok(entry.status)
    }

    pub fn accept_all(&mut self) -> Result<(), CatalogError> {
        self.set_all(ItemStatus::Accepted)
    }

    /// "Select all" checkbox: clears everything when all items are accepted,
    /// accepts everything otherwise.
    pub fn toggle_all(&mut self) -> Result<(), CatalogError> {
        let all_accepted = self
            .draft
            .iter()
            .all(|entry| entry.status == ItemStatus::Accepted);
        self.set_all(if all_accepted {
            ItemStatus::Rejected
        } else {
            ItemStatus::Accepted
        })
    }

    /// Sends the current draft; the comment is optional.
    pub fn accept_selected(&mut self, comment: Option<&str>) -> Result<&RequestDetail, CatalogError> {
        self.ensure_editable()?;
        self.submit(comment.unwrap_or_default())
    }

    /// Rejects every item. A non-empty comment is mandatory.
    pub fn reject_all(&mut self, comment: &str) -> Result<&RequestDetail, CatalogError> {
        self.ensure_editable()?;
        if comment.trim().is_empty() {
            return Err(CatalogError::CommentRequired);
        }
        self.set_all(ItemStatus::Rejected)?;
        self.submit(comment)
    }

    fn submit(&mut self, comment: &str) -> Result<&RequestDetail, CatalogError> {
        if comment.chars().count() > MAX_COMMENT_CHARS {
            return Err(CatalogError::CommentTooLong {
                max: MAX_COMMENT_CHARS,
            });
        }
        let update = TriageUpdate {
            requests: self.draft.clone(),
            message: comment.trim().to_string(),
        };
        let id = self.detail.id;
        self.api.update_request(id, &update)?;
        let accepted = update
            .requests
            .iter()
            .filter(|entry| entry.status == ItemStatus::Accepted)
            .count();
        info!(id, accepted, total = update.requests.len(), "triage submitted");

        self.detail = self.api.request(id)?;
        self.draft = draft_items(&self.detail);
        info!(id, status = %self.detail.status, "request refreshed");
        Ok(&self.detail)
    }

    fn set_all(&mut self, status: ItemStatus) -> Result<(), CatalogError> {
        self.ensure_editable()?;
        for entry in &mut self.draft {
            entry.status = status;
        }
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), CatalogError> {
        if self.is_editable() {
            Ok(())
        } else {
            Err(CatalogError::RequestNotPending {
                id: self.detail.id,
                status: self.detail.status.to_string(),
            })
        }
    }
}

/// Unanswered items start out rejected: only items the administrator ticks
/// are granted.
fn draft_items(detail: &RequestDetail) -> Vec<RequestItem> {
    let mut items = detail.requests.clone();
    if detail.status == RequestStatus::Pending {
        for entry in &mut items {
            if entry.status == ItemStatus::Pending {
                entry.status = ItemStatus::Rejected;
            }
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: u64, status: RequestStatus) -> RequestSummary {
        RequestSummary {
            id,
            name: format!("Solicitante {id}"),
            email: format!("s{id}@example.cl"),
            request_count: 2,
            status,
        }
    }

    #[test]
    fn filter_by_status() {
        let requests = vec![
            summary(1, RequestStatus::Pending),
            summary(2, RequestStatus::Accepted),
            summary(3, RequestStatus::Pending),
        ];
        let pending: Vec<u64> = filter_requests(&requests, Some(RequestStatus::Pending))
            .iter()
            .map(|request| request.id)
            .collect();
        assert_eq!(pending, vec![1, 3]);
        assert_eq!(filter_requests(&requests, None).len(), 3);
    }

    #[test]
    fn pending_items_draft_as_rejected() {
        let detail: RequestDetail = serde_json::from_value(serde_json::json!({
            "id": 5,
            "name": "Ana",
            "email": "ana@example.cl",
            "status": "pending",
            "requests": [
                {"id": 1, "artifact": 10, "status": "pending"},
                {"id": 2, "artifact": 11, "status": "accepted"}
            ]
        }))
        .unwrap();
        let statuses: Vec<ItemStatus> = draft_items(&detail).iter().map(|item| item.status).collect();
        assert_eq!(statuses, vec![ItemStatus::Rejected, ItemStatus::Accepted]);
    }
}
