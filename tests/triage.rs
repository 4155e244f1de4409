mod common;

use assert_matches::assert_matches;

use heritage_catalog::domain::{ItemStatus, RequestStatus};
use heritage_catalog::error::CatalogError;
use heritage_catalog::triage::{MAX_COMMENT_CHARS, TriageSession};

use common::{MockCatalog, pending_request};

fn statuses(items: &[heritage_catalog::api::RequestItem]) -> Vec<ItemStatus> {
    items.iter().map(|item| item.status).collect()
}

#[test]
fn unanswered_items_start_rejected() {
    let api = MockCatalog::default().with_request(pending_request(5, 3));

    let session = TriageSession::load(&api, 5).unwrap();
    assert!(session.is_editable());
    assert_eq!(
        statuses(session.items()),
        vec![ItemStatus::Rejected; 3]
    );
    assert_eq!(
        statuses(&session.detail().requests),
        vec![ItemStatus::Pending; 3]
    );
}

#[test]
fn partial_accept_refetches_request() {
    let api = MockCatalog::default().with_request(pending_request(5, 3));

    let mut session = TriageSession::load(&api, 5).unwrap();
    assert_eq!(session.toggle(2).unwrap(), ItemStatus::Accepted);
    let detail = session.accept_selected(Some("  solo la vasija ")).unwrap();

    assert_eq!(detail.status, RequestStatus::PartiallyAccepted);
    assert_eq!(
        api.calls(),
        vec![
            "GET artifact/request/5",
            "PUT artifact/request/5",
            "GET artifact/request/5"
        ]
    );
    let updates = api.updates.lock().unwrap();
    let (_, update) = &updates[0];
    assert_eq!(update.message, "solo la vasija");
    assert_eq!(
        statuses(&update.requests),
        vec![ItemStatus::Rejected, ItemStatus::Accepted, ItemStatus::Rejected]
    );
    assert!(!session.is_editable());
}

#[test]
fn toggle_all_flips_between_all_and_none() {
    let api = MockCatalog::default().with_request(pending_request(5, 2));

    let mut session = TriageSession::load(&api, 5).unwrap();
    session.toggle(1).unwrap();
    session.toggle_all().unwrap();
    assert_eq!(statuses(session.items()), vec![ItemStatus::Accepted; 2]);
    session.toggle_all().unwrap();
    assert_eq!(statuses(session.items()), vec![ItemStatus::Rejected; 2]);
    assert_matches!(
        session.toggle(9),
        Err(CatalogError::UnknownRequestItem { request: 5, item: 9 })
    );
}

#[test]
fn reject_all_needs_comment() {
    let api = MockCatalog::default().with_request(pending_request(5, 2));

    let mut session = TriageSession::load(&api, 5).unwrap();
    session.toggle(1).unwrap();
    assert_matches!(session.reject_all("   "), Err(CatalogError::CommentRequired));
    assert_eq!(api.calls(), vec!["GET artifact/request/5"]);
    assert_eq!(session.items()[0].status, ItemStatus::Accepted);

    let detail = session.reject_all("Fuera de plazo").unwrap();
    assert_eq!(detail.status, RequestStatus::Rejected);
}

#[test]
fn long_comment_is_refused_locally() {
    let api = MockCatalog::default().with_request(pending_request(5, 1));

    let mut session = TriageSession::load(&api, 5).unwrap();
    let comment = "á".repeat(MAX_COMMENT_CHARS + 1);
    let err = session.accept_selected(Some(&comment)).unwrap_err();

    assert_matches!(err, CatalogError::CommentTooLong { max: MAX_COMMENT_CHARS });
    assert!(api.updates.lock().unwrap().is_empty());

    let at_limit = "á".repeat(MAX_COMMENT_CHARS);
    assert!(session.accept_selected(Some(&at_limit)).is_ok());
}

#[test]
fn answered_request_is_read_only() {
    let mut request = pending_request(6, 2);
    request.status = RequestStatus::Accepted;
    for item in &mut request.requests {
        item.status = ItemStatus::Accepted;
    }
    let api = MockCatalog::default().with_request(request);

    let mut session = TriageSession::load(&api, 6).unwrap();
    assert!(!session.is_editable());
    assert_matches!(
        session.toggle(1),
        Err(CatalogError::RequestNotPending { id: 6, .. })
    );
    assert_matches!(
        session.reject_all("tarde"),
        Err(CatalogError::RequestNotPending { .. })
    );
    assert!(api.updates.lock().unwrap().is_empty());
}
