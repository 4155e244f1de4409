mod common;

use std::fs;

use assert_matches::assert_matches;

use heritage_catalog::domain::NamedValue;
use heritage_catalog::error::CatalogError;
use heritage_catalog::request_panel::{REQUEST_CONFIRMATION, RequestForm, RequestPanel};
use heritage_catalog::selection::SelectionStore;

use common::{Failure, MockCatalog, snapshot, temp_storage};

fn selected(ids: &[u64]) -> (tempfile::TempDir, SelectionStore) {
    let (temp, storage) = temp_storage();
    let mut store = SelectionStore::load(storage);
    for id in ids {
        store.toggle(snapshot(*id)).unwrap();
    }
    (temp, store)
}

fn form() -> RequestForm {
    RequestForm {
        full_name: "Ana Rojas".to_string(),
        rut: "12.345.678-5".to_string(),
        email: "ana@example.cl".to_string(),
        repeat_email: Some("ana@example.cl".to_string()),
        institution: "Universidad de Chile".to_string(),
        comments: "Tesis de magister".to_string(),
    }
}

fn institutions() -> Vec<NamedValue> {
    vec![
        NamedValue {
            id: 4,
            value: "Museo Nacional".to_string(),
        },
        NamedValue {
            id: 9,
            value: "Universidad de Chile".to_string(),
        },
    ]
}

#[test]
fn download_makes_two_calls_and_keeps_selection() {
    let (temp, mut store) = selected(&[10, 11, 12]);
    let api = MockCatalog {
        bulk_request_id: Some(42),
        archive_entries: vec!["10.obj", "11.obj", "12.obj"],
        ..MockCatalog::default()
    };
    let dest = temp.path().join("downloads");

    let panel = RequestPanel::new(&api, &mut store, true);
    let receipt = panel.download_now(&dest).unwrap();

    assert_eq!(
        api.calls(),
        vec![
            "POST artifact/bulkdownloading",
            "GET artifact/bulkdownloading/42"
        ]
    );
    let sent = api.bulk_requests.lock().unwrap();
    assert_eq!(sent[0].artifacts, vec![10, 11, 12]);
    assert!(sent[0].authenticated);
    assert!(sent[0].email.is_none());
    assert_eq!(receipt.bulk_request_id, 42);
    assert_eq!(receipt.files, 3);
    assert_eq!(receipt.path, dest.join("bulk-download-42.zip"));
    assert!(receipt.path.exists());
    assert_eq!(store.ids(), vec![10, 11, 12]);
}

#[test]
fn failed_archive_download_keeps_selection_and_leaves_no_file() {
    let (temp, mut store) = selected(&[10, 11]);
    let api = MockCatalog {
        bulk_request_id: Some(7),
        download_failure: Some(Failure::Network("connection reset".to_string())),
        ..MockCatalog::default()
    };
    let dest = temp.path().join("downloads");

    let panel = RequestPanel::new(&api, &mut store, true);
    let err = panel.download_now(&dest).unwrap_err();

    assert_matches!(err, CatalogError::Http(_));
    assert_eq!(api.calls().len(), 2);
    assert!(!dest.join("bulk-download-7.zip").exists());
    assert_eq!(store.ids(), vec![10, 11]);
}

#[test]
fn rejected_download_request_skips_archive_fetch() {
    let (temp, mut store) = selected(&[10, 11]);
    let api = MockCatalog {
        bulk_request_id: Some(7),
        create_failure: Some(Failure::bad_request("Solicitud inválida", &[])),
        archive_entries: vec!["10.obj", "11.obj"],
        ..MockCatalog::default()
    };
    let dest = temp.path().join("downloads");

    let panel = RequestPanel::new(&api, &mut store, true);
    let err = panel.download_now(&dest).unwrap_err();

    assert_matches!(err, CatalogError::Status { status: 400, .. });
    assert_eq!(api.calls(), vec!["POST artifact/bulkdownloading"]);
    assert!(!dest.exists() || fs::read_dir(&dest).unwrap().next().is_none());
    assert_eq!(store.ids(), vec![10, 11]);
}

#[test]
fn download_requires_login() {
    let (temp, mut store) = selected(&[1]);
    let api = MockCatalog::default();

    let panel = RequestPanel::new(&api, &mut store, false);
    let err = panel.download_now(temp.path()).unwrap_err();

    assert_matches!(err, CatalogError::AuthenticationRequired);
    assert!(api.calls().is_empty());
}

#[test]
fn empty_selection_sends_nothing() {
    let (temp, mut store) = selected(&[]);
    let api = MockCatalog::default();

    let panel = RequestPanel::new(&api, &mut store, true);
    assert_matches!(
        panel.download_now(temp.path()),
        Err(CatalogError::EmptySelection)
    );
    assert_matches!(
        panel.submit_request(&form()),
        Err(CatalogError::EmptySelection)
    );
    assert!(api.calls().is_empty());
}

#[test]
fn email_mismatch_makes_no_calls() {
    let (_temp, mut store) = selected(&[3]);
    let api = MockCatalog {
        institutions: institutions(),
        ..MockCatalog::default()
    };
    let form = RequestForm {
        repeat_email: Some("ana@example.com".to_string()),
        ..form()
    };

    let panel = RequestPanel::new(&api, &mut store, false);
    assert_matches!(panel.submit_request(&form), Err(CatalogError::EmailMismatch));
    assert!(api.calls().is_empty());
}

#[test]
fn email_confirmation_must_match_exactly() {
    let (_temp, mut store) = selected(&[3]);
    let api = MockCatalog {
        institutions: institutions(),
        ..MockCatalog::default()
    };
    let padded = RequestForm {
        repeat_email: Some("ana@example.cl ".to_string()),
        ..form()
    };
    assert_matches!(padded.validate(), Err(CatalogError::EmailMismatch));

    let panel = RequestPanel::new(&api, &mut store, false);
    assert_matches!(panel.submit_request(&padded), Err(CatalogError::EmailMismatch));
    assert!(api.calls().is_empty());
    assert!(form().validate().is_ok());
}

#[test]
fn invalid_rut_makes_no_calls() {
    let (_temp, mut store) = selected(&[3]);
    let api = MockCatalog {
        institutions: institutions(),
        ..MockCatalog::default()
    };
    let form = RequestForm {
        rut: "12.345.678-9".to_string(),
        ..form()
    };

    let panel = RequestPanel::new(&api, &mut store, false);
    let err = panel.submit_request(&form).unwrap_err();
    assert!(err.is_validation());
    assert_matches!(err, CatalogError::InvalidRut(_));
    assert!(api.calls().is_empty());
}

#[test]
fn anonymous_request_carries_identity() {
    let (_temp, mut store) = selected(&[3, 5]);
    let api = MockCatalog {
        institutions: institutions(),
        ..MockCatalog::default()
    };

    let panel = RequestPanel::new(&api, &mut store, false);
    let receipt = panel.submit_request(&form()).unwrap();

    assert_eq!(receipt.message, REQUEST_CONFIRMATION);
    assert_eq!(receipt.artifacts, 2);
    assert_eq!(
        api.calls(),
        vec!["GET institutions", "POST artifact/bulkdownloading"]
    );
    let body = serde_json::to_value(&api.bulk_requests.lock().unwrap()[0]).unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "fullName": "Ana Rojas",
            "rut": "12345678-5",
            "email": "ana@example.cl",
            "institution": 9,
            "comments": "Tesis de magister",
            "artifacts": [3, 5],
            "authenticated": false
        })
    );
    assert_eq!(store.ids(), vec![3, 5]);
}

#[test]
fn unknown_institution_is_not_sent() {
    let (_temp, mut store) = selected(&[3]);
    let api = MockCatalog {
        institutions: institutions(),
        ..MockCatalog::default()
    };
    let form = RequestForm {
        institution: "Harvard".to_string(),
        ..form()
    };

    let panel = RequestPanel::new(&api, &mut store, false);
    assert_matches!(
        panel.submit_request(&form),
        Err(CatalogError::UnknownInstitution(_))
    );
    assert_eq!(api.calls(), vec!["GET institutions"]);
}

#[test]
fn backend_rejection_detail_is_surfaced() {
    let (_temp, mut store) = selected(&[3]);
    let api = MockCatalog {
        institutions: institutions(),
        create_failure: Some(Failure::bad_request("Institución inválida", &[])),
        ..MockCatalog::default()
    };

    let panel = RequestPanel::new(&api, &mut store, false);
    let err = panel.submit_request(&form()).unwrap_err();
    assert_eq!(err.to_string(), "Institución inválida");
    assert_eq!(store.ids(), vec![3]);
}

#[test]
fn undo_clears_selection() {
    let (_temp, mut store) = selected(&[3, 4]);
    let api = MockCatalog::default();

    let mut panel = RequestPanel::new(&api, &mut store, false);
    assert!(panel.can_undo());
    panel.undo().unwrap();
    assert!(!panel.can_undo());
    assert!(panel.items().is_empty());
    assert!(api.calls().is_empty());
}
