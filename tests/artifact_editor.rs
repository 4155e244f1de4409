mod common;

use std::fs;
use std::path::Path;

use assert_matches::assert_matches;

use heritage_catalog::app::App;
use heritage_catalog::artifact_editor::{ArtifactEdit, ArtifactForm, MAX_DESCRIPTION_CHARS};
use heritage_catalog::error::CatalogError;
use heritage_catalog::output::JsonOutput;

use common::{Failure, MockCatalog, temp_storage};

fn app(api: MockCatalog, authenticated: bool) -> (tempfile::TempDir, App<MockCatalog>) {
    let (temp, storage) = temp_storage();
    let app = App::new(api, storage, temp.path().join("downloads"), authenticated);
    (temp, app)
}

fn media(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, name.as_bytes()).unwrap();
    path
}

#[test]
fn staff_create_uploads_form_and_reloads() {
    let api = MockCatalog {
        created_id: Some(31),
        ..MockCatalog::with_artifacts(&[31])
    };
    let (temp, app) = app(api, true);
    let form = ArtifactForm {
        description: "Vasija zoomorfa".to_string(),
        shape: Some(2),
        culture: Some(1),
        tags: vec![4, 6],
        new_thumbnail: Some(media(temp.path(), "31.jpg")),
        new_object: Some(media(temp.path(), "31.obj")),
        new_material: Some(media(temp.path(), "31.mtl")),
        new_texture: Some(media(temp.path(), "31.png")),
        new_images: vec![media(temp.path(), "31-1.jpg")],
        ..ArtifactForm::default()
    };

    let saved = app.create_artifact(&form, &JsonOutput).unwrap();

    assert!(saved.created);
    assert_eq!(saved.artifact.id, 31);
    assert_eq!(app.api().calls(), vec!["POST artifact/upload", "GET artifact/31"]);
    let sent = app.api().saved_forms.lock().unwrap();
    assert_eq!(sent[0].0, None);
    assert_eq!(sent[0].1.uploads().len(), 5);
}

#[test]
fn create_requires_session() {
    let api = MockCatalog {
        created_id: Some(31),
        ..MockCatalog::default()
    };
    let (_temp, app) = app(api, false);
    let form = ArtifactForm {
        description: "Vasija".to_string(),
        ..ArtifactForm::default()
    };

    assert_matches!(
        app.create_artifact(&form, &JsonOutput),
        Err(CatalogError::AuthenticationRequired)
    );
    assert_matches!(
        app.edit_artifact(31, ArtifactEdit::default(), &JsonOutput),
        Err(CatalogError::AuthenticationRequired)
    );
    assert!(app.api().calls().is_empty());
}

#[test]
fn missing_media_file_is_not_uploaded() {
    let api = MockCatalog {
        created_id: Some(31),
        ..MockCatalog::default()
    };
    let (temp, app) = app(api, true);
    let form = ArtifactForm {
        description: "Vasija".to_string(),
        new_texture: Some(temp.path().join("ausente.png")),
        ..ArtifactForm::default()
    };

    let err = app.create_artifact(&form, &JsonOutput).unwrap_err();
    assert_matches!(err, CatalogError::MissingFile(_));
    assert!(app.api().calls().is_empty());
}

#[test]
fn edit_keeps_stored_media_and_applies_changes() {
    let (temp, app) = app(MockCatalog::with_artifacts(&[12]), true);
    let edit = ArtifactEdit {
        description: Some("Pieza restaurada".to_string()),
        tags: Some(vec![7]),
        drop_images: vec!["12-1.jpg".to_string()],
        new_images: vec![media(temp.path(), "12-2.jpg")],
        ..ArtifactEdit::default()
    };

    let saved = app.edit_artifact(12, edit, &JsonOutput).unwrap();

    assert!(!saved.created);
    assert_eq!(
        app.api().calls(),
        vec!["GET artifact/12", "PUT artifact/12/upload", "GET artifact/12"]
    );
    let sent = app.api().saved_forms.lock().unwrap();
    let (id, form) = &sent[0];
    assert_eq!(*id, Some(12));
    assert_eq!(form.description, "Pieza restaurada");
    assert_eq!(form.shape, Some(2));
    assert_eq!(form.culture, Some(1));
    assert_eq!(form.tags, vec![7]);
    assert_eq!(form.thumbnail.as_deref(), Some("12.jpg"));
    assert!(form.images.is_empty());
    assert_eq!(form.uploads(), vec![("new_images", temp.path().join("12-2.jpg").as_path())]);
}

#[test]
fn overlong_description_stops_before_upload() {
    let (_temp, app) = app(MockCatalog::with_artifacts(&[12]), true);
    let edit = ArtifactEdit {
        description: Some("x".repeat(MAX_DESCRIPTION_CHARS + 1)),
        ..ArtifactEdit::default()
    };

    let err = app.edit_artifact(12, edit, &JsonOutput).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(app.api().calls(), vec!["GET artifact/12"]);
}

#[test]
fn server_rejection_skips_reload() {
    let api = MockCatalog {
        save_failure: Some(Failure::bad_request("Error al subir archivos", &[])),
        ..MockCatalog::with_artifacts(&[12])
    };
    let (_temp, app) = app(api, true);

    let err = app
        .edit_artifact(12, ArtifactEdit::default(), &JsonOutput)
        .unwrap_err();

    assert_eq!(err.to_string(), "Error al subir archivos");
    assert_eq!(
        app.api().calls(),
        vec!["GET artifact/12", "PUT artifact/12/upload"]
    );
}
