use std::path::{Path, PathBuf};

use crate::api::ArtifactDetail;
use crate::error::CatalogError;
use crate::fs_util::require_file;

pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Staff form for creating or editing one artifact.
///
/// Media already on the server is referenced by file name and kept as long as
/// it stays listed; `new_*` paths are uploaded from disk. A new thumbnail
/// replaces the kept one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactForm {
    pub description: String,
    pub shape: Option<u64>,
    pub culture: Option<u64>,
    pub tags: Vec<u64>,
    pub thumbnail: Option<String>,
    pub images: Vec<String>,
    pub new_thumbnail: Option<PathBuf>,
    pub new_object: Option<PathBuf>,
    pub new_material: Option<PathBuf>,
    pub new_texture: Option<PathBuf>,
    pub new_images: Vec<PathBuf>,
}

/// Field overrides applied on top of a stored artifact by `artifacts edit`.
#[derive(Debug, Clone, Default)]
pub struct ArtifactEdit {
    pub description: Option<String>,
    pub shape: Option<u64>,
    pub culture: Option<u64>,
    /// Replaces the tag list when set.
    pub tags: Option<Vec<u64>>,
    pub drop_thumbnail: bool,
    pub drop_images: Vec<String>,
    pub new_thumbnail: Option<PathBuf>,
    pub new_object: Option<PathBuf>,
    pub new_material: Option<PathBuf>,
    pub new_texture: Option<PathBuf>,
    pub new_images: Vec<PathBuf>,
}

impl ArtifactForm {
    /// Prefills the form with what the server already has.
    pub fn from_detail(detail: &ArtifactDetail) -> Self {
        let attributes = &detail.attributes;
        Self {
            description: attributes.description.clone(),
            shape: attributes.shape.as_ref().map(|shape| shape.id),
            culture: attributes.culture.as_ref().map(|culture| culture.id),
            tags: attributes.tags.iter().map(|tag| tag.id).collect(),
            thumbnail: media_name(&detail.thumbnail),
            images: detail
                .images
                .iter()
                .filter_map(|image| media_name(image))
                .collect(),
            ..Self::default()
        }
    }

    pub fn apply(&mut self, edit: ArtifactEdit) {
        if let Some(description) = edit.description {
            self.description = description;
        }
        if edit.shape.is_some() {
            self.shape = edit.shape;
        }
        if edit.culture.is_some() {
            self.culture = edit.culture;
        }
        if let Some(tags) = edit.tags {
            self.tags = tags;
        }
        if edit.drop_thumbnail {
            self.thumbnail = None;
        }
        self.images
            .retain(|image| !edit.drop_images.iter().any(|dropped| dropped == image));
        self.new_thumbnail = edit.new_thumbnail.or(self.new_thumbnail.take());
        self.new_object = edit.new_object.or(self.new_object.take());
        self.new_material = edit.new_material.or(self.new_material.take());
        self.new_texture = edit.new_texture.or(self.new_texture.take());
        self.new_images.extend(edit.new_images);
    }

    /// Local checks: description present and within the limit, every file to
    /// upload readable.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let description = self.description.trim();
        if description.is_empty() {
            return Err(CatalogError::MissingField("description"));
        }
        if description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(CatalogError::DescriptionTooLong {
                max: MAX_DESCRIPTION_CHARS,
            });
        }
        for (_, path) in self.uploads() {
            require_file(path)?;
        }
        Ok(())
    }

    /// Text parts of the multipart body. Repeated names carry list values.
    pub fn text_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("description", self.description.trim().to_string())];
        if let Some(shape) = self.shape {
            fields.push(("id_shape", shape.to_string()));
        }
        if let Some(culture) = self.culture {
            fields.push(("id_culture", culture.to_string()));
        }
        fields.extend(self.tags.iter().map(|tag| ("id_tags", tag.to_string())));
        if self.new_thumbnail.is_none()
            && let Some(thumbnail) = &self.thumbnail
        {
            fields.push(("thumbnail", thumbnail.clone()));
        }
        fields.extend(self.images.iter().map(|image| ("images", image.clone())));
        fields
    }

    /// File parts of the multipart body.
    pub fn uploads(&self) -> Vec<(&'static str, &Path)> {
        let mut files = Vec::new();
        for (name, path) in [
            ("new_thumbnail", &self.new_thumbnail),
            ("model[new_object]", &self.new_object),
            ("model[new_material]", &self.new_material),
            ("model[new_texture]", &self.new_texture),
        ] {
            if let Some(path) = path {
                files.push((name, path.as_path()));
            }
        }
        files.extend(
            self.new_images
                .iter()
                .map(|path| ("new_images", path.as_path())),
        );
        files
    }
}

// "/media/thumbnails/12.jpg" -> "12.jpg"
fn media_name(url: &str) -> Option<String> {
    url.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
