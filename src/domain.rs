use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Catalog lookup entry as served by the backend (`{id, value}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedValue {
    pub id: u64,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactAttributes {
    #[serde(default)]
    pub culture: Option<NamedValue>,
    #[serde(default)]
    pub shape: Option<NamedValue>,
    #[serde(default)]
    pub tags: Vec<NamedValue>,
    #[serde(default)]
    pub description: String,
}

/// Snapshot of an artifact queued for bulk download.
///
/// This is also the shape of a catalog listing card, so listing entries are
/// stored in the selection as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedArtifact {
    pub id: u64,
    #[serde(default)]
    pub attributes: ArtifactAttributes,
    #[serde(default)]
    pub thumbnail: String,
}

impl SelectedArtifact {
    pub fn label(&self) -> String {
        let culture = self
            .attributes
            .culture
            .as_ref()
            .map(|culture| culture.value.as_str())
            .unwrap_or("-");
        let shape = self
            .attributes
            .shape
            .as_ref()
            .map(|shape| shape.value.as_str())
            .unwrap_or("-");
        format!("#{} {culture} / {shape}", self.id)
    }
}

/// Chilean national identification number, stored as `BODY-DV`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rut(String);

impl Rut {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn body(&self) -> &str {
        self.0.split_once('-').map(|(body, _)| body).unwrap_or("")
    }

    pub fn check_digit(&self) -> char {
        self.0.chars().last().unwrap_or('0')
    }
}

/// Modulo-11 check character for a numeric RUT body.
///
/// Digits are weighted right-to-left with the cycle 2,3,4,5,6,7. Returns
/// `None` when the body is empty or contains anything other than ASCII digits.
pub fn expected_check_digit(body: &str) -> Option<char> {
    if body.is_empty() || !body.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    let mut total = 0u32;
    let mut factor = 2u32;
    for digit in body.chars().rev().filter_map(|ch| ch.to_digit(10)) {
        total = (total + digit * factor) % 11;
        factor = if factor == 7 { 2 } else { factor + 1 };
    }
    match 11 - total {
        10 => Some('K'),
        11 => Some('0'),
        value => char::from_digit(value, 10),
    }
}

impl fmt::Display for Rut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Rut {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|ch| !matches!(ch, '.' | '-'))
            .collect::<String>()
            .to_uppercase();
        let (split, dv) = normalized
            .char_indices()
            .last()
            .filter(|(split, _)| *split > 0)
            .ok_or_else(|| CatalogError::InvalidRut(value.to_string()))?;
        let body = &normalized[..split];
        let expected = expected_check_digit(body)
            .ok_or_else(|| CatalogError::InvalidRut(value.to_string()))?;
        if dv != expected {
            return Err(CatalogError::InvalidRut(value.to_string()));
        }
        Ok(Self(format!("{body}-{dv}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Email {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if !EMAIL_RE.is_match(trimmed) {
            return Err(CatalogError::InvalidEmail(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Operator disposition for a possible duplicate found during bulk loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Replace the existing artifact with the uploaded one.
    #[default]
    Replace,
    /// Keep the existing artifact and drop the uploaded one.
    Keep,
    /// Create the uploaded artifact alongside the existing one.
    New,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Replace => write!(f, "replace"),
            Resolution::Keep => write!(f, "keep"),
            Resolution::New => write!(f, "new"),
        }
    }
}

impl FromStr for Resolution {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "replace" => Ok(Resolution::Replace),
            "keep" => Ok(Resolution::Keep),
            "new" => Ok(Resolution::New),
            _ => Err(CatalogError::InvalidResolution(value.to_string())),
        }
    }
}

/// Aggregate status of a bulk download request, computed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    #[serde(rename = "partiallyaccepted")]
    #[value(name = "partiallyaccepted")]
    PartiallyAccepted,
    Rejected,
    Downloaded,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Accepted => write!(f, "accepted"),
            RequestStatus::PartiallyAccepted => write!(f, "partiallyaccepted"),
            RequestStatus::Rejected => write!(f, "rejected"),
            RequestStatus::Downloaded => write!(f, "downloaded"),
        }
    }
}

/// Per-artifact status inside a bulk download request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Accepted,
    Rejected,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemStatus::Pending => write!(f, "pending"),
            ItemStatus::Accepted => write!(f, "accepted"),
            ItemStatus::Rejected => write!(f, "rejected"),
        }
    }
}
