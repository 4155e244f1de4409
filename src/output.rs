use std::io::{self, Write};

use serde::Serialize;

use crate::api::{ArtifactPage, RequestDetail};
use crate::app::{
    ArtifactInfo, BulkLoadResult, DownloadResult, NotificationResult, ProgressEvent, ProgressSink,
    RequestInfo, RequestListResult, SavedArtifact, SelectionChange, SelectionResult,
};
use crate::bulk_loading::BulkLoadState;
use crate::request_panel::RequestReceipt;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

pub struct JsonOutput;

impl JsonOutput {
    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Prints phase lines to stderr while a command runs outside the TUI.
pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        if let Some(rest) = event.message.strip_prefix("phase=") {
            let (phase, message) = rest.split_once("; ").unwrap_or((rest, ""));
            eprintln!("{CYAN}[{phase}]{RESET} {message}");
        }
    }
}

pub struct HumanOutput;

impl HumanOutput {
    pub fn print_page(page: &ArtifactPage) {
        println!(
            "{CYAN}Catalog page {}/{} ({} artifacts){RESET}",
            page.current_page,
            page.total_pages.max(1),
            page.total
        );
        for artifact in &page.data {
            let tags: Vec<&str> = artifact
                .attributes
                .tags
                .iter()
                .map(|tag| tag.value.as_str())
                .collect();
            println!("  {}  {}", artifact.label(), tags.join(", "));
        }
        let cultures = present(&page.filters.cultures);
        if !cultures.is_empty() {
            println!("{YELLOW}cultures:{RESET} {}", cultures.join(", "));
        }
        let shapes = present(&page.filters.shapes);
        if !shapes.is_empty() {
            println!("{YELLOW}shapes:{RESET} {}", shapes.join(", "));
        }
    }

    pub fn print_saved(saved: &SavedArtifact) {
        let verb = if saved.created { "created" } else { "updated" };
        println!("{GREEN}Artifact #{} {verb}{RESET}", saved.artifact.id);
        if !saved.artifact.thumbnail.is_empty() {
            println!("  thumbnail: {}", saved.artifact.thumbnail);
        }
        println!("  images:    {}", saved.artifact.images.len());
    }

    pub fn print_artifact(info: &ArtifactInfo) {
        let artifact = &info.artifact;
        let mark = if info.selected { " [selected]" } else { "" };
        println!("{CYAN}Artifact #{}{mark}{RESET}", artifact.id);
        if let Some(culture) = &artifact.attributes.culture {
            println!("  culture: {}", culture.value);
        }
        if let Some(shape) = &artifact.attributes.shape {
            println!("  shape:   {}", shape.value);
        }
        if !artifact.attributes.tags.is_empty() {
            let tags: Vec<&str> = artifact
                .attributes
                .tags
                .iter()
                .map(|tag| tag.value.as_str())
                .collect();
            println!("  tags:    {}", tags.join(", "));
        }
        if !artifact.attributes.description.is_empty() {
            println!("  {}", artifact.attributes.description);
        }
        println!("  showing: {}", info.visualization);
        if !artifact.model.object.is_empty() {
            println!("  model:   {}", artifact.model.object);
        }
        for image in &artifact.images {
            println!("  image:   {image}");
        }
    }

    pub fn print_selection(result: &SelectionResult) {
        println!("{CYAN}{} artifact(s) selected{RESET}", result.count);
        for item in &result.items {
            println!("  {}", item.label());
        }
    }

    pub fn print_selection_change(change: &SelectionChange) {
        let verb = if change.selected { "added" } else { "removed" };
        println!(
            "{GREEN}artifact #{} {verb}{RESET} ({} selected)",
            change.id, change.count
        );
    }

    pub fn print_download(result: &DownloadResult) {
        println!(
            "{GREEN}saved {} ({} file(s), request #{}){RESET}",
            result.receipt.path.display(),
            result.receipt.files,
            result.receipt.bulk_request_id
        );
    }

    pub fn print_request(receipt: &RequestReceipt) {
        if !receipt.detail.is_empty() {
            println!("{}", receipt.detail);
        }
        println!("{GREEN}{}{RESET}", receipt.message);
    }

    pub fn print_bulk_load(result: &BulkLoadResult) {
        if result.cancelled {
            println!("{YELLOW}duplicate review cancelled; nothing was loaded{RESET}");
            return;
        }
        match &result.outcome {
            BulkLoadState::Success { detail } => println!("{GREEN}{detail}{RESET}"),
            BulkLoadState::ValidationError { detail, errors } => {
                println!("{RED}{detail}{RESET}");
                for error in errors {
                    println!("{RED}  - {error}{RESET}");
                }
            }
            BulkLoadState::DuplicateReview(review) => {
                println!("{YELLOW}{}{RESET}", review.detail);
                for entry in &review.matches {
                    println!(
                        "  new #{} matches #{} -> {}",
                        entry.new_artifact.id,
                        entry.match_artifact,
                        entry.resolution()
                    );
                }
            }
            BulkLoadState::Idle | BulkLoadState::Submitting => {}
        }
    }

    pub fn print_requests(result: &RequestListResult) {
        if result.requests.is_empty() {
            println!("no requests");
            return;
        }
        for request in &result.requests {
            println!(
                "  #{:<5} {:<18} {:<30} {:>3} artifact(s)  {}",
                request.id,
                request.status.to_string(),
                request.email,
                request.request_count,
                request.name
            );
        }
    }

    pub fn print_request_detail(info: &RequestInfo) {
        let request: &RequestDetail = &info.request;
        println!(
            "{CYAN}Request #{} ({}){RESET}",
            request.id, request.status
        );
        println!("  {} <{}>", request.name, request.email);
        if let Some(comments) = request.comments.as_deref().filter(|text| !text.is_empty()) {
            println!("  message: {comments}");
        }
        for item in &request.requests {
            let artifact = item
                .artifact
                .map(|id| format!("#{id}"))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  item {:<5} artifact {:<7} {}",
                item.id, artifact, item.status
            );
            if let Some(description) = item.description.as_deref().filter(|text| !text.is_empty()) {
                println!("             {description}");
            }
        }
        if !info.editable {
            println!("{YELLOW}request already answered{RESET}");
        }
    }

    pub fn print_notifications(result: &NotificationResult) {
        match &result.message {
            Some(message) => println!("{YELLOW}{message}{RESET}"),
            None => println!("no pending requests"),
        }
    }

    pub fn print_message(message: &str) {
        println!("{GREEN}{message}{RESET}");
    }
}

fn present(values: &[Option<String>]) -> Vec<&str> {
    values
        .iter()
        .filter_map(|value| value.as_deref())
        .filter(|value| !value.is_empty())
        .collect()
}
