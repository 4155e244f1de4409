pub mod api;
pub mod app;
pub mod artifact_editor;
pub mod bulk_loading;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod http;
pub mod output;
pub mod request_panel;
pub mod selection;
pub mod storage;
pub mod tui;
pub mod triage;
