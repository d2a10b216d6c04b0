//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use report_core::ports::{ChatStore, ReportStore, TemplateRenderer};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers. Everything behind it is a port, so tests can swap the concrete
/// adapters without touching the web layer.
#[derive(Clone)]
pub struct AppState {
    pub reports: Arc<dyn ReportStore>,
    pub chats: Arc<dyn ChatStore>,
    pub renderer: Arc<dyn TemplateRenderer>,
    pub config: Arc<Config>,
}
