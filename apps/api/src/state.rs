use std::sync::Arc;

use crate::config::Config;
use crate::export::browser::BrowserLauncher;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Pluggable browser launcher. Default: ChromeLauncher. Each export call
    /// launches (and closes) its own browser process; the launcher itself is
    /// the only shared piece and holds no mutable state.
    pub launcher: Arc<dyn BrowserLauncher>,
}
