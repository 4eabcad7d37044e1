//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. The
//! canvas itself lives inside the actor task; handlers only hold a handle to
//! its command queue plus the resolved configuration.

use std::sync::Arc;

use crate::config::Config;
use crate::services::canvas::CanvasHandle;

/// Clone is required by Axum; both fields are cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub canvas: CanvasHandle,
    pub config: Arc<Config>,
}

impl AppState {
    #[must_use]
    pub fn new(canvas: CanvasHandle, config: Config) -> Self {
        Self { canvas, config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
