//! Retouch: a mask-based photo retouching service.
//!
//! The [`editor`] module is the headless mask editor — image loading, brush
//! strokes on a transparent raster, and submission to the processing
//! endpoint. The `handlers`/`models`/`services` modules form the server side:
//! a stateless proxy that forwards an image + mask + instruction to the
//! Gemini generative API while keeping the credential server-held.

pub mod editor;
pub mod handlers;
pub mod models;
pub mod services;

use std::sync::Arc;

use models::config::AppConfig;
use services::generative::GenerativeService;

pub struct AppState {
    pub config: Arc<AppConfig>,
    pub generative: GenerativeService,
}
