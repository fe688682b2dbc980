use std::sync::Arc;

use axum::{Json, extract::State};
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::models::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub prompt: Option<String>,
    pub image: Option<String>,
    pub mask: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub base64_data: String,
    pub mime_type: String,
}

pub async fn process_edit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProcessRequest>,
) -> Result<Json<ProcessResponse>, AppError> {
    let mut missing = Vec::new();
    if req.prompt.as_deref().map_or(true, |p| p.trim().is_empty()) {
        missing.push("prompt");
    }
    if req.image.as_deref().map_or(true, |i| i.is_empty()) {
        missing.push("image");
    }
    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "missing required field(s): {}",
            missing.join(", ")
        )));
    }

    let prompt = req.prompt.unwrap_or_default();
    let image = req.image.unwrap_or_default();
    let mask = req.mask.as_deref().filter(|m| !m.is_empty());

    let edited = state.generative.process_edit(&prompt, &image, mask).await?;

    Ok(Json(ProcessResponse {
        base64_data: base64::engine::general_purpose::STANDARD.encode(&edited.data),
        mime_type: edited.mime_type,
    }))
}
