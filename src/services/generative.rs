use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::models::config::AppConfig;
use crate::models::error::AppError;

pub struct GenerativeService {
    config: Arc<AppConfig>,
    client: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_modalities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponsePart {
    #[serde(default)]
    inline_data: Option<GeminiResponseInlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponseInlineData {
    mime_type: String,
    data: String,
}

/// Decoded image extracted from a successful upstream response.
#[derive(Debug)]
pub struct EditedImage {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl GenerativeService {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self { config, client }
    }

    /// One upstream call per inbound request: prompt text plus the image
    /// (and mask, when painted) as inline-data parts. Returns the first
    /// inline image found in the response candidates.
    pub async fn process_edit(
        &self,
        prompt: &str,
        image_base64: &str,
        mask_base64: Option<&str>,
    ) -> Result<EditedImage, AppError> {
        let Some(api_key) = self.config.gemini_api_key.as_deref() else {
            error!("GEMINI_API_KEY is not configured; rejecting edit request");
            return Err(AppError::MissingApiKey);
        };

        let model = &self.config.gemini_model;
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            model
        );

        let request = build_request(prompt, image_base64, mask_base64);

        info!(model = %model, has_mask = mask_base64.is_some(), "forwarding edit request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Gemini API request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), %body, "Gemini API returned an error");
            return Err(AppError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("failed to parse Gemini response: {}", e)))?;

        extract_inline_image(gemini_response)
    }
}

fn build_request(prompt: &str, image_base64: &str, mask_base64: Option<&str>) -> GeminiRequest {
    let mut parts = vec![
        GeminiPart::Text {
            text: prompt.to_string(),
        },
        GeminiPart::InlineData {
            inline_data: GeminiInlineData {
                mime_type: sniff_base64_mime(image_base64).to_string(),
                data: image_base64.to_string(),
            },
        },
    ];

    if let Some(mask) = mask_base64 {
        parts.push(GeminiPart::InlineData {
            inline_data: GeminiInlineData {
                mime_type: sniff_base64_mime(mask).to_string(),
                data: mask.to_string(),
            },
        });
    }

    GeminiRequest {
        contents: vec![GeminiContent { parts }],
        generation_config: GeminiGenerationConfig {
            response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
        },
    }
}

/// First inline image across all candidates' content parts, decoded.
fn extract_inline_image(response: GeminiResponse) -> Result<EditedImage, AppError> {
    let candidates = response.candidates.unwrap_or_default();

    for candidate in candidates {
        let Some(content) = candidate.content else {
            continue;
        };
        for part in content.parts {
            if let Some(inline) = part.inline_data {
                let data = base64::engine::general_purpose::STANDARD
                    .decode(&inline.data)
                    .map_err(|e| {
                        AppError::Internal(format!("failed to decode upstream image: {}", e))
                    })?;
                return Ok(EditedImage {
                    data,
                    mime_type: inline.mime_type,
                });
            }
        }
    }

    Err(AppError::NoImageData)
}

/// Sniffs the MIME type from the magic bytes at the start of a base64
/// payload. Only the first aligned 16 characters are decoded.
fn sniff_base64_mime(b64: &str) -> &'static str {
    let prefix_len = b64.len().min(16) & !3;
    let head = base64::engine::general_purpose::STANDARD
        .decode(&b64[..prefix_len])
        .unwrap_or_default();
    sniff_mime(&head)
}

fn sniff_mime(data: &[u8]) -> &'static str {
    if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        "image/png"
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/png"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 12 PNG magic-prefixed bytes, standard-alphabet base64.
    const PNG_B64: &str = "iVBORw0KGgoAAAAA";

    #[test]
    fn request_carries_text_then_image() {
        let request = build_request("remove the lamp post", PNG_B64, None);
        let json = serde_json::to_value(&request).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts.as_array().unwrap().len(), 2);
        assert_eq!(parts[0]["text"], "remove the lamp post");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], PNG_B64);
    }

    #[test]
    fn request_appends_mask_as_third_part() {
        let request = build_request("clean up", PNG_B64, Some(PNG_B64));
        let json = serde_json::to_value(&request).unwrap();

        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2]["inlineData"]["mimeType"], "image/png");
    }

    #[test]
    fn request_serialization_uses_camel_case() {
        let request = build_request("x", PNG_B64, None);
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("generationConfig").is_some());
        assert!(json.get("generation_config").is_none());
    }

    #[test]
    fn extracts_first_inline_image_part() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Here is your edited image." },
                        { "inlineData": { "mimeType": "image/png", "data": "aGVsbG8=" } },
                        { "inlineData": { "mimeType": "image/jpeg", "data": "d29ybGQ=" } }
                    ]
                }
            }]
        }"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        let image = extract_inline_image(response).unwrap();
        assert_eq!(image.data, b"hello");
        assert_eq!(image.mime_type, "image/png");
    }

    #[test]
    fn text_only_response_is_no_image_data() {
        let json = r#"{
            "candidates": [{
                "content": { "parts": [{ "text": "I cannot edit this image." }] }
            }]
        }"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            extract_inline_image(response),
            Err(AppError::NoImageData)
        ));
    }

    #[test]
    fn empty_response_is_no_image_data() {
        let response: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            extract_inline_image(response),
            Err(AppError::NoImageData)
        ));
    }

    #[test]
    fn sniffs_jpeg_and_falls_back_to_png() {
        let jpeg_b64 = base64::engine::general_purpose::STANDARD.encode([
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01,
        ]);
        assert_eq!(sniff_base64_mime(&jpeg_b64), "image/jpeg");
        assert_eq!(sniff_base64_mime("AAAA"), "image/png");
        assert_eq!(sniff_base64_mime(""), "image/png");
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_upstream_call() {
        let config = AppConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            allowed_origin: "http://localhost:5173".to_string(),
            gemini_api_key: None,
            gemini_model: "gemini-2.5-flash-image".to_string(),
            upstream_timeout_secs: 1,
            max_body_bytes: 1024,
            log_level: "info".to_string(),
        };
        let service = GenerativeService::new(Arc::new(config));
        let result = service.process_edit("prompt", PNG_B64, None).await;
        assert!(matches!(result, Err(AppError::MissingApiKey)));
    }
}
