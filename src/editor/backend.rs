use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::editor::EditorError;

/// Payload for one edit round-trip to the processing endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    pub prompt: String,
    pub image: String,
    pub mask: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EditResult {
    pub base64_data: String,
    pub mime_type: String,
}

/// Seam between the editor session and the network. Drawing and submission
/// logic are tested against a mock implementation of this trait.
#[async_trait]
pub trait EditBackend: Send + Sync {
    async fn process(&self, request: EditRequest) -> Result<EditResult, EditorError>;
}

/// Production backend: one POST to the proxy's process endpoint.
pub struct HttpEditBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEditBackend {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl EditBackend for HttpEditBackend {
    async fn process(&self, request: EditRequest) -> Result<EditResult, EditorError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| EditorError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EditorError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| EditorError::Request(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_camel_case() {
        let request = EditRequest {
            prompt: "remove the fence".to_string(),
            image: "aW1n".to_string(),
            mask: "bWFzaw==".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["prompt"], "remove the fence");
        assert_eq!(json["image"], "aW1n");
        assert_eq!(json["mask"], "bWFzaw==");
    }

    #[test]
    fn result_deserializes_from_proxy_response() {
        let json = r#"{ "base64Data": "aGVsbG8=", "mimeType": "image/png" }"#;
        let result: EditResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.base64_data, "aGVsbG8=");
        assert_eq!(result.mime_type, "image/png");
    }
}
