use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetail {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub code: String,
    pub request_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("Gemini API key is not configured")]
    MissingApiKey,

    #[error("upstream error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("no image data in upstream response")]
    NoImageData,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Client-visible mapping. Server-side detail for 5xx variants stays in
    /// the logs; the serialized body carries only generic text.
    pub fn to_problem_detail(&self, request_id: &str) -> ProblemDetail {
        let (status, code, title, detail) = match self {
            AppError::Validation(detail) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Validation Error",
                detail.clone(),
            ),
            AppError::MissingApiKey | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal Error",
                "Internal Server Error".to_string(),
            ),
            AppError::Upstream { .. } => (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_ERROR",
                "Upstream Error",
                "The generative service failed to process the request".to_string(),
            ),
            AppError::NoImageData => (
                StatusCode::BAD_GATEWAY,
                "NO_IMAGE_DATA",
                "No Image Data",
                "No image data received from the generative service".to_string(),
            ),
        };

        ProblemDetail {
            problem_type: format!("https://retouch.dev/problems/{}", code.to_lowercase()),
            title: title.to_string(),
            status: status.as_u16(),
            detail,
            code: code.to_string(),
            request_id: request_id.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Every error funnels through here. Server errors keep their full
        // Display form in the log; the response body stays generic.
        if !matches!(self, AppError::Validation(_)) {
            tracing::error!(error = %self, "request failed");
        }

        // The request_id_middleware overwrites this header after the handler,
        // so the canonical id wins once the middleware runs.
        let request_id = uuid::Uuid::new_v4().to_string();
        let problem = self.to_problem_detail(&request_id);
        let status =
            StatusCode::from_u16(problem.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = (status, Json(problem)).into_response();
        response
            .headers_mut()
            .insert("X-Request-Id", request_id.parse().unwrap());
        response
            .headers_mut()
            .insert("Content-Type", "application/problem+json".parse().unwrap());
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400_with_field_names() {
        let err = AppError::Validation("missing required field(s): prompt, image".to_string());
        let problem = err.to_problem_detail("req-1");
        assert_eq!(problem.status, 400);
        assert!(problem.detail.contains("prompt"));
        assert!(problem.detail.contains("image"));
        assert_eq!(problem.request_id, "req-1");
    }

    #[test]
    fn missing_key_body_never_mentions_the_credential() {
        let problem = AppError::MissingApiKey.to_problem_detail("req-2");
        assert_eq!(problem.status, 500);
        let body = serde_json::to_string(&problem).unwrap().to_lowercase();
        assert!(!body.contains("key"));
        assert!(!body.contains("credential"));
        assert!(!body.contains("gemini"));
    }

    #[test]
    fn upstream_body_is_not_leaked() {
        let err = AppError::Upstream {
            status: 403,
            body: "API key expired: AIza-secret".to_string(),
        };
        let problem = err.to_problem_detail("req-3");
        assert_eq!(problem.status, 502);
        assert!(!problem.detail.contains("AIza"));
        assert!(!problem.detail.contains("expired"));
    }

    #[test]
    fn no_image_data_names_the_condition() {
        let problem = AppError::NoImageData.to_problem_detail("req-4");
        assert_eq!(problem.status, 502);
        assert!(problem.detail.contains("No image data"));
    }
}
