use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CropError {
    #[error("decode image: {0}")]
    Decode(image::ImageError),

    #[error("encode thumbnail: {0}")]
    Encode(image::ImageError),

    #[error("image dimensions are zero")]
    ZeroDimensions,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("analysis not found: {0}")]
    AnalysisNotFound(String),

    #[error("person not found: {0}")]
    PersonNotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("thumbnail: {0}")]
    Crop(#[from] CropError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::AnalysisNotFound(_) | ApiError::PersonNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Crop(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
