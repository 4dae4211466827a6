use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{
    gamification::GamificationError,
    openai_api::OpenAiApiError,
    permissions::PermissionError,
    task_suggestion::TaskSuggestionError,
};
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Permission(#[from] PermissionError),
    #[error(transparent)]
    Gamification(#[from] GamificationError),
    #[error(transparent)]
    Suggestion(#[from] TaskSuggestionError),
    #[error(transparent)]
    OpenAi(#[from] OpenAiApiError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("missing or unknown user identity")]
    Unauthorized,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Database(sqlx::Error::RowNotFound) | ApiError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Database(_) | ApiError::Gamification(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Permission(_) => StatusCode::FORBIDDEN,
            ApiError::Suggestion(
                TaskSuggestionError::ProjectNotFound | TaskSuggestionError::BatchNotFound,
            ) => StatusCode::NOT_FOUND,
            ApiError::Suggestion(TaskSuggestionError::NotCompleted) => StatusCode::CONFLICT,
            ApiError::Suggestion(TaskSuggestionError::OpenAiApi(e)) => openai_status(e),
            ApiError::Suggestion(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::OpenAi(e) => openai_status(e),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

fn openai_status(e: &OpenAiApiError) -> StatusCode {
    match e {
        // A key problem is ours to fix; everything else is the upstream API.
        OpenAiApiError::NoApiKey | OpenAiApiError::KeyRejected => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = %status, error = %self, "Request failed");
        }
        (status, Json(ApiResponse::<()>::error(self.to_string()))).into_response()
    }
}
