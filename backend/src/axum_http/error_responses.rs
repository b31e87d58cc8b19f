use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::config::{config_loader, stage::Stage};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_devices: Option<i32>,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("device limit reached")]
    DeviceLimitReached { max_devices: i32 },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::rejected(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::rejected(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::rejected(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::rejected(StatusCode::NOT_FOUND, message)
    }

    pub fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        AppError::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Rejected { status, .. } => *status,
            AppError::DeviceLimitReached { .. } => StatusCode::FORBIDDEN,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_body(self, stage: Stage) -> ErrorResponse {
        match self {
            AppError::Rejected { message, .. } => ErrorResponse {
                error: message,
                details: None,
                max_devices: None,
            },
            AppError::DeviceLimitReached { max_devices } => ErrorResponse {
                error: "Достигнут лимит устройств".to_string(),
                details: None,
                max_devices: Some(max_devices),
            },
            AppError::Internal(err) => ErrorResponse {
                error: "Внутренняя ошибка сервера".to_string(),
                details: (stage != Stage::Production).then(|| format!("{err:#}")),
                max_devices: None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.into_body(config_loader::get_stage());

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_details_are_hidden_in_production() {
        let body = AppError::Internal(anyhow::anyhow!("pool timed out")).into_body(Stage::Production);

        assert!(body.details.is_none());
        assert_eq!(body.error, "Внутренняя ошибка сервера");
    }

    #[test]
    fn internal_details_are_shown_outside_production() {
        let body = AppError::Internal(anyhow::anyhow!("pool timed out")).into_body(Stage::Local);

        assert_eq!(body.details.as_deref(), Some("pool timed out"));
    }

    #[test]
    fn device_limit_carries_max_devices() {
        let err = AppError::DeviceLimitReached { max_devices: 2 };

        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.into_body(Stage::Local).max_devices, Some(2));
    }
}
