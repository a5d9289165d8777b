// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Journal Vault

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::service::JournalError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn payment_required(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYMENT_REQUIRED, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<JournalError> for ApiError {
    fn from(e: JournalError) -> Self {
        match &e {
            JournalError::Validation(_) => Self::unprocessable(e.to_string()),
            JournalError::InsufficientCredits { .. } => Self::payment_required(e.to_string()),
            JournalError::EntryNotFound => Self::not_found(e.to_string()),
            JournalError::UnknownUser(_) => Self::not_found(e.to_string()),
            // Uniform message whatever the cause; the envelope tells nobody why.
            JournalError::DecryptionFailure => Self::internal(e.to_string()),
            JournalError::Worker => Self::internal("internal error"),
            JournalError::Storage(inner) => {
                tracing::error!(error = %inner, "storage failure");
                Self::internal("storage failure; the request may be retried")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
