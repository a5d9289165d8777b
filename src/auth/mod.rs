// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Journal Vault

//! Caller identity resolution.
//!
//! Authentication is out of scope for this service: the gateway in front of
//! it verifies credentials and forwards the resolved numeric user id in the
//! `x-user-id` header. The extractor here only parses that header; the
//! core trusts it.
//!
//! Use the `Identity` extractor in handlers:
//!
//! ```rust,ignore
//! async fn my_handler(Identity(owner_id): Identity) -> impl IntoResponse {
//!     // owner_id is the authenticated caller's user id
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Header carrying the upstream-resolved user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor for the authenticated caller's user id.
pub struct Identity(pub u64);

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("missing {USER_ID_HEADER} header")]
    Missing,

    #[error("invalid {USER_ID_HEADER} header")]
    Invalid,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = IdentityError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(IdentityError::Missing)?
            .to_str()
            .map_err(|_| IdentityError::Invalid)?;

        let user_id: u64 = header.trim().parse().map_err(|_| IdentityError::Invalid)?;
        Ok(Identity(user_id))
    }
}
