use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use slimquest_db::EconomyError;
use slimquest_types::api::ErrorBody;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl From<EconomyError> for ApiError {
    fn from(err: EconomyError) -> Self {
        let msg = err.to_string();
        match err {
            EconomyError::UserNotFound | EconomyError::NotFound(_) => Self::NotFound(msg),
            EconomyError::NotOwner => Self::Forbidden(msg),
            EconomyError::AlreadyUsed | EconomyError::UsernameTaken => Self::Conflict(msg),
            EconomyError::InvalidAmount(_)
            | EconomyError::InsufficientCoins { .. }
            | EconomyError::OutOfStock
            | EconomyError::RewardInactive
            | EconomyError::UnknownAction(_) => Self::BadRequest(msg),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<EconomyError>() {
            Ok(economy) => economy.into(),
            Err(other) => Self::Internal(other),
        }
    }
}

// Malformed paths, query strings and bodies get the same JSON error body as
// other validation failures.
impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(e) => {
                error!("Request failed: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn economy_errors_survive_anyhow() {
        let err: ApiError = anyhow::Error::from(EconomyError::OutOfStock).into();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "reward is out of stock"));

        let err: ApiError = anyhow::Error::from(EconomyError::NotOwner).into();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

        let err: ApiError = anyhow::Error::from(EconomyError::UsernameTaken).into();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn other_errors_are_internal() {
        let err: ApiError = anyhow::anyhow!("disk on fire").into();
        assert!(matches!(err, ApiError::Internal(_)));
        assert_eq!(err.to_string(), "internal error");
    }
}
