//! Defines the `ApiError` type returned by every API handler: an HTTP
//! status plus a message, rendered as the uniform `{"errorMsg": ...}`
//! envelope. `From` impls exist for the backing `ServiceError` taxonomy and
//! the model parse errors, so handlers can lean on `?` throughout.

use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
#[error("status: {status}, error: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> ApiError {
        ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> ApiError {
        ApiError::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> ApiError {
        ApiError::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> ApiError {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// The router's uniform no-match rejection: a client error, not a 404,
    /// so a malformed request is distinguishable from an absent resource.
    pub fn wrong_path(method: &axum::http::Method, path: &str) -> ApiError {
        ApiError::bad_request(format!("Wrong path {method} {path}"))
    }
}

impl From<services::ServiceError> for ApiError {
    fn from(err: services::ServiceError) -> ApiError {
        use services::ServiceError;
        match err {
            ServiceError::NotFound(msg) => ApiError::not_found(msg),
            ServiceError::BadArgument(msg) => ApiError::bad_request(format!("Bad arguments: {msg}")),
            ServiceError::Internal(msg) => ApiError::internal(msg),
        }
    }
}

impl From<models::InvalidEnum> for ApiError {
    fn from(err: models::InvalidEnum) -> ApiError {
        ApiError::bad_request(err.to_string())
    }
}

impl From<models::tags::InvalidTag> for ApiError {
    fn from(err: models::tags::InvalidTag) -> ApiError {
        ApiError::bad_request(err.to_string())
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let message = if self.message.trim().is_empty() {
            "No details".to_string()
        } else {
            self.message
        };
        (
            self.status,
            axum::Json(serde_json::json!({ "errorMsg": message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn blank_messages_are_substituted() {
        let response =
            axum::response::IntoResponse::into_response(ApiError::internal("  "));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn service_errors_map_onto_the_taxonomy() {
        let err: ApiError = services::ServiceError::not_found("missing").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err: ApiError = services::ServiceError::bad_argument("nope").into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Bad arguments: nope");

        let err: ApiError = services::ServiceError::internal("boom").into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
