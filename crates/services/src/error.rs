/// Error taxonomy of every backing-service operation.
///
/// `NotFound` and `BadArgument` are contract outcomes the handlers map to
/// 404/400 responses; `Internal` covers everything else and surfaces as a
/// 500 with the service's message.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadArgument(String),
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(msg: impl Into<String>) -> ServiceError {
        ServiceError::NotFound(msg.into())
    }

    pub fn bad_argument(msg: impl Into<String>) -> ServiceError {
        ServiceError::BadArgument(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> ServiceError {
        ServiceError::Internal(msg.into())
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> ServiceError {
        ServiceError::Internal(format!("{err:#}"))
    }
}
