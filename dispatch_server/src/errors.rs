use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use dispatch_engine::DispatchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    /// The request lost a race, or collides with the current state of the record.
    #[error("Conflict. {0}")]
    Conflict(String),
    #[error("The request cannot be applied. {0}")]
    Unprocessable(String),
    #[error("A storage service is temporarily unavailable. {0}")]
    ServiceUnavailable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::BAD_REQUEST,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("No bearer token was provided.")]
    MissingToken,
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Access token signature is invalid. {0}")]
    ValidationError(String),
    #[error("Access token has expired.")]
    TokenExpired,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
}

impl From<DispatchError> for ServerError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::LockContention(_) |
            DispatchError::PreconditionFailed(_) |
            DispatchError::OrderAlreadyExists(_) |
            DispatchError::NoPendingOffer { .. } |
            DispatchError::OrderNotAssignable(..) => Self::Conflict(e.to_string()),
            DispatchError::AuthorizationDenied(_) => Self::InsufficientPermissions(e.to_string()),
            DispatchError::TransientStoreFailure(_) => Self::ServiceUnavailable(e.to_string()),
            DispatchError::InvalidTransition { .. } |
            DispatchError::UnsupportedStatusChange(_) |
            DispatchError::VendorNotEligible(..) => Self::Unprocessable(e.to_string()),
            DispatchError::OrderNotFound(_) | DispatchError::VendorNotFound(_) => Self::NoRecordFound(e.to_string()),
            DispatchError::InvalidSearchRadius(_) | DispatchError::InvalidLocation(_) => {
                Self::InvalidRequestBody(e.to_string())
            },
        }
    }
}

#[cfg(test)]
mod test {
    use dispatch_engine::db_types::OrderStatusType;

    use super::*;

    #[test]
    fn dispatch_errors_map_to_status_codes() {
        let code = |e: DispatchError| ServerError::from(e).status_code();
        assert_eq!(code(DispatchError::LockContention("1".into())), StatusCode::CONFLICT);
        assert_eq!(code(DispatchError::PreconditionFailed("gone".into())), StatusCode::CONFLICT);
        assert_eq!(code(DispatchError::AuthorizationDenied("no".into())), StatusCode::FORBIDDEN);
        assert_eq!(code(DispatchError::TransientStoreFailure("down".into())), StatusCode::SERVICE_UNAVAILABLE);
        let invalid = DispatchError::InvalidTransition {
            current: OrderStatusType::Completed,
            attempted: OrderStatusType::InProgress,
        };
        assert_eq!(code(invalid), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code(DispatchError::OrderNotFound("1".into())), StatusCode::NOT_FOUND);
        assert_eq!(code(DispatchError::InvalidSearchRadius(-1.0)), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn error_bodies_are_json() {
        let res = ServerError::NoRecordFound("Order 1".into()).error_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.headers().get("content-type").unwrap(), "application/json");
    }
}
