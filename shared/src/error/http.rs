//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::OrderNotFound
            | Self::ProductNotFound
            | Self::StoreNotFound
            | Self::DeliveryNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict (state-machine preconditions, lost races)
            Self::OrderAlreadyPaid
            | Self::OrderAlreadyCompleted
            | Self::InvalidOrderTransition
            | Self::ConfirmationCodeMismatch
            | Self::ProductOutOfStock
            | Self::DeliveryAlreadyClaimed
            | Self::CourierUnavailable
            | Self::CourierNotAssigned => StatusCode::CONFLICT,

            // 401 Unauthorized
            Self::NotAuthenticated | Self::TokenExpired | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }

            // 403 Forbidden
            Self::RoleRequired
            | Self::NotResourceOwner
            | Self::SimulationDisabled => StatusCode::FORBIDDEN,

            // 402 Payment Required (charge could not be created)
            Self::PaymentFailed | Self::PaymentTimeout => StatusCode::PAYMENT_REQUIRED,

            // 500 Internal Server Error
            Self::InternalError | Self::Unknown => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (default for validation errors)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
