//! Unified error codes for the Feira marketplace
//!
//! Error codes are shared by the server and its HTTP clients and are
//! organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Catalog errors (stores, products, stock)
//! - 7xxx: Delivery errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values so clients can match on a
/// stable number instead of the (translatable) message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    /// Specific role required
    RoleRequired = 2002,
    /// Actor does not own the resource
    NotResourceOwner = 2006,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order has already been paid
    OrderAlreadyPaid = 4002,
    /// Order has already been completed
    OrderAlreadyCompleted = 4003,
    /// Order has no items
    OrderEmpty = 4007,
    /// Order status does not allow the requested transition
    InvalidOrderTransition = 4008,
    /// Order total must be positive
    OrderInvalidTotal = 4009,
    /// Buyer address on file is incomplete
    AddressIncomplete = 4010,
    /// Delivery confirmation code does not match
    ConfirmationCodeMismatch = 4011,
    /// Pickup code does not match
    PickupCodeMismatch = 4012,

    // ==================== 5xxx: Payment ====================
    /// Charge creation failed at the payment gateway
    PaymentFailed = 5001,
    /// Payment gateway did not answer in time
    PaymentTimeout = 5006,
    /// Order has no payment transaction attached
    PaymentNotInitiated = 5007,
    /// Webhook signature could not be verified
    WebhookSignatureInvalid = 5008,
    /// Simulation endpoints are disabled
    SimulationDisabled = 5009,

    // ==================== 6xxx: Catalog ====================
    /// Product not found
    ProductNotFound = 6001,
    /// Product stock is insufficient for the requested quantity
    ProductOutOfStock = 6003,
    /// Store not found
    StoreNotFound = 6101,

    // ==================== 7xxx: Delivery ====================
    /// Delivery not found
    DeliveryNotFound = 7001,
    /// Delivery was already claimed by another courier
    DeliveryAlreadyClaimed = 7002,
    /// Courier already has an active delivery
    CourierUnavailable = 7003,
    /// Store has no contracted courier
    NoContractedCourier = 7004,
    /// No courier is assigned to the delivery
    CourierNotAssigned = 7005,
    /// Delivery method not allowed for this operation
    InvalidDeliveryMethod = 7006,
    /// Referenced user is not a courier
    NotACourier = 7007,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the default message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",

            // Permission
            ErrorCode::RoleRequired => "Specific role is required",
            ErrorCode::NotResourceOwner => "Resource belongs to another user",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderAlreadyPaid => "Order has already been paid",
            ErrorCode::OrderAlreadyCompleted => "Order has already been completed",
            ErrorCode::OrderEmpty => "Order has no items",
            ErrorCode::InvalidOrderTransition => "Order status does not allow this operation",
            ErrorCode::OrderInvalidTotal => "Order total must be greater than zero",
            ErrorCode::AddressIncomplete => "Delivery address on file is incomplete",
            ErrorCode::ConfirmationCodeMismatch => "Invalid confirmation code",
            ErrorCode::PickupCodeMismatch => "Invalid pickup code",

            // Payment
            ErrorCode::PaymentFailed => "Failed to create PIX charge",
            ErrorCode::PaymentTimeout => "Payment gateway timed out",
            ErrorCode::PaymentNotInitiated => "Order has no payment transaction",
            ErrorCode::WebhookSignatureInvalid => "Webhook signature is invalid",
            ErrorCode::SimulationDisabled => "Simulation is disabled in this environment",

            // Catalog
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::ProductOutOfStock => "Insufficient stock",
            ErrorCode::StoreNotFound => "Store not found",

            // Delivery
            ErrorCode::DeliveryNotFound => "Delivery not found",
            ErrorCode::DeliveryAlreadyClaimed => "Delivery is no longer available",
            ErrorCode::CourierUnavailable => "Courier already has an active delivery",
            ErrorCode::NoContractedCourier => "Store has no contracted courier",
            ErrorCode::CourierNotAssigned => "No courier assigned to this delivery",
            ErrorCode::InvalidDeliveryMethod => "Invalid delivery method",
            ErrorCode::NotACourier => "User is not a registered courier",

            // System
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            8 => Ok(ErrorCode::ValueOutOfRange),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Permission
            2002 => Ok(ErrorCode::RoleRequired),
            2006 => Ok(ErrorCode::NotResourceOwner),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderAlreadyPaid),
            4003 => Ok(ErrorCode::OrderAlreadyCompleted),
            4007 => Ok(ErrorCode::OrderEmpty),
            4008 => Ok(ErrorCode::InvalidOrderTransition),
            4009 => Ok(ErrorCode::OrderInvalidTotal),
            4010 => Ok(ErrorCode::AddressIncomplete),
            4011 => Ok(ErrorCode::ConfirmationCodeMismatch),
            4012 => Ok(ErrorCode::PickupCodeMismatch),

            // Payment
            5001 => Ok(ErrorCode::PaymentFailed),
            5006 => Ok(ErrorCode::PaymentTimeout),
            5007 => Ok(ErrorCode::PaymentNotInitiated),
            5008 => Ok(ErrorCode::WebhookSignatureInvalid),
            5009 => Ok(ErrorCode::SimulationDisabled),

            // Catalog
            6001 => Ok(ErrorCode::ProductNotFound),
            6003 => Ok(ErrorCode::ProductOutOfStock),
            6101 => Ok(ErrorCode::StoreNotFound),

            // Delivery
            7001 => Ok(ErrorCode::DeliveryNotFound),
            7002 => Ok(ErrorCode::DeliveryAlreadyClaimed),
            7003 => Ok(ErrorCode::CourierUnavailable),
            7004 => Ok(ErrorCode::NoContractedCourier),
            7005 => Ok(ErrorCode::CourierNotAssigned),
            7006 => Ok(ErrorCode::InvalidDeliveryMethod),
            7007 => Ok(ErrorCode::NotACourier),

            // System
            9001 => Ok(ErrorCode::InternalError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::NotAuthenticated.code(), 1001);
        assert_eq!(ErrorCode::OrderNotFound.code(), 4001);
        assert_eq!(ErrorCode::PaymentFailed.code(), 5001);
        assert_eq!(ErrorCode::ProductOutOfStock.code(), 6003);
        assert_eq!(ErrorCode::DeliveryAlreadyClaimed.code(), 7002);
        assert_eq!(ErrorCode::InternalError.code(), 9001);
    }

    #[test]
    fn test_try_from_roundtrips_every_known_code() {
        let all = [
            ErrorCode::Success,
            ErrorCode::NotResourceOwner,
            ErrorCode::InvalidOrderTransition,
            ErrorCode::PickupCodeMismatch,
            ErrorCode::PaymentTimeout,
            ErrorCode::StoreNotFound,
            ErrorCode::NotACourier,
        ];
        for code in all {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
    }

    #[test]
    fn test_try_from_unknown_value() {
        assert_eq!(ErrorCode::try_from(4242), Err(InvalidErrorCode(4242)));
        assert_eq!(ErrorCode::try_from(6), Err(InvalidErrorCode(6)));
        // retired codes are not decoded
        for retired in [2, 3, 2001, 9002, 9005] {
            assert_eq!(ErrorCode::try_from(retired), Err(InvalidErrorCode(retired)));
        }
    }

    #[test]
    fn test_serializes_as_number() {
        let json = serde_json::to_string(&ErrorCode::DeliveryAlreadyClaimed).unwrap();
        assert_eq!(json, "7002");
        let code: ErrorCode = serde_json::from_str("4011").unwrap();
        assert_eq!(code, ErrorCode::ConfirmationCodeMismatch);
    }

    #[test]
    fn test_messages_are_not_empty() {
        assert_eq!(ErrorCode::OrderNotFound.message(), "Order not found");
        assert!(!ErrorCode::AddressIncomplete.message().is_empty());
        assert!(ErrorCode::Success.is_success());
        assert!(!ErrorCode::Unknown.is_success());
    }
}
