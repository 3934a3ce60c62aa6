//! Lifecycle enums for orders and deliveries
//!
//! All enums are persisted as lowercase snake_case strings (`as_db` /
//! `from_db`) and travel over the wire as SCREAMING_SNAKE_CASE.

use serde::{Deserialize, Serialize};

// ============================================================================
// Order Status
// ============================================================================

/// Order lifecycle state
///
/// ```text
/// PendingPayment ──webhook──▶ Processing ──route/dispatch──▶ Delivering ──confirm──▶ Completed
///                 (simulation starts here) ┘
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    PendingPayment,
    Processing,
    Delivering,
    Completed,
}

impl OrderStatus {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "pending_payment" => Some(Self::PendingPayment),
            "processing" => Some(Self::Processing),
            "delivering" => Some(Self::Delivering),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Processing => "processing",
            Self::Delivering => "delivering",
            Self::Completed => "completed",
        }
    }

    /// Human-readable label used in messages
    pub fn label(&self) -> &'static str {
        match self {
            Self::PendingPayment => "Pending Payment",
            Self::Processing => "Processing",
            Self::Delivering => "Delivering",
            Self::Completed => "Completed",
        }
    }

    /// The single state reachable from this one, if any
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::PendingPayment => Some(Self::Processing),
            Self::Processing => Some(Self::Delivering),
            Self::Delivering => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    /// Transitions only ever move one step forward.
    pub fn can_transition_to(&self, target: Self) -> bool {
        self.next() == Some(target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Delivery Method
// ============================================================================

/// How an order travels from the store to the buyer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryMethod {
    /// Not routed yet
    #[default]
    Unset,
    /// Seller delivers personally
    Seller,
    /// Store's pre-hired courier
    Contracted,
    /// Open claim queue for any available courier
    Marketplace,
}

impl DeliveryMethod {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "unset" => Some(Self::Unset),
            "seller" => Some(Self::Seller),
            "contracted" => Some(Self::Contracted),
            "marketplace" => Some(Self::Marketplace),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Seller => "seller",
            Self::Contracted => "contracted",
            Self::Marketplace => "marketplace",
        }
    }

    /// Methods that go through courier assignment
    pub fn is_courier_routed(&self) -> bool {
        matches!(self, Self::Contracted | Self::Marketplace)
    }
}

// ============================================================================
// Delivery Status
// ============================================================================

/// Transport leg state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Requested,
    Accepted,
    PickedUp,
    DeliveredConfirmed,
}

impl DeliveryStatus {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "requested" => Some(Self::Requested),
            "accepted" => Some(Self::Accepted),
            "picked_up" => Some(Self::PickedUp),
            "delivered_confirmed" => Some(Self::DeliveredConfirmed),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Accepted => "accepted",
            Self::PickedUp => "picked_up",
            Self::DeliveredConfirmed => "delivered_confirmed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_only_moves_forward() {
        use OrderStatus::*;
        assert!(PendingPayment.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Delivering));
        assert!(Delivering.can_transition_to(Completed));

        assert!(!PendingPayment.can_transition_to(Delivering));
        assert!(!Processing.can_transition_to(Completed));
        assert!(!Delivering.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(PendingPayment));
        assert!(!Processing.can_transition_to(Processing));
        assert!(Completed.is_terminal());
        assert_eq!(Completed.next(), None);
    }

    #[test]
    fn test_db_strings_roundtrip() {
        for s in [
            OrderStatus::PendingPayment,
            OrderStatus::Processing,
            OrderStatus::Delivering,
            OrderStatus::Completed,
        ] {
            assert_eq!(OrderStatus::from_db(s.as_db()), Some(s));
        }
        for m in [
            DeliveryMethod::Unset,
            DeliveryMethod::Seller,
            DeliveryMethod::Contracted,
            DeliveryMethod::Marketplace,
        ] {
            assert_eq!(DeliveryMethod::from_db(m.as_db()), Some(m));
        }
        assert_eq!(
            DeliveryStatus::from_db("picked_up"),
            Some(DeliveryStatus::PickedUp)
        );
        assert_eq!(OrderStatus::from_db("Pending Payment"), None);
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_string(&OrderStatus::PendingPayment).unwrap();
        assert_eq!(json, "\"PENDING_PAYMENT\"");
        let method: DeliveryMethod = serde_json::from_str("\"MARKETPLACE\"").unwrap();
        assert_eq!(method, DeliveryMethod::Marketplace);
        assert!(method.is_courier_routed());
        assert!(!DeliveryMethod::Seller.is_courier_routed());
    }
}
