//! Marketplace user model

use serde::{Deserialize, Serialize};

/// The single role a marketplace account acts as
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Buyer,
    Seller,
    Courier,
    Admin,
}

impl Role {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "buyer" => Some(Self::Buyer),
            "seller" => Some(Self::Seller),
            "courier" => Some(Self::Courier),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Seller => "seller",
            Self::Courier => "courier",
            Self::Admin => "admin",
        }
    }
}

/// Address fields as stored on a user profile (any may be missing)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct ProfileAddress {
    pub city_id: Option<i64>,
    pub district_id: Option<i64>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub nearby: Option<String>,
    pub contact_phone: Option<String>,
}

/// Address copied onto an order at creation time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressSnapshot {
    pub city_id: i64,
    pub district_id: i64,
    pub street: String,
    pub number: String,
    pub nearby: Option<String>,
    pub contact_phone: String,
}

impl ProfileAddress {
    /// Snapshot of the address, or `None` if a required field is missing.
    ///
    /// `nearby` is optional; blank strings count as missing.
    pub fn complete(&self) -> Option<AddressSnapshot> {
        fn filled(v: &Option<String>) -> Option<String> {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        }

        Some(AddressSnapshot {
            city_id: self.city_id?,
            district_id: self.district_id?,
            street: filled(&self.street)?,
            number: filled(&self.number)?,
            nearby: filled(&self.nearby),
            contact_phone: filled(&self.contact_phone)?,
        })
    }

    /// Names of the required fields that are missing
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
        let mut missing = Vec::new();
        if self.city_id.is_none() {
            missing.push("city_id");
        }
        if self.district_id.is_none() {
            missing.push("district_id");
        }
        if blank(&self.street) {
            missing.push("street");
        }
        if blank(&self.number) {
            missing.push("number");
        }
        if blank(&self.contact_phone) {
            missing.push("contact_phone");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> ProfileAddress {
        ProfileAddress {
            city_id: Some(1),
            district_id: Some(2),
            street: Some("Rua das Flores".into()),
            number: Some("10".into()),
            nearby: None,
            contact_phone: Some("5511999990000".into()),
        }
    }

    #[test]
    fn test_complete_address_snapshot() {
        let snap = full().complete().unwrap();
        assert_eq!(snap.street, "Rua das Flores");
        assert_eq!(snap.nearby, None);
        assert!(full().missing_fields().is_empty());
    }

    #[test]
    fn test_blank_field_counts_as_missing() {
        let mut addr = full();
        addr.number = Some("   ".into());
        addr.city_id = None;
        assert!(addr.complete().is_none());
        assert_eq!(addr.missing_fields(), vec!["city_id", "number"]);
    }

    #[test]
    fn test_role_db_roundtrip() {
        for role in [Role::Buyer, Role::Seller, Role::Courier, Role::Admin] {
            assert_eq!(Role::from_db(role.as_db()), Some(role));
        }
        assert_eq!(Role::from_db("delivery_person"), None);
    }
}
