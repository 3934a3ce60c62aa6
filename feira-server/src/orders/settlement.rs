//! Fee split applied when a delivery is confirmed
//!
//! | Method                | Seller                          | Courier     |
//! |-----------------------|---------------------------------|-------------|
//! | Seller / Contracted   | total − fee                     | 0           |
//! | Marketplace (courier) | total − fee − courier fee       | courier fee |
//!
//! `fee = total × marketplace_fee_rate`, rounded to cents (half away from zero).

use rust_decimal::{Decimal, RoundingStrategy};
use shared::order::DeliveryMethod;

/// Configurable fee constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    pub marketplace_fee_rate: Decimal,
    pub courier_fee: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            marketplace_fee_rate: Decimal::new(5, 2),
            courier_fee: Decimal::new(500, 2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub marketplace_fee: Decimal,
    pub seller_earnings: Decimal,
    pub courier_earnings: Decimal,
}

fn cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

impl FeeSchedule {
    pub fn settle(&self, total: Decimal, method: DeliveryMethod, courier_assigned: bool) -> Settlement {
        let marketplace_fee = cents(total * self.marketplace_fee_rate);
        let courier_earnings = if method == DeliveryMethod::Marketplace && courier_assigned {
            cents(self.courier_fee)
        } else {
            Decimal::ZERO
        };
        // Tiny orders cannot push the seller into debt
        let seller_earnings = (cents(total) - marketplace_fee - courier_earnings).max(Decimal::ZERO);

        Settlement {
            marketplace_fee,
            seller_earnings,
            courier_earnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_marketplace_split() {
        let s = FeeSchedule::default().settle(dec("100.00"), DeliveryMethod::Marketplace, true);
        assert_eq!(s.courier_earnings, dec("5.00"));
        assert_eq!(s.seller_earnings, dec("90.00"));
        assert_eq!(s.marketplace_fee, dec("5.00"));
    }

    #[test]
    fn test_fifty_marketplace() {
        let s = FeeSchedule::default().settle(dec("50.00"), DeliveryMethod::Marketplace, true);
        assert_eq!(s.marketplace_fee, dec("2.50"));
        assert_eq!(s.seller_earnings, dec("42.50"));
        assert_eq!(s.courier_earnings, dec("5.00"));
    }

    #[test]
    fn test_seller_and_contracted_pay_no_courier_fee() {
        let fees = FeeSchedule::default();
        for method in [DeliveryMethod::Seller, DeliveryMethod::Contracted] {
            let s = fees.settle(dec("80.00"), method, true);
            assert_eq!(s.courier_earnings, Decimal::ZERO);
            assert_eq!(s.seller_earnings, dec("76.00"));
        }
    }

    #[test]
    fn test_marketplace_without_courier_pays_no_fee() {
        let s = FeeSchedule::default().settle(dec("20.00"), DeliveryMethod::Marketplace, false);
        assert_eq!(s.courier_earnings, Decimal::ZERO);
        assert_eq!(s.seller_earnings, dec("19.00"));
    }

    #[test]
    fn test_fee_rounds_half_away_from_zero() {
        // 10.10 * 0.05 = 0.505
        let s = FeeSchedule::default().settle(dec("10.10"), DeliveryMethod::Seller, false);
        assert_eq!(s.marketplace_fee, dec("0.51"));
        assert_eq!(s.seller_earnings, dec("9.59"));
    }

    #[test]
    fn test_seller_never_negative() {
        let s = FeeSchedule::default().settle(dec("3.00"), DeliveryMethod::Marketplace, true);
        assert_eq!(s.seller_earnings, Decimal::ZERO);
        assert_eq!(s.courier_earnings, dec("5.00"));
    }

    #[test]
    fn test_custom_schedule() {
        let fees = FeeSchedule {
            marketplace_fee_rate: dec("0.10"),
            courier_fee: dec("7.50"),
        };
        let s = fees.settle(dec("100"), DeliveryMethod::Marketplace, true);
        assert_eq!(s.marketplace_fee, dec("10.00"));
        assert_eq!(s.courier_earnings, dec("7.50"));
        assert_eq!(s.seller_earnings, dec("82.50"));
    }
}
