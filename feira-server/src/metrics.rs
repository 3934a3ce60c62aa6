//! Seller and courier performance figures over completed deliveries

use shared::models::Role;
use shared::order::{CourierMetrics, DeliveryMethod, DurationStats, SellerMetrics};

use crate::auth::CurrentActor;
use crate::error::ServiceResult;
use crate::orders::FeeSchedule;
use crate::store::{DeliveryTiming, MarketStore};

const NOT_AVAILABLE: &str = "N/A";

/// `"1h 2m 3s"`, dropping zero units; `"0s"` for sub-second spans.
pub fn format_duration(millis: i64) -> String {
    let total = millis.max(0) / 1000;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    let mut parts = Vec::with_capacity(3);
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}

fn average(samples: &[i64]) -> Option<i64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<i64>() / samples.len() as i64)
}

fn format_opt(millis: Option<i64>) -> String {
    millis.map_or_else(|| NOT_AVAILABLE.to_string(), format_duration)
}

pub fn stats(samples: &[i64]) -> DurationStats {
    DurationStats {
        avg: format_opt(average(samples)),
        min: format_opt(samples.iter().min().copied()),
        max: format_opt(samples.iter().max().copied()),
    }
}

/// `to - from` for every timing that has both ends (negative spans dropped).
fn spans(
    timings: &[DeliveryTiming],
    from: impl Fn(&DeliveryTiming) -> Option<i64>,
    to: impl Fn(&DeliveryTiming) -> Option<i64>,
) -> Vec<i64> {
    timings
        .iter()
        .filter_map(|t| Some(to(t)? - from(t)?))
        .filter(|d| *d >= 0)
        .collect()
}

pub async fn seller_metrics(
    store: &dyn MarketStore,
    fees: FeeSchedule,
    actor: &CurrentActor,
) -> ServiceResult<SellerMetrics> {
    actor.require_role(Role::Seller)?;
    let timings = store.seller_timings(actor.user_id).await?;

    let packing = spans(&timings, |t| Some(t.order_created_at), |t| t.packing_started_at);
    let self_delivered: Vec<DeliveryTiming> = timings
        .iter()
        .filter(|t| t.method == DeliveryMethod::Seller)
        .copied()
        .collect();
    let self_delivery = spans(&self_delivered, |t| t.packing_started_at, |t| t.delivered_at);

    Ok(SellerMetrics {
        pending_balance: actor.pending_balance,
        completed_orders: timings.len(),
        avg_packing_time: format_opt(average(&packing)),
        self_delivery: stats(&self_delivery),
        marketplace_fee_rate: fees.marketplace_fee_rate,
        courier_fee: fees.courier_fee,
    })
}

pub async fn courier_metrics(
    store: &dyn MarketStore,
    actor: &CurrentActor,
) -> ServiceResult<CourierMetrics> {
    actor.require_role(Role::Courier)?;
    let timings = store.courier_timings(actor.user_id).await?;

    let delivery = spans(&timings, |t| t.picked_up_at, |t| t.delivered_at);
    let pickup = spans(&timings, |t| t.packing_started_at, |t| t.picked_up_at);

    Ok(CourierMetrics {
        pending_balance: actor.pending_balance,
        completed_deliveries: timings.len(),
        delivery_time: stats(&delivery),
        avg_pickup_speed: format_opt(average(&pickup)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(999), "0s");
        assert_eq!(format_duration(59_000), "59s");
        assert_eq!(format_duration(3_600_000), "1h");
        assert_eq!(format_duration(3_723_000), "1h 2m 3s");
        assert_eq!(format_duration(3_605_000), "1h 5s");
    }

    #[test]
    fn test_stats_empty() {
        let s = stats(&[]);
        assert_eq!(s.avg, "N/A");
        assert_eq!(s.min, "N/A");
        assert_eq!(s.max, "N/A");
    }

    #[test]
    fn test_stats_values() {
        let s = stats(&[60_000, 120_000, 180_000]);
        assert_eq!(s.avg, "2m");
        assert_eq!(s.min, "1m");
        assert_eq!(s.max, "3m");
    }

    #[test]
    fn test_spans_skip_missing_and_negative() {
        let timings = [
            DeliveryTiming {
                method: DeliveryMethod::Marketplace,
                order_created_at: 0,
                packing_started_at: Some(1_000),
                picked_up_at: Some(5_000),
                delivered_at: Some(65_000),
            },
            DeliveryTiming {
                method: DeliveryMethod::Marketplace,
                order_created_at: 0,
                packing_started_at: None,
                picked_up_at: Some(9_000),
                delivered_at: Some(1_000),
            },
        ];
        assert_eq!(spans(&timings, |t| t.picked_up_at, |t| t.delivered_at), vec![60_000]);
        assert_eq!(spans(&timings, |t| t.packing_started_at, |t| t.picked_up_at), vec![4_000]);
    }
}
