//! Period-bounded order summaries for the back-office dashboard.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::errors::ServiceError;
use crate::models::order::fallback_status_label;
use crate::models::{Order, PaymentMethod, PaymentStatus};
use crate::repositories::OrderStore;

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReportPeriod {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Custom,
}

impl ReportPeriod {
    pub fn label(self) -> &'static str {
        match self {
            ReportPeriod::Daily => "Today",
            ReportPeriod::Weekly => "This Week",
            ReportPeriod::Monthly => "This Month",
            ReportPeriod::Yearly => "This Year",
            ReportPeriod::Custom => "Custom Range",
        }
    }

    /// Inclusive `[start, end]` bounds of the period containing `now`. Weeks start on
    /// Monday. For `Custom`, missing dates default to today.
    pub fn bounds(
        self,
        now: DateTime<Utc>,
        custom_start: Option<NaiveDate>,
        custom_end: Option<NaiveDate>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), ServiceError> {
        let today = now.date_naive();
        let (first, last) = match self {
            ReportPeriod::Daily => (today, today),
            ReportPeriod::Weekly => {
                let monday =
                    today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
                (monday, monday + Duration::days(6))
            }
            ReportPeriod::Monthly => {
                let first = today.with_day(1).ok_or_else(|| invalid_date(today))?;
                let next_month = if first.month() == 12 {
                    NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
                }
                .ok_or_else(|| invalid_date(first))?;
                (first, next_month - Duration::days(1))
            }
            ReportPeriod::Yearly => (
                NaiveDate::from_ymd_opt(today.year(), 1, 1).ok_or_else(|| invalid_date(today))?,
                NaiveDate::from_ymd_opt(today.year(), 12, 31).ok_or_else(|| invalid_date(today))?,
            ),
            ReportPeriod::Custom => {
                let start = custom_start.unwrap_or(today);
                let end = custom_end.unwrap_or(today);
                if end < start {
                    return Err(ServiceError::InvalidInput(format!(
                        "Report end date {} is before start date {}",
                        end, start
                    )));
                }
                (start, end)
            }
        };
        Ok((start_of_day(first), end_of_day(last)))
    }
}

fn invalid_date(date: NaiveDate) -> ServiceError {
    ServiceError::InternalError(format!("Could not compute report bounds for {}", date))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date) + Duration::days(1) - Duration::microseconds(1)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DailyStats {
    pub orders: u64,
    pub revenue: Decimal,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderReport {
    pub period: ReportPeriod,
    pub period_label: &'static str,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_orders: u64,
    pub total_revenue: Decimal,
    /// Keyed by `YYYY-MM-DD`, ascending.
    pub daily_stats: BTreeMap<String, DailyStats>,
    pub max_orders: u64,
    pub max_revenue: Decimal,
    pub rows: Vec<OrderExportRow>,
}

/// One line of the tabular export.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderExportRow {
    pub invoice_number: String,
    pub created_at: DateTime<Utc>,
    pub customer_name: String,
    pub status: String,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub total_amount: Decimal,
}

impl From<&Order> for OrderExportRow {
    fn from(order: &Order) -> Self {
        let status = match order.status {
            Some(_) => order.status_label(),
            None => fallback_status_label(&order.stored_status),
        };
        Self {
            invoice_number: order.invoice_number(),
            created_at: order.created_at,
            customer_name: order.customer_name.clone(),
            status,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            total_amount: order.total_amount,
        }
    }
}

/// Summarises orders (newest first) created inside the given bounds.
pub fn summarize(
    period: ReportPeriod,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    orders: &[Order],
) -> OrderReport {
    let mut daily_stats: BTreeMap<String, DailyStats> = BTreeMap::new();
    for order in orders {
        let day = daily_stats
            .entry(order.created_at.format("%Y-%m-%d").to_string())
            .or_default();
        day.orders += 1;
        day.revenue += order.total_amount;
    }

    let max_orders = daily_stats.values().map(|d| d.orders).max().unwrap_or(0);
    let max_revenue = daily_stats
        .values()
        .map(|d| d.revenue)
        .max()
        .unwrap_or(Decimal::ZERO);

    OrderReport {
        period,
        period_label: period.label(),
        start,
        end,
        total_orders: orders.len() as u64,
        total_revenue: orders.iter().map(|o| o.total_amount).sum(),
        daily_stats,
        max_orders,
        max_revenue,
        rows: orders.iter().map(OrderExportRow::from).collect(),
    }
}

#[derive(Clone)]
pub struct OrderReportService {
    store: Arc<dyn OrderStore>,
}

impl OrderReportService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn order_report(
        &self,
        period: ReportPeriod,
        now: DateTime<Utc>,
        custom_start: Option<NaiveDate>,
        custom_end: Option<NaiveDate>,
    ) -> Result<OrderReport, ServiceError> {
        let (start, end) = period.bounds(now, custom_start, custom_end)?;
        let orders = self.store.list_created_between(start, end).await?;
        let report = summarize(period, start, end, &orders);
        info!(
            total_orders = report.total_orders,
            total_revenue = %report.total_revenue,
            "Generated {} order report",
            period
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::order::test_support::order_with_status;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[rstest]
    #[case(ReportPeriod::Daily, (2024, 2, 14), (2024, 2, 14))]
    #[case(ReportPeriod::Weekly, (2024, 2, 12), (2024, 2, 18))]
    #[case(ReportPeriod::Monthly, (2024, 2, 1), (2024, 2, 29))]
    #[case(ReportPeriod::Yearly, (2024, 1, 1), (2024, 12, 31))]
    fn period_bounds_cover_whole_days(
        #[case] period: ReportPeriod,
        #[case] first: (i32, u32, u32),
        #[case] last: (i32, u32, u32),
    ) {
        // Wednesday
        let now = at(2024, 2, 14, 15);
        let (start, end) = period.bounds(now, None, None).unwrap();
        assert_eq!(start, at(first.0, first.1, first.2, 0));
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(last.0, last.1, last.2).unwrap());
        assert_eq!(end + Duration::microseconds(1), start_of_day(end.date_naive() + Duration::days(1)));
    }

    #[test]
    fn custom_range_rejects_inverted_dates() {
        let now = at(2024, 2, 14, 15);
        let start = NaiveDate::from_ymd_opt(2024, 3, 1);
        let end = NaiveDate::from_ymd_opt(2024, 2, 1);
        assert_matches!(
            ReportPeriod::Custom.bounds(now, start, end),
            Err(ServiceError::InvalidInput(_))
        );
    }

    #[test]
    fn december_month_rolls_into_next_year() {
        let (_, end) = ReportPeriod::Monthly
            .bounds(at(2023, 12, 5, 9), None, None)
            .unwrap();
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn summary_groups_by_day() {
        let mut a = order_with_status("completed");
        a.created_at = at(2024, 2, 13, 10);
        a.total_amount = dec!(150.00);
        let mut b = order_with_status("pending");
        b.id = 2;
        b.created_at = at(2024, 2, 14, 8);
        b.total_amount = dec!(40.50);
        let mut c = order_with_status("on_hold");
        c.id = 3;
        c.created_at = at(2024, 2, 14, 9);
        c.total_amount = dec!(9.50);

        let report = summarize(
            ReportPeriod::Weekly,
            at(2024, 2, 12, 0),
            at(2024, 2, 18, 23),
            &[c, b, a],
        );
        assert_eq!(report.total_orders, 3);
        assert_eq!(report.total_revenue, dec!(200.00));
        assert_eq!(report.daily_stats.len(), 2);
        assert_eq!(report.daily_stats["2024-02-14"].orders, 2);
        assert_eq!(report.daily_stats["2024-02-14"].revenue, dec!(50.00));
        assert_eq!(report.max_orders, 2);
        assert_eq!(report.max_revenue, dec!(150.00));
        assert_eq!(report.period_label, "This Week");
        assert_eq!(report.rows[0].status, "On hold");
        assert_eq!(report.rows[0].invoice_number, "RMP-10002");
    }
}
