use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use super::models::{BillingSchedule, BillingStatus, OverdueScheduleView};

/// key: billing-evaluator -> overdue aggregation
///
/// `schedules` must already be the tenant's active schedules ordered by due
/// date; the order is carried through to `overdue_schedules` untouched.
pub fn evaluate(schedules: &[BillingSchedule], now: DateTime<Utc>) -> BillingStatus {
    let overdue_schedules: Vec<OverdueScheduleView> = schedules
        .iter()
        .filter(|schedule| schedule.next_due_date < now)
        .map(|schedule| OverdueScheduleView {
            id: schedule.id.clone(),
            label: schedule.label.clone(),
            amount: schedule.amount,
            next_due_date: schedule.next_due_date,
            days_overdue: days_overdue(schedule.next_due_date, now),
        })
        .collect();

    let days_overdue = overdue_schedules
        .iter()
        .map(|view| view.days_overdue)
        .max()
        .unwrap_or(0);
    let total_overdue_amount = overdue_schedules
        .iter()
        .fold(Decimal::ZERO, |total, view| total + view.amount);

    BillingStatus {
        is_overdue: !overdue_schedules.is_empty(),
        days_overdue,
        overdue_schedules,
        total_overdue_amount,
    }
}

/// Whole days late, rounded up: one second past due already counts as a day.
pub fn days_overdue(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let elapsed = now - due;
    if elapsed <= Duration::zero() {
        return 0;
    }
    let whole_days = elapsed.num_days();
    if elapsed > Duration::days(whole_days) {
        whole_days + 1
    } else {
        whole_days
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::models::{BillingFrequency, BillingScheduleStatus};
    use chrono::TimeZone;

    fn schedule(id: &str, label: &str, amount: Decimal, due: DateTime<Utc>) -> BillingSchedule {
        BillingSchedule {
            id: id.to_string(),
            tenant_id: "T1".to_string(),
            label: label.to_string(),
            amount,
            frequency: BillingFrequency::Monthly,
            status: BillingScheduleStatus::Active,
            next_due_date: due,
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).single().unwrap()
    }

    #[test]
    fn tuition_overdue_bus_upcoming() {
        let now = fixed_now();
        let schedules = vec![
            schedule("s1", "Tuition", Decimal::new(500, 0), now - Duration::days(3)),
            schedule("s2", "Bus", Decimal::new(100, 0), now + Duration::days(1)),
        ];

        let status = evaluate(&schedules, now);

        assert!(status.is_overdue);
        assert_eq!(status.days_overdue, 3);
        assert_eq!(status.overdue_schedules.len(), 1);
        assert_eq!(status.overdue_schedules[0].label, "Tuition");
        assert_eq!(status.overdue_schedules[0].days_overdue, 3);
        assert_eq!(status.total_overdue_amount, Decimal::new(500, 0));
    }

    #[test]
    fn empty_input_is_all_zero() {
        assert_eq!(evaluate(&[], fixed_now()), BillingStatus::default());
    }

    #[test]
    fn due_exactly_now_is_not_overdue() {
        let now = fixed_now();
        let status = evaluate(&[schedule("s1", "Fees", Decimal::ONE, now)], now);
        assert!(!status.is_overdue);
        assert_eq!(status.days_overdue, 0);
        assert_eq!(status.total_overdue_amount, Decimal::ZERO);
    }

    #[test]
    fn day_count_rounds_up() {
        let now = fixed_now();
        assert_eq!(days_overdue(now - Duration::seconds(1), now), 1);
        assert_eq!(days_overdue(now - Duration::milliseconds(1), now), 1);
        assert_eq!(days_overdue(now - Duration::hours(24), now), 1);
        assert_eq!(
            days_overdue(now - Duration::hours(24) - Duration::seconds(1), now),
            2
        );
        assert_eq!(days_overdue(now + Duration::seconds(1), now), 0);
    }

    #[test]
    fn status_days_is_max_and_total_is_exact_sum() {
        let now = fixed_now();
        let schedules = vec![
            schedule("a", "Exam fee", Decimal::new(1999, 2), now - Duration::days(10)),
            schedule("b", "Library", Decimal::new(1, 2), now - Duration::hours(30)),
            schedule("c", "Lab", Decimal::new(3333, 3), now - Duration::minutes(5)),
        ];

        let status = evaluate(&schedules, now);

        let per_schedule: Vec<i64> = status
            .overdue_schedules
            .iter()
            .map(|view| view.days_overdue)
            .collect();
        assert_eq!(per_schedule, vec![10, 2, 1]);
        assert_eq!(status.days_overdue, 10);
        assert_eq!(status.total_overdue_amount, Decimal::new(23333, 3));
        let ids: Vec<&str> = status
            .overdue_schedules
            .iter()
            .map(|view| view.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
