use chrono::{DateTime, Months, Utc};

use super::models::{BillingFrequency, BillingSchedule, BillingScheduleStatus};

/// Next due date after one period is paid. Month arithmetic clamps to the
/// last day of shorter months (Jan 31 -> Feb 28/29).
pub fn next_due_date(
    frequency: BillingFrequency,
    current: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match frequency {
        BillingFrequency::OneTime => None,
        BillingFrequency::Monthly => current.checked_add_months(Months::new(1)),
        BillingFrequency::Yearly => current.checked_add_months(Months::new(12)),
    }
}

/// key: billing-rollover -> schedule state after a settled payment
///
/// Recurring schedules move forward by one period; one-time schedules are
/// retired and keep their last due date.
pub fn settle(schedule: &BillingSchedule) -> BillingSchedule {
    let mut settled = schedule.clone();
    match next_due_date(schedule.frequency, schedule.next_due_date) {
        Some(next) => settled.next_due_date = next,
        None => settled.status = BillingScheduleStatus::Inactive,
    }
    settled
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).single().unwrap()
    }

    fn schedule(frequency: BillingFrequency, due: DateTime<Utc>) -> BillingSchedule {
        BillingSchedule {
            id: "sched-1".into(),
            tenant_id: "T1".into(),
            label: "Tuition".into(),
            amount: Decimal::new(50000, 2),
            frequency,
            status: BillingScheduleStatus::Active,
            next_due_date: due,
        }
    }

    #[test]
    fn monthly_clamps_to_month_end() {
        assert_eq!(
            next_due_date(BillingFrequency::Monthly, at(2024, 1, 31)),
            Some(at(2024, 2, 29))
        );
        assert_eq!(
            next_due_date(BillingFrequency::Monthly, at(2023, 1, 31)),
            Some(at(2023, 2, 28))
        );
        assert_eq!(
            next_due_date(BillingFrequency::Monthly, at(2023, 12, 15)),
            Some(at(2024, 1, 15))
        );
    }

    #[test]
    fn yearly_moves_twelve_months() {
        assert_eq!(
            next_due_date(BillingFrequency::Yearly, at(2024, 2, 29)),
            Some(at(2025, 2, 28))
        );
    }

    #[test]
    fn one_time_schedule_is_retired() {
        let original = schedule(BillingFrequency::OneTime, at(2024, 5, 1));
        let settled = settle(&original);
        assert_eq!(settled.status, BillingScheduleStatus::Inactive);
        assert_eq!(settled.next_due_date, original.next_due_date);
    }

    #[test]
    fn recurring_schedule_stays_active() {
        let settled = settle(&schedule(BillingFrequency::Monthly, at(2024, 5, 1)));
        assert_eq!(settled.status, BillingScheduleStatus::Active);
        assert_eq!(settled.next_due_date, at(2024, 6, 1));
    }
}
