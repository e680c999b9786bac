use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// key: billing-frequency -> rollover cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingFrequency {
    OneTime,
    Monthly,
    Yearly,
}

impl BillingFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingFrequency::OneTime => "ONE_TIME",
            BillingFrequency::Monthly => "MONTHLY",
            BillingFrequency::Yearly => "YEARLY",
        }
    }
}

impl FromStr for BillingFrequency {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ONE_TIME" => Ok(BillingFrequency::OneTime),
            "MONTHLY" => Ok(BillingFrequency::Monthly),
            "YEARLY" => Ok(BillingFrequency::Yearly),
            other => Err(UnknownVariant {
                kind: "frequency",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingScheduleStatus {
    Active,
    Inactive,
}

impl BillingScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingScheduleStatus::Active => "ACTIVE",
            BillingScheduleStatus::Inactive => "INACTIVE",
        }
    }
}

impl FromStr for BillingScheduleStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ACTIVE" => Ok(BillingScheduleStatus::Active),
            "INACTIVE" => Ok(BillingScheduleStatus::Inactive),
            other => Err(UnknownVariant {
                kind: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// Raised when a stored enum column holds a value this build does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown billing schedule {kind} `{value}`")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// key: billing-schedule-model -> tenant obligation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingSchedule {
    pub id: String,
    pub tenant_id: String,
    pub label: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub frequency: BillingFrequency,
    pub status: BillingScheduleStatus,
    pub next_due_date: DateTime<Utc>,
}

impl BillingSchedule {
    pub fn is_active(&self) -> bool {
        self.status == BillingScheduleStatus::Active
    }
}

/// key: billing-overdue-view -> one late schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueScheduleView {
    pub id: String,
    pub label: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub next_due_date: DateTime<Utc>,
    pub days_overdue: i64,
}

/// key: billing-status -> evaluator output, cached per tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingStatus {
    pub is_overdue: bool,
    pub days_overdue: i64,
    pub overdue_schedules: Vec<OverdueScheduleView>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_overdue_amount: Decimal,
}

impl Default for BillingStatus {
    fn default() -> Self {
        Self {
            is_overdue: false,
            days_overdue: 0,
            overdue_schedules: Vec::new(),
            total_overdue_amount: Decimal::ZERO,
        }
    }
}

/// Partial update applied to a schedule by billing administrators.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleUpdate {
    #[serde(default)]
    pub next_due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<BillingScheduleStatus>,
}

impl ScheduleUpdate {
    pub fn is_empty(&self) -> bool {
        self.next_due_date.is_none() && self.status.is_none()
    }
}

impl fmt::Display for BillingFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for BillingScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
