use chrono::NaiveDate;
use serde::Serialize;

use crate::schedule::PaymentCycle;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub course: String,
    pub enrolled_on: NaiveDate,
    #[serde(flatten)]
    pub cycle: PaymentCycle,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Creation input after defaults have been resolved by the caller.
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub course: String,
    pub enrolled_on: NaiveDate,
    pub last_payment: Option<NaiveDate>,
    pub classes_per_period: i64,
    pub weekly_frequency: i64,
    pub remaining_classes: Option<i64>,
}

/// `Some("")` clears an optional field; `None` leaves it alone.
#[derive(Debug, Clone, Default)]
pub struct StudentContactPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub course: Option<String>,
}

impl StudentContactPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none() && self.course.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub student_id: String,
    pub paid_on: NaiveDate,
    pub amount: f64,
    pub description: String,
    pub classes_per_period: i64,
    pub weekly_frequency: i64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub student_id: String,
    pub paid_on: NaiveDate,
    pub amount: f64,
    pub description: String,
    pub classes_per_period: i64,
    pub weekly_frequency: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWithStudent {
    #[serde(flatten)]
    pub payment: Payment,
    pub student_name: String,
    pub course: String,
}

/// Trims and maps blank strings to `None`.
pub fn clean_optional(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
}
