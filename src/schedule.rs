use chrono::{DateTime, Days, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CLASSES_PER_PERIOD: i64 = 8;
pub const DEFAULT_WEEKLY_FREQUENCY: i64 = 2;

const DAYS_PER_WEEK: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Current,
    Overdue,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Overdue => "overdue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "current" => Some(Self::Current),
            "overdue" => Some(Self::Overdue),
            _ => None,
        }
    }
}

/// Payment fields carried by every student row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCycle {
    pub last_payment: NaiveDate,
    pub next_payment: NaiveDate,
    pub classes_per_period: i64,
    pub weekly_frequency: i64,
    pub remaining_classes: i64,
    pub payment_status: PaymentStatus,
}

impl PaymentCycle {
    /// Stored status is only a cache; reads always go through here.
    pub fn refresh_status(&mut self, today: NaiveDate) {
        self.payment_status = classify_payment_status(self.next_payment, today);
    }
}

fn check_positive(value: i64, name: &str) -> Result<(), ScheduleError> {
    if value <= 0 {
        return Err(ScheduleError::InvalidArgument(format!(
            "{} must be a positive integer (got {})",
            name, value
        )));
    }
    Ok(())
}

/// Calendar days covered by one package: `ceil(classes / frequency * 7)`.
///
/// Evaluated as `ceil(7 * classes / frequency)` in integers so that exact
/// multiples (29 classes at 7 per week is 29 days) are not pushed up a day by
/// floating point error.
pub fn cycle_days(classes_per_period: i64, weekly_frequency: i64) -> Result<i64, ScheduleError> {
    check_positive(classes_per_period, "classesPerPeriod")?;
    check_positive(weekly_frequency, "weeklyFrequency")?;
    let numerator = classes_per_period
        .checked_mul(DAYS_PER_WEEK)
        .ok_or_else(|| {
            ScheduleError::InvalidArgument(format!(
                "classesPerPeriod is too large: {}",
                classes_per_period
            ))
        })?;
    Ok(numerator / weekly_frequency + i64::from(numerator % weekly_frequency != 0))
}

pub fn compute_next_due_date(
    reference_date: NaiveDate,
    classes_per_period: i64,
    weekly_frequency: i64,
) -> Result<NaiveDate, ScheduleError> {
    let days = cycle_days(classes_per_period, weekly_frequency)?;
    // days > 0 here, the cast is lossless.
    reference_date
        .checked_add_days(Days::new(days as u64))
        .ok_or_else(|| {
            ScheduleError::InvalidArgument(format!(
                "next due date out of range: {} + {} days",
                reference_date, days
            ))
        })
}

/// Strictly-before comparison: a payment due today is still current.
pub fn classify_payment_status(next_due_date: NaiveDate, today: NaiveDate) -> PaymentStatus {
    if next_due_date < today {
        PaymentStatus::Overdue
    } else {
        PaymentStatus::Current
    }
}

/// Payment fields for a freshly created student.
pub fn initial_cycle(
    last_payment: NaiveDate,
    classes_per_period: i64,
    weekly_frequency: i64,
    remaining_classes: Option<i64>,
    today: NaiveDate,
) -> Result<PaymentCycle, ScheduleError> {
    let next_payment = compute_next_due_date(last_payment, classes_per_period, weekly_frequency)?;
    let remaining_classes = remaining_classes.unwrap_or(classes_per_period);
    if remaining_classes < 0 {
        return Err(ScheduleError::InvalidArgument(format!(
            "remainingClasses must not be negative (got {})",
            remaining_classes
        )));
    }
    Ok(PaymentCycle {
        last_payment,
        next_payment,
        classes_per_period,
        weekly_frequency,
        remaining_classes,
        payment_status: classify_payment_status(next_payment, today),
    })
}

/// Field values after a payment. The package and frequency may differ from the
/// previous cycle; nothing from `current` carries over.
pub fn register_payment(
    current: &PaymentCycle,
    paid_on: NaiveDate,
    classes_per_period: i64,
    weekly_frequency: i64,
) -> Result<PaymentCycle, ScheduleError> {
    let next_payment = compute_next_due_date(paid_on, classes_per_period, weekly_frequency)?;
    log::debug!(
        "payment cycle reset: next payment {} -> {} ({} classes, {}/week)",
        current.next_payment,
        next_payment,
        classes_per_period,
        weekly_frequency
    );
    Ok(PaymentCycle {
        last_payment: paid_on,
        next_payment,
        classes_per_period,
        weekly_frequency,
        // Consumed classes from the previous package are not carried over.
        remaining_classes: classes_per_period,
        payment_status: PaymentStatus::Current,
    })
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp; any time component is dropped.
pub fn parse_iso_date(s: &str) -> Result<NaiveDate, ScheduleError> {
    let t = s.trim();
    if is_plain_date(t) {
        if let Ok(d) = NaiveDate::parse_from_str(t, "%Y-%m-%d") {
            return Ok(d);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Ok(normalize_date(&dt));
    }
    Err(ScheduleError::InvalidArgument(format!(
        "expected YYYY-MM-DD date, got {:?}",
        s
    )))
}

// chrono's %Y and %m also take signs and unpadded digits.
fn is_plain_date(t: &str) -> bool {
    let b = t.as_bytes();
    b.len() == 10
        && b.iter().enumerate().all(|(i, c)| match i {
            4 | 7 => *c == b'-',
            _ => c.is_ascii_digit(),
        })
}

pub fn format_iso_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub fn normalize_date<Tz: TimeZone>(dt: &DateTime<Tz>) -> NaiveDate {
    dt.date_naive()
}

pub fn local_today() -> NaiveDate {
    normalize_date(&Local::now())
}
