use serde::Serialize;

use crate::model::Student;
use crate::schedule::PaymentStatus;

pub const DEFAULT_UPCOMING_COUNT: usize = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_students: usize,
    pub current_count: usize,
    pub overdue_count: usize,
    pub upcoming: Vec<Student>,
    pub overdue: Vec<Student>,
}

/// Students must already carry a status derived for the same day.
pub fn summarize(students: &[Student], upcoming_count: usize) -> DashboardSummary {
    let mut current: Vec<Student> = students
        .iter()
        .filter(|s| s.cycle.payment_status == PaymentStatus::Current)
        .cloned()
        .collect();
    let mut overdue: Vec<Student> = students
        .iter()
        .filter(|s| s.cycle.payment_status == PaymentStatus::Overdue)
        .cloned()
        .collect();

    // Stable sort keeps name order among equal due dates.
    current.sort_by_key(|s| s.cycle.next_payment);
    overdue.sort_by_key(|s| s.cycle.next_payment);

    let current_count = current.len();
    current.truncate(upcoming_count);

    DashboardSummary {
        total_students: students.len(),
        current_count,
        overdue_count: overdue.len(),
        upcoming: current,
        overdue,
    }
}

/// Case-insensitive substring match on name, course or status label.
pub fn search<'a>(students: &'a [Student], query: &str) -> Vec<&'a Student> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return students.iter().collect();
    }
    students
        .iter()
        .filter(|s| {
            s.name.to_lowercase().contains(&needle)
                || s.course.to_lowercase().contains(&needle)
                || s.cycle.payment_status.as_str().contains(&needle)
        })
        .collect()
}
