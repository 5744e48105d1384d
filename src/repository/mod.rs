mod sqlite;

#[cfg(test)]
mod memory;

pub use sqlite::SqliteStudentRepository;

#[cfg(test)]
pub use memory::InMemoryStudentRepository;

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{
    clean_optional, NewPayment, NewStudent, Payment, PaymentWithStudent, Student,
    StudentContactPatch,
};
use crate::schedule::ScheduleError;

const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 100;
const MAX_PHONE_LEN: usize = 20;
const MAX_DESCRIPTION_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl From<ScheduleError> for RepositoryError {
    fn from(e: ScheduleError) -> Self {
        match e {
            ScheduleError::InvalidArgument(msg) => Self::InvalidArgument(msg),
        }
    }
}

/// Student and payment storage. `today` is passed in wherever the derived
/// payment status is produced so reads stay deterministic.
pub trait StudentRepository {
    fn list_students(&self, today: NaiveDate) -> Result<Vec<Student>, RepositoryError>;

    fn get_student(&self, id: &str, today: NaiveDate) -> Result<Option<Student>, RepositoryError>;

    fn create_student(
        &mut self,
        new: NewStudent,
        today: NaiveDate,
    ) -> Result<Student, RepositoryError>;

    /// Contact fields only; payment fields change through `record_payment`.
    fn update_student_contact(
        &mut self,
        id: &str,
        patch: StudentContactPatch,
        today: NaiveDate,
    ) -> Result<Option<Student>, RepositoryError>;

    /// Removes the student and every payment recorded for them.
    fn delete_student(&mut self, id: &str) -> Result<bool, RepositoryError>;

    /// Inserts the payment and resets the student's cycle as one unit.
    /// The returned student carries the status derived for `today`.
    /// `Ok(None)` when the student does not exist.
    fn record_payment(
        &mut self,
        new: NewPayment,
        today: NaiveDate,
    ) -> Result<Option<(Payment, Student)>, RepositoryError>;

    /// Newest payment date first.
    fn list_payments(
        &self,
        student_id: Option<&str>,
    ) -> Result<Vec<PaymentWithStudent>, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ContactFields {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub course: String,
}

fn required_text(value: &str, field: &str, max_len: usize) -> Result<String, RepositoryError> {
    let t = value.trim();
    if t.is_empty() {
        return Err(RepositoryError::InvalidArgument(format!(
            "{} must not be empty",
            field
        )));
    }
    if t.chars().count() > max_len {
        return Err(RepositoryError::InvalidArgument(format!(
            "{} length must be <= {}",
            field, max_len
        )));
    }
    Ok(t.to_string())
}

fn optional_text(
    value: Option<&str>,
    field: &str,
    max_len: usize,
) -> Result<Option<String>, RepositoryError> {
    let cleaned = clean_optional(value);
    if let Some(s) = cleaned.as_deref() {
        if s.chars().count() > max_len {
            return Err(RepositoryError::InvalidArgument(format!(
                "{} length must be <= {}",
                field, max_len
            )));
        }
    }
    Ok(cleaned)
}

pub(crate) fn validate_contact(
    name: &str,
    email: Option<&str>,
    phone: Option<&str>,
    course: &str,
) -> Result<ContactFields, RepositoryError> {
    let email = optional_text(email, "email", MAX_EMAIL_LEN)?;
    if let Some(e) = email.as_deref() {
        if !e.contains('@') {
            return Err(RepositoryError::InvalidArgument(format!(
                "email is not valid: {}",
                e
            )));
        }
    }
    Ok(ContactFields {
        name: required_text(name, "name", MAX_NAME_LEN)?,
        email,
        phone: optional_text(phone, "phone", MAX_PHONE_LEN)?,
        course: required_text(course, "course", MAX_NAME_LEN)?,
    })
}

pub(crate) fn validate_new_student(new: &NewStudent) -> Result<ContactFields, RepositoryError> {
    validate_contact(
        &new.name,
        new.email.as_deref(),
        new.phone.as_deref(),
        &new.course,
    )
}

pub(crate) fn merge_contact_patch(
    student: &Student,
    patch: &StudentContactPatch,
) -> Result<ContactFields, RepositoryError> {
    let name = patch.name.as_deref().unwrap_or(&student.name);
    let course = patch.course.as_deref().unwrap_or(&student.course);
    let email = match patch.email.as_deref() {
        Some(e) => Some(e),
        None => student.email.as_deref(),
    };
    let phone = match patch.phone.as_deref() {
        Some(p) => Some(p),
        None => student.phone.as_deref(),
    };
    validate_contact(name, email, phone, course)
}

pub(crate) fn validate_payment(new: &NewPayment) -> Result<String, RepositoryError> {
    if !new.amount.is_finite() || new.amount < 0.0 {
        return Err(RepositoryError::InvalidArgument(format!(
            "amount must be a non-negative number (got {})",
            new.amount
        )));
    }
    let description = new.description.trim();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(RepositoryError::InvalidArgument(format!(
            "description length must be <= {}",
            MAX_DESCRIPTION_LEN
        )));
    }
    Ok(description.to_string())
}
