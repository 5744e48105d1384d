use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use super::{
    merge_contact_patch, validate_new_student, validate_payment, RepositoryError,
    StudentRepository,
};
use crate::model::{NewPayment, NewStudent, Payment, PaymentWithStudent, Student, StudentContactPatch};
use crate::schedule::{initial_cycle, register_payment};

fn now_stamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Vec-backed store with the same observable behavior as the SQLite one.
#[derive(Debug, Default)]
pub struct InMemoryStudentRepository {
    students: Vec<Student>,
    // Insertion order doubles as the creation-time tiebreak.
    payments: Vec<Payment>,
}

impl InMemoryStudentRepository {
    fn position(&self, id: &str) -> Option<usize> {
        self.students.iter().position(|s| s.id == id)
    }

    fn require_free_email(
        &self,
        email: Option<&str>,
        except_id: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let Some(e) = email else {
            return Ok(());
        };
        let taken = self.students.iter().any(|s| {
            Some(s.id.as_str()) != except_id
                && s.email.as_deref().map(|x| x.eq_ignore_ascii_case(e)).unwrap_or(false)
        });
        if taken {
            return Err(RepositoryError::Conflict(format!(
                "email already registered: {}",
                e
            )));
        }
        Ok(())
    }

    fn snapshot(&self, idx: usize, today: NaiveDate) -> Student {
        let mut s = self.students[idx].clone();
        s.cycle.refresh_status(today);
        s
    }
}

impl StudentRepository for InMemoryStudentRepository {
    fn list_students(&self, today: NaiveDate) -> Result<Vec<Student>, RepositoryError> {
        let mut out: Vec<Student> = (0..self.students.len())
            .map(|i| self.snapshot(i, today))
            .collect();
        out.sort_by(|a, b| {
            a.name
                .to_ascii_lowercase()
                .cmp(&b.name.to_ascii_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(out)
    }

    fn get_student(&self, id: &str, today: NaiveDate) -> Result<Option<Student>, RepositoryError> {
        Ok(self.position(id).map(|i| self.snapshot(i, today)))
    }

    fn create_student(
        &mut self,
        new: NewStudent,
        today: NaiveDate,
    ) -> Result<Student, RepositoryError> {
        let fields = validate_new_student(&new)?;
        let cycle = initial_cycle(
            new.last_payment.unwrap_or(new.enrolled_on),
            new.classes_per_period,
            new.weekly_frequency,
            new.remaining_classes,
            today,
        )?;
        self.require_free_email(fields.email.as_deref(), None)?;

        let stamp = now_stamp();
        let student = Student {
            id: Uuid::new_v4().to_string(),
            name: fields.name,
            email: fields.email,
            phone: fields.phone,
            course: fields.course,
            enrolled_on: new.enrolled_on,
            cycle,
            created_at: Some(stamp.clone()),
            updated_at: Some(stamp),
        };
        self.students.push(student.clone());
        Ok(student)
    }

    fn update_student_contact(
        &mut self,
        id: &str,
        patch: StudentContactPatch,
        today: NaiveDate,
    ) -> Result<Option<Student>, RepositoryError> {
        let Some(idx) = self.position(id) else {
            return Ok(None);
        };
        let fields = merge_contact_patch(&self.students[idx], &patch)?;
        self.require_free_email(fields.email.as_deref(), Some(id))?;

        let s = &mut self.students[idx];
        s.name = fields.name;
        s.email = fields.email;
        s.phone = fields.phone;
        s.course = fields.course;
        s.updated_at = Some(now_stamp());
        Ok(Some(self.snapshot(idx, today)))
    }

    fn delete_student(&mut self, id: &str) -> Result<bool, RepositoryError> {
        let Some(idx) = self.position(id) else {
            return Ok(false);
        };
        self.payments.retain(|p| p.student_id != id);
        self.students.remove(idx);
        Ok(true)
    }

    fn record_payment(
        &mut self,
        new: NewPayment,
        today: NaiveDate,
    ) -> Result<Option<(Payment, Student)>, RepositoryError> {
        let description = validate_payment(&new)?;
        let Some(idx) = self.position(&new.student_id) else {
            return Ok(None);
        };
        let cycle = register_payment(
            &self.students[idx].cycle,
            new.paid_on,
            new.classes_per_period,
            new.weekly_frequency,
        )?;

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            student_id: new.student_id,
            paid_on: new.paid_on,
            amount: new.amount,
            description,
            classes_per_period: new.classes_per_period,
            weekly_frequency: new.weekly_frequency,
            created_at: now_stamp(),
        };
        self.payments.push(payment.clone());

        let s = &mut self.students[idx];
        s.cycle = cycle;
        s.updated_at = Some(now_stamp());
        Ok(Some((payment, self.snapshot(idx, today))))
    }

    fn list_payments(
        &self,
        student_id: Option<&str>,
    ) -> Result<Vec<PaymentWithStudent>, RepositoryError> {
        let mut rows: Vec<(usize, PaymentWithStudent)> = Vec::new();
        for (seq, p) in self.payments.iter().enumerate() {
            if student_id.map(|id| id != p.student_id).unwrap_or(false) {
                continue;
            }
            let Some(idx) = self.position(&p.student_id) else {
                continue;
            };
            let s = &self.students[idx];
            rows.push((
                seq,
                PaymentWithStudent {
                    payment: p.clone(),
                    student_name: s.name.clone(),
                    course: s.course.clone(),
                },
            ));
        }
        rows.sort_by(|(sa, a), (sb, b)| {
            b.payment
                .paid_on
                .cmp(&a.payment.paid_on)
                .then_with(|| sb.cmp(sa))
        });
        Ok(rows.into_iter().map(|(_, r)| r).collect())
    }
}
