use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{
    merge_contact_patch, validate_new_student, validate_payment, RepositoryError,
    StudentRepository,
};
use crate::model::{NewPayment, NewStudent, Payment, PaymentWithStudent, Student, StudentContactPatch};
use crate::schedule::{initial_cycle, register_payment, PaymentCycle, PaymentStatus};

const STUDENT_COLUMNS: &str = "id, name, email, phone, course, enrolled_on, last_payment, \
     next_payment, classes_per_period, weekly_frequency, remaining_classes, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "p.id, p.student_id, p.paid_on, p.amount, p.description, \
     p.classes_per_period, p.weekly_frequency, p.created_at";

fn student_from_row(row: &Row<'_>, today: NaiveDate) -> rusqlite::Result<Student> {
    let mut cycle = PaymentCycle {
        last_payment: row.get(6)?,
        next_payment: row.get(7)?,
        classes_per_period: row.get(8)?,
        weekly_frequency: row.get(9)?,
        remaining_classes: row.get(10)?,
        payment_status: PaymentStatus::Current,
    };
    cycle.refresh_status(today);
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        course: row.get(4)?,
        enrolled_on: row.get(5)?,
        cycle,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: row.get(0)?,
        student_id: row.get(1)?,
        paid_on: row.get(2)?,
        amount: row.get(3)?,
        description: row.get(4)?,
        classes_per_period: row.get(5)?,
        weekly_frequency: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub struct SqliteStudentRepository<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStudentRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn email_taken(&self, email: &str, except_id: Option<&str>) -> Result<bool, RepositoryError> {
        let hit: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM students WHERE lower(email) = lower(?) AND id <> ?",
                (email, except_id.unwrap_or("")),
                |r| r.get(0),
            )
            .optional()?;
        Ok(hit.is_some())
    }

    fn require_free_email(
        &self,
        email: Option<&str>,
        except_id: Option<&str>,
    ) -> Result<(), RepositoryError> {
        if let Some(e) = email {
            if self.email_taken(e, except_id)? {
                return Err(RepositoryError::Conflict(format!(
                    "email already registered: {}",
                    e
                )));
            }
        }
        Ok(())
    }

    fn load_student(
        conn: &Connection,
        id: &str,
        today: NaiveDate,
    ) -> Result<Option<Student>, RepositoryError> {
        let sql = format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS);
        Ok(conn
            .query_row(&sql, [id], |r| student_from_row(r, today))
            .optional()?)
    }
}

impl StudentRepository for SqliteStudentRepository<'_> {
    fn list_students(&self, today: NaiveDate) -> Result<Vec<Student>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM students ORDER BY name COLLATE NOCASE, id",
            STUDENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |r| student_from_row(r, today))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_student(&self, id: &str, today: NaiveDate) -> Result<Option<Student>, RepositoryError> {
        Self::load_student(self.conn, id, today)
    }

    fn create_student(
        &mut self,
        new: NewStudent,
        today: NaiveDate,
    ) -> Result<Student, RepositoryError> {
        let fields = validate_new_student(&new)?;
        let last_payment = new.last_payment.unwrap_or(new.enrolled_on);
        let cycle = initial_cycle(
            last_payment,
            new.classes_per_period,
            new.weekly_frequency,
            new.remaining_classes,
            today,
        )?;
        self.require_free_email(fields.email.as_deref(), None)?;

        let student_id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO students(
               id,
               name,
               email,
               phone,
               course,
               enrolled_on,
               last_payment,
               next_payment,
               classes_per_period,
               weekly_frequency,
               remaining_classes,
               payment_status,
               created_at,
               updated_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
               strftime('%Y-%m-%dT%H:%M:%SZ','now'),
               strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
            params![
                &student_id,
                &fields.name,
                fields.email.as_deref(),
                fields.phone.as_deref(),
                &fields.course,
                new.enrolled_on,
                cycle.last_payment,
                cycle.next_payment,
                cycle.classes_per_period,
                cycle.weekly_frequency,
                cycle.remaining_classes,
                cycle.payment_status.as_str(),
            ],
        )?;
        log::info!(
            "student created: {} (next payment {})",
            student_id,
            cycle.next_payment
        );

        Self::load_student(self.conn, &student_id, today)?
            .ok_or(RepositoryError::Storage(rusqlite::Error::QueryReturnedNoRows))
    }

    fn update_student_contact(
        &mut self,
        id: &str,
        patch: StudentContactPatch,
        today: NaiveDate,
    ) -> Result<Option<Student>, RepositoryError> {
        let Some(current) = Self::load_student(self.conn, id, today)? else {
            return Ok(None);
        };
        let fields = merge_contact_patch(&current, &patch)?;
        self.require_free_email(fields.email.as_deref(), Some(id))?;

        self.conn.execute(
            "UPDATE students
             SET name = ?,
                 email = ?,
                 phone = ?,
                 course = ?,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
             WHERE id = ?",
            params![
                &fields.name,
                fields.email.as_deref(),
                fields.phone.as_deref(),
                &fields.course,
                id,
            ],
        )?;
        Self::load_student(self.conn, id, today)
    }

    fn delete_student(&mut self, id: &str) -> Result<bool, RepositoryError> {
        let exists: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM students WHERE id = ?", [id], |r| r.get(0))
            .optional()?;
        if exists.is_none() {
            return Ok(false);
        }

        // Dropping the transaction on an early return rolls it back.
        let tx = self.conn.unchecked_transaction()?;
        let removed_payments = tx.execute("DELETE FROM payments WHERE student_id = ?", [id])?;
        let changed = tx.execute("DELETE FROM students WHERE id = ?", [id])?;
        tx.commit()?;

        log::info!(
            "student deleted: {} ({} payments removed)",
            id,
            removed_payments
        );
        Ok(changed > 0)
    }

    fn record_payment(
        &mut self,
        new: NewPayment,
        today: NaiveDate,
    ) -> Result<Option<(Payment, Student)>, RepositoryError> {
        let description = validate_payment(&new)?;

        let tx = self.conn.unchecked_transaction()?;
        let Some(student) = Self::load_student(&tx, &new.student_id, today)? else {
            return Ok(None);
        };
        let cycle = register_payment(
            &student.cycle,
            new.paid_on,
            new.classes_per_period,
            new.weekly_frequency,
        )?;

        let payment_id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO payments(
               id,
               student_id,
               paid_on,
               amount,
               description,
               classes_per_period,
               weekly_frequency,
               created_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%fZ','now'))",
            params![
                &payment_id,
                &new.student_id,
                new.paid_on,
                new.amount,
                &description,
                new.classes_per_period,
                new.weekly_frequency,
            ],
        )?;
        tx.execute(
            "UPDATE students
             SET last_payment = ?,
                 next_payment = ?,
                 classes_per_period = ?,
                 weekly_frequency = ?,
                 remaining_classes = ?,
                 payment_status = ?,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
             WHERE id = ?",
            params![
                cycle.last_payment,
                cycle.next_payment,
                cycle.classes_per_period,
                cycle.weekly_frequency,
                cycle.remaining_classes,
                cycle.payment_status.as_str(),
                &new.student_id,
            ],
        )?;
        let payment = tx.query_row(
            &format!("SELECT {} FROM payments p WHERE p.id = ?", PAYMENT_COLUMNS),
            [&payment_id],
            payment_from_row,
        )?;
        let updated = Self::load_student(&tx, &new.student_id, today)?
            .ok_or(RepositoryError::Storage(rusqlite::Error::QueryReturnedNoRows))?;
        tx.commit()?;

        log::info!(
            "payment recorded: {} for student {} (next payment {})",
            payment.id,
            payment.student_id,
            updated.cycle.next_payment
        );
        Ok(Some((payment, updated)))
    }

    fn list_payments(
        &self,
        student_id: Option<&str>,
    ) -> Result<Vec<PaymentWithStudent>, RepositoryError> {
        let sql = format!(
            "SELECT {}, s.name, s.course
             FROM payments p
             JOIN students s ON s.id = p.student_id
             WHERE (?1 IS NULL OR p.student_id = ?1)
             ORDER BY p.paid_on DESC, p.created_at DESC, p.rowid DESC",
            PAYMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([student_id], |r| {
                Ok(PaymentWithStudent {
                    payment: payment_from_row(r)?,
                    student_name: r.get(8)?,
                    course: r.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
