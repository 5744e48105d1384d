use crate::ipc::handlers::setup::billing_settings;
use crate::ipc::helpers::{
    get_optional_date, get_optional_f64, get_optional_i64, get_optional_str, get_required_str,
    request_today, to_json, with_db, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::NewPayment;
use crate::repository::{SqliteStudentRepository, StudentRepository};
use rusqlite::Connection;
use serde_json::{json, Value};

fn payments_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let billing = billing_settings(conn)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;

    let today = request_today(params)?;
    let paid_on = get_optional_date(params, "paidOn")?.unwrap_or(today);
    let description = get_optional_str(params, "description")?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or(billing.default_description);

    let new = NewPayment {
        student_id,
        paid_on,
        amount: get_optional_f64(params, "amount")?.unwrap_or(0.0),
        description,
        classes_per_period: get_optional_i64(params, "classesPerPeriod")?
            .unwrap_or(billing.default_classes_per_period),
        weekly_frequency: get_optional_i64(params, "weeklyFrequency")?
            .unwrap_or(billing.default_weekly_frequency),
    };

    let mut repo = SqliteStudentRepository::new(conn);
    let (payment, student) = repo
        .record_payment(new, today)
        .map_err(|e| {
            HandlerErr::from_repository(e, "db_insert_failed")
                .with_details(json!({ "table": "payments" }))
        })?
        .ok_or_else(|| HandlerErr::new("not_found", "student not found"))?;
    Ok(json!({
        "payment": to_json(&payment)?,
        "student": to_json(&student)?
    }))
}

fn payments_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_optional_str(params, "studentId")?;
    let repo = SqliteStudentRepository::new(conn);
    let payments = repo
        .list_payments(student_id.as_deref())
        .map_err(|e| HandlerErr::from_repository(e, "db_query_failed"))?;
    Ok(json!({ "payments": to_json(&payments)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "payments.create" => Some(with_db(state, req, payments_create)),
        "payments.list" => Some(with_db(state, req, payments_list)),
        _ => None,
    }
}
