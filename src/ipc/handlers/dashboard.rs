use crate::dashboard::summarize;
use crate::ipc::error::ok;
use crate::ipc::handlers::setup::billing_settings;
use crate::ipc::helpers::{get_optional_i64, request_today, to_json, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::repository::{SqliteStudentRepository, StudentRepository};
use crate::schedule::{
    classify_payment_status, compute_next_due_date, cycle_days, format_iso_date, parse_iso_date,
    ScheduleError,
};
use rusqlite::Connection;
use serde_json::{json, Value};

fn dashboard_summary(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let today = request_today(params)?;
    let limit = match get_optional_i64(params, "limit")? {
        Some(n) if n < 1 => return Err(HandlerErr::bad_params("limit must be >= 1")),
        Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
        None => {
            billing_settings(conn)
                .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?
                .upcoming_count
        }
    };

    let repo = SqliteStudentRepository::new(conn);
    let students = repo
        .list_students(today)
        .map_err(|e| HandlerErr::from_repository(e, "db_query_failed"))?;
    let summary = summarize(&students, limit);
    let mut result = to_json(&summary)?;
    result["today"] = json!(format_iso_date(today));
    Ok(result)
}

fn schedule_preview(params: &Value) -> Result<Value, HandlerErr> {
    let Some(reference) = params.get("referenceDate").and_then(|v| v.as_str()) else {
        return Err(HandlerErr::bad_params("missing referenceDate"));
    };
    let reference = parse_iso_date(reference)
        .map_err(|e| HandlerErr::bad_params(format!("referenceDate: {}", e)))?;
    let classes = get_optional_i64(params, "classesPerPeriod")?
        .ok_or_else(|| HandlerErr::bad_params("missing classesPerPeriod"))?;
    let frequency = get_optional_i64(params, "weeklyFrequency")?
        .ok_or_else(|| HandlerErr::bad_params("missing weeklyFrequency"))?;
    let today = request_today(params)?;

    let invalid = |e: ScheduleError| HandlerErr::new("invalid_argument", e.to_string());
    let days = cycle_days(classes, frequency).map_err(invalid)?;
    let next = compute_next_due_date(reference, classes, frequency).map_err(invalid)?;
    Ok(json!({
        "referenceDate": format_iso_date(reference),
        "nextPayment": format_iso_date(next),
        "days": days,
        "paymentStatus": classify_payment_status(next, today).as_str()
    }))
}

fn handle_schedule_preview(req: &Request) -> serde_json::Value {
    // Pure calculation; works without a workspace.
    match schedule_preview(&req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.summary" => Some(with_db(state, req, dashboard_summary)),
        "schedule.preview" => Some(handle_schedule_preview(req)),
        _ => None,
    }
}
