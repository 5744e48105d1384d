use crate::dashboard;
use crate::ipc::handlers::setup::billing_settings;
use crate::ipc::helpers::{
    get_optional_date, get_optional_i64, get_optional_str, get_required_str, request_today,
    to_json, with_db, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{NewStudent, StudentContactPatch};
use crate::repository::{SqliteStudentRepository, StudentRepository};
use crate::schedule::PaymentStatus;
use rusqlite::Connection;
use serde_json::{json, Value};

fn students_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let today = request_today(params)?;
    let status = match get_optional_str(params, "status")? {
        Some(s) => Some(PaymentStatus::parse(&s).ok_or_else(|| {
            HandlerErr::bad_params("status must be one of: current, overdue")
        })?),
        None => None,
    };
    let repo = SqliteStudentRepository::new(conn);
    let mut students = repo
        .list_students(today)
        .map_err(|e| HandlerErr::from_repository(e, "db_query_failed"))?;
    if let Some(status) = status {
        students.retain(|s| s.cycle.payment_status == status);
    }
    Ok(json!({ "students": to_json(&students)? }))
}

fn students_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let today = request_today(params)?;
    let repo = SqliteStudentRepository::new(conn);
    let student = repo
        .get_student(&student_id, today)
        .map_err(|e| HandlerErr::from_repository(e, "db_query_failed"))?
        .ok_or_else(|| HandlerErr::new("not_found", "student not found"))?;
    Ok(json!({ "student": to_json(&student)? }))
}

fn students_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let today = request_today(params)?;
    let billing = billing_settings(conn)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;

    let new = NewStudent {
        name: get_required_str(params, "name")?,
        email: get_optional_str(params, "email")?,
        phone: get_optional_str(params, "phone")?,
        course: get_required_str(params, "course")?,
        enrolled_on: get_optional_date(params, "enrolledOn")?.unwrap_or(today),
        last_payment: get_optional_date(params, "lastPayment")?,
        classes_per_period: get_optional_i64(params, "classesPerPeriod")?
            .unwrap_or(billing.default_classes_per_period),
        weekly_frequency: get_optional_i64(params, "weeklyFrequency")?
            .unwrap_or(billing.default_weekly_frequency),
        remaining_classes: get_optional_i64(params, "remainingClasses")?,
    };

    let mut repo = SqliteStudentRepository::new(conn);
    let student = repo
        .create_student(new, today)
        .map_err(|e| {
            HandlerErr::from_repository(e, "db_insert_failed")
                .with_details(json!({ "table": "students" }))
        })?;
    Ok(json!({ "studentId": student.id, "student": to_json(&student)? }))
}

fn students_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let today = request_today(params)?;
    let Some(patch_value) = params.get("patch").filter(|v| v.is_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };
    if let Some(obj) = patch_value.as_object() {
        if let Some(k) = obj
            .keys()
            .find(|k| !matches!(k.as_str(), "name" | "email" | "phone" | "course"))
        {
            return Err(HandlerErr::bad_params(format!("unknown student field: {}", k)));
        }
    }
    let patch = StudentContactPatch {
        name: get_optional_str(patch_value, "name")?,
        email: get_optional_str(patch_value, "email")?,
        phone: get_optional_str(patch_value, "phone")?,
        course: get_optional_str(patch_value, "course")?,
    };
    if patch.is_empty() {
        return Err(HandlerErr::bad_params("patch must change at least one field"));
    }

    let mut repo = SqliteStudentRepository::new(conn);
    let student = repo
        .update_student_contact(&student_id, patch, today)
        .map_err(|e| HandlerErr::from_repository(e, "db_update_failed"))?
        .ok_or_else(|| HandlerErr::new("not_found", "student not found"))?;
    Ok(json!({ "student": to_json(&student)? }))
}

fn students_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let mut repo = SqliteStudentRepository::new(conn);
    let deleted = repo
        .delete_student(&student_id)
        .map_err(|e| HandlerErr::from_repository(e, "db_delete_failed"))?;
    if !deleted {
        return Err(HandlerErr::new("not_found", "student not found"));
    }
    Ok(json!({ "ok": true }))
}

fn students_search(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let query = get_optional_str(params, "query")?.unwrap_or_default();
    let today = request_today(params)?;
    let repo = SqliteStudentRepository::new(conn);
    let students = repo
        .list_students(today)
        .map_err(|e| HandlerErr::from_repository(e, "db_query_failed"))?;
    let hits = dashboard::search(&students, &query);
    Ok(json!({ "students": to_json(&hits)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(with_db(state, req, students_list)),
        "students.get" => Some(with_db(state, req, students_get)),
        "students.create" => Some(with_db(state, req, students_create)),
        "students.update" => Some(with_db(state, req, students_update)),
        "students.delete" => Some(with_db(state, req, students_delete)),
        "students.search" => Some(with_db(state, req, students_search)),
        _ => None,
    }
}
