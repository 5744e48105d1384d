use crate::dashboard::DEFAULT_UPCOMING_COUNT;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::schedule::{DEFAULT_CLASSES_PER_PERIOD, DEFAULT_WEEKLY_FREQUENCY};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Billing,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "billing" => Some(Self::Billing),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Billing => "setup.billing",
        }
    }
}

/// Defaults applied by `students.create`, `payments.create` and the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingSettings {
    pub default_classes_per_period: i64,
    pub default_weekly_frequency: i64,
    pub default_description: String,
    pub upcoming_count: usize,
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Billing => json!({
            "defaultClassesPerPeriod": DEFAULT_CLASSES_PER_PERIOD,
            "defaultWeeklyFrequency": DEFAULT_WEEKLY_FREQUENCY,
            "defaultDescription": "Monthly payment",
            "upcomingCount": DEFAULT_UPCOMING_COUNT
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.chars().count() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn apply_section_field(
    section: SetupSection,
    obj: &mut Map<String, Value>,
    k: &str,
    v: &Value,
) -> Result<(), String> {
    match section {
        SetupSection::Billing => match k {
            "defaultClassesPerPeriod" => {
                obj.insert(k.to_string(), Value::from(parse_i64_range(v, k, 1, 100)?));
            }
            "defaultWeeklyFrequency" => {
                obj.insert(k.to_string(), Value::from(parse_i64_range(v, k, 1, 14)?));
            }
            "defaultDescription" => {
                let s = parse_string_max(v, k, 120)?;
                if s.is_empty() {
                    return Err(format!("{} must not be empty", k));
                }
                obj.insert(k.to_string(), Value::String(s));
            }
            "upcomingCount" => {
                obj.insert(k.to_string(), Value::from(parse_i64_range(v, k, 1, 50)?));
            }
            _ => return Err(format!("unknown billing field: {}", k)),
        },
    }
    Ok(())
}

/// All-or-nothing: the caller discards `current` on error.
fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        apply_section_field(section, obj, k, v)?;
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    let Some(saved) = db::settings_get_json(conn, section.key())? else {
        return Ok(current);
    };
    let Some(saved_obj) = saved.as_object() else {
        log::warn!("ignoring non-object settings value for {}", section.key());
        return Ok(current);
    };
    let obj = as_object_mut(&mut current).map_err(anyhow::Error::msg)?;
    // Each stored key stands alone; a bad one keeps its default.
    for (k, v) in saved_obj {
        if let Err(msg) = apply_section_field(section, obj, k, v) {
            log::warn!("ignoring stored {}.{}: {}", section.key(), k, msg);
        }
    }
    Ok(current)
}

pub fn billing_settings(conn: &rusqlite::Connection) -> anyhow::Result<BillingSettings> {
    let v = load_section(conn, SetupSection::Billing)?;
    let int = |key: &str, fallback: i64| v.get(key).and_then(|x| x.as_i64()).unwrap_or(fallback);
    Ok(BillingSettings {
        default_classes_per_period: int("defaultClassesPerPeriod", DEFAULT_CLASSES_PER_PERIOD),
        default_weekly_frequency: int("defaultWeeklyFrequency", DEFAULT_WEEKLY_FREQUENCY),
        default_description: v
            .get("defaultDescription")
            .and_then(|x| x.as_str())
            .unwrap_or("Monthly payment")
            .to_string(),
        upcoming_count: usize::try_from(int("upcomingCount", DEFAULT_UPCOMING_COUNT as i64))
            .unwrap_or(DEFAULT_UPCOMING_COUNT),
    })
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let billing = match load_section(conn, SetupSection::Billing) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "billing": billing }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    log::info!("settings updated: {}", section.key());
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
