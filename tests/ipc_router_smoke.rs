mod test_support;

use serde_json::json;
use test_support::{error_code, request, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("academia-router-smoke");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let calls: Vec<(&str, serde_json::Value)> = vec![
        ("health", json!({})),
        ("workspace.select", json!({ "path": workspace.to_string_lossy() })),
        ("students.list", json!({})),
        ("students.search", json!({ "query": "x" })),
        ("students.get", json!({ "studentId": "missing" })),
        ("students.update", json!({ "studentId": "missing", "patch": { "name": "N" } })),
        ("students.delete", json!({ "studentId": "missing" })),
        ("payments.list", json!({})),
        ("payments.create", json!({ "studentId": "missing" })),
        ("dashboard.summary", json!({})),
        (
            "schedule.preview",
            json!({ "referenceDate": "2024-01-01", "classesPerPeriod": 8, "weeklyFrequency": 2 }),
        ),
        ("setup.get", json!({})),
    ];

    for (i, (method, params)) in calls.into_iter().enumerate() {
        let id = (i + 1).to_string();
        let resp = request(&mut stdin, &mut reader, &id, method, params);
        if resp.get("ok").and_then(|v| v.as_bool()) == Some(false) {
            assert_ne!(
                error_code(&resp),
                "not_implemented",
                "unexpected unknown method for {}",
                method
            );
        }
    }

    let unknown = request(&mut stdin, &mut reader, "99", "classes.list", json!({}));
    assert_eq!(unknown["ok"], json!(false));
    assert_eq!(error_code(&unknown), "not_implemented");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn data_methods_require_a_workspace() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["ok"], json!(true));
    assert!(health["result"]["workspacePath"].is_null());

    for (i, method) in ["students.list", "payments.list", "dashboard.summary", "setup.get"]
        .iter()
        .enumerate()
    {
        let id = format!("n{}", i);
        let resp = request(&mut stdin, &mut reader, &id, method, json!({}));
        assert_eq!(resp["ok"], json!(false), "{}", method);
        assert_eq!(error_code(&resp), "no_workspace", "{}", method);
    }

    // Pure calculation needs no workspace.
    let preview = request(
        &mut stdin,
        &mut reader,
        "p",
        "schedule.preview",
        json!({ "referenceDate": "2024-01-01", "classesPerPeriod": 8, "weeklyFrequency": 2 }),
    );
    assert_eq!(preview["ok"], json!(true));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn malformed_line_gets_bad_json_and_loop_continues() {
    use std::io::{BufRead, Write};

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json reply");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("reply is json");
    assert_eq!(value["ok"], json!(false));
    assert_eq!(error_code(&value), "bad_json");

    let health = request(&mut stdin, &mut reader, "after", "health", json!({}));
    assert_eq!(health["ok"], json!(true));

    drop(stdin);
    let _ = child.wait();
}
