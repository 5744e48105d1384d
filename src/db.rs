use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "academia.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)?;
    init_schema(&conn)?;
    log::info!("opened database {}", db_path.to_string_lossy());
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT UNIQUE,
            phone TEXT,
            course TEXT NOT NULL,
            enrolled_on TEXT NOT NULL,
            last_payment TEXT NOT NULL,
            next_payment TEXT NOT NULL,
            payment_status TEXT NOT NULL DEFAULT 'current',
            created_at TEXT,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS payments(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            paid_on TEXT NOT NULL,
            amount REAL NOT NULL,
            description TEXT NOT NULL DEFAULT 'Monthly payment',
            created_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_payments_student ON payments(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_payments_paid_on ON payments(paid_on)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    // Early workspaces stored only the dates; package columns came later.
    ensure_students_cycle_columns(conn)?;
    ensure_payments_cycle_columns(conn)?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_next_payment ON students(next_payment)",
        [],
    )?;

    Ok(())
}

fn ensure_students_cycle_columns(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "students", "classes_per_period")? {
        conn.execute(
            "ALTER TABLE students ADD COLUMN classes_per_period INTEGER NOT NULL DEFAULT 8",
            [],
        )?;
    }
    if !table_has_column(conn, "students", "weekly_frequency")? {
        conn.execute(
            "ALTER TABLE students ADD COLUMN weekly_frequency INTEGER NOT NULL DEFAULT 2",
            [],
        )?;
    }
    if !table_has_column(conn, "students", "remaining_classes")? {
        conn.execute(
            "ALTER TABLE students ADD COLUMN remaining_classes INTEGER NOT NULL DEFAULT 0",
            [],
        )?;
        // Best-effort backfill: assume a full package is still available.
        conn.execute("UPDATE students SET remaining_classes = classes_per_period", [])?;
    }
    Ok(())
}

fn ensure_payments_cycle_columns(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "payments", "classes_per_period")? {
        conn.execute(
            "ALTER TABLE payments ADD COLUMN classes_per_period INTEGER NOT NULL DEFAULT 8",
            [],
        )?;
    }
    if !table_has_column(conn, "payments", "weekly_frequency")? {
        conn.execute(
            "ALTER TABLE payments ADD COLUMN weekly_frequency INTEGER NOT NULL DEFAULT 2",
            [],
        )?;
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}
