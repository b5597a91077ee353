use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::session::Identity;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("campus.sqlite3");
    let conn = Connection::open(db_path)?;

    // At most one signed-in session per workspace.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS session(
            slot INTEGER PRIMARY KEY CHECK (slot = 1),
            token TEXT NOT NULL,
            identity_json TEXT NOT NULL,
            saved_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub token: String,
    pub identity: Identity,
}

pub fn session_save(conn: &Connection, token: &str, identity: &Identity) -> anyhow::Result<()> {
    let identity_json = serde_json::to_string(identity)?;
    conn.execute(
        "INSERT INTO session(slot, token, identity_json, saved_at) VALUES (1, ?, ?, ?)
         ON CONFLICT(slot) DO UPDATE SET
            token = excluded.token,
            identity_json = excluded.identity_json,
            saved_at = excluded.saved_at",
        (token, identity_json, chrono::Utc::now().to_rfc3339()),
    )?;
    Ok(())
}

/// A row whose identity no longer decodes is treated as absent.
pub fn session_load(conn: &Connection) -> anyhow::Result<Option<StoredSession>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT token, identity_json FROM session WHERE slot = 1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((token, identity_json)) = row else {
        return Ok(None);
    };
    match serde_json::from_str::<Identity>(&identity_json) {
        Ok(identity) => Ok(Some(StoredSession { token, identity })),
        Err(e) => {
            tracing::warn!(error = %e, "discarding unreadable persisted session");
            session_delete(conn)?;
            Ok(None)
        }
    }
}

pub fn session_delete(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("DELETE FROM session", [])?;
    Ok(())
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
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::payments::validate::tests::temp_dir;
    use crate::session::tests::identity;

    #[test]
    fn session_row_roundtrips_and_deletes() {
        let ws = temp_dir("campusd-db-session");
        let conn = open_db(&ws).expect("open db");
        assert_eq!(session_load(&conn).expect("load"), None);

        session_save(&conn, "tok-1", &identity(Role::Parent)).expect("save");
        session_save(&conn, "tok-2", &identity(Role::Teacher)).expect("overwrite");
        let loaded = session_load(&conn).expect("load").expect("row");
        assert_eq!(loaded.token, "tok-2");
        assert_eq!(loaded.identity.role, Role::Teacher);

        session_delete(&conn).expect("delete");
        assert_eq!(session_load(&conn).expect("load"), None);
    }

    #[test]
    fn unreadable_identity_is_dropped() {
        let ws = temp_dir("campusd-db-corrupt");
        let conn = open_db(&ws).expect("open db");
        conn.execute(
            "INSERT INTO session(slot, token, identity_json, saved_at) VALUES (1, 't', '{\"role\":\"Janitor\"}', 'now')",
            [],
        )
        .expect("insert");
        assert_eq!(session_load(&conn).expect("load"), None);
        let left: i64 = conn
            .query_row("SELECT COUNT(*) FROM session", [], |r| r.get(0))
            .expect("count");
        assert_eq!(left, 0);
    }

    #[test]
    fn settings_overwrite() {
        let ws = temp_dir("campusd-db-settings");
        let conn = open_db(&ws).expect("open db");
        settings_set_json(&conn, "nav.current", &serde_json::json!("profile")).expect("set");
        settings_set_json(&conn, "nav.current", &serde_json::json!("payments")).expect("set");
        assert_eq!(
            settings_get_json(&conn, "nav.current").expect("get"),
            Some(serde_json::json!("payments"))
        );
        assert_eq!(settings_get_json(&conn, "missing").expect("get"), None);
    }
}
