use anyhow::Result;
use rusqlite::{params, Connection, ErrorCode};
use std::{path::Path, thread, time::Duration};

use crate::models::{ChatRecord, RecordId};

/**
 * \brief Open the chat log database at `path`, creating the file if needed.
 */
pub fn open_db(path: impl AsRef<Path>) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

/**
 * \brief Create the `chat` table if it does not exist yet.
 * \details Safe to run on every process start; existing rows are untouched.
 */
pub fn initialize(conn: &Connection) -> Result<()> {
    retry_on_locked(|| {
        conn.execute_batch(
            r#"
        CREATE TABLE IF NOT EXISTS chat (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_message TEXT,
            ai_response TEXT
        );
        "#,
        )
    })?;
    Ok(())
}

/**
 * \brief Append one message/response pair and return its row id.
 */
pub fn append(conn: &Connection, user_message: Option<&str>, ai_response: &str) -> Result<RecordId> {
    retry_on_locked(|| {
        conn.execute(
            "INSERT INTO chat (user_message, ai_response) VALUES (?1, ?2)",
            params![user_message, ai_response],
        )
    })?;
    Ok(conn.last_insert_rowid())
}

pub fn count_records(conn: &Connection) -> Result<i64> {
    let n = conn.query_row("SELECT COUNT(*) FROM chat", [], |row| row.get(0))?;
    Ok(n)
}

/**
 * \brief Most recent records first, at most `limit` rows.
 */
pub fn recent_records(conn: &Connection, limit: usize) -> Result<Vec<ChatRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_message, ai_response FROM chat ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![i64::try_from(limit)?], |row| {
            Ok(ChatRecord {
                id: row.get(0)?,
                user_message: row.get(1)?,
                ai_response: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/**
 * \brief Retry helper for SQLite lock contention.
 * \details Retries `database is locked`/`database table is locked` with linear backoff, at most 6 attempts.
 */
fn retry_on_locked<T, F>(mut action: F) -> Result<T>
where
    F: FnMut() -> rusqlite::Result<T>,
{
    const MAX_RETRIES: usize = 5;
    let mut attempt = 0;
    loop {
        match action() {
            Ok(value) => return Ok(value),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if matches!(
                    err.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
                ) && attempt < MAX_RETRIES =>
            {
                attempt += 1;
                tracing::debug!(attempt, "sqlite busy, retrying");
                thread::sleep(Duration::from_millis(200 * attempt as u64));
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        initialize(&conn).expect("initialize");
        conn
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let conn = mem_conn();
        let first = append(&conn, Some("hello"), "hi there").expect("append 1");
        let second = append(&conn, Some("again"), "hi again").expect("append 2");
        assert!(second > first);
        assert_eq!(count_records(&conn).expect("count"), 2);
    }

    #[test]
    fn test_append_keeps_missing_message_as_null() {
        let conn = mem_conn();
        let id = append(&conn, None, "Error: missing message").expect("append");
        let records = recent_records(&conn, 10).expect("recent");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].user_message, None);
        assert_eq!(records[0].ai_response, "Error: missing message");
    }

    #[test]
    fn test_recent_records_newest_first_and_limited() {
        let conn = mem_conn();
        for i in 0..5 {
            append(&conn, Some(&format!("m{}", i)), &format!("r{}", i)).expect("append");
        }
        let records = recent_records(&conn, 2).expect("recent");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].user_message.as_deref(), Some("m4"));
        assert_eq!(records[1].user_message.as_deref(), Some("m3"));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_recent_records_rejects_limit_beyond_sqlite_range() {
        let conn = mem_conn();
        append(&conn, Some("hello"), "hi").expect("append");
        assert!(recent_records(&conn, usize::MAX).is_err());
    }

    #[test]
    fn test_initialize_is_idempotent_and_keeps_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chat.db");

        let conn = open_db(&path).expect("open");
        initialize(&conn).expect("initialize 1");
        append(&conn, Some("persisted"), "yes").expect("append");
        drop(conn);

        let conn = open_db(&path).expect("reopen");
        initialize(&conn).expect("initialize 2");
        initialize(&conn).expect("initialize 3");
        assert_eq!(count_records(&conn).expect("count"), 1);
        let records = recent_records(&conn, 1).expect("recent");
        assert_eq!(records[0].user_message.as_deref(), Some("persisted"));

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='chat'",
                [],
                |row| row.get(0),
            )
            .expect("table count");
        assert_eq!(tables, 1);
    }

    #[test]
    fn test_append_without_table_fails() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        assert!(append(&conn, Some("hello"), "hi").is_err());
    }
}
