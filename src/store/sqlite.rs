//! SQLite-backed graph store

use super::{utcnow, GraphStore};
use crate::config::SessionConfig;
use crate::error::{RankError, Result};
use crate::types::{Explain, FeedbackEntry, SessionItem, SessionRecord, Video};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS videos (
    video_id     TEXT PRIMARY KEY,
    secondary_id TEXT,
    url          TEXT NOT NULL,
    title        TEXT,
    tags_json    TEXT NOT NULL DEFAULT '[]',
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS edges (
    from_video_id TEXT NOT NULL,
    to_video_id   TEXT NOT NULL,
    weight        INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (from_video_id, to_video_id)
);
CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_video_id);

CREATE TABLE IF NOT EXISTS video_seen (
    video_id   TEXT PRIMARY KEY,
    seen_count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS taste_profile (
    tag    TEXT PRIMARY KEY,
    weight REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS sessions (
    session_id  TEXT PRIMARY KEY,
    seed_url    TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    config_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS session_items (
    session_id   TEXT NOT NULL,
    idx          INTEGER NOT NULL,
    video_id     TEXT NOT NULL,
    url          TEXT NOT NULL,
    title        TEXT,
    explain_json TEXT NOT NULL,
    PRIMARY KEY (session_id, idx)
);

CREATE TABLE IF NOT EXISTS feedback (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    video_id   TEXT NOT NULL,
    action     TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        debug!("Opened sqlite store at {}", path.display());
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RankError::Lock)
    }
}

impl GraphStore for SqliteStore {
    fn upsert_video(&self, video_id: &str, url: &str, title: Option<&str>, tags: &[String]) -> Result<()> {
        let tags_json = serde_json::to_string(tags)?;
        self.conn()?.execute(
            r#"
            INSERT INTO videos (video_id, url, title, tags_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(video_id) DO UPDATE SET
                url = excluded.url,
                title = COALESCE(excluded.title, videos.title),
                tags_json = CASE WHEN excluded.tags_json != '[]'
                                 THEN excluded.tags_json ELSE videos.tags_json END
            "#,
            params![video_id, url, title, tags_json, utcnow()],
        )?;
        Ok(())
    }

    fn set_secondary_id(&self, video_id: &str, secondary_id: &str) -> Result<()> {
        self.conn()?.execute(
            "UPDATE videos SET secondary_id = ?2 WHERE video_id = ?1",
            params![video_id, secondary_id],
        )?;
        Ok(())
    }

    fn get_video(&self, video_id: &str) -> Result<Option<Video>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT video_id, secondary_id, url, title, tags_json FROM videos WHERE video_id = ?1",
                params![video_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((video_id, secondary_id, url, title, tags_json)) => Ok(Some(Video {
                video_id,
                secondary_id,
                url,
                title,
                tags: serde_json::from_str(&tags_json)?,
            })),
            None => Ok(None),
        }
    }

    fn incr_edge(&self, from_id: &str, to_id: &str, inc: u64) -> Result<()> {
        self.conn()?.execute(
            r#"
            INSERT INTO edges (from_video_id, to_video_id, weight)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(from_video_id, to_video_id) DO UPDATE SET
                weight = edges.weight + excluded.weight
            "#,
            params![from_id, to_id, inc as i64],
        )?;
        Ok(())
    }

    fn get_edge_weight(&self, from_id: &str, to_id: &str) -> Result<u64> {
        let weight: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT weight FROM edges WHERE from_video_id = ?1 AND to_video_id = ?2",
                params![from_id, to_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(weight.unwrap_or(0) as u64)
    }

    fn get_incoming_weight(&self, to_id: &str, from_ids: &[String]) -> Result<u64> {
        if from_ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; from_ids.len()].join(",");
        let sql = format!(
            "SELECT COALESCE(SUM(weight), 0) FROM edges WHERE to_video_id = ? AND from_video_id IN ({})",
            placeholders
        );
        let args = std::iter::once(to_id).chain(from_ids.iter().map(String::as_str));
        let total: i64 = self.conn()?.query_row(&sql, params_from_iter(args), |row| row.get(0))?;
        Ok(total as u64)
    }

    fn incr_seen(&self, video_id: &str, inc: u64) -> Result<()> {
        self.conn()?.execute(
            r#"
            INSERT INTO video_seen (video_id, seen_count)
            VALUES (?1, ?2)
            ON CONFLICT(video_id) DO UPDATE SET
                seen_count = video_seen.seen_count + excluded.seen_count
            "#,
            params![video_id, inc as i64],
        )?;
        Ok(())
    }

    fn get_seen_count(&self, video_id: &str) -> Result<u64> {
        let count: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT seen_count FROM video_seen WHERE video_id = ?1",
                params![video_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0) as u64)
    }

    fn get_taste(&self) -> Result<HashMap<String, f64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT tag, weight FROM taste_profile")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?;
        let mut taste = HashMap::new();
        for row in rows {
            let (tag, weight) = row?;
            taste.insert(tag, weight);
        }
        Ok(taste)
    }

    fn bump_taste(&self, tags: &[String], amount: f64) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO taste_profile (tag, weight) VALUES (?1, ?2)
                ON CONFLICT(tag) DO UPDATE SET weight = taste_profile.weight + excluded.weight
                "#,
            )?;
            for tag in tags {
                stmt.execute(params![tag, amount])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn create_session(&self, session_id: &str, seed_url: &str, config: &SessionConfig) -> Result<()> {
        let config_json = serde_json::to_string(config)?;
        self.conn()?.execute(
            "INSERT INTO sessions (session_id, seed_url, created_at, config_json) VALUES (?1, ?2, ?3, ?4)",
            params![session_id, seed_url, utcnow(), config_json],
        )?;
        Ok(())
    }

    fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let row = self
            .conn()?
            .query_row(
                "SELECT session_id, seed_url, created_at, config_json FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((session_id, seed_url, created_at, config_json)) => Ok(Some(SessionRecord {
                session_id,
                seed_url,
                created_at,
                config: serde_json::from_str(&config_json)?,
            })),
            None => Ok(None),
        }
    }

    fn add_session_item(
        &self,
        session_id: &str,
        idx: usize,
        video_id: &str,
        url: &str,
        title: Option<&str>,
        explain: &Explain,
    ) -> Result<()> {
        let explain_json = serde_json::to_string(explain)?;
        self.conn()?.execute(
            r#"
            INSERT INTO session_items (session_id, idx, video_id, url, title, explain_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![session_id, idx as i64, video_id, url, title, explain_json],
        )?;
        Ok(())
    }

    fn list_session_items(&self, session_id: &str) -> Result<Vec<SessionItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT idx, video_id, url, title, explain_json
            FROM session_items
            WHERE session_id = ?1
            ORDER BY idx ASC
            "#,
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (idx, video_id, url, title, explain_json) = row?;
            items.push(SessionItem {
                idx: idx as usize,
                video_id,
                url,
                title,
                explain: serde_json::from_str(&explain_json)?,
            });
        }
        Ok(items)
    }

    fn add_feedback(&self, session_id: &str, video_id: &str, action: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO feedback (session_id, video_id, action, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![session_id, video_id, action, utcnow()],
        )?;
        Ok(())
    }

    fn list_feedback(&self, session_id: &str) -> Result<Vec<FeedbackEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, video_id, action, created_at FROM feedback WHERE session_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok(FeedbackEntry {
                session_id: row.get(0)?,
                video_id: row.get(1)?,
                action: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}
