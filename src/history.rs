//! Durable record of applications and searches across runs.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;

/// One submitted (or attempted) application.
#[derive(Clone, Debug, Serialize)]
pub struct ApplicationRecord {
    pub posting_id: String,
    pub title: String,
    pub company: String,
    pub match_score: Option<f64>,
    pub success: bool,
    pub verified: bool,
    pub applied_at: DateTime<Local>,
}

/// One search session summary.
#[derive(Clone, Debug, Serialize)]
pub struct SearchRecord {
    pub keywords: String,
    pub jobs_found: u32,
    pub applications_sent: u32,
    pub searched_at: DateTime<Local>,
}

/// Storage seam for run history. Failures here never abort a run.
pub trait HistoryStore: Send + Sync {
    fn record_application(&self, record: &ApplicationRecord) -> Result<()>;
    fn record_search(&self, record: &SearchRecord) -> Result<()>;
    fn recent_applications(&self, limit: u32) -> Result<Vec<ApplicationRecord>>;
}

/// SQLite-backed history store.
pub struct SqliteHistory {
    conn: Mutex<Connection>,
}

impl SqliteHistory {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open history db: {}", path.display()))?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                posting_id TEXT NOT NULL,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                match_score REAL,
                success INTEGER NOT NULL,
                verified INTEGER NOT NULL,
                applied_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS searches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                keywords TEXT NOT NULL,
                jobs_found INTEGER NOT NULL,
                applications_sent INTEGER NOT NULL,
                searched_at TEXT NOT NULL
            );",
        )?;
        Ok(())
    }
}

impl HistoryStore for SqliteHistory {
    fn record_application(&self, record: &ApplicationRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO applications (posting_id, title, company, match_score, success, verified, applied_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.posting_id,
                record.title,
                record.company,
                record.match_score,
                record.success,
                record.verified,
                record.applied_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn record_search(&self, record: &SearchRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO searches (keywords, jobs_found, applications_sent, searched_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.keywords,
                record.jobs_found,
                record.applications_sent,
                record.searched_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn recent_applications(&self, limit: u32) -> Result<Vec<ApplicationRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT posting_id, title, company, match_score, success, verified, applied_at
             FROM applications ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            let applied_at: String = row.get(6)?;
            Ok((
                ApplicationRecord {
                    posting_id: row.get(0)?,
                    title: row.get(1)?,
                    company: row.get(2)?,
                    match_score: row.get(3)?,
                    success: row.get(4)?,
                    verified: row.get(5)?,
                    applied_at: Local::now(), // replaced below once parsed
                },
                applied_at,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (mut record, raw) = row?;
            record.applied_at = DateTime::parse_from_rfc3339(&raw)
                .with_context(|| format!("invalid applied_at in history: {raw}"))?
                .with_timezone(&Local);
            records.push(record);
        }
        Ok(records)
    }
}

/// No-op store for dry runs and tests that do not care about history.
#[derive(Default)]
pub struct NullHistory;

impl HistoryStore for NullHistory {
    fn record_application(&self, _: &ApplicationRecord) -> Result<()> {
        Ok(())
    }
    fn record_search(&self, _: &SearchRecord) -> Result<()> {
        Ok(())
    }
    fn recent_applications(&self, _: u32) -> Result<Vec<ApplicationRecord>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(posting_id: &str) -> ApplicationRecord {
        ApplicationRecord {
            posting_id: posting_id.into(),
            title: "Data Analyst".into(),
            company: "Acme".into(),
            match_score: Some(82.5),
            success: true,
            verified: false,
            applied_at: Local::now(),
        }
    }

    #[test]
    fn test_roundtrip_applications() {
        let store = SqliteHistory::open_in_memory().unwrap();
        store.record_application(&sample("a1")).unwrap();
        store.record_application(&sample("a2")).unwrap();

        let recent = store.recent_applications(10).unwrap();
        assert_eq!(recent.len(), 2);
        // Most recent first.
        assert_eq!(recent[0].posting_id, "a2");
        assert_eq!(recent[1].posting_id, "a1");
        assert_eq!(recent[0].match_score, Some(82.5));
        assert!(recent[0].success);
        assert!(!recent[0].verified);
    }

    #[test]
    fn test_limit_applies() {
        let store = SqliteHistory::open_in_memory().unwrap();
        for i in 0..5 {
            store.record_application(&sample(&format!("a{i}"))).unwrap();
        }
        assert_eq!(store.recent_applications(3).unwrap().len(), 3);
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        {
            let store = SqliteHistory::open(&path).unwrap();
            store.record_application(&sample("a1")).unwrap();
            store
                .record_search(&SearchRecord {
                    keywords: "data analyst".into(),
                    jobs_found: 12,
                    applications_sent: 3,
                    searched_at: Local::now(),
                })
                .unwrap();
        }
        let reopened = SqliteHistory::open(&path).unwrap();
        assert_eq!(reopened.recent_applications(10).unwrap().len(), 1);
    }
}
