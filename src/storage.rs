use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::logging::log_storage;
use crate::outcome::{CardRank, Outcome};
use crate::record::ResultRecord;
use crate::state::{History, Round};

/// SQLite persistence for session rounds and emitted analyses.
pub struct SessionStore {
    conn: Connection,
}

impl SessionStore {
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("opening {}", path))?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS rounds (
                session_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                outcome TEXT NOT NULL,
                card INTEGER,
                PRIMARY KEY (session_id, seq)
            );
            CREATE TABLE IF NOT EXISTS analyses (
                ts INTEGER NOT NULL,
                session_id TEXT NOT NULL,
                history_len INTEGER NOT NULL,
                fingerprint TEXT NOT NULL,
                call TEXT,
                confidence REAL NOT NULL,
                red REAL NOT NULL,
                blue REAL NOT NULL,
                tie REAL NOT NULL,
                level INTEGER NOT NULL,
                alert TEXT NOT NULL,
                labels TEXT NOT NULL
            );
            COMMIT;",
        )?;
        Ok(())
    }

    /// Replace the stored rounds of a session with the current history.
    pub fn save_history(&mut self, session_id: &str, history: &History) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM rounds WHERE session_id = ?1", params![session_id])?;
        for (seq, r) in history.iter().enumerate() {
            tx.execute(
                "INSERT INTO rounds (session_id, seq, outcome, card) VALUES (?1, ?2, ?3, ?4)",
                params![session_id, seq as i64, r.outcome.as_str(), r.card.map(|c| c.value() as i64)],
            )?;
        }
        tx.commit()?;
        log_storage("save_history", session_id, history.len());
        Ok(())
    }

    /// Stored rounds of a session, oldest first.
    pub fn load_rounds(&self, session_id: &str) -> Result<Vec<Round>> {
        let mut stmt = self
            .conn
            .prepare("SELECT outcome, card FROM rounds WHERE session_id = ?1 ORDER BY seq")?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?))
        })?;
        let mut rounds = Vec::new();
        for row in rows {
            let (outcome, card) = row?;
            let outcome: Outcome = outcome.parse().context("stored outcome")?;
            let card = match card {
                Some(v) => Some(CardRank::new(u8::try_from(v).unwrap_or(0)).context("stored card")?),
                None => None,
            };
            rounds.push(Round { outcome, card });
        }
        log_storage("load_rounds", session_id, rounds.len());
        Ok(rounds)
    }

    pub fn record_analysis(&mut self, ts: u64, session_id: &str, rec: &ResultRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO analyses
                (ts, session_id, history_len, fingerprint, call, confidence,
                 red, blue, tie, level, alert, labels)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                ts as i64,
                session_id,
                rec.history_len as i64,
                rec.history_fingerprint,
                rec.recommendation.outcome.map(|o| o.as_str()),
                rec.recommendation.confidence_percent,
                rec.distribution.red,
                rec.distribution.blue,
                rec.distribution.tie,
                rec.manipulation_level as i64,
                rec.alert_tier.as_str(),
                serde_json::to_string(&rec.pattern_labels)?,
            ],
        )?;
        Ok(())
    }

    pub fn analysis_count(&self, session_id: &str) -> Result<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM analyses WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }
}
