use std::path::Path;

use rusqlite::{params, Connection};

use super::{EventSink, SessionTag};
use crate::analytics::{FeedbackRecord, JudgmentEvent, SessionSummary, SinkRecord, SummaryRecord};
use crate::error::SinkError;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS judgment_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        player TEXT NOT NULL,
        mode TEXT NOT NULL,
        session TEXT NOT NULL,
        occurred_at_ms INTEGER NOT NULL,
        level INTEGER NOT NULL,
        lane INTEGER NOT NULL,
        outcome TEXT NOT NULL,
        reaction_time_ms INTEGER,
        reaction_distance REAL,
        speed REAL NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS level_feedback (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        player TEXT NOT NULL,
        mode TEXT NOT NULL,
        session TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        level INTEGER NOT NULL,
        satisfaction INTEGER NOT NULL,
        accomplishment INTEGER NOT NULL,
        frustration INTEGER NOT NULL,
        level_duration_secs REAL NOT NULL,
        exited BOOLEAN NOT NULL
    );
    CREATE TABLE IF NOT EXISTS level_summaries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        player TEXT NOT NULL,
        mode TEXT NOT NULL,
        session TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        level INTEGER NOT NULL,
        hit_rate REAL NOT NULL,
        mean_reaction_ms REAL,
        incorrect_rate REAL NOT NULL,
        level_duration_secs REAL NOT NULL,
        exited BOOLEAN NOT NULL,
        summary_json TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_judgment_events_player ON judgment_events(player);
    CREATE INDEX IF NOT EXISTS idx_level_summaries_player ON level_summaries(player);
"#;

/// Tables the sink writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Events,
    Feedback,
    Summaries,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Table::Events => "judgment_events",
            Table::Feedback => "level_feedback",
            Table::Summaries => "level_summaries",
        }
    }
}

/// Records sessions into a SQLite database, one row per record.
#[derive(Debug)]
pub struct SqliteSink {
    conn: Connection,
    player: String,
    mode: String,
    session: String,
}

impl SqliteSink {
    pub fn open<P: AsRef<Path>>(path: P, tag: &SessionTag) -> Result<Self, SinkError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let sink = Self::with_connection(Connection::open(path)?, tag)?;
        log::info!("recording events to {}", path.display());
        Ok(sink)
    }

    pub fn open_in_memory(tag: &SessionTag) -> Result<Self, SinkError> {
        Self::with_connection(Connection::open_in_memory()?, tag)
    }

    fn with_connection(conn: Connection, tag: &SessionTag) -> Result<Self, SinkError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            player: tag.player.clone(),
            mode: tag.mode.to_string(),
            session: tag.stamp(),
        })
    }

    pub fn count(&self, table: Table) -> Result<i64, SinkError> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    /// Stored summaries for `player`, oldest first.
    pub fn summaries_for(&self, player: &str) -> Result<Vec<SessionSummary>, SinkError> {
        let mut stmt = self.conn.prepare(
            "SELECT summary_json FROM level_summaries WHERE player = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([player], |row| row.get::<_, String>(0))?;

        let mut summaries = Vec::new();
        for json in rows {
            summaries.push(serde_json::from_str(&json?)?);
        }
        Ok(summaries)
    }

    fn insert_event(&self, e: &JudgmentEvent) -> Result<(), SinkError> {
        self.conn.execute(
            r#"
            INSERT INTO judgment_events
            (player, mode, session, occurred_at_ms, level, lane, outcome,
             reaction_time_ms, reaction_distance, speed)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                self.player,
                self.mode,
                self.session,
                e.occurred_at_millis as i64,
                e.level as i64,
                e.lane as i64,
                e.outcome.to_string(),
                e.reaction_time_millis.map(|v| v as i64),
                e.reaction_distance,
                e.speed,
            ],
        )?;
        Ok(())
    }

    fn insert_feedback(&self, f: &FeedbackRecord) -> Result<(), SinkError> {
        self.conn.execute(
            r#"
            INSERT INTO level_feedback
            (player, mode, session, timestamp, level, satisfaction, accomplishment,
             frustration, level_duration_secs, exited)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                self.player,
                self.mode,
                self.session,
                f.timestamp.to_rfc3339(),
                f.level as i64,
                f.ratings.satisfaction,
                f.ratings.accomplishment,
                f.ratings.frustration,
                f.level_duration_secs,
                f.exited,
            ],
        )?;
        Ok(())
    }

    fn insert_summary(&self, r: &SummaryRecord) -> Result<(), SinkError> {
        let s = &r.summary;
        self.conn.execute(
            r#"
            INSERT INTO level_summaries
            (player, mode, session, timestamp, level, hit_rate, mean_reaction_ms,
             incorrect_rate, level_duration_secs, exited, summary_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                self.player,
                self.mode,
                self.session,
                r.timestamp.to_rfc3339(),
                s.level as i64,
                s.hit_rate,
                s.mean_reaction_millis,
                s.incorrect_rate,
                s.level_duration_secs,
                s.exited,
                serde_json::to_string(s)?,
            ],
        )?;
        Ok(())
    }
}

impl EventSink for SqliteSink {
    fn append(&mut self, record: &SinkRecord) -> Result<(), SinkError> {
        match record {
            SinkRecord::Event(e) => self.insert_event(e),
            SinkRecord::Feedback(f) => self.insert_feedback(f),
            SinkRecord::Summary(s) => self.insert_summary(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::FeedbackRatings;
    use crate::difficulty::TraversalMode;
    use crate::judge::Outcome;
    use chrono::Local;
    use std::time::Duration;

    fn event(lane: usize, outcome: Outcome, rt: Option<u64>) -> JudgmentEvent {
        JudgmentEvent {
            occurred_at_millis: 10,
            level: 1,
            lane,
            outcome,
            reaction_time_millis: rt,
            reaction_distance: rt.map(|_| 12.0),
            speed: 2.0,
        }
    }

    fn sink() -> SqliteSink {
        SqliteSink::open_in_memory(&SessionTag::new("ada", TraversalMode::Sequential)).unwrap()
    }

    #[test]
    fn events_land_in_their_table() {
        let mut sink = sink();
        sink.append(&SinkRecord::Event(event(0, Outcome::Hit, Some(100))))
            .unwrap();
        sink.append(&SinkRecord::Event(event(1, Outcome::Miss, None)))
            .unwrap();

        assert_eq!(sink.count(Table::Events).unwrap(), 2);
        assert_eq!(sink.count(Table::Feedback).unwrap(), 0);
        assert_eq!(sink.count(Table::Summaries).unwrap(), 0);
    }

    #[test]
    fn summaries_roundtrip_through_json_column() {
        let mut sink = sink();
        let summary = SessionSummary::from_events(
            &[event(1, Outcome::Hit, Some(90)), event(1, Outcome::Miss, None)],
            4,
            1,
            Duration::from_secs(70),
            false,
        );

        sink.append(&SinkRecord::Feedback(FeedbackRecord {
            timestamp: Local::now(),
            level: 1,
            ratings: FeedbackRatings::new(3, 3, 3).unwrap(),
            level_duration_secs: 70.0,
            exited: false,
        }))
        .unwrap();
        sink.append(&SinkRecord::Summary(SummaryRecord {
            timestamp: Local::now(),
            summary: summary.clone(),
        }))
        .unwrap();

        assert_eq!(sink.count(Table::Feedback).unwrap(), 1);
        let stored = sink.summaries_for("ada").unwrap();
        assert_eq!(stored, vec![summary]);
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("events.db");
        let tag = SessionTag::new("ada", TraversalMode::Shuffled);
        let sink = SqliteSink::open(&path, &tag).unwrap();
        assert!(path.exists());
        assert_eq!(sink.count(Table::Events).unwrap(), 0);
    }
}
