use crate::app_dirs::AppDirs;
use crate::error::StoreResult;
use crate::record::{LeaderboardKey, Record};
use crate::session::{FingerMode, ModeKind};
use chrono::{DateTime, Local};
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Most recent records returned per board
pub const HISTORY_LIMIT: usize = 10;

/// Persistence for finished sessions, one board per (finger mode, mode kind)
pub trait RecordStore {
    /// Store `record` and return the board's best afterwards
    fn save(&mut self, mode_kind: ModeKind, record: &Record) -> StoreResult<Record>;

    fn best(&self, key: LeaderboardKey) -> StoreResult<Option<Record>>;

    /// Newest first, at most [`HISTORY_LIMIT`] entries
    fn history(&self, key: LeaderboardKey) -> StoreResult<Vec<Record>>;

    /// Drop every record of one board, returning how many went
    fn clear_board(&mut self, key: LeaderboardKey) -> StoreResult<usize>;

    fn clear_all(&mut self) -> StoreResult<usize> {
        let mut removed = 0;
        for key in LeaderboardKey::all() {
            removed += self.clear_board(key)?;
        }
        Ok(removed)
    }

    /// Best and history of one board as a JSON document
    fn export_json(&self, key: LeaderboardKey) -> StoreResult<String> {
        let doc = serde_json::json!({
            "board": key.slug(),
            "best": self.best(key)?,
            "history": self.history(key)?,
        });
        Ok(serde_json::to_string_pretty(&doc)?)
    }
}

/// Record store backed by a SQLite database
#[derive(Debug)]
pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    /// Open the database at the default state location
    pub fn open_default() -> StoreResult<Self> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("renda_records.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), "opening record database");
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                board TEXT NOT NULL,
                value REAL NOT NULL,
                date TEXT NOT NULL,
                had_false_start BOOLEAN NOT NULL,
                used_ticket BOOLEAN NOT NULL DEFAULT 0,
                finger_mode INTEGER NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_records_board ON records(board)",
            [],
        )?;

        Ok(Self { conn })
    }

    fn row_to_record(row: &Row) -> rusqlite::Result<Record> {
        let date_str: String = row.get(1)?;
        let date = DateTime::parse_from_rfc3339(&date_str)
            .map_err(|_| {
                rusqlite::Error::InvalidColumnType(1, "date".to_string(), rusqlite::types::Type::Text)
            })?
            .with_timezone(&Local);

        let finger_mode = FingerMode::try_from(row.get::<_, u8>(4)?).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Integer, e.into())
        })?;

        Ok(Record {
            value: row.get(0)?,
            date,
            had_false_start: row.get(2)?,
            used_ticket: row.get(3)?,
            finger_mode,
        })
    }

    fn query_records(&self, sql: &str, board: &str) -> StoreResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([board], Self::row_to_record)?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }
}

impl RecordStore for SqliteRecordStore {
    fn save(&mut self, mode_kind: ModeKind, record: &Record) -> StoreResult<Record> {
        let key = LeaderboardKey::for_record(record, mode_kind);
        self.conn.execute(
            r#"
            INSERT INTO records
            (board, value, date, had_false_start, used_ticket, finger_mode)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                key.slug(),
                record.value,
                record.date.to_rfc3339(),
                record.had_false_start,
                record.used_ticket,
                record.finger_mode.as_u8(),
            ],
        )?;
        info!(board = %key.slug(), value = record.value, "record saved");

        // the row just written guarantees a best exists
        Ok(self.best(key)?.unwrap_or_else(|| record.clone()))
    }

    fn best(&self, key: LeaderboardKey) -> StoreResult<Option<Record>> {
        let order = match key.mode_kind {
            ModeKind::TimeAttack => "ASC",
            ModeKind::TapChallenge => "DESC",
        };
        let sql = format!(
            r#"
            SELECT value, date, had_false_start, used_ticket, finger_mode
            FROM records
            WHERE board = ?1
            ORDER BY value {order}, id ASC
            LIMIT 1
            "#
        );
        Ok(self.query_records(&sql, &key.slug())?.into_iter().next())
    }

    fn history(&self, key: LeaderboardKey) -> StoreResult<Vec<Record>> {
        let sql = format!(
            r#"
            SELECT value, date, had_false_start, used_ticket, finger_mode
            FROM records
            WHERE board = ?1
            ORDER BY id DESC
            LIMIT {HISTORY_LIMIT}
            "#
        );
        self.query_records(&sql, &key.slug())
    }

    fn clear_board(&mut self, key: LeaderboardKey) -> StoreResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM records WHERE board = ?1", [key.slug()])?;
        info!(board = %key.slug(), removed, "board cleared");
        Ok(removed)
    }

    fn clear_all(&mut self) -> StoreResult<usize> {
        let removed = self.conn.execute("DELETE FROM records", [])?;
        info!(removed, "all boards cleared");
        Ok(removed)
    }
}

/// Record store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    boards: HashMap<LeaderboardKey, Vec<Record>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn save(&mut self, mode_kind: ModeKind, record: &Record) -> StoreResult<Record> {
        let key = LeaderboardKey::for_record(record, mode_kind);
        self.boards.entry(key).or_default().push(record.clone());
        Ok(self.best(key)?.unwrap_or_else(|| record.clone()))
    }

    fn best(&self, key: LeaderboardKey) -> StoreResult<Option<Record>> {
        let best = self.boards.get(&key).and_then(|records| {
            records.iter().fold(None, |best: Option<&Record>, r| match best {
                Some(b) if !r.beats(b, key.mode_kind) => Some(b),
                _ => Some(r),
            })
        });
        Ok(best.cloned())
    }

    fn history(&self, key: LeaderboardKey) -> StoreResult<Vec<Record>> {
        Ok(self
            .boards
            .get(&key)
            .map(|records| records.iter().rev().take(HISTORY_LIMIT).cloned().collect())
            .unwrap_or_default())
    }

    fn clear_board(&mut self, key: LeaderboardKey) -> StoreResult<usize> {
        Ok(self.boards.remove(&key).map_or(0, |records| records.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use tempfile::tempdir;

    fn record(value: f64, minute: i64, finger_mode: FingerMode) -> Record {
        let base = Local.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        Record::new(value, base + ChronoDuration::minutes(minute), false, finger_mode)
    }

    fn exercise_best_and_history(store: &mut dyn RecordStore) {
        let ta = LeaderboardKey::new(FingerMode::One, ModeKind::TimeAttack);
        let tc = LeaderboardKey::new(FingerMode::One, ModeKind::TapChallenge);

        assert_eq!(store.best(ta).unwrap(), None);
        assert!(store.history(ta).unwrap().is_empty());

        let best = store.save(ModeKind::TimeAttack, &record(14.2, 0, FingerMode::One)).unwrap();
        assert_eq!(best.value, 14.2);
        let best = store.save(ModeKind::TimeAttack, &record(12.9, 1, FingerMode::One)).unwrap();
        assert_eq!(best.value, 12.9);
        let best = store.save(ModeKind::TimeAttack, &record(13.5, 2, FingerMode::One)).unwrap();
        assert_eq!(best.value, 12.9);

        store.save(ModeKind::TapChallenge, &record(60.0, 3, FingerMode::One)).unwrap();
        let best = store.save(ModeKind::TapChallenge, &record(72.0, 4, FingerMode::One)).unwrap();
        assert_eq!(best.value, 72.0);

        let history: Vec<f64> = store.history(ta).unwrap().iter().map(|r| r.value).collect();
        assert_eq!(history, vec![13.5, 12.9, 14.2]);
        assert_eq!(store.history(tc).unwrap().len(), 2);
    }

    fn exercise_board_isolation(store: &mut dyn RecordStore) {
        store.save(ModeKind::TimeAttack, &record(10.0, 0, FingerMode::Two)).unwrap();
        let one = LeaderboardKey::new(FingerMode::One, ModeKind::TimeAttack);
        let two = LeaderboardKey::new(FingerMode::Two, ModeKind::TimeAttack);
        assert_eq!(store.best(one).unwrap(), None);
        assert_eq!(store.best(two).unwrap().unwrap().finger_mode, FingerMode::Two);
    }

    fn exercise_history_limit_and_ties(store: &mut dyn RecordStore) {
        let key = LeaderboardKey::new(FingerMode::One, ModeKind::TapChallenge);
        for i in 0..15 {
            store.save(ModeKind::TapChallenge, &record(50.0, i, FingerMode::One)).unwrap();
        }
        let history = store.history(key).unwrap();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].date, record(0.0, 14, FingerMode::One).date);

        // equal scores keep the earliest record as best
        let best = store.best(key).unwrap().unwrap();
        assert_eq!(best.date, record(0.0, 0, FingerMode::One).date);
    }

    #[test]
    fn sqlite_best_and_history() {
        let mut store = SqliteRecordStore::open_in_memory().unwrap();
        exercise_best_and_history(&mut store);
    }

    #[test]
    fn memory_best_and_history() {
        let mut store = MemoryRecordStore::new();
        exercise_best_and_history(&mut store);
    }

    #[test]
    fn sqlite_boards_are_isolated() {
        let mut store = SqliteRecordStore::open_in_memory().unwrap();
        exercise_board_isolation(&mut store);
    }

    #[test]
    fn memory_boards_are_isolated() {
        let mut store = MemoryRecordStore::new();
        exercise_board_isolation(&mut store);
    }

    #[test]
    fn sqlite_history_limit_and_ties() {
        let mut store = SqliteRecordStore::open_in_memory().unwrap();
        exercise_history_limit_and_ties(&mut store);
    }

    #[test]
    fn memory_history_limit_and_ties() {
        let mut store = MemoryRecordStore::new();
        exercise_history_limit_and_ties(&mut store);
    }

    #[test]
    fn sqlite_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("records.db");
        {
            let mut store = SqliteRecordStore::open(&path).unwrap();
            let mut r = record(11.11, 0, FingerMode::Two);
            r.had_false_start = true;
            store.save(ModeKind::TimeAttack, &r).unwrap();
        }
        let store = SqliteRecordStore::open(&path).unwrap();
        let best = store
            .best(LeaderboardKey::new(FingerMode::Two, ModeKind::TimeAttack))
            .unwrap()
            .unwrap();
        assert_eq!(best.value, 11.11);
        assert!(best.had_false_start);
        assert!(!best.used_ticket);
        assert_eq!(best.date, record(0.0, 0, FingerMode::Two).date);
    }

    #[test]
    fn sqlite_clear_board_only_touches_that_board() {
        let mut store = SqliteRecordStore::open_in_memory().unwrap();
        store.save(ModeKind::TimeAttack, &record(10.0, 0, FingerMode::One)).unwrap();
        store.save(ModeKind::TapChallenge, &record(70.0, 1, FingerMode::One)).unwrap();

        let removed = store
            .clear_board(LeaderboardKey::new(FingerMode::One, ModeKind::TimeAttack))
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store
            .best(LeaderboardKey::new(FingerMode::One, ModeKind::TapChallenge))
            .unwrap()
            .is_some());

        assert_eq!(store.clear_all().unwrap(), 1);
        assert!(store
            .best(LeaderboardKey::new(FingerMode::One, ModeKind::TapChallenge))
            .unwrap()
            .is_none());
    }

    #[test]
    fn memory_clear_all_empties_every_board() {
        let mut store = MemoryRecordStore::new();
        store.save(ModeKind::TimeAttack, &record(10.0, 0, FingerMode::One)).unwrap();
        store.save(ModeKind::TimeAttack, &record(9.0, 1, FingerMode::Two)).unwrap();
        store.save(ModeKind::TapChallenge, &record(70.0, 2, FingerMode::Two)).unwrap();

        let key = LeaderboardKey::new(FingerMode::Two, ModeKind::TimeAttack);
        assert_eq!(store.clear_board(key).unwrap(), 1);
        assert_eq!(store.clear_board(key).unwrap(), 0);
        assert_eq!(store.clear_all().unwrap(), 2);
        for key in LeaderboardKey::all() {
            assert!(store.history(key).unwrap().is_empty());
        }
    }

    #[test]
    fn export_json_contains_board_best_and_history() {
        let mut store = MemoryRecordStore::new();
        store.save(ModeKind::TapChallenge, &record(66.0, 0, FingerMode::Two)).unwrap();
        let key = LeaderboardKey::new(FingerMode::Two, ModeKind::TapChallenge);

        let doc: serde_json::Value = serde_json::from_str(&store.export_json(key).unwrap()).unwrap();
        assert_eq!(doc["board"], "tap_challenge_2");
        assert_eq!(doc["best"]["value"], 66.0);
        assert_eq!(doc["history"].as_array().unwrap().len(), 1);
    }
}
