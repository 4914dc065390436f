use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackPosition {
    pub id: i64,
    pub playlist_url: String,
    pub item_url: String,
    pub position: u64,
    pub updated_at: DateTime<Utc>,
}

pub struct Database {
    conn: Connection,
}

const SELECT_COLUMNS: &str =
    "SELECT id, playlist_url, item_url, position, updated_at FROM playback_position";

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        let journal_mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "wal", |row| row.get(0))
            .context("failed to enable write-ahead logging")?;
        if !journal_mode.eq_ignore_ascii_case("wal") {
            bail!(
                "database at {} refused WAL mode ({journal_mode})",
                path.display()
            );
        }
        conn.pragma_update(None, "synchronous", "full")?;
        conn.pragma_update(None, "foreign_keys", "off")?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS playback_position (
                id INTEGER PRIMARY KEY,
                playlist_url TEXT NOT NULL,
                item_url TEXT NOT NULL,
                position INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_playback_position_pair
                ON playback_position(playlist_url, item_url);
            CREATE INDEX IF NOT EXISTS idx_playback_position_latest
                ON playback_position(playlist_url, updated_at DESC);
            "#,
        )?;
        Ok(())
    }

    /// Returns the record for the pair, inserting one at position 0 when missing.
    /// The flag is `true` only when this call created the row.
    pub fn get_or_create(
        &self,
        playlist_url: &str,
        item_url: &str,
    ) -> Result<(PlaybackPosition, bool)> {
        if playlist_url.is_empty() || item_url.is_empty() {
            bail!("playlist and item identifiers must be non-empty");
        }

        let inserted = self.conn.execute(
            r#"
            INSERT INTO playback_position (playlist_url, item_url, position, updated_at)
            VALUES (?1, ?2, 0, ?3)
            ON CONFLICT(playlist_url, item_url) DO NOTHING
            "#,
            params![playlist_url, item_url, format_timestamp(Utc::now())],
        )?;

        let record = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE playlist_url = ?1 AND item_url = ?2"),
                params![playlist_url, item_url],
                row_to_position,
            )
            .with_context(|| format!("failed to load position for {item_url}"))?;
        Ok((record, inserted == 1))
    }

    pub fn get_latest(&self, playlist_url: &str) -> Result<Option<PlaybackPosition>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "{SELECT_COLUMNS} WHERE playlist_url = ?1 ORDER BY updated_at DESC, id DESC LIMIT 1"
                ),
                params![playlist_url],
                row_to_position,
            )
            .optional()?;
        Ok(record)
    }

    pub fn update(&self, record: &mut PlaybackPosition, new_position: u64) -> Result<()> {
        self.update_at(record, new_position, Utc::now())
    }

    pub(crate) fn update_at(
        &self,
        record: &mut PlaybackPosition,
        new_position: u64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let updated_at = now.trunc_subsecs(6).max(record.updated_at);
        let stored = i64::try_from(new_position).context("position out of range")?;
        let changed = self.conn.execute(
            "UPDATE playback_position SET position = ?1, updated_at = ?2 WHERE id = ?3",
            params![stored, format_timestamp(updated_at), record.id],
        )?;
        if changed == 0 {
            bail!(
                "position record {} for {} no longer exists",
                record.id,
                record.item_url
            );
        }
        record.position = new_position;
        record.updated_at = updated_at;
        Ok(())
    }

    pub fn list(&self, playlist_url: Option<&str>) -> Result<Vec<PlaybackPosition>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE ?1 IS NULL OR playlist_url = ?1 ORDER BY updated_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![playlist_url], row_to_position)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, err)| err)
            .context("failed to close database")
    }
}

// Fixed precision keeps lexical order of the column equal to chronological order.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_position(row: &Row<'_>) -> rusqlite::Result<PlaybackPosition> {
    let position: i64 = row.get(3)?;
    let raw_updated: String = row.get(4)?;
    let updated_at = DateTime::parse_from_rfc3339(&raw_updated)
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(err))
        })?
        .with_timezone(&Utc);
    Ok(PlaybackPosition {
        id: row.get(0)?,
        playlist_url: row.get(1)?,
        item_url: row.get(2)?,
        position: u64::try_from(position).unwrap_or(0),
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    use chrono::{Duration, TimeZone};

    use super::*;

    struct TempDbDir {
        path: PathBuf,
    }

    impl TempDbDir {
        fn new(tag: &str) -> Self {
            let ts = Utc::now().timestamp_nanos_opt().unwrap_or(0);
            let name = format!("kiosk-resume-{tag}-{}-{ts}", std::process::id());
            Self {
                path: env::temp_dir().join(name),
            }
        }
    }

    impl Drop for TempDbDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    // Well past creation time so explicit timestamps always win over `now`.
    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(4_000_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn get_or_create_returns_same_record_on_second_call() {
        let db = Database::open_in_memory().unwrap();
        let (first, created) = db.get_or_create("http://pl", "a.mp4").unwrap();
        assert!(created);
        assert_eq!(first.position, 0);

        let (second, created) = db.get_or_create("http://pl", "a.mp4").unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
    }

    #[test]
    fn get_or_create_rejects_empty_identifiers() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_or_create("", "a.mp4").is_err());
        assert!(db.get_or_create("http://pl", "").is_err());
        assert!(db.list(None).unwrap().is_empty());
    }

    #[test]
    fn get_or_create_accepts_any_non_empty_identifier() {
        let db = Database::open_in_memory().unwrap();
        let (record, created) = db.get_or_create("http://pl", " ").unwrap();
        assert!(created);
        assert_eq!(record.item_url, " ");

        let (again, created) = db.get_or_create("http://pl", " ").unwrap();
        assert!(!created);
        assert_eq!(again.id, record.id);
    }

    #[test]
    fn same_item_under_different_playlists_is_tracked_separately() {
        let db = Database::open_in_memory().unwrap();
        let (one, _) = db.get_or_create("http://pl-1", "a.mp4").unwrap();
        let (two, created) = db.get_or_create("http://pl-2", "a.mp4").unwrap();
        assert!(created);
        assert_ne!(one.id, two.id);
    }

    #[test]
    fn get_latest_returns_none_for_unknown_playlist() {
        let db = Database::open_in_memory().unwrap();
        db.get_or_create("http://other", "x.mp4").unwrap();
        assert!(db.get_latest("http://pl").unwrap().is_none());
    }

    #[test]
    fn get_latest_picks_most_recently_updated_item() {
        let db = Database::open_in_memory().unwrap();
        let (mut a, _) = db.get_or_create("http://pl", "a.mp4").unwrap();
        let (mut b, _) = db.get_or_create("http://pl", "b.mp4").unwrap();
        let (mut other, _) = db.get_or_create("http://other", "z.mp4").unwrap();

        db.update_at(&mut a, 30, at(100)).unwrap();
        db.update_at(&mut b, 10, at(50)).unwrap();
        db.update_at(&mut other, 5, at(500)).unwrap();

        let latest = db
            .get_latest("http://pl")
            .unwrap()
            .expect("record expected");
        assert_eq!(latest.item_url, "a.mp4");
        assert_eq!(latest.position, 30);

        db.update_at(&mut b, 11, at(200)).unwrap();
        let latest = db
            .get_latest("http://pl")
            .unwrap()
            .expect("record expected");
        assert_eq!(latest.item_url, "b.mp4");
        assert_eq!(latest.updated_at, at(200));
    }

    #[test]
    fn update_with_same_position_only_moves_timestamp() {
        let db = Database::open_in_memory().unwrap();
        let (mut record, _) = db.get_or_create("http://pl", "a.mp4").unwrap();

        db.update_at(&mut record, 42, at(10)).unwrap();
        let first = db.get_latest("http://pl").unwrap().unwrap();
        db.update_at(&mut record, 42, at(20)).unwrap();
        let second = db.get_latest("http://pl").unwrap().unwrap();

        assert_eq!(first.position, 42);
        assert_eq!(second.position, 42);
        assert_eq!(second.id, first.id);
        assert_eq!(second.updated_at - first.updated_at, Duration::seconds(10));
    }

    #[test]
    fn update_never_moves_timestamp_backwards() {
        let db = Database::open_in_memory().unwrap();
        let (mut record, _) = db.get_or_create("http://pl", "a.mp4").unwrap();
        db.update_at(&mut record, 1, at(100)).unwrap();
        db.update_at(&mut record, 2, at(40)).unwrap();

        let stored = db.get_latest("http://pl").unwrap().unwrap();
        assert_eq!(stored.position, 2);
        assert_eq!(stored.updated_at, at(100));
        assert_eq!(record.updated_at, at(100));
    }

    #[test]
    fn list_orders_newest_first_and_filters_by_playlist() {
        let db = Database::open_in_memory().unwrap();
        let (mut a, _) = db.get_or_create("http://pl", "a.mp4").unwrap();
        let (mut b, _) = db.get_or_create("http://pl", "b.mp4").unwrap();
        let (mut c, _) = db.get_or_create("http://other", "c.mp4").unwrap();
        db.update_at(&mut a, 1, at(1)).unwrap();
        db.update_at(&mut b, 2, at(3)).unwrap();
        db.update_at(&mut c, 3, at(2)).unwrap();

        let all: Vec<_> = db
            .list(None)
            .unwrap()
            .into_iter()
            .map(|p| p.item_url)
            .collect();
        assert_eq!(all, vec!["b.mp4", "c.mp4", "a.mp4"]);

        let filtered: Vec<_> = db
            .list(Some("http://pl"))
            .unwrap()
            .into_iter()
            .map(|p| p.item_url)
            .collect();
        assert_eq!(filtered, vec!["b.mp4", "a.mp4"]);
    }

    #[test]
    fn positions_survive_reopen() {
        let dir = TempDbDir::new("reopen");
        let path = dir.path.join("nested").join("kiosk.db");

        let db = Database::open(&path).unwrap();
        db.migrate().unwrap();
        let (mut record, _) = db.get_or_create("http://pl", "a.mp4").unwrap();
        db.update(&mut record, 90).unwrap();
        db.close().unwrap();

        let db = Database::open(&path).unwrap();
        db.migrate().unwrap();
        let stored = db
            .get_latest("http://pl")
            .unwrap()
            .expect("record expected");
        assert_eq!(stored.position, 90);
        assert_eq!(stored.id, record.id);
    }
}
