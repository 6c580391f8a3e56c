/// Database module for the schedule snapshot and chat contacts

mod error;
mod types;

pub use error::StoreError;
pub use types::{ScheduleDate, Selector, UserContact};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row, TransactionBehavior};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

use crate::record::{compact_name, split_teachers, teacher_field_matches, ScheduleRecord};

const SCHEMA_SQL: &str = include_str!("../../../../sql/init_schedule.sql");

const LIVE_TABLE: &str = "schedules";
const SHADOW_TABLE: &str = "schedules_next";

const RECORD_COLUMNS: &str =
    "date, day, group_name, teacher, subject, lesson_number, classroom, arrival_time";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// DDL for a table with the schedule layout.
fn schedule_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL DEFAULT '',
            day TEXT NOT NULL DEFAULT '',
            group_name TEXT NOT NULL DEFAULT '',
            teacher TEXT NOT NULL DEFAULT '',
            subject TEXT NOT NULL DEFAULT '',
            lesson_number TEXT NOT NULL DEFAULT '',
            classroom TEXT NOT NULL DEFAULT '',
            arrival_time TEXT NOT NULL DEFAULT '',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );"
    )
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ScheduleRecord> {
    Ok(ScheduleRecord {
        date: row.get(0)?,
        day: row.get(1)?,
        group: row.get(2)?,
        teacher: row.get(3)?,
        subject: row.get(4)?,
        lesson_number: row.get(5)?,
        classroom: row.get(6)?,
        arrival_time: row.get(7)?,
    })
}

/// Sort key for lessons within a day: announcement slots (no lesson number)
/// come first, then numbered lessons ascending, then anything unparseable.
fn lesson_order(record: &ScheduleRecord) -> (u8, u32) {
    if record.is_announcement() {
        return (0, 0);
    }

    let number = record.lesson_number.trim();
    let digits: String = number.chars().take_while(|c| c.is_ascii_digit()).collect();
    match digits.parse::<u32>() {
        Ok(n) => (1, n),
        Err(_) => (2, 0),
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StoreError> {
    conn.lock().map_err(|_| StoreError::Poisoned)
}

/// The current schedule snapshot plus the contact list.
///
/// Writes (schedule swaps, contact upserts) go through one connection and
/// queries through another. With WAL enabled a reader always sees the last
/// committed snapshot, and a schedule swap commits in a single transaction,
/// so queries observe either the old or the new record set in full.
pub struct ScheduleStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl ScheduleStore {
    /// Opens (or creates) the database at `db_path` and initializes the schema
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        let writer = Self::connect(db_path)?;
        writer.execute_batch(SCHEMA_SQL)?;
        writer.execute_batch(&schedule_table_sql(LIVE_TABLE))?;
        // A shadow left behind by an interrupted swap is never read.
        writer.execute_batch(&format!("DROP TABLE IF EXISTS {SHADOW_TABLE};"))?;

        let reader = Self::connect(db_path)?;

        info!(path = %db_path.display(), "Opened schedule database");

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    }

    fn connect(db_path: &Path) -> Result<Connection, StoreError> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Replaces the whole schedule with `records`.
    ///
    /// The new set is written into a shadow table first; the shadow then
    /// takes the live table's place in one IMMEDIATE transaction. Any
    /// failure leaves the previous snapshot untouched.
    pub fn replace_schedule(&self, records: &[ScheduleRecord]) -> Result<usize, StoreError> {
        let mut db = lock(&self.writer)?;

        let tx = db.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {SHADOW_TABLE}; {}",
            schedule_table_sql(SHADOW_TABLE)
        ))?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {SHADOW_TABLE} ({RECORD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ))?;
            for record in records {
                stmt.execute(params![
                    record.date,
                    record.day,
                    record.group,
                    record.teacher,
                    record.subject,
                    record.lesson_number,
                    record.classroom,
                    record.arrival_time,
                ])?;
            }
        }
        tx.commit()?;
        debug!(records = records.len(), "Shadow schedule table built");

        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {LIVE_TABLE};
             ALTER TABLE {SHADOW_TABLE} RENAME TO {LIVE_TABLE};"
        ))?;
        tx.commit()?;

        info!(records = records.len(), "Schedule snapshot replaced");
        Ok(records.len())
    }

    /// Number of records in the current snapshot.
    pub fn record_count(&self) -> Result<usize, StoreError> {
        let db = lock(&self.reader)?;
        let count: i64 = db.query_row(
            &format!("SELECT COUNT(*) FROM {LIVE_TABLE}"),
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Gets every record of the current snapshot in document order
    pub fn all_records(&self) -> Result<Vec<ScheduleRecord>, StoreError> {
        let db = lock(&self.reader)?;
        let mut stmt = db.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM {LIVE_TABLE} ORDER BY id"
        ))?;
        let records = stmt.query_map([], record_from_row)?;
        Ok(records.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// All group codes, alphabetically.
    pub fn distinct_groups(&self) -> Result<Vec<String>, StoreError> {
        let db = lock(&self.reader)?;
        let mut stmt = db.prepare(&format!(
            "SELECT DISTINCT group_name FROM {LIVE_TABLE} WHERE group_name != ''"
        ))?;
        let groups = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(groups.into_iter().collect())
    }

    /// All individual teachers, alphabetically. Co-taught fields contribute
    /// each of their names separately.
    pub fn distinct_teachers(&self) -> Result<Vec<String>, StoreError> {
        let db = lock(&self.reader)?;
        let mut stmt = db.prepare(&format!(
            "SELECT DISTINCT teacher FROM {LIVE_TABLE} WHERE teacher != ''"
        ))?;
        let fields = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let teachers: BTreeSet<String> = fields
            .iter()
            .flat_map(|field| split_teachers(field))
            .map(str::to_string)
            .collect();
        Ok(teachers.into_iter().collect())
    }

    /// Days on which the selected group or teacher has anything scheduled,
    /// in the order they first appear in the document.
    pub fn available_dates(&self, selector: &Selector) -> Result<Vec<ScheduleDate>, StoreError> {
        let db = lock(&self.reader)?;
        let mut stmt = db.prepare(&format!(
            "SELECT date, day, group_name, teacher FROM {LIVE_TABLE} ORDER BY id"
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok((
                ScheduleDate {
                    date: row.get(0)?,
                    day: row.get(1)?,
                },
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut seen = HashSet::new();
        let mut dates = Vec::new();
        for row in rows {
            let (date, group, teacher) = row?;
            let selected = match selector {
                Selector::Group(wanted) => &group == wanted,
                Selector::Teacher(wanted) => teacher_field_matches(&teacher, wanted),
            };
            if selected && seen.insert(date.clone()) {
                dates.push(date);
            }
        }

        Ok(dates)
    }

    /// Lessons of the selected group or teacher on `date`, in lesson order.
    ///
    /// Announcement slots (empty lesson number) sort before numbered lessons;
    /// ties keep document order.
    pub fn schedule_for(
        &self,
        selector: &Selector,
        date: &str,
    ) -> Result<Vec<ScheduleRecord>, StoreError> {
        let db = lock(&self.reader)?;
        let mut stmt = db.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM {LIVE_TABLE} WHERE date = ?1 ORDER BY id"
        ))?;
        let records = stmt
            .query_map([date], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut selected: Vec<_> = records
            .into_iter()
            .filter(|record| match selector {
                Selector::Group(wanted) => &record.group == wanted,
                Selector::Teacher(wanted) => record.taught_by(wanted),
            })
            .collect();
        selected.sort_by_key(lesson_order);

        Ok(selected)
    }

    /// Teachers sharing a co-taught field with `teacher`, excluding `teacher`.
    pub fn co_teachers(&self, teacher: &str) -> Result<Vec<String>, StoreError> {
        let wanted = compact_name(teacher);
        let db = lock(&self.reader)?;
        let mut stmt = db.prepare(&format!(
            "SELECT DISTINCT teacher FROM {LIVE_TABLE} WHERE teacher LIKE '%/%'"
        ))?;
        let fields = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let co_teachers: BTreeSet<String> = fields
            .iter()
            .filter(|field| teacher_field_matches(field, teacher))
            .flat_map(|field| split_teachers(field))
            .filter(|name| compact_name(name) != wanted)
            .map(str::to_string)
            .collect();
        Ok(co_teachers.into_iter().collect())
    }

    /// Records an inbound interaction from `chat_id`.
    pub fn touch_contact(&self, chat_id: i64) -> Result<(), StoreError> {
        self.touch_contact_at(chat_id, Utc::now())
    }

    pub fn touch_contact_at(&self, chat_id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        let db = lock(&self.writer)?;
        db.execute(
            "INSERT INTO users (chat_id, last_interaction) VALUES (?1, ?2)
             ON CONFLICT(chat_id) DO UPDATE SET last_interaction = excluded.last_interaction",
            params![chat_id, at],
        )?;
        Ok(())
    }

    /// Every known contact, ordered by chat id.
    pub fn contacts(&self) -> Result<Vec<UserContact>, StoreError> {
        let db = lock(&self.reader)?;
        let mut stmt =
            db.prepare("SELECT chat_id, last_interaction FROM users ORDER BY chat_id")?;
        let contacts = stmt.query_map([], |row| {
            Ok(UserContact {
                chat_id: row.get(0)?,
                last_interaction: row.get(1)?,
            })
        })?;
        Ok(contacts.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
