use super::{HouseholdStore, StoreError};
use crate::catalog::{
    decode_audience, decode_level_options, encode_audience, encode_level_options, Catalog,
    CatalogIssue,
};
use crate::domain::{
    Audience, CatalogItem, Category, DateRange, Gender, ItemId, LogEntry, LogId, LogUpsert,
    NewCatalogItem, NewPerson, Person, PersonId, Role, ScoringMode, ScoringRule, TimeConfig,
    UpsertOutcome,
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";
const FORCED_TIMEZONE_KEY: &str = "forced_timezone";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS persons (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        display_name TEXT NOT NULL,
        role TEXT NOT NULL,
        gender TEXT NOT NULL DEFAULT 'unset',
        birth_date TEXT,
        guardian_pin TEXT,
        target_points INTEGER NOT NULL DEFAULT 100
    );

    CREATE TABLE IF NOT EXISTS catalog_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        scoring_mode TEXT NOT NULL,
        category TEXT NOT NULL,
        base_points INTEGER NOT NULL,
        counter_target INTEGER,
        level_options_json TEXT,
        eligible_audience_json TEXT NOT NULL DEFAULT '\"all\"'
    );

    CREATE TABLE IF NOT EXISTS log_entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        person_id INTEGER NOT NULL REFERENCES persons(id) ON DELETE CASCADE,
        item_id INTEGER NOT NULL REFERENCES catalog_items(id) ON DELETE CASCADE,
        calendar_date TEXT NOT NULL,
        value INTEGER NOT NULL,
        note TEXT,
        recorded_at TEXT NOT NULL,
        UNIQUE (person_id, item_id, calendar_date)
    );

    CREATE INDEX IF NOT EXISTS log_entries_by_date ON log_entries (calendar_date);

    CREATE TABLE IF NOT EXISTS time_config (
        key TEXT PRIMARY KEY,
        value TEXT
    );
";

/// Household tables in a single SQLite database file.
pub struct SqliteHouseholdStore {
    conn: Mutex<Connection>,
}

impl SqliteHouseholdStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened household database");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("database mutex poisoned".to_string()))
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|err| StoreError::Corrupt(format!("bad calendar date '{raw}': {err}")))
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|err| StoreError::Corrupt(format!("bad timestamp '{raw}': {err}")))
}

struct PersonRow {
    id: i64,
    display_name: String,
    role: String,
    gender: String,
    birth_date: Option<String>,
    guardian_pin: Option<String>,
    target_points: i64,
}

impl PersonRow {
    const COLUMNS: &'static str =
        "id, display_name, role, gender, birth_date, guardian_pin, target_points";

    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            display_name: row.get(1)?,
            role: row.get(2)?,
            gender: row.get(3)?,
            birth_date: row.get(4)?,
            guardian_pin: row.get(5)?,
            target_points: row.get(6)?,
        })
    }

    fn into_person(self) -> Result<Person, StoreError> {
        let role = Role::parse(&self.role).ok_or_else(|| {
            StoreError::Corrupt(format!("person {} has unknown role '{}'", self.id, self.role))
        })?;
        // An unreadable birth date is treated like a missing one.
        let birth_date = self.birth_date.as_deref().and_then(|raw| {
            NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map_err(|err| warn!(person = self.id, raw, error = %err, "ignoring birth date"))
                .ok()
        });
        Ok(Person {
            id: PersonId(self.id),
            display_name: self.display_name,
            role,
            gender: Gender::parse(&self.gender),
            birth_date,
            guardian_pin: self.guardian_pin,
            target_points: u32::try_from(self.target_points.max(0)).unwrap_or(u32::MAX),
        })
    }
}

struct ItemRow {
    id: i64,
    name: String,
    scoring_mode: String,
    category: String,
    base_points: i32,
    counter_target: Option<i64>,
    level_options_json: Option<String>,
    eligible_audience_json: Option<String>,
}

impl ItemRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            scoring_mode: row.get(2)?,
            category: row.get(3)?,
            base_points: row.get(4)?,
            counter_target: row.get(5)?,
            level_options_json: row.get(6)?,
            eligible_audience_json: row.get(7)?,
        })
    }

    fn into_item(self, issues: &mut Vec<CatalogIssue>) -> CatalogItem {
        let id = ItemId(self.id);

        let mode = ScoringMode::parse(&self.scoring_mode).unwrap_or_else(|| {
            issues.push(CatalogIssue::UnknownScoringMode {
                item_id: id,
                raw: self.scoring_mode.clone(),
            });
            ScoringMode::Boolean
        });
        let category = Category::parse(&self.category).unwrap_or_else(|| {
            issues.push(CatalogIssue::UnknownCategory {
                item_id: id,
                raw: self.category.clone(),
            });
            Category::Recommended
        });

        let rule = match mode {
            ScoringMode::Boolean => ScoringRule::Boolean,
            ScoringMode::Counter => ScoringRule::Counter {
                target: self
                    .counter_target
                    .and_then(|target| u32::try_from(target).ok()),
            },
            ScoringMode::LeveledChoice => ScoringRule::LeveledChoice {
                levels: decode_level_options(id, self.level_options_json.as_deref(), issues),
            },
        };

        let audience = match self.eligible_audience_json.as_deref() {
            Some(raw) => decode_audience(id, raw, issues),
            None => Audience::All,
        };

        CatalogItem {
            id,
            name: self.name,
            category,
            base_points: self.base_points,
            rule,
            audience,
        }
    }
}

struct LogRow {
    id: i64,
    person_id: i64,
    item_id: i64,
    calendar_date: String,
    value: i64,
    note: Option<String>,
    recorded_at: String,
}

impl LogRow {
    const COLUMNS: &'static str =
        "id, person_id, item_id, calendar_date, value, note, recorded_at";

    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            person_id: row.get(1)?,
            item_id: row.get(2)?,
            calendar_date: row.get(3)?,
            value: row.get(4)?,
            note: row.get(5)?,
            recorded_at: row.get(6)?,
        })
    }

    fn into_entry(self) -> Result<LogEntry, StoreError> {
        Ok(LogEntry {
            id: LogId(self.id),
            person_id: PersonId(self.person_id),
            item_id: ItemId(self.item_id),
            date: parse_date(&self.calendar_date)?,
            value: self.value,
            note: self.note,
            recorded_at: parse_instant(&self.recorded_at)?,
        })
    }
}

fn exists(conn: &Connection, sql: &str, id: i64) -> Result<bool, StoreError> {
    Ok(conn
        .query_row(sql, [id], |_| Ok(()))
        .optional()?
        .is_some())
}

impl HouseholdStore for SqliteHouseholdStore {
    fn persons(&self) -> Result<Vec<Person>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM persons ORDER BY id",
            PersonRow::COLUMNS
        ))?;
        let rows = stmt
            .query_map([], PersonRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(PersonRow::into_person).collect()
    }

    fn person(&self, id: PersonId) -> Result<Option<Person>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM persons WHERE id = ?1", PersonRow::COLUMNS),
            [id.0],
            PersonRow::read,
        )
        .optional()?
        .map(PersonRow::into_person)
        .transpose()
    }

    fn insert_person(&self, person: NewPerson) -> Result<Person, StoreError> {
        let conn = self.lock()?;
        let draft = person.into_person(PersonId(0));
        conn.execute(
            "INSERT INTO persons (display_name, role, gender, birth_date, guardian_pin, target_points)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                draft.display_name,
                draft.role.as_str(),
                draft.gender.as_str(),
                draft.birth_date.map(|date| date.format(DATE_FORMAT).to_string()),
                draft.guardian_pin,
                i64::from(draft.target_points),
            ],
        )?;
        Ok(Person {
            id: PersonId(conn.last_insert_rowid()),
            ..draft
        })
    }

    fn update_person(&self, person: Person) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE persons
             SET display_name = ?2, role = ?3, gender = ?4, birth_date = ?5,
                 guardian_pin = ?6, target_points = ?7
             WHERE id = ?1",
            params![
                person.id.0,
                person.display_name,
                person.role.as_str(),
                person.gender.as_str(),
                person.birth_date.map(|date| date.format(DATE_FORMAT).to_string()),
                person.guardian_pin,
                i64::from(person.target_points),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::PersonNotFound(person.id));
        }
        Ok(())
    }

    fn delete_person(&self, id: PersonId) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM log_entries WHERE person_id = ?1", [id.0])?;
        let removed = tx.execute("DELETE FROM persons WHERE id = ?1", [id.0])?;
        if removed == 0 {
            return Err(StoreError::PersonNotFound(id));
        }
        tx.commit()?;
        Ok(())
    }

    fn catalog(&self) -> Result<Catalog, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, scoring_mode, category, base_points, counter_target,
                    level_options_json, eligible_audience_json
             FROM catalog_items ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], ItemRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut issues = Vec::new();
        let items = rows
            .into_iter()
            .map(|row| row.into_item(&mut issues))
            .collect();
        let catalog = Catalog::with_issues(items, issues);
        for issue in &catalog.issues {
            warn!(item = issue.item_id().0, "{}", issue.summary());
        }
        Ok(catalog)
    }

    fn insert_item(&self, item: NewCatalogItem) -> Result<CatalogItem, StoreError> {
        let conn = self.lock()?;
        let counter_target = match item.rule {
            ScoringRule::Counter { target } => target.map(i64::from),
            _ => None,
        };
        conn.execute(
            "INSERT INTO catalog_items
                (name, scoring_mode, category, base_points, counter_target,
                 level_options_json, eligible_audience_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                item.name,
                item.rule.mode().as_str(),
                item.category.as_str(),
                item.base_points,
                counter_target,
                encode_level_options(&item.rule),
                encode_audience(&item.audience),
            ],
        )?;
        Ok(item.into_item(ItemId(conn.last_insert_rowid())))
    }

    fn delete_item(&self, id: ItemId) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM log_entries WHERE item_id = ?1", [id.0])?;
        let removed = tx.execute("DELETE FROM catalog_items WHERE id = ?1", [id.0])?;
        if removed == 0 {
            return Err(StoreError::ItemNotFound(id));
        }
        tx.commit()?;
        Ok(())
    }

    fn upsert_log(&self, upsert: LogUpsert) -> Result<(LogEntry, UpsertOutcome), StoreError> {
        let conn = self.lock()?;
        if !exists(&conn, "SELECT 1 FROM persons WHERE id = ?1", upsert.person_id.0)? {
            return Err(StoreError::PersonNotFound(upsert.person_id));
        }
        if !exists(&conn, "SELECT 1 FROM catalog_items WHERE id = ?1", upsert.item_id.0)? {
            return Err(StoreError::ItemNotFound(upsert.item_id));
        }

        let date = upsert.date.format(DATE_FORMAT).to_string();
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM log_entries
                 WHERE person_id = ?1 AND item_id = ?2 AND calendar_date = ?3",
                params![upsert.person_id.0, upsert.item_id.0, date],
                |row| row.get(0),
            )
            .optional()?;

        conn.execute(
            "INSERT INTO log_entries (person_id, item_id, calendar_date, value, note, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (person_id, item_id, calendar_date) DO UPDATE SET
                value = excluded.value,
                note = excluded.note,
                recorded_at = excluded.recorded_at",
            params![
                upsert.person_id.0,
                upsert.item_id.0,
                date,
                upsert.value,
                upsert.note,
                upsert.recorded_at.to_rfc3339(),
            ],
        )?;

        let (id, outcome) = match existing {
            Some(id) => (id, UpsertOutcome::Replaced),
            None => (conn.last_insert_rowid(), UpsertOutcome::Inserted),
        };

        Ok((
            LogEntry {
                id: LogId(id),
                person_id: upsert.person_id,
                item_id: upsert.item_id,
                date: upsert.date,
                value: upsert.value,
                note: upsert.note,
                recorded_at: upsert.recorded_at,
            },
            outcome,
        ))
    }

    fn log(
        &self,
        person: PersonId,
        item: ItemId,
        date: NaiveDate,
    ) -> Result<Option<LogEntry>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM log_entries
                 WHERE person_id = ?1 AND item_id = ?2 AND calendar_date = ?3",
                LogRow::COLUMNS
            ),
            params![person.0, item.0, date.format(DATE_FORMAT).to_string()],
            LogRow::read,
        )
        .optional()?
        .map(LogRow::into_entry)
        .transpose()
    }

    fn logs_between(
        &self,
        range: DateRange,
        person: Option<PersonId>,
    ) -> Result<Vec<LogEntry>, StoreError> {
        let conn = self.lock()?;
        let start = range.start.format(DATE_FORMAT).to_string();
        let end = range.end.format(DATE_FORMAT).to_string();

        let rows = match person {
            Some(person) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM log_entries
                     WHERE calendar_date BETWEEN ?1 AND ?2 AND person_id = ?3
                     ORDER BY calendar_date, person_id, item_id",
                    LogRow::COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![start, end, person.0], LogRow::read)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM log_entries
                     WHERE calendar_date BETWEEN ?1 AND ?2
                     ORDER BY calendar_date, person_id, item_id",
                    LogRow::COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![start, end], LogRow::read)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };

        rows.into_iter().map(LogRow::into_entry).collect()
    }

    fn time_config(&self) -> Result<TimeConfig, StoreError> {
        let conn = self.lock()?;
        let forced_timezone: Option<String> = conn
            .query_row(
                "SELECT value FROM time_config WHERE key = ?1",
                [FORCED_TIMEZONE_KEY],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(TimeConfig {
            forced_timezone: forced_timezone.filter(|zone: &String| !zone.trim().is_empty()),
        })
    }

    fn set_time_config(&self, config: TimeConfig) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO time_config (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            params![FORCED_TIMEZONE_KEY, config.forced_timezone],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LevelOption, NewCatalogItem};
    use chrono::TimeZone;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).expect("valid date")
    }

    fn upsert(person: PersonId, item: ItemId, day: u32, value: i64) -> LogUpsert {
        LogUpsert {
            person_id: person,
            item_id: item,
            date: date(day),
            value,
            note: None,
            recorded_at: Utc
                .with_ymd_and_hms(2025, 10, day, 6, 0, 0)
                .single()
                .expect("valid instant"),
        }
    }

    #[test]
    fn upsert_keeps_one_row_per_natural_key() {
        let store = SqliteHouseholdStore::open_in_memory().expect("store opens");
        let person = store
            .insert_person(NewPerson::guardian("Abi"))
            .expect("person inserted");
        let item = store
            .insert_item(NewCatalogItem::counter(
                "Tilawah",
                Category::Recommended,
                10,
                Some(5),
            ))
            .expect("item inserted");

        let (first, outcome) = store
            .upsert_log(upsert(person.id, item.id, 1, 2))
            .expect("first write");
        assert_eq!(outcome, UpsertOutcome::Inserted);

        let (second, outcome) = store
            .upsert_log(upsert(person.id, item.id, 1, 4))
            .expect("second write");
        assert_eq!(outcome, UpsertOutcome::Replaced);
        assert_eq!(first.id, second.id);

        let logs = store
            .logs_between(DateRange::single(date(1)), None)
            .expect("logs load");
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].value, 4);
    }

    #[test]
    fn malformed_level_json_surfaces_as_issue() {
        let store = SqliteHouseholdStore::open_in_memory().expect("store opens");
        store
            .insert_item(NewCatalogItem::leveled(
                "Qiyamul Lail",
                Category::Recommended,
                1,
                vec![LevelOption::new("ringan", 5)],
            ))
            .expect("item inserted");
        {
            let conn = store.lock().expect("lock");
            conn.execute(
                "UPDATE catalog_items SET level_options_json = '{broken'",
                [],
            )
            .expect("corrupt payload");
        }

        let catalog = store.catalog().expect("catalog still loads");
        assert_eq!(catalog.len(), 1);
        assert!(matches!(
            catalog.issues.as_slice(),
            [CatalogIssue::MalformedLevelOptions { .. }]
        ));
    }

    #[test]
    fn deleting_an_item_cascades_to_logs() {
        let store = SqliteHouseholdStore::open_in_memory().expect("store opens");
        let person = store
            .insert_person(NewPerson::guardian("Umi"))
            .expect("person inserted");
        let item = store
            .insert_item(NewCatalogItem::boolean("Subuh", Category::Obligatory, 20))
            .expect("item inserted");
        store
            .upsert_log(upsert(person.id, item.id, 3, 1))
            .expect("log written");

        store.delete_item(item.id).expect("item removed");
        let logs = store
            .logs_between(DateRange::single(date(3)), Some(person.id))
            .expect("logs load");
        assert!(logs.is_empty());
        assert!(matches!(
            store.delete_item(item.id),
            Err(StoreError::ItemNotFound(_))
        ));
    }

    #[test]
    fn time_config_round_trips_through_key_value_row() {
        let store = SqliteHouseholdStore::open_in_memory().expect("store opens");
        assert_eq!(store.time_config().expect("reads"), TimeConfig::default());
        store
            .set_time_config(TimeConfig {
                forced_timezone: Some("Asia/Makassar".to_string()),
            })
            .expect("writes");
        assert_eq!(
            store.time_config().expect("reads").forced_timezone.as_deref(),
            Some("Asia/Makassar")
        );
    }
}
