//! Household operations composed over a store, the scoring engine and the
//! time resolver. Handlers and the CLI only talk to this layer.

use std::io::Write;
use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::{standard_catalog, Catalog};
use crate::domain::{
    CatalogItem, DateRange, DomainError, IslamicLevel, ItemId, LogEntry, LogUpsert, NewCatalogItem,
    NewPerson, Person, PersonId, ScoringRule, TimeConfig, UpsertOutcome,
};
use crate::leaderboard::{rank, LeaderboardEntry};
use crate::report::{build_pivot, write_csv, ExportError, PersonFilter, PivotMatrix};
use crate::scoring::{DayScore, ItemDayStatus, ScoringEngine};
use crate::snapshot::HouseholdSnapshot;
use crate::store::{HouseholdStore, StoreError};
use crate::time::{parse_zone, LeaderboardWindow, TimeResolver, ZoneSource};

/// The household's current calendar day and how it was determined.
#[derive(Debug, Clone, Serialize)]
pub struct TodayView {
    pub date: NaiveDate,
    pub timezone: String,
    pub source: ZoneSource,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordedLog {
    pub entry: LogEntry,
    pub outcome: UpsertOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonDaySummary {
    pub person: Person,
    pub date: NaiveDate,
    pub level: IslamicLevel,
    pub score: DayScore,
    pub items: Vec<ItemDayStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardView {
    pub window: LeaderboardWindow,
    pub label: &'static str,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub entries: Vec<LeaderboardEntry>,
}

/// Error raised by household operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("person {0} not found")]
    PersonNotFound(PersonId),
    #[error("catalog item {0} not found")]
    ItemNotFound(ItemId),
    #[error("value {value} is not valid for item {item_id}: {reason}")]
    InvalidValue {
        item_id: ItemId,
        value: i64,
        reason: String,
    },
    #[error("item {item_id} is scored as {mode}, which does not support this operation")]
    UnsupportedMode { item_id: ItemId, mode: &'static str },
    #[error("unrecognised timezone '{0}'")]
    InvalidTimezone(String),
    #[error("report spans {days} days; at most {max} are allowed")]
    RangeTooLong { days: usize, max: usize },
    #[error(transparent)]
    InvalidRange(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::PersonNotFound(_)
            | ServiceError::ItemNotFound(_)
            | ServiceError::Store(StoreError::PersonNotFound(_))
            | ServiceError::Store(StoreError::ItemNotFound(_)) => StatusCode::NOT_FOUND,
            ServiceError::InvalidValue { .. }
            | ServiceError::UnsupportedMode { .. }
            | ServiceError::InvalidTimezone(_)
            | ServiceError::RangeTooLong { .. }
            | ServiceError::InvalidRange(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Store(_) | ServiceError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Longest inclusive span a single report may cover.
pub const MAX_REPORT_DAYS: usize = 366;

/// Rejects values the item's scoring mode cannot interpret.
pub fn validate_value(item: &CatalogItem, value: i64) -> Result<(), ServiceError> {
    let invalid = |reason: &str| ServiceError::InvalidValue {
        item_id: item.id,
        value,
        reason: reason.to_string(),
    };

    match &item.rule {
        ScoringRule::Boolean if value == 0 || value == 1 => Ok(()),
        ScoringRule::Boolean => Err(invalid("boolean items take 0 or 1")),
        ScoringRule::Counter { .. } if u32::try_from(value).is_ok() => Ok(()),
        ScoringRule::Counter { .. } => Err(invalid("counters cannot be negative")),
        ScoringRule::LeveledChoice { levels } if levels.is_malformed() => {
            Err(invalid("the item's level options are unreadable"))
        }
        ScoringRule::LeveledChoice { .. } if value == 0 => Ok(()),
        ScoringRule::LeveledChoice { levels } => match i32::try_from(value) {
            Ok(points) if levels.contains_points(points) => Ok(()),
            _ => Err(invalid("value must match one of the item's level options")),
        },
    }
}

pub struct HouseholdService<S> {
    store: Arc<S>,
    engine: ScoringEngine,
    time: TimeResolver,
}

impl<S> HouseholdService<S>
where
    S: HouseholdStore + 'static,
{
    pub fn new(store: Arc<S>, engine: ScoringEngine, time: TimeResolver) -> Self {
        Self {
            store,
            engine,
            time,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn engine(&self) -> ScoringEngine {
        self.engine
    }

    pub fn today(&self, client_hint: Option<&str>) -> Result<TodayView, ServiceError> {
        self.today_at(client_hint, Utc::now())
    }

    pub fn today_at(
        &self,
        client_hint: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<TodayView, ServiceError> {
        let config = self.store.time_config()?;
        let resolved = self.time.resolve(&config, client_hint);
        Ok(TodayView {
            date: resolved.zone.date_of(now),
            timezone: resolved.zone.label(),
            source: resolved.source,
            warnings: resolved.warnings,
        })
    }

    fn person(&self, id: PersonId) -> Result<Person, ServiceError> {
        self.store
            .person(id)?
            .ok_or(ServiceError::PersonNotFound(id))
    }

    fn item(&self, catalog: &Catalog, id: ItemId) -> Result<CatalogItem, ServiceError> {
        catalog
            .get(id)
            .cloned()
            .ok_or(ServiceError::ItemNotFound(id))
    }

    fn write_log(
        &self,
        person_id: PersonId,
        item_id: ItemId,
        date: NaiveDate,
        value: i64,
        note: Option<String>,
    ) -> Result<RecordedLog, ServiceError> {
        let (entry, outcome) = self.store.upsert_log(LogUpsert {
            person_id,
            item_id,
            date,
            value,
            note,
            recorded_at: Utc::now(),
        })?;
        debug!(
            person = %person_id,
            item = %item_id,
            %date,
            value,
            ?outcome,
            "log written"
        );
        Ok(RecordedLog { entry, outcome })
    }

    /// Upserts the (person, item, date) log after checking the value against
    /// the item's scoring mode. A second write for the same key replaces the first.
    pub fn record(
        &self,
        person_id: PersonId,
        item_id: ItemId,
        date: NaiveDate,
        value: i64,
        note: Option<String>,
    ) -> Result<RecordedLog, ServiceError> {
        self.person(person_id)?;
        let item = self.item(&self.store.catalog()?, item_id)?;
        validate_value(&item, value)?;
        self.write_log(person_id, item_id, date, value, note)
    }

    /// Flips a boolean item between done and not done, keeping any note.
    pub fn toggle(
        &self,
        person_id: PersonId,
        item_id: ItemId,
        date: NaiveDate,
    ) -> Result<RecordedLog, ServiceError> {
        self.person(person_id)?;
        let item = self.item(&self.store.catalog()?, item_id)?;
        if !matches!(item.rule, ScoringRule::Boolean) {
            return Err(ServiceError::UnsupportedMode {
                item_id,
                mode: item.mode().as_str(),
            });
        }

        let current = self.store.log(person_id, item_id, date)?;
        let value = match &current {
            Some(entry) if entry.value > 0 => 0,
            _ => 1,
        };
        let note = current.and_then(|entry| entry.note);
        self.write_log(person_id, item_id, date, value, note)
    }

    /// Adds `delta` to a counter item. The count never drops below zero.
    pub fn increment(
        &self,
        person_id: PersonId,
        item_id: ItemId,
        date: NaiveDate,
        delta: i64,
    ) -> Result<RecordedLog, ServiceError> {
        self.person(person_id)?;
        let item = self.item(&self.store.catalog()?, item_id)?;
        if !matches!(item.rule, ScoringRule::Counter { .. }) {
            return Err(ServiceError::UnsupportedMode {
                item_id,
                mode: item.mode().as_str(),
            });
        }

        let current = self.store.log(person_id, item_id, date)?;
        let base = current.as_ref().map_or(0, |entry| entry.value.max(0));
        let value = base
            .saturating_add(delta)
            .clamp(0, i64::from(u32::MAX));
        let note = current.and_then(|entry| entry.note);
        self.write_log(person_id, item_id, date, value, note)
    }

    pub fn day_summary(
        &self,
        person_id: PersonId,
        date: NaiveDate,
        client_hint: Option<&str>,
    ) -> Result<PersonDaySummary, ServiceError> {
        let person = self.person(person_id)?;
        let today = self.today(client_hint)?.date;
        let catalog = self.store.catalog()?;
        let logs = self
            .store
            .logs_between(DateRange::single(date), Some(person_id))?;

        Ok(PersonDaySummary {
            level: self.engine.level_for(&person, date, today),
            score: self.engine.score_day(&person, date, today, &catalog, &logs),
            items: self
                .engine
                .item_statuses(&person, date, today, &catalog, &logs),
            person,
            date,
        })
    }

    pub fn leaderboard(
        &self,
        window: LeaderboardWindow,
        client_hint: Option<&str>,
    ) -> Result<LeaderboardView, ServiceError> {
        let today = self.today(client_hint)?.date;
        self.leaderboard_on(window, today)
    }

    /// Leaderboard for the window ending on an explicit household day.
    pub fn leaderboard_on(
        &self,
        window: LeaderboardWindow,
        today: NaiveDate,
    ) -> Result<LeaderboardView, ServiceError> {
        let range = window.range(today);
        let snapshot = HouseholdSnapshot::load(self.store.as_ref(), range, today)?;
        let entries = rank(&snapshot, &self.engine);
        info!(
            window = window.label(),
            start = %range.start,
            end = %range.end,
            people = entries.len(),
            "leaderboard computed"
        );
        Ok(LeaderboardView {
            window,
            label: window.label(),
            start: range.start,
            end: range.end,
            entries,
        })
    }

    pub fn report(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        filter: PersonFilter,
        client_hint: Option<&str>,
    ) -> Result<PivotMatrix, ServiceError> {
        let range = DateRange::new(start, end)?;
        if range.len_days() > MAX_REPORT_DAYS {
            return Err(ServiceError::RangeTooLong {
                days: range.len_days(),
                max: MAX_REPORT_DAYS,
            });
        }
        if let PersonFilter::Person(id) = filter {
            self.person(id)?;
        }
        let today = self.today(client_hint)?.date;
        let snapshot = HouseholdSnapshot::load(self.store.as_ref(), range, today)?;
        let matrix = build_pivot(&snapshot, filter, &self.engine);
        info!(
            %start,
            %end,
            rows = matrix.rows.len(),
            issues = matrix.issues.len(),
            "report pivot built"
        );
        Ok(matrix)
    }

    pub fn export_csv<W: Write>(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        filter: PersonFilter,
        client_hint: Option<&str>,
        writer: W,
    ) -> Result<PivotMatrix, ServiceError> {
        let matrix = self.report(start, end, filter, client_hint)?;
        write_csv(&matrix, writer)?;
        Ok(matrix)
    }

    pub fn persons(&self) -> Result<Vec<Person>, ServiceError> {
        let mut persons = self.store.persons()?;
        persons.sort_by_key(|person| person.id);
        Ok(persons)
    }

    pub fn add_person(&self, person: NewPerson) -> Result<Person, ServiceError> {
        let person = self.store.insert_person(person)?;
        info!(person = %person.id, role = person.role.as_str(), "person added");
        Ok(person)
    }

    pub fn update_person(&self, person: Person) -> Result<(), ServiceError> {
        let id = person.id;
        self.store.update_person(person).map_err(|err| match err {
            StoreError::PersonNotFound(_) => ServiceError::PersonNotFound(id),
            other => ServiceError::Store(other),
        })
    }

    /// Removes the person together with every log they recorded.
    pub fn remove_person(&self, id: PersonId) -> Result<(), ServiceError> {
        self.person(id)?;
        self.store.delete_person(id)?;
        info!(person = %id, "person removed");
        Ok(())
    }

    pub fn catalog(&self) -> Result<Catalog, ServiceError> {
        Ok(self.store.catalog()?)
    }

    pub fn add_item(&self, item: NewCatalogItem) -> Result<CatalogItem, ServiceError> {
        let item = self.store.insert_item(item)?;
        info!(item = %item.id, mode = item.mode().as_str(), "catalog item added");
        Ok(item)
    }

    /// Removes the item together with every log recorded against it.
    pub fn remove_item(&self, id: ItemId) -> Result<(), ServiceError> {
        let catalog = self.store.catalog()?;
        self.item(&catalog, id)?;
        self.store.delete_item(id)?;
        info!(item = %id, "catalog item removed");
        Ok(())
    }

    /// Inserts the standard item set when the catalog is still empty.
    pub fn seed_standard_catalog(&self) -> Result<Vec<CatalogItem>, ServiceError> {
        if !self.store.catalog()?.is_empty() {
            return Ok(Vec::new());
        }
        let items = standard_catalog()
            .into_iter()
            .map(|item| self.store.insert_item(item))
            .collect::<Result<Vec<_>, _>>()?;
        info!(items = items.len(), "standard catalog seeded");
        Ok(items)
    }

    /// Sets or clears the household-wide timezone override.
    pub fn set_forced_timezone(&self, timezone: Option<String>) -> Result<(), ServiceError> {
        let timezone = timezone
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty());
        if let Some(raw) = &timezone {
            if parse_zone(raw).is_none() {
                return Err(ServiceError::InvalidTimezone(raw.clone()));
            }
        }
        self.store.set_time_config(TimeConfig {
            forced_timezone: timezone,
        })?;
        Ok(())
    }
}
