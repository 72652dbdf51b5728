//! Persistence boundary for persons, the catalog, log entries and the time config.

mod memory;
mod sqlite;

pub use memory::InMemoryHouseholdStore;
pub use sqlite::SqliteHouseholdStore;

use crate::catalog::Catalog;
use crate::domain::{
    CatalogItem, DateRange, ItemId, LogEntry, LogUpsert, NewCatalogItem, NewPerson, Person,
    PersonId, TimeConfig, UpsertOutcome,
};
use chrono::NaiveDate;

/// Storage abstraction so the service can run over SQLite or memory.
///
/// Log writes are upserts keyed on (person, item, date) with last-write-wins
/// semantics; there is no version check between concurrent writers.
pub trait HouseholdStore: Send + Sync {
    fn persons(&self) -> Result<Vec<Person>, StoreError>;
    fn person(&self, id: PersonId) -> Result<Option<Person>, StoreError>;
    fn insert_person(&self, person: NewPerson) -> Result<Person, StoreError>;
    fn update_person(&self, person: Person) -> Result<(), StoreError>;
    /// Removes the person and every log they own.
    fn delete_person(&self, id: PersonId) -> Result<(), StoreError>;

    fn catalog(&self) -> Result<Catalog, StoreError>;
    fn insert_item(&self, item: NewCatalogItem) -> Result<CatalogItem, StoreError>;
    /// Removes the item and every log recorded against it.
    fn delete_item(&self, id: ItemId) -> Result<(), StoreError>;

    fn upsert_log(&self, upsert: LogUpsert) -> Result<(LogEntry, UpsertOutcome), StoreError>;
    fn log(
        &self,
        person: PersonId,
        item: ItemId,
        date: NaiveDate,
    ) -> Result<Option<LogEntry>, StoreError>;
    fn logs_between(
        &self,
        range: DateRange,
        person: Option<PersonId>,
    ) -> Result<Vec<LogEntry>, StoreError>;

    fn time_config(&self) -> Result<TimeConfig, StoreError>;
    fn set_time_config(&self, config: TimeConfig) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("person {0} not found")]
    PersonNotFound(PersonId),
    #[error("catalog item {0} not found")]
    ItemNotFound(ItemId),
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}
