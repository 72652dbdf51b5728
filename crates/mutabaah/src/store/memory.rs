use super::{HouseholdStore, StoreError};
use crate::catalog::Catalog;
use crate::domain::{
    CatalogItem, DateRange, ItemId, LogEntry, LogId, LogUpsert, NewCatalogItem, NewPerson,
    Person, PersonId, TimeConfig, UpsertOutcome,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    persons: BTreeMap<PersonId, Person>,
    items: BTreeMap<ItemId, CatalogItem>,
    logs: BTreeMap<(PersonId, ItemId, NaiveDate), LogEntry>,
    time_config: TimeConfig,
    next_person: i64,
    next_item: i64,
    next_log: i64,
}

/// Mutex-guarded household tables for tests, demos and ephemeral servers.
#[derive(Debug, Default, Clone)]
pub struct InMemoryHouseholdStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryHouseholdStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("household mutex poisoned".to_string()))
    }
}

impl HouseholdStore for InMemoryHouseholdStore {
    fn persons(&self) -> Result<Vec<Person>, StoreError> {
        Ok(self.lock()?.persons.values().cloned().collect())
    }

    fn person(&self, id: PersonId) -> Result<Option<Person>, StoreError> {
        Ok(self.lock()?.persons.get(&id).cloned())
    }

    fn insert_person(&self, person: NewPerson) -> Result<Person, StoreError> {
        let mut tables = self.lock()?;
        tables.next_person += 1;
        let person = person.into_person(PersonId(tables.next_person));
        tables.persons.insert(person.id, person.clone());
        Ok(person)
    }

    fn update_person(&self, person: Person) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        match tables.persons.get_mut(&person.id) {
            Some(existing) => {
                *existing = person;
                Ok(())
            }
            None => Err(StoreError::PersonNotFound(person.id)),
        }
    }

    fn delete_person(&self, id: PersonId) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        if tables.persons.remove(&id).is_none() {
            return Err(StoreError::PersonNotFound(id));
        }
        tables.logs.retain(|(person, _, _), _| *person != id);
        Ok(())
    }

    fn catalog(&self) -> Result<Catalog, StoreError> {
        Ok(Catalog::new(self.lock()?.items.values().cloned().collect()))
    }

    fn insert_item(&self, item: NewCatalogItem) -> Result<CatalogItem, StoreError> {
        let mut tables = self.lock()?;
        tables.next_item += 1;
        let item = item.into_item(ItemId(tables.next_item));
        tables.items.insert(item.id, item.clone());
        Ok(item)
    }

    fn delete_item(&self, id: ItemId) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        if tables.items.remove(&id).is_none() {
            return Err(StoreError::ItemNotFound(id));
        }
        tables.logs.retain(|(_, item, _), _| *item != id);
        Ok(())
    }

    fn upsert_log(&self, upsert: LogUpsert) -> Result<(LogEntry, UpsertOutcome), StoreError> {
        let mut tables = self.lock()?;
        if !tables.persons.contains_key(&upsert.person_id) {
            return Err(StoreError::PersonNotFound(upsert.person_id));
        }
        if !tables.items.contains_key(&upsert.item_id) {
            return Err(StoreError::ItemNotFound(upsert.item_id));
        }

        let key = (upsert.person_id, upsert.item_id, upsert.date);
        let (id, outcome) = match tables.logs.get(&key) {
            Some(existing) => (existing.id, UpsertOutcome::Replaced),
            None => {
                tables.next_log += 1;
                (LogId(tables.next_log), UpsertOutcome::Inserted)
            }
        };

        let entry = LogEntry {
            id,
            person_id: upsert.person_id,
            item_id: upsert.item_id,
            date: upsert.date,
            value: upsert.value,
            note: upsert.note,
            recorded_at: upsert.recorded_at,
        };
        tables.logs.insert(key, entry.clone());
        Ok((entry, outcome))
    }

    fn log(
        &self,
        person: PersonId,
        item: ItemId,
        date: NaiveDate,
    ) -> Result<Option<LogEntry>, StoreError> {
        Ok(self.lock()?.logs.get(&(person, item, date)).cloned())
    }

    fn logs_between(
        &self,
        range: DateRange,
        person: Option<PersonId>,
    ) -> Result<Vec<LogEntry>, StoreError> {
        let tables = self.lock()?;
        let mut logs: Vec<LogEntry> = tables
            .logs
            .values()
            .filter(|entry| range.contains(entry.date))
            .filter(|entry| person.map_or(true, |id| entry.person_id == id))
            .cloned()
            .collect();
        logs.sort_by_key(|entry| (entry.date, entry.person_id, entry.item_id));
        Ok(logs)
    }

    fn time_config(&self) -> Result<TimeConfig, StoreError> {
        Ok(self.lock()?.time_config.clone())
    }

    fn set_time_config(&self, config: TimeConfig) -> Result<(), StoreError> {
        self.lock()?.time_config = config;
        Ok(())
    }
}
