use crate::catalog::Catalog;
use crate::domain::{DateRange, LogEntry, Person, PersonId};
use crate::store::{HouseholdStore, StoreError};
use chrono::NaiveDate;

/// Everything the read-side reducers need for one request: persons, the
/// catalog, and the log rows already restricted to `range`.
#[derive(Debug, Clone)]
pub struct HouseholdSnapshot {
    pub persons: Vec<Person>,
    pub catalog: Catalog,
    pub logs: Vec<LogEntry>,
    pub range: DateRange,
    pub today: NaiveDate,
}

impl HouseholdSnapshot {
    pub fn load<S: HouseholdStore + ?Sized>(
        store: &S,
        range: DateRange,
        today: NaiveDate,
    ) -> Result<Self, StoreError> {
        let mut persons = store.persons()?;
        persons.sort_by_key(|person| person.id);
        Ok(Self {
            persons,
            catalog: store.catalog()?,
            logs: store.logs_between(range, None)?,
            range,
            today,
        })
    }

    pub fn person(&self, id: PersonId) -> Option<&Person> {
        self.persons.iter().find(|person| person.id == id)
    }

    pub fn logs_for(&self, id: PersonId) -> impl Iterator<Item = &LogEntry> {
        self.logs.iter().filter(move |entry| entry.person_id == id)
    }
}
