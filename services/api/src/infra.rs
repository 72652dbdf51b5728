use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use mutabaah::catalog::Catalog;
use mutabaah::config::HouseholdConfig;
use mutabaah::domain::{
    CatalogItem, DateRange, ItemId, LogEntry, LogUpsert, NewCatalogItem, NewPerson, Person,
    PersonId, TimeConfig, UpsertOutcome,
};
use mutabaah::scoring::ScoringEngine;
use mutabaah::service::HouseholdService;
use mutabaah::store::{HouseholdStore, InMemoryHouseholdStore, SqliteHouseholdStore, StoreError};
use mutabaah::time::{LeaderboardWindow, TimeResolver};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Store picked at startup: SQLite when a database path is configured,
/// otherwise an ephemeral in-memory household.
pub(crate) enum HouseholdBackend {
    Sqlite(SqliteHouseholdStore),
    Memory(InMemoryHouseholdStore),
}

impl HouseholdBackend {
    pub(crate) fn open(config: &HouseholdConfig) -> Result<Self, StoreError> {
        match &config.database_path {
            Some(path) => {
                info!(path = %path.display(), "opening household database");
                SqliteHouseholdStore::open(path).map(Self::Sqlite)
            }
            None => {
                warn!("MUTABAAH_DATABASE_PATH not set; household data will not persist");
                Ok(Self::Memory(InMemoryHouseholdStore::new()))
            }
        }
    }

    fn store(&self) -> &dyn HouseholdStore {
        match self {
            Self::Sqlite(store) => store,
            Self::Memory(store) => store,
        }
    }
}

impl HouseholdStore for HouseholdBackend {
    fn persons(&self) -> Result<Vec<Person>, StoreError> {
        self.store().persons()
    }

    fn person(&self, id: PersonId) -> Result<Option<Person>, StoreError> {
        self.store().person(id)
    }

    fn insert_person(&self, person: NewPerson) -> Result<Person, StoreError> {
        self.store().insert_person(person)
    }

    fn update_person(&self, person: Person) -> Result<(), StoreError> {
        self.store().update_person(person)
    }

    fn delete_person(&self, id: PersonId) -> Result<(), StoreError> {
        self.store().delete_person(id)
    }

    fn catalog(&self) -> Result<Catalog, StoreError> {
        self.store().catalog()
    }

    fn insert_item(&self, item: NewCatalogItem) -> Result<CatalogItem, StoreError> {
        self.store().insert_item(item)
    }

    fn delete_item(&self, id: ItemId) -> Result<(), StoreError> {
        self.store().delete_item(id)
    }

    fn upsert_log(&self, upsert: LogUpsert) -> Result<(LogEntry, UpsertOutcome), StoreError> {
        self.store().upsert_log(upsert)
    }

    fn log(
        &self,
        person: PersonId,
        item: ItemId,
        date: NaiveDate,
    ) -> Result<Option<LogEntry>, StoreError> {
        self.store().log(person, item, date)
    }

    fn logs_between(
        &self,
        range: DateRange,
        person: Option<PersonId>,
    ) -> Result<Vec<LogEntry>, StoreError> {
        self.store().logs_between(range, person)
    }

    fn time_config(&self) -> Result<TimeConfig, StoreError> {
        self.store().time_config()
    }

    fn set_time_config(&self, config: TimeConfig) -> Result<(), StoreError> {
        self.store().set_time_config(config)
    }
}

pub(crate) fn household_service<S>(store: Arc<S>, config: &HouseholdConfig) -> HouseholdService<S>
where
    S: HouseholdStore + 'static,
{
    HouseholdService::new(
        store,
        ScoringEngine::new(config.eligibility_basis),
        TimeResolver::new(config.default_timezone.clone()),
    )
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_window(raw: &str) -> Result<LeaderboardWindow, String> {
    LeaderboardWindow::parse(raw)
        .ok_or_else(|| format!("unknown window '{raw}'; expected today, week, month or year"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mutabaah::eligibility::EligibilityBasis;

    #[test]
    fn parse_date_reports_the_raw_value() {
        assert_eq!(
            parse_date(" 2025-10-16 "),
            Ok(NaiveDate::from_ymd_opt(2025, 10, 16).expect("valid date"))
        );
        let err = parse_date("16/10/2025").expect_err("wrong format rejected");
        assert!(err.contains("16/10/2025"));
    }

    #[test]
    fn parse_window_accepts_presets_only() {
        assert_eq!(parse_window("Month"), Ok(LeaderboardWindow::Month));
        assert!(parse_window("decade").is_err());
    }

    #[test]
    fn backend_without_path_is_in_memory() {
        let config = HouseholdConfig {
            database_path: None,
            default_timezone: "Asia/Jakarta".to_string(),
            eligibility_basis: EligibilityBasis::QueryDate,
        };
        let backend = HouseholdBackend::open(&config).expect("memory backend opens");
        assert!(matches!(backend, HouseholdBackend::Memory(_)));

        let service = household_service(Arc::new(backend), &config);
        let seeded = service.seed_standard_catalog().expect("seeded");
        assert!(!seeded.is_empty());
    }
}
