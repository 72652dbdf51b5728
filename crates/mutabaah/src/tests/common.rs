use std::sync::Arc;

use axum::response::Response;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::Value;

use crate::catalog::Catalog;
use crate::domain::{
    Audience, Category, CatalogItem, DateRange, IslamicLevel, ItemId, LevelOption, LogEntry,
    LogUpsert, NewCatalogItem, NewPerson, Person, PersonId, TimeConfig, UpsertOutcome,
};
use crate::eligibility::EligibilityBasis;
use crate::router::household_router;
use crate::scoring::ScoringEngine;
use crate::service::HouseholdService;
use crate::store::{HouseholdStore, InMemoryHouseholdStore, StoreError};
use crate::time::TimeResolver;

pub(super) fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, day).expect("valid date")
}

/// Birth date that keeps a child at `years` old for the lifetime of the suite.
pub(super) fn born_years_ago(years: i64) -> NaiveDate {
    Utc::now().date_naive() - Duration::days(years * 365 + 120)
}

pub(super) struct Household {
    pub service: HouseholdService<InMemoryHouseholdStore>,
    pub store: Arc<InMemoryHouseholdStore>,
    pub guardian: Person,
    pub child: Person,
    pub subuh: CatalogItem,
    pub harsh_words: CatalogItem,
    pub tilawah: CatalogItem,
    pub qiyam: CatalogItem,
    pub rawatib: CatalogItem,
}

pub(super) fn build_household(basis: EligibilityBasis) -> Household {
    let store = Arc::new(InMemoryHouseholdStore::new());
    let service = HouseholdService::new(
        store.clone(),
        ScoringEngine::new(basis),
        TimeResolver::new("Asia/Jakarta"),
    );

    let guardian = service
        .add_person(NewPerson::guardian("Abi").with_target(100).with_pin("1234"))
        .expect("guardian added");
    let child = service
        .add_person(NewPerson::dependent("Hasan", Some(born_years_ago(10))))
        .expect("child added");

    let subuh = service
        .add_item(NewCatalogItem::boolean("Sholat Subuh", Category::Obligatory, 20))
        .expect("item added");
    let harsh_words = service
        .add_item(NewCatalogItem::boolean("Berkata Kasar", Category::Infraction, -10))
        .expect("item added");
    let tilawah = service
        .add_item(NewCatalogItem::counter(
            "Tilawah",
            Category::Recommended,
            10,
            Some(5),
        ))
        .expect("item added");
    let qiyam = service
        .add_item(NewCatalogItem::leveled(
            "Qiyamul Lail",
            Category::Recommended,
            1,
            vec![LevelOption::new("ringan", 5), LevelOption::new("berat", 15)],
        ))
        .expect("item added");
    let rawatib = service
        .add_item(
            NewCatalogItem::boolean("Rawatib", Category::Recommended, 5)
                .for_audience(Audience::only([IslamicLevel::Guardian, IslamicLevel::Baligh])),
        )
        .expect("item added");

    Household {
        service,
        store,
        guardian,
        child,
        subuh,
        harsh_words,
        tilawah,
        qiyam,
        rawatib,
    }
}

pub(super) fn household() -> Household {
    build_household(EligibilityBasis::QueryDate)
}

pub(super) fn household_router_for(household: Household) -> axum::Router {
    household_router(Arc::new(household.service))
}

/// Store that fails every call, as an unreachable database would.
pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, StoreError> {
    Err(StoreError::Unavailable("database offline".to_string()))
}

impl HouseholdStore for UnavailableStore {
    fn persons(&self) -> Result<Vec<Person>, StoreError> {
        offline()
    }

    fn person(&self, _id: PersonId) -> Result<Option<Person>, StoreError> {
        offline()
    }

    fn insert_person(&self, _person: NewPerson) -> Result<Person, StoreError> {
        offline()
    }

    fn update_person(&self, _person: Person) -> Result<(), StoreError> {
        offline()
    }

    fn delete_person(&self, _id: PersonId) -> Result<(), StoreError> {
        offline()
    }

    fn catalog(&self) -> Result<Catalog, StoreError> {
        offline()
    }

    fn insert_item(&self, _item: NewCatalogItem) -> Result<CatalogItem, StoreError> {
        offline()
    }

    fn delete_item(&self, _id: ItemId) -> Result<(), StoreError> {
        offline()
    }

    fn upsert_log(&self, _upsert: LogUpsert) -> Result<(LogEntry, UpsertOutcome), StoreError> {
        offline()
    }

    fn log(
        &self,
        _person: PersonId,
        _item: ItemId,
        _date: NaiveDate,
    ) -> Result<Option<LogEntry>, StoreError> {
        offline()
    }

    fn logs_between(
        &self,
        _range: DateRange,
        _person: Option<PersonId>,
    ) -> Result<Vec<LogEntry>, StoreError> {
        offline()
    }

    fn time_config(&self) -> Result<TimeConfig, StoreError> {
        offline()
    }

    fn set_time_config(&self, _config: TimeConfig) -> Result<(), StoreError> {
        offline()
    }
}

pub(super) fn unavailable_service() -> HouseholdService<UnavailableStore> {
    HouseholdService::new(
        Arc::new(UnavailableStore),
        ScoringEngine::default(),
        TimeResolver::default(),
    )
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf8 body")
}
