use super::common::*;
use crate::domain::{
    Audience, Category, IslamicLevel, LoggedValue, NewCatalogItem, NewPerson, PersonId,
    UpsertOutcome,
};
use crate::eligibility::EligibilityBasis;
use crate::report::PersonFilter;
use crate::scoring::ScoringEngine;
use crate::service::{HouseholdService, ServiceError, MAX_REPORT_DAYS};
use crate::store::{HouseholdStore, InMemoryHouseholdStore, StoreError};
use crate::time::{LeaderboardWindow, TimeResolver, ZoneSource};
use axum::http::StatusCode;
use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc};
use std::sync::Arc;

#[test]
fn record_replaces_the_same_day_entry() {
    let household = household();
    let day = date(10, 16);

    let first = household
        .service
        .record(household.guardian.id, household.tilawah.id, day, 3, None)
        .expect("first write");
    let second = household
        .service
        .record(
            household.guardian.id,
            household.tilawah.id,
            day,
            5,
            Some("juz 3".to_string()),
        )
        .expect("second write");

    assert_eq!(first.outcome, UpsertOutcome::Inserted);
    assert_eq!(second.outcome, UpsertOutcome::Replaced);
    assert_eq!(second.entry.id, first.entry.id);

    let stored = household
        .store
        .log(household.guardian.id, household.tilawah.id, day)
        .expect("store readable")
        .expect("entry present");
    assert_eq!(stored.value, 5);
    assert_eq!(stored.note.as_deref(), Some("juz 3"));
}

#[test]
fn record_rejects_values_the_mode_cannot_read() {
    let household = household();
    let day = date(10, 16);
    let guardian = household.guardian.id;

    for (item, value) in [
        (household.subuh.id, 2),
        (household.tilawah.id, -1),
        (household.qiyam.id, 7),
    ] {
        match household.service.record(guardian, item, day, value, None) {
            Err(err @ ServiceError::InvalidValue { .. }) => {
                assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY)
            }
            other => panic!("expected invalid value for {item}, got {other:?}"),
        }
    }

    household
        .service
        .record(guardian, household.qiyam.id, day, 15, None)
        .expect("level option accepted");
    household
        .service
        .record(guardian, household.qiyam.id, day, 0, None)
        .expect("zero clears a leveled item");
}

#[test]
fn record_reports_unknown_person_and_item() {
    let household = household();
    let day = date(10, 16);

    match household
        .service
        .record(PersonId(99), household.subuh.id, day, 1, None)
    {
        Err(err @ ServiceError::PersonNotFound(_)) => {
            assert_eq!(err.status_code(), StatusCode::NOT_FOUND)
        }
        other => panic!("expected missing person, got {other:?}"),
    }

    match household.service.record(
        household.guardian.id,
        crate::domain::ItemId(404),
        day,
        1,
        None,
    ) {
        Err(ServiceError::ItemNotFound(_)) => {}
        other => panic!("expected missing item, got {other:?}"),
    }
}

#[test]
fn toggle_flips_boolean_items_and_keeps_notes() {
    let household = household();
    let day = date(10, 16);
    let guardian = household.guardian.id;

    household
        .service
        .record(guardian, household.subuh.id, day, 1, Some("masjid".to_string()))
        .expect("recorded");
    let toggled = household
        .service
        .toggle(guardian, household.subuh.id, day)
        .expect("toggled off");
    assert_eq!(toggled.entry.value, 0);
    assert_eq!(toggled.entry.note.as_deref(), Some("masjid"));

    let again = household
        .service
        .toggle(guardian, household.subuh.id, day)
        .expect("toggled on");
    assert_eq!(again.entry.value, 1);

    match household.service.toggle(guardian, household.tilawah.id, day) {
        Err(ServiceError::UnsupportedMode { mode, .. }) => assert_eq!(mode, "counter"),
        other => panic!("expected unsupported mode, got {other:?}"),
    }
}

#[test]
fn increment_saturates_at_zero() {
    let household = household();
    let day = date(10, 16);
    let guardian = household.guardian.id;

    let up = household
        .service
        .increment(guardian, household.tilawah.id, day, 2)
        .expect("incremented");
    assert_eq!(up.entry.value, 2);

    let down = household
        .service
        .increment(guardian, household.tilawah.id, day, -5)
        .expect("decremented");
    assert_eq!(down.entry.value, 0);
}

#[test]
fn day_summary_lists_only_eligible_items() {
    let household = household();
    let day = date(10, 16);

    household
        .service
        .record(household.child.id, household.subuh.id, day, 1, None)
        .expect("recorded");

    let summary = household
        .service
        .day_summary(household.child.id, day, None)
        .expect("summary");

    assert_eq!(summary.level, crate::domain::IslamicLevel::Tamyiz);
    assert!(summary
        .items
        .iter()
        .all(|status| status.item_id != household.rawatib.id));
    let subuh = summary
        .items
        .iter()
        .find(|status| status.item_id == household.subuh.id)
        .expect("subuh listed");
    assert_eq!(subuh.value, Some(LoggedValue::Done(true)));
    assert_eq!(subuh.points, 20);
    assert_eq!(summary.score.achieved, 20);
    // subuh 20 + tilawah 10 + qiyam 15
    assert_eq!(summary.score.max, 45);
}

#[test]
fn today_prefers_forced_timezone_over_client_hint() {
    let household = household();
    let now = Utc
        .with_ymd_and_hms(2025, 10, 16, 20, 0, 0)
        .single()
        .expect("instant");

    let hinted = household
        .service
        .today_at(Some("America/New_York"), now)
        .expect("today");
    assert_eq!(hinted.date, date(10, 16));
    assert_eq!(hinted.source, ZoneSource::ClientHint);

    household
        .service
        .set_forced_timezone(Some("Asia/Jakarta".to_string()))
        .expect("override saved");
    let forced = household
        .service
        .today_at(Some("America/New_York"), now)
        .expect("today");
    assert_eq!(forced.date, date(10, 17));
    assert_eq!(forced.source, ZoneSource::Forced);
    assert_eq!(forced.timezone, "Asia/Jakarta");
}

#[test]
fn invalid_override_is_rejected_but_bad_hints_fall_back() {
    let household = household();
    match household
        .service
        .set_forced_timezone(Some("Mars/Olympus".to_string()))
    {
        Err(ServiceError::InvalidTimezone(raw)) => assert_eq!(raw, "Mars/Olympus"),
        other => panic!("expected invalid timezone, got {other:?}"),
    }

    let view = household
        .service
        .today(Some("not a zone"))
        .expect("falls back");
    assert_eq!(view.source, ZoneSource::Default);
    assert_eq!(view.warnings.len(), 1);
}

#[test]
fn report_rejects_inverted_range_and_unknown_person() {
    let household = household();
    match household
        .service
        .report(date(10, 20), date(10, 13), PersonFilter::All, None)
    {
        Err(err @ ServiceError::InvalidRange(_)) => {
            assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY)
        }
        other => panic!("expected invalid range, got {other:?}"),
    }

    match household.service.report(
        date(10, 13),
        date(10, 19),
        PersonFilter::Person(PersonId(77)),
        None,
    ) {
        Err(ServiceError::PersonNotFound(PersonId(77))) => {}
        other => panic!("expected missing person, got {other:?}"),
    }
}

#[test]
fn report_caps_the_span_it_will_build() {
    let household = household();
    let start = date(1, 1);

    let year = household
        .service
        .report(start, start + Duration::days(365), PersonFilter::All, None)
        .expect("a full year is allowed");
    assert_eq!(year.days.len(), MAX_REPORT_DAYS);

    match household
        .service
        .report(start, start + Duration::days(366), PersonFilter::All, None)
    {
        Err(err @ ServiceError::RangeTooLong { days: 367, .. }) => {
            assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY)
        }
        other => panic!("expected span rejection, got {other:?}"),
    }

    let ancient = NaiveDate::from_ymd_opt(1, 1, 1).expect("valid date");
    let distant = NaiveDate::from_ymd_opt(9999, 12, 31).expect("valid date");
    assert!(matches!(
        household.service.report(ancient, distant, PersonFilter::All, None),
        Err(ServiceError::RangeTooLong { .. })
    ));
}

#[test]
fn report_measures_age_on_the_hinted_day() {
    let service = HouseholdService::new(
        Arc::new(InMemoryHouseholdStore::new()),
        ScoringEngine::new(EligibilityBasis::QueryDate),
        TimeResolver::new("Pacific/Pago_Pago"),
    );
    // Kiritimati runs a full day ahead of Pago Pago.
    let ahead = Utc::now()
        .with_timezone(&chrono_tz::Pacific::Kiritimati)
        .date_naive();
    let seventh_birthday = NaiveDate::from_ymd_opt(ahead.year() - 7, ahead.month(), ahead.day());
    let Some(birth) = seventh_birthday else {
        // No seventh birthday falls on Feb 29 of a common year.
        return;
    };
    let child = service
        .add_person(NewPerson::dependent("Aisyah", Some(birth)))
        .expect("child added");
    let hafalan = service
        .add_item(
            NewCatalogItem::boolean("Hafalan", Category::Recommended, 5)
                .for_audience(Audience::only([IslamicLevel::Tamyiz])),
        )
        .expect("item added");

    let eligible = |hint: Option<&str>| {
        service
            .report(ahead, ahead, PersonFilter::Person(child.id), hint)
            .expect("report")
            .rows
            .iter()
            .find(|row| row.item_id == hafalan.id)
            .map(|row| row.eligible)
    };

    assert_eq!(eligible(Some("Pacific/Kiritimati")), Some(true));
    assert_eq!(eligible(None), Some(false));
}

#[test]
fn export_writes_the_pivot_as_csv() {
    let household = household();
    household
        .service
        .record(household.guardian.id, household.subuh.id, date(10, 14), 1, None)
        .expect("recorded");

    let mut buffer = Vec::new();
    let matrix = household
        .service
        .export_csv(
            date(10, 13),
            date(10, 19),
            PersonFilter::Person(household.guardian.id),
            None,
            &mut buffer,
        )
        .expect("export");
    let text = String::from_utf8(buffer).expect("utf8");

    assert_eq!(matrix.days.len(), 7);
    assert!(text.starts_with("person,item,category,2025-10-13,"));
    assert!(text.contains("Abi,Sholat Subuh,obligatory,,20,,,,,,20"));
    assert!(text.contains("Abi,TOTAL,,0,20,0,0,0,0,0,20"));
}

#[test]
fn removing_a_person_drops_their_logs() {
    let household = household();
    let day = date(10, 16);
    household
        .service
        .record(household.child.id, household.subuh.id, day, 1, None)
        .expect("recorded");

    household
        .service
        .remove_person(household.child.id)
        .expect("removed");

    let logs = household
        .store
        .logs_between(crate::domain::DateRange::single(day), None)
        .expect("readable");
    assert!(logs.is_empty());
    assert!(household
        .service
        .persons()
        .expect("persons")
        .iter()
        .all(|person| person.id != household.child.id));
}

#[test]
fn removing_an_item_drops_its_logs() {
    let household = household();
    let day = date(10, 16);
    household
        .service
        .record(household.guardian.id, household.tilawah.id, day, 2, None)
        .expect("recorded");

    household
        .service
        .remove_item(household.tilawah.id)
        .expect("removed");

    assert!(household
        .store
        .log(household.guardian.id, household.tilawah.id, day)
        .expect("readable")
        .is_none());
    assert!(household
        .service
        .catalog()
        .expect("catalog")
        .get(household.tilawah.id)
        .is_none());
}

#[test]
fn seeding_only_fills_an_empty_catalog() {
    let household = household();
    let seeded = household
        .service
        .seed_standard_catalog()
        .expect("seed call succeeds");
    assert!(seeded.is_empty(), "existing catalog is left alone");

    let fresh = build_household(EligibilityBasis::QueryDate);
    for item in fresh.service.catalog().expect("catalog").items {
        fresh.service.remove_item(item.id).expect("removed");
    }
    let seeded = fresh.service.seed_standard_catalog().expect("seeded");
    assert!(!seeded.is_empty());
}

#[test]
fn update_person_maps_missing_rows_to_not_found() {
    let household = household();
    let mut ghost = NewPerson::guardian("Ghost").into_person(PersonId(500));
    ghost.target_points = 50;
    match household.service.update_person(ghost) {
        Err(ServiceError::PersonNotFound(PersonId(500))) => {}
        other => panic!("expected missing person, got {other:?}"),
    }
}

#[test]
fn store_outages_surface_as_server_errors() {
    let service = unavailable_service();
    match service.leaderboard(LeaderboardWindow::Week, None) {
        Err(err @ ServiceError::Store(StoreError::Unavailable(_))) => {
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR)
        }
        other => panic!("expected store outage, got {other:?}"),
    }
}
