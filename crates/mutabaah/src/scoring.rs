//! Converts a person's logs for one day into achieved and achievable points.

use crate::catalog::Catalog;
use crate::domain::{
    CatalogItem, Category, IslamicLevel, ItemId, LogEntry, LoggedValue, Person, ScoringMode,
    ScoringRule,
};
use crate::eligibility::{classify, eligible_items, EligibilityBasis};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DayScore {
    pub achieved: i32,
    pub max: i32,
    pub percentage: u8,
}

/// Points one logged value earns. Counts are never multiplied in: any positive
/// count earns the base points once.
pub fn contribution(item: &CatalogItem, value: LoggedValue) -> i32 {
    if !value.is_positive() {
        return 0;
    }
    match (&item.rule, value) {
        (ScoringRule::Boolean, _) | (ScoringRule::Counter { .. }, _) => item.base_points,
        (ScoringRule::LeveledChoice { levels }, LoggedValue::Level(points)) => {
            if levels.is_malformed() {
                0
            } else {
                points
            }
        }
        (ScoringRule::LeveledChoice { .. }, _) => 0,
    }
}

/// Best positive score an item can add to a day; infractions add nothing.
pub fn potential(item: &CatalogItem) -> i32 {
    if item.is_infraction() {
        return 0;
    }
    let best = match &item.rule {
        ScoringRule::Boolean | ScoringRule::Counter { .. } => item.base_points,
        ScoringRule::LeveledChoice { levels } => levels
            .max_points()
            .map_or(item.base_points, |top| top.max(item.base_points)),
    };
    best.max(0)
}

/// Share of the daily target reached, capped at 100. A zero target reads as 0%.
pub fn percentage(achieved: i32, target_points: u32) -> u8 {
    if target_points == 0 || achieved <= 0 {
        return 0;
    }
    let ratio = (f64::from(achieved) * 100.0 / f64::from(target_points)).round();
    ratio.min(100.0) as u8
}

/// Picks the newest entry per item among `logs` for `person` on `on_date`.
fn latest_per_item<'a>(
    person: &Person,
    on_date: NaiveDate,
    logs: &'a [LogEntry],
) -> HashMap<ItemId, &'a LogEntry> {
    let mut latest: HashMap<ItemId, &LogEntry> = HashMap::new();
    for entry in logs
        .iter()
        .filter(|entry| entry.person_id == person.id && entry.date == on_date)
    {
        latest
            .entry(entry.item_id)
            .and_modify(|current| {
                if entry.recorded_at >= current.recorded_at {
                    *current = entry;
                }
            })
            .or_insert(entry);
    }
    latest
}

pub fn day_score(
    person: &Person,
    on_date: NaiveDate,
    logs: &[LogEntry],
    eligible: &[&CatalogItem],
) -> DayScore {
    let entries = latest_per_item(person, on_date, logs);

    let mut achieved = 0;
    let mut max = 0;
    for item in eligible {
        max += potential(item);
        if let Some(entry) = entries.get(&item.id) {
            achieved += contribution(item, LoggedValue::resolve(item, entry.value));
        }
    }

    DayScore {
        achieved,
        max,
        percentage: percentage(achieved, person.target_points),
    }
}

/// One catalog row of a person's day, as shown on a tracking screen.
#[derive(Debug, Clone, Serialize)]
pub struct ItemDayStatus {
    pub item_id: ItemId,
    pub name: String,
    pub category: Category,
    pub mode: ScoringMode,
    pub value: Option<LoggedValue>,
    pub note: Option<String>,
    pub points: i32,
    pub potential: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_target: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine {
    basis: EligibilityBasis,
}

impl ScoringEngine {
    pub fn new(basis: EligibilityBasis) -> Self {
        Self { basis }
    }

    pub fn basis(&self) -> EligibilityBasis {
        self.basis
    }

    pub fn level_for(
        &self,
        person: &Person,
        scored_day: NaiveDate,
        today: NaiveDate,
    ) -> IslamicLevel {
        classify(person, self.basis.reference_date(scored_day, today))
    }

    pub fn score_day(
        &self,
        person: &Person,
        scored_day: NaiveDate,
        today: NaiveDate,
        catalog: &Catalog,
        logs: &[LogEntry],
    ) -> DayScore {
        let level = self.level_for(person, scored_day, today);
        let eligible = eligible_items(catalog, level);
        day_score(person, scored_day, logs, &eligible)
    }

    pub fn item_statuses(
        &self,
        person: &Person,
        scored_day: NaiveDate,
        today: NaiveDate,
        catalog: &Catalog,
        logs: &[LogEntry],
    ) -> Vec<ItemDayStatus> {
        let level = self.level_for(person, scored_day, today);
        let entries = latest_per_item(person, scored_day, logs);

        eligible_items(catalog, level)
            .into_iter()
            .map(|item| {
                let entry = entries.get(&item.id);
                let value = entry.map(|entry| LoggedValue::resolve(item, entry.value));
                ItemDayStatus {
                    item_id: item.id,
                    name: item.name.clone(),
                    category: item.category,
                    mode: item.mode(),
                    value,
                    note: entry.and_then(|entry| entry.note.clone()),
                    points: value.map_or(0, |value| contribution(item, value)),
                    potential: potential(item),
                    counter_target: item.counter_target(),
                }
            })
            .collect()
    }
}
