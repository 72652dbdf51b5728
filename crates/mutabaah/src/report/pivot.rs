use super::views::{PersonFilter, PivotMatrix, PivotRow, PivotTotalRow};
use crate::domain::{CatalogItem, ItemId, LogEntry, LoggedValue, Person, PersonId};
use crate::eligibility::eligible_items;
use crate::scoring::{contribution, ScoringEngine};
use crate::snapshot::HouseholdSnapshot;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

type LogKey = (PersonId, ItemId, NaiveDate);

fn index_logs(logs: &[LogEntry]) -> HashMap<LogKey, &LogEntry> {
    let mut index: HashMap<LogKey, &LogEntry> = HashMap::new();
    for entry in logs {
        index
            .entry((entry.person_id, entry.item_id, entry.date))
            .and_modify(|current| {
                if entry.recorded_at >= current.recorded_at {
                    *current = entry;
                }
            })
            .or_insert(entry);
    }
    index
}

/// Infractions always read negative, everything else positive.
fn sign_tagged(item: &CatalogItem, points: i32) -> i32 {
    if item.is_infraction() {
        -points.abs()
    } else {
        points
    }
}

struct PersonDays {
    eligible_by_day: Vec<HashSet<ItemId>>,
}

impl PersonDays {
    fn new(
        person: &Person,
        days: &[NaiveDate],
        snapshot: &HouseholdSnapshot,
        engine: &ScoringEngine,
    ) -> Self {
        let eligible_by_day = days
            .iter()
            .map(|day| {
                let level = engine.level_for(person, *day, snapshot.today);
                eligible_items(&snapshot.catalog, level)
                    .into_iter()
                    .map(|item| item.id)
                    .collect()
            })
            .collect();
        Self { eligible_by_day }
    }

    fn eligible(&self, day_index: usize, item: ItemId) -> bool {
        self.eligible_by_day
            .get(day_index)
            .map_or(false, |items| items.contains(&item))
    }
}

/// Dense person × item × day matrix over the snapshot range. Every day of the
/// range gets a column whether or not anything was logged. A cell holds the
/// sign-tagged points of the day's log, or `None` when there is no entry or
/// the item was not eligible for the person that day.
pub fn build_pivot(
    snapshot: &HouseholdSnapshot,
    filter: PersonFilter,
    engine: &ScoringEngine,
) -> PivotMatrix {
    let days: Vec<NaiveDate> = snapshot.range.days().collect();
    let index = index_logs(&snapshot.logs);

    let selected: Vec<&Person> = snapshot
        .persons
        .iter()
        .filter(|person| filter.includes(person.id))
        .collect();

    let mut rows = Vec::new();
    let mut person_totals = Vec::new();

    for person in &selected {
        let person_days = PersonDays::new(person, &days, snapshot, engine);
        let mut daily = vec![0_i32; days.len()];

        for item in &snapshot.catalog.items {
            let cells: Vec<Option<i32>> = days
                .iter()
                .enumerate()
                .map(|(day_index, day)| {
                    if !person_days.eligible(day_index, item.id) {
                        return None;
                    }
                    index.get(&(person.id, item.id, *day)).map(|entry| {
                        let points = contribution(item, LoggedValue::resolve(item, entry.value));
                        sign_tagged(item, points)
                    })
                })
                .collect();

            for (slot, cell) in daily.iter_mut().zip(&cells) {
                *slot += cell.unwrap_or(0);
            }

            rows.push(PivotRow {
                person_id: person.id,
                person_name: person.display_name.clone(),
                item_id: item.id,
                item_name: item.name.clone(),
                category: item.category,
                eligible: (0..days.len()).any(|day_index| person_days.eligible(day_index, item.id)),
                total: cells.iter().flatten().copied().map(i64::from).sum(),
                cells,
            });
        }

        person_totals.push(PivotTotalRow::new(
            person.display_name.clone(),
            Some(person.id),
            daily,
        ));
    }

    let household_total = match filter {
        PersonFilter::All => {
            let mut daily = vec![0_i32; days.len()];
            for total in &person_totals {
                for (slot, value) in daily.iter_mut().zip(&total.cells) {
                    *slot += value;
                }
            }
            Some(PivotTotalRow::new("Household".to_string(), None, daily))
        }
        PersonFilter::Person(_) => None,
    };

    PivotMatrix {
        start: snapshot.range.start,
        end: snapshot.range.end,
        days,
        rows,
        person_totals,
        household_total,
        issues: snapshot.catalog.issues.clone(),
    }
}
