//! Ranks household members by points earned over a window.

use crate::domain::{PersonId, Role};
use crate::scoring::ScoringEngine;
use crate::snapshot::HouseholdSnapshot;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub person_id: PersonId,
    pub display_name: String,
    pub role: Role,
    pub total_points: i64,
    pub active_days: usize,
}

/// Sums each person's daily achieved points across the days that have logs in
/// the snapshot window. People without logs still appear with zero. Ties keep
/// person id order.
pub fn rank(snapshot: &HouseholdSnapshot, engine: &ScoringEngine) -> Vec<LeaderboardEntry> {
    let mut logged_days: BTreeMap<PersonId, BTreeSet<NaiveDate>> = BTreeMap::new();
    for entry in snapshot
        .logs
        .iter()
        .filter(|entry| snapshot.range.contains(entry.date))
    {
        logged_days
            .entry(entry.person_id)
            .or_default()
            .insert(entry.date);
    }

    let mut entries: Vec<LeaderboardEntry> = snapshot
        .persons
        .iter()
        .map(|person| {
            let days = logged_days.get(&person.id);
            let total_points = days
                .into_iter()
                .flatten()
                .map(|day| {
                    let score = engine.score_day(
                        person,
                        *day,
                        snapshot.today,
                        &snapshot.catalog,
                        &snapshot.logs,
                    );
                    i64::from(score.achieved)
                })
                .sum();
            LeaderboardEntry {
                rank: 0,
                person_id: person.id,
                display_name: person.display_name.clone(),
                role: person.role,
                total_points,
                active_days: days.map_or(0, BTreeSet::len),
            }
        })
        .collect();

    entries.sort_by(|a, b| b.total_points.cmp(&a.total_points));

    // Equal totals share a rank.
    let mut previous: Option<(i64, usize)> = None;
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.rank = match previous {
            Some((points, rank)) if points == entry.total_points => rank,
            _ => index + 1,
        };
        previous = Some((entry.total_points, entry.rank));
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::domain::{
        Category, DateRange, ItemId, LogEntry, LogId, NewCatalogItem, NewPerson, PersonId,
    };
    use crate::eligibility::EligibilityBasis;
    use chrono::{TimeZone, Utc};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).expect("valid date")
    }

    fn log(id: i64, person: i64, item: i64, day: u32, value: i64) -> LogEntry {
        LogEntry {
            id: LogId(id),
            person_id: PersonId(person),
            item_id: ItemId(item),
            date: date(day),
            value,
            note: None,
            recorded_at: Utc.with_ymd_and_hms(2025, 10, day, 4, 0, 0).single().expect("instant"),
        }
    }

    fn snapshot(logs: Vec<LogEntry>, range: DateRange) -> HouseholdSnapshot {
        HouseholdSnapshot {
            persons: vec![
                NewPerson::guardian("Abi").into_person(PersonId(1)),
                NewPerson::guardian("Umi").into_person(PersonId(2)),
                NewPerson::dependent("Hasan", Some(date(1) - chrono::Duration::days(365 * 10)))
                    .into_person(PersonId(3)),
            ],
            catalog: Catalog::new(vec![
                NewCatalogItem::boolean("Subuh", Category::Obligatory, 20).into_item(ItemId(1)),
                NewCatalogItem::counter("Tilawah", Category::Recommended, 10, None)
                    .into_item(ItemId(2)),
            ]),
            logs,
            range,
            today: range.end,
        }
    }

    #[test]
    fn totals_sum_daily_scores_and_keep_idle_people() {
        let range = DateRange::new(date(13), date(16)).expect("range");
        let board = rank(
            &snapshot(
                vec![
                    log(1, 2, 1, 13, 1),
                    log(2, 2, 2, 14, 7),
                    log(3, 3, 1, 15, 1),
                ],
                range,
            ),
            &ScoringEngine::new(EligibilityBasis::QueryDate),
        );

        let totals: Vec<(PersonId, i64)> = board
            .iter()
            .map(|entry| (entry.person_id, entry.total_points))
            .collect();
        assert_eq!(
            totals,
            vec![(PersonId(2), 30), (PersonId(3), 20), (PersonId(1), 0)]
        );
        assert_eq!(board[0].active_days, 2);
        assert_eq!(board[2].active_days, 0);
    }

    #[test]
    fn ties_keep_person_order_and_share_rank() {
        let range = DateRange::single(date(16));
        let board = rank(
            &snapshot(vec![log(1, 3, 1, 16, 1), log(2, 1, 1, 16, 1)], range),
            &ScoringEngine::default(),
        );
        assert_eq!(board[0].person_id, PersonId(1));
        assert_eq!(board[1].person_id, PersonId(3));
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[1].rank, 1);
        assert_eq!(board[2].rank, 3);
    }

    #[test]
    fn rows_outside_the_window_are_ignored() {
        let range = DateRange::single(date(16));
        let board = rank(
            &snapshot(vec![log(1, 1, 1, 15, 1)], range),
            &ScoringEngine::default(),
        );
        assert!(board.iter().all(|entry| entry.total_points == 0));
    }
}
