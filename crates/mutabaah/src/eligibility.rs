//! Age-bucketed audience classification and catalog filtering.

use crate::catalog::Catalog;
use crate::domain::{age_in_years, CatalogItem, IslamicLevel, Person, Role};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const BALIGH_AGE: u32 = 15;
pub const TAMYIZ_AGE: u32 = 7;

/// Which date a person's age is measured on when scoring a historical day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityBasis {
    /// Age as of the day the query runs, applied to every scored day.
    #[default]
    QueryDate,
    /// Age as of each scored day, so history stays stable as people age.
    LogDate,
}

impl EligibilityBasis {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "query" | "query_date" | "now" => Some(Self::QueryDate),
            "log" | "log_date" | "historical" => Some(Self::LogDate),
            _ => None,
        }
    }

    /// The date whose age applies when scoring `scored_day` during a query run on `today`.
    pub fn reference_date(self, scored_day: NaiveDate, today: NaiveDate) -> NaiveDate {
        match self {
            Self::QueryDate => today,
            Self::LogDate => scored_day,
        }
    }
}

pub fn classify(person: &Person, on_date: NaiveDate) -> IslamicLevel {
    match person.role {
        Role::Guardian => IslamicLevel::Guardian,
        Role::Dependent => match person.birth_date {
            None => IslamicLevel::GhairuTamyiz,
            Some(birth) => {
                let age = age_in_years(birth, on_date);
                if age >= BALIGH_AGE {
                    IslamicLevel::Baligh
                } else if age >= TAMYIZ_AGE {
                    IslamicLevel::Tamyiz
                } else {
                    IslamicLevel::GhairuTamyiz
                }
            }
        },
    }
}

pub fn eligible_items(catalog: &Catalog, level: IslamicLevel) -> Vec<&CatalogItem> {
    catalog
        .items
        .iter()
        .filter(|item| item.audience.admits(level))
        .collect()
}
