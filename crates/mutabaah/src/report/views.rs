use crate::catalog::CatalogIssue;
use crate::domain::{Category, ItemId, PersonId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "person_id")]
pub enum PersonFilter {
    #[default]
    All,
    Person(PersonId),
}

impl PersonFilter {
    pub fn includes(self, id: PersonId) -> bool {
        match self {
            Self::All => true,
            Self::Person(selected) => selected == id,
        }
    }
}

impl From<Option<PersonId>> for PersonFilter {
    fn from(value: Option<PersonId>) -> Self {
        value.map_or(Self::All, Self::Person)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PivotRow {
    pub person_id: PersonId,
    pub person_name: String,
    pub item_id: ItemId,
    pub item_name: String,
    pub category: Category,
    pub eligible: bool,
    pub cells: Vec<Option<i32>>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PivotTotalRow {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_id: Option<PersonId>,
    pub cells: Vec<i32>,
    pub total: i64,
}

impl PivotTotalRow {
    pub fn new(label: String, person_id: Option<PersonId>, cells: Vec<i32>) -> Self {
        let total = cells.iter().copied().map(i64::from).sum();
        Self {
            label,
            person_id,
            cells,
            total,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PivotMatrix {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: Vec<NaiveDate>,
    pub rows: Vec<PivotRow>,
    pub person_totals: Vec<PivotTotalRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub household_total: Option<PivotTotalRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<CatalogIssue>,
}
