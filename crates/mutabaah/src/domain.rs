use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(pub i64);

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Guardian,
    Dependent,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guardian => "guardian",
            Self::Dependent => "dependent",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "guardian" | "parent" => Some(Self::Guardian),
            "dependent" | "child" => Some(Self::Dependent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[default]
    #[serde(rename = "unset")]
    Unset,
}

impl Gender {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
            Self::Unset => "unset",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "M" | "m" => Self::Male,
            "F" | "f" => Self::Female,
            _ => Self::Unset,
        }
    }
}

pub const DEFAULT_TARGET_POINTS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub display_name: String,
    pub role: Role,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing)]
    pub guardian_pin: Option<String>,
    pub target_points: u32,
}

/// Fields supplied when a person joins the household; the store assigns the id.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPerson {
    pub display_name: String,
    pub role: Role,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub guardian_pin: Option<String>,
    #[serde(default)]
    pub target_points: Option<u32>,
}

impl NewPerson {
    pub fn guardian(name: impl Into<String>) -> Self {
        Self {
            display_name: name.into(),
            role: Role::Guardian,
            gender: Gender::Unset,
            birth_date: None,
            guardian_pin: None,
            target_points: None,
        }
    }

    pub fn dependent(name: impl Into<String>, birth_date: Option<NaiveDate>) -> Self {
        Self {
            display_name: name.into(),
            role: Role::Dependent,
            gender: Gender::Unset,
            birth_date,
            guardian_pin: None,
            target_points: None,
        }
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = gender;
        self
    }

    pub fn with_target(mut self, target_points: u32) -> Self {
        self.target_points = Some(target_points);
        self
    }

    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.guardian_pin = Some(pin.into());
        self
    }

    pub fn into_person(self, id: PersonId) -> Person {
        // PINs only exist for guardians.
        let guardian_pin = match self.role {
            Role::Guardian => self.guardian_pin,
            Role::Dependent => None,
        };
        Person {
            id,
            display_name: self.display_name,
            role: self.role,
            gender: self.gender,
            birth_date: self.birth_date,
            guardian_pin,
            target_points: self.target_points.unwrap_or(DEFAULT_TARGET_POINTS),
        }
    }
}

/// Audience tier used to gate catalog visibility.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IslamicLevel {
    Guardian,
    Baligh,
    Tamyiz,
    GhairuTamyiz,
}

impl IslamicLevel {
    pub const fn ordered() -> [Self; 4] {
        [Self::Guardian, Self::Baligh, Self::Tamyiz, Self::GhairuTamyiz]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guardian => "guardian",
            Self::Baligh => "baligh",
            Self::Tamyiz => "tamyiz",
            Self::GhairuTamyiz => "ghairu_tamyiz",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Guardian => "Guardian",
            Self::Baligh => "Baligh",
            Self::Tamyiz => "Tamyiz",
            Self::GhairuTamyiz => "Ghairu Tamyiz",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "guardian" => Some(Self::Guardian),
            "baligh" => Some(Self::Baligh),
            "tamyiz" => Some(Self::Tamyiz),
            "ghairu_tamyiz" | "ghairu-tamyiz" => Some(Self::GhairuTamyiz),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    Boolean,
    Counter,
    LeveledChoice,
}

impl ScoringMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Counter => "counter",
            Self::LeveledChoice => "leveled_choice",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Some(Self::Boolean),
            "counter" | "count" => Some(Self::Counter),
            "leveled_choice" | "leveledchoice" | "level" | "choice" => Some(Self::LeveledChoice),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Obligatory,
    Recommended,
    Infraction,
}

impl Category {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Obligatory => "obligatory",
            Self::Recommended => "recommended",
            Self::Infraction => "infraction",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "obligatory" | "wajib" => Some(Self::Obligatory),
            "recommended" | "sunnah" => Some(Self::Recommended),
            "infraction" | "pelanggaran" => Some(Self::Infraction),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelOption {
    pub label: String,
    pub points: i32,
}

impl LevelOption {
    pub fn new(label: impl Into<String>, points: i32) -> Self {
        Self {
            label: label.into(),
            points,
        }
    }
}

/// Level menu of a leveled-choice item. A payload that failed to decode is kept
/// as `Malformed` so the item scores zero instead of failing the catalog load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "options")]
pub enum LevelOptions {
    Parsed(Vec<LevelOption>),
    Malformed { raw: String },
}

impl LevelOptions {
    pub fn options(&self) -> &[LevelOption] {
        match self {
            Self::Parsed(options) => options,
            Self::Malformed { .. } => &[],
        }
    }

    pub fn max_points(&self) -> Option<i32> {
        self.options().iter().map(|option| option.points).max()
    }

    pub fn contains_points(&self, points: i32) -> bool {
        self.options().iter().any(|option| option.points == points)
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ScoringRule {
    Boolean,
    Counter { target: Option<u32> },
    LeveledChoice { levels: LevelOptions },
}

impl ScoringRule {
    pub const fn mode(&self) -> ScoringMode {
        match self {
            Self::Boolean => ScoringMode::Boolean,
            Self::Counter { .. } => ScoringMode::Counter,
            Self::LeveledChoice { .. } => ScoringMode::LeveledChoice,
        }
    }
}

/// Who may see a catalog item. `Levels` may be empty, which hides the item
/// from everyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    All,
    Levels(BTreeSet<IslamicLevel>),
}

impl Audience {
    pub fn only(levels: impl IntoIterator<Item = IslamicLevel>) -> Self {
        Self::Levels(levels.into_iter().collect())
    }

    pub fn admits(&self, level: IslamicLevel) -> bool {
        match self {
            Self::All => true,
            Self::Levels(levels) => levels.contains(&level),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Levels(levels) if levels.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    pub category: Category,
    pub base_points: i32,
    pub rule: ScoringRule,
    pub audience: Audience,
}

impl CatalogItem {
    pub fn mode(&self) -> ScoringMode {
        self.rule.mode()
    }

    pub fn is_infraction(&self) -> bool {
        self.category == Category::Infraction || self.base_points < 0
    }

    pub fn counter_target(&self) -> Option<u32> {
        match self.rule {
            ScoringRule::Counter { target } => target,
            _ => None,
        }
    }
}

/// Fields supplied when adding an item to the catalog.
#[derive(Debug, Clone)]
pub struct NewCatalogItem {
    pub name: String,
    pub category: Category,
    pub base_points: i32,
    pub rule: ScoringRule,
    pub audience: Audience,
}

impl NewCatalogItem {
    pub fn boolean(name: impl Into<String>, category: Category, base_points: i32) -> Self {
        Self {
            name: name.into(),
            category,
            base_points,
            rule: ScoringRule::Boolean,
            audience: Audience::All,
        }
    }

    pub fn counter(
        name: impl Into<String>,
        category: Category,
        base_points: i32,
        target: Option<u32>,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            base_points,
            rule: ScoringRule::Counter { target },
            audience: Audience::All,
        }
    }

    pub fn leveled(
        name: impl Into<String>,
        category: Category,
        base_points: i32,
        options: Vec<LevelOption>,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            base_points,
            rule: ScoringRule::LeveledChoice {
                levels: LevelOptions::Parsed(options),
            },
            audience: Audience::All,
        }
    }

    pub fn for_audience(mut self, audience: Audience) -> Self {
        self.audience = audience;
        self
    }

    pub fn into_item(self, id: ItemId) -> CatalogItem {
        CatalogItem {
            id,
            name: self.name,
            category: self.category,
            base_points: self.base_points,
            rule: self.rule,
            audience: self.audience,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub id: LogId,
    pub person_id: PersonId,
    pub item_id: ItemId,
    pub date: NaiveDate,
    pub value: i64,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Upsert payload keyed by (person, item, date).
#[derive(Debug, Clone)]
pub struct LogUpsert {
    pub person_id: PersonId,
    pub item_id: ItemId,
    pub date: NaiveDate,
    pub value: i64,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

/// A raw log integer interpreted through the item's scoring mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum LoggedValue {
    Done(bool),
    Count(u32),
    Level(i32),
    Unreadable(i64),
}

impl LoggedValue {
    pub fn resolve(item: &CatalogItem, raw: i64) -> Self {
        match &item.rule {
            ScoringRule::Boolean => match raw {
                0 => Self::Done(false),
                r if r > 0 => Self::Done(true),
                r => Self::Unreadable(r),
            },
            ScoringRule::Counter { .. } => match u32::try_from(raw) {
                Ok(count) => Self::Count(count),
                Err(_) => Self::Unreadable(raw),
            },
            ScoringRule::LeveledChoice { levels } => {
                if levels.is_malformed() {
                    return Self::Unreadable(raw);
                }
                match i32::try_from(raw) {
                    Ok(points) => Self::Level(points),
                    Err(_) => Self::Unreadable(raw),
                }
            }
        }
    }

    pub fn is_positive(self) -> bool {
        match self {
            Self::Done(done) => done,
            Self::Count(count) => count > 0,
            Self::Level(points) => points > 0,
            Self::Unreadable(_) => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeConfig {
    pub forced_timezone: Option<String>,
}

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DomainError> {
        if end < start {
            return Err(DomainError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }

    pub fn len_days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }
}

/// Whole years elapsed between `birth` and `on`; zero when `on` precedes the birth date.
pub fn age_in_years(birth: NaiveDate, on: NaiveDate) -> u32 {
    on.years_since(birth).unwrap_or(0)
}

pub(crate) fn start_of_week(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("range end {end} precedes start {start}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
}
