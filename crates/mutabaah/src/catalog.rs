use crate::domain::{
    Audience, CatalogItem, Category, IslamicLevel, ItemId, LevelOption, LevelOptions,
    NewCatalogItem, ScoringRule,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::warn;

/// Non-fatal catalog data problem surfaced beside the loaded items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CatalogIssue {
    MalformedLevelOptions { item_id: ItemId, detail: String },
    EmptyAudience { item_id: ItemId },
    UnknownAudienceTag { item_id: ItemId, tag: String },
    MalformedAudience { item_id: ItemId, detail: String },
    UnknownScoringMode { item_id: ItemId, raw: String },
    UnknownCategory { item_id: ItemId, raw: String },
}

impl CatalogIssue {
    pub fn item_id(&self) -> ItemId {
        match self {
            Self::MalformedLevelOptions { item_id, .. }
            | Self::EmptyAudience { item_id }
            | Self::UnknownAudienceTag { item_id, .. }
            | Self::MalformedAudience { item_id, .. }
            | Self::UnknownScoringMode { item_id, .. }
            | Self::UnknownCategory { item_id, .. } => *item_id,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Self::MalformedLevelOptions { item_id, detail } => {
                format!("item {item_id}: level options unreadable ({detail}); scoring as zero")
            }
            Self::EmptyAudience { item_id } => {
                format!("item {item_id}: eligible audience is empty; nobody will see it")
            }
            Self::UnknownAudienceTag { item_id, tag } => {
                format!("item {item_id}: ignoring unknown audience tag '{tag}'")
            }
            Self::MalformedAudience { item_id, detail } => {
                format!("item {item_id}: audience unreadable ({detail}); hidden from everyone")
            }
            Self::UnknownScoringMode { item_id, raw } => {
                format!("item {item_id}: unknown scoring mode '{raw}'; treated as boolean")
            }
            Self::UnknownCategory { item_id, raw } => {
                format!("item {item_id}: unknown category '{raw}'; treated as recommended")
            }
        }
    }
}

/// The household catalog together with any data issues found while loading it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    pub items: Vec<CatalogItem>,
    pub issues: Vec<CatalogIssue>,
}

impl Catalog {
    pub fn new(mut items: Vec<CatalogItem>) -> Self {
        items.sort_by_key(|item| item.id);
        let issues = items
            .iter()
            .filter(|item| item.audience.is_empty())
            .map(|item| CatalogIssue::EmptyAudience { item_id: item.id })
            .collect();
        Self { items, issues }
    }

    pub fn with_issues(items: Vec<CatalogItem>, mut issues: Vec<CatalogIssue>) -> Self {
        let mut catalog = Self::new(items);
        issues.append(&mut catalog.issues);
        issues.sort_by_key(CatalogIssue::item_id);
        issues.dedup();
        catalog.issues = issues;
        catalog
    }

    pub fn get(&self, id: ItemId) -> Option<&CatalogItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

pub fn encode_level_options(rule: &ScoringRule) -> Option<String> {
    match rule {
        ScoringRule::LeveledChoice {
            levels: LevelOptions::Parsed(options),
        } => serde_json::to_string(options).ok(),
        ScoringRule::LeveledChoice {
            levels: LevelOptions::Malformed { raw },
        } => Some(raw.clone()),
        _ => None,
    }
}

pub fn decode_level_options(
    item_id: ItemId,
    raw: Option<&str>,
    issues: &mut Vec<CatalogIssue>,
) -> LevelOptions {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        issues.push(CatalogIssue::MalformedLevelOptions {
            item_id,
            detail: "missing payload".to_string(),
        });
        return LevelOptions::Malformed {
            raw: String::new(),
        };
    };

    match serde_json::from_str::<Vec<LevelOption>>(raw) {
        Ok(options) => LevelOptions::Parsed(options),
        Err(err) => {
            warn!(item = item_id.0, error = %err, "unreadable level options");
            issues.push(CatalogIssue::MalformedLevelOptions {
                item_id,
                detail: err.to_string(),
            });
            LevelOptions::Malformed {
                raw: raw.to_string(),
            }
        }
    }
}

pub fn encode_audience(audience: &Audience) -> String {
    match audience {
        Audience::All => "\"all\"".to_string(),
        Audience::Levels(levels) => {
            let tags: Vec<&str> = levels.iter().map(|level| level.as_str()).collect();
            serde_json::to_string(&tags).unwrap_or_else(|_| "[]".to_string())
        }
    }
}

/// Accepts `"all"`, `["all"]`, or a list of level tags. Anything unreadable
/// hides the item rather than exposing it to everyone.
pub fn decode_audience(item_id: ItemId, raw: &str, issues: &mut Vec<CatalogIssue>) -> Audience {
    let value: Value = match serde_json::from_str(raw.trim()) {
        Ok(value) => value,
        Err(err) => {
            issues.push(CatalogIssue::MalformedAudience {
                item_id,
                detail: err.to_string(),
            });
            return Audience::Levels(BTreeSet::new());
        }
    };

    let tags: Vec<String> = match value {
        Value::String(tag) => vec![tag],
        Value::Array(entries) => entries
            .into_iter()
            .filter_map(|entry| entry.as_str().map(str::to_string))
            .collect(),
        Value::Null => Vec::new(),
        other => {
            issues.push(CatalogIssue::MalformedAudience {
                item_id,
                detail: format!("unexpected audience payload {other}"),
            });
            return Audience::Levels(BTreeSet::new());
        }
    };

    if tags.iter().any(|tag| tag.trim().eq_ignore_ascii_case("all")) {
        return Audience::All;
    }

    let mut levels = BTreeSet::new();
    for tag in tags {
        match IslamicLevel::parse(&tag) {
            Some(level) => {
                levels.insert(level);
            }
            None => issues.push(CatalogIssue::UnknownAudienceTag { item_id, tag }),
        }
    }
    Audience::Levels(levels)
}

/// Default mutabaah item set used to seed a new household.
pub fn standard_catalog() -> Vec<NewCatalogItem> {
    use IslamicLevel::{Baligh, Guardian, Tamyiz};

    let mut items: Vec<NewCatalogItem> = ["Subuh", "Dzuhur", "Ashar", "Maghrib", "Isya"]
        .into_iter()
        .map(|prayer| {
            NewCatalogItem::boolean(format!("Sholat {prayer}"), Category::Obligatory, 20)
                .for_audience(Audience::only([Guardian, Baligh, Tamyiz]))
        })
        .collect();

    items.push(
        NewCatalogItem::boolean("Sholat Rawatib", Category::Recommended, 5)
            .for_audience(Audience::only([Guardian, Baligh])),
    );
    items.push(NewCatalogItem::counter(
        "Tilawah Al-Qur'an",
        Category::Recommended,
        10,
        Some(5),
    ));
    items.push(
        NewCatalogItem::leveled(
            "Qiyamul Lail",
            Category::Recommended,
            1,
            vec![LevelOption::new("ringan", 5), LevelOption::new("berat", 15)],
        )
        .for_audience(Audience::only([Guardian, Baligh])),
    );
    items.push(NewCatalogItem::boolean("Dzikir Pagi Petang", Category::Recommended, 5));
    items.push(
        NewCatalogItem::boolean("Berkata Kasar", Category::Infraction, -10)
            .for_audience(Audience::only([Guardian, Baligh, Tamyiz])),
    );
    items.push(
        NewCatalogItem::boolean("Menunda Sholat", Category::Infraction, -5)
            .for_audience(Audience::only([Guardian, Baligh])),
    );

    items
}
