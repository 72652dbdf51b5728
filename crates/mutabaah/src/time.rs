//! Household day boundaries and leaderboard windows.

use crate::domain::{start_of_week, DateRange, TimeConfig};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_TIMEZONE: &str = "Asia/Jakarta";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HouseholdZone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl HouseholdZone {
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            Self::Named(tz) => instant.with_timezone(tz).date_naive(),
            Self::Fixed(offset) => instant.with_timezone(offset).date_naive(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Named(tz) => tz.name().to_string(),
            Self::Fixed(offset) => format!("UTC{offset}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneSource {
    Forced,
    ClientHint,
    Default,
    Utc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedZone {
    pub zone: HouseholdZone,
    pub source: ZoneSource,
    pub warnings: Vec<String>,
}

/// Plain digits only; signs inside an offset component are rejected.
fn unsigned(raw: &str) -> Option<i32> {
    if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

fn parse_fixed_offset(raw: &str) -> Option<FixedOffset> {
    let trimmed = raw.trim();
    let (sign, rest) = match trimmed.chars().next()? {
        '+' => (1, &trimmed[1..]),
        '-' => (-1, &trimmed[1..]),
        _ => return None,
    };

    let rest = rest.trim();
    if rest.is_empty() || !rest.is_ascii() {
        return None;
    }

    let (hours, minutes) = if let Some((h, m)) = rest.split_once(':') {
        (unsigned(h)?, unsigned(m)?)
    } else if rest.len() > 2 {
        let (h, m) = rest.split_at(rest.len() - 2);
        (unsigned(h)?, unsigned(m)?)
    } else {
        (unsigned(rest)?, 0)
    };

    if hours > 14 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Parses an IANA name, `UTC`/`GMT`, or a fixed offset such as `+07:00` or `UTC+7`.
pub fn parse_zone(raw: &str) -> Option<HouseholdZone> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let upper = trimmed.to_ascii_uppercase();
    if upper == "UTC" || upper == "GMT" || upper == "Z" {
        return FixedOffset::east_opt(0).map(HouseholdZone::Fixed);
    }

    if let Some(offset) = upper
        .strip_prefix("UTC")
        .or_else(|| upper.strip_prefix("GMT"))
    {
        return parse_fixed_offset(offset).map(HouseholdZone::Fixed);
    }

    if let Some(offset) = parse_fixed_offset(trimmed) {
        return Some(HouseholdZone::Fixed(offset));
    }

    trimmed.parse::<Tz>().ok().map(HouseholdZone::Named)
}

#[derive(Debug, Clone)]
pub struct TimeResolver {
    default_timezone: String,
}

impl Default for TimeResolver {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

impl TimeResolver {
    pub fn new(default_timezone: impl Into<String>) -> Self {
        Self {
            default_timezone: default_timezone.into(),
        }
    }

    pub fn default_timezone(&self) -> &str {
        &self.default_timezone
    }

    /// Forced override, then the client hint, then the configured default.
    /// Each unparseable candidate adds a warning and resolution moves on.
    pub fn resolve(&self, config: &TimeConfig, client_hint: Option<&str>) -> ResolvedZone {
        let mut warnings = Vec::new();
        let candidates = [
            (config.forced_timezone.as_deref(), ZoneSource::Forced),
            (client_hint, ZoneSource::ClientHint),
            (Some(self.default_timezone.as_str()), ZoneSource::Default),
        ];

        for (candidate, source) in candidates {
            let Some(raw) = candidate.map(str::trim).filter(|raw| !raw.is_empty()) else {
                continue;
            };
            match parse_zone(raw) {
                Some(zone) => {
                    return ResolvedZone {
                        zone,
                        source,
                        warnings,
                    }
                }
                None => {
                    warn!(timezone = raw, ?source, "unparseable timezone, falling back");
                    warnings.push(format!("unrecognised timezone '{raw}'"));
                }
            }
        }

        ResolvedZone {
            zone: HouseholdZone::Fixed(Utc.fix()),
            source: ZoneSource::Utc,
            warnings,
        }
    }

    pub fn local_today(
        &self,
        config: &TimeConfig,
        client_hint: Option<&str>,
        now: DateTime<Utc>,
    ) -> NaiveDate {
        self.resolve(config, client_hint).zone.date_of(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardWindow {
    #[default]
    Today,
    Week,
    Month,
    Year,
}

impl LeaderboardWindow {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "today" | "day" => Some(Self::Today),
            "week" | "this_week" => Some(Self::Week),
            "month" | "this_month" => Some(Self::Month),
            "year" | "this_year" => Some(Self::Year),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Today => "Today",
            Self::Week => "This week",
            Self::Month => "This month",
            Self::Year => "This year",
        }
    }

    /// Window ending on `today`; weeks start on Monday.
    pub fn range(self, today: NaiveDate) -> DateRange {
        let start = match self {
            Self::Today => today,
            Self::Week => start_of_week(today),
            Self::Month => today.with_day(1).unwrap_or(today),
            Self::Year => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
        };
        DateRange { start, end: today }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn instant(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).single().expect("valid instant")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn forced_zone_wins_over_client_hint() {
        let resolver = TimeResolver::default();
        let config = TimeConfig {
            forced_timezone: Some("Asia/Jakarta".to_string()),
        };
        // 18:00 UTC is already the next day in Jakarta (UTC+7).
        let today =
            resolver.local_today(&config, Some("America/New_York"), instant(2025, 3, 1, 18));
        assert_eq!(today, date(2025, 3, 2));
    }

    #[test]
    fn client_hint_applies_without_override() {
        let resolver = TimeResolver::default();
        let resolved = resolver.resolve(&TimeConfig::default(), Some("America/New_York"));
        assert_eq!(resolved.source, ZoneSource::ClientHint);
        assert_eq!(resolved.zone.date_of(instant(2025, 3, 2, 3)), date(2025, 3, 1));
    }

    #[test]
    fn garbage_zone_falls_back_with_warning() {
        let resolver = TimeResolver::default();
        let config = TimeConfig {
            forced_timezone: Some("Mars/Olympus".to_string()),
        };
        let resolved = resolver.resolve(&config, None);
        assert_eq!(resolved.source, ZoneSource::Default);
        assert_eq!(resolved.warnings.len(), 1);
    }

    #[test]
    fn broken_default_lands_on_utc() {
        let resolver = TimeResolver::new("nowhere");
        let resolved = resolver.resolve(&TimeConfig::default(), Some(""));
        assert_eq!(resolved.source, ZoneSource::Utc);
        assert_eq!(resolved.zone.date_of(instant(2025, 3, 1, 23)), date(2025, 3, 1));
    }

    #[test]
    fn fixed_offsets_parse() {
        assert!(matches!(parse_zone("+07:00"), Some(HouseholdZone::Fixed(_))));
        assert!(matches!(parse_zone("UTC+7"), Some(HouseholdZone::Fixed(_))));
        assert!(matches!(parse_zone("gmt"), Some(HouseholdZone::Fixed(_))));
        assert!(parse_zone("+25:00").is_none());
    }

    #[test]
    fn signed_components_inside_an_offset_are_rejected() {
        assert!(parse_zone("+-5").is_none());
        assert!(parse_zone("+5:-30").is_none());
        assert!(parse_zone("UTC+-7").is_none());
        assert_eq!(
            parse_zone("+0530"),
            FixedOffset::east_opt(5 * 3600 + 30 * 60).map(HouseholdZone::Fixed)
        );
    }

    #[test]
    fn non_ascii_hint_falls_back_to_default() {
        let resolved = TimeResolver::default().resolve(&TimeConfig::default(), Some("+é1"));
        assert_eq!(resolved.source, ZoneSource::Default);
        assert_eq!(resolved.warnings.len(), 1);
        assert!(parse_zone("-1é").is_none());
    }

    #[test]
    fn windows_anchor_to_today() {
        let today = date(2025, 10, 16);
        assert_eq!(LeaderboardWindow::Today.range(today).start, today);
        assert_eq!(LeaderboardWindow::Week.range(today).start, date(2025, 10, 13));
        assert_eq!(LeaderboardWindow::Month.range(today).start, date(2025, 10, 1));
        assert_eq!(LeaderboardWindow::Year.range(today).start, date(2025, 1, 1));
        assert!(LeaderboardWindow::Year.range(today).contains(today));
    }
}
