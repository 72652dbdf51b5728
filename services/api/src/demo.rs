use crate::infra::{household_service, parse_date, parse_window, HouseholdBackend};
use chrono::{Duration, NaiveDate};
use clap::Args;
use mutabaah::config::{AppConfig, HouseholdConfig};
use mutabaah::domain::{Gender, NewPerson, PersonId, ScoringRule};
use mutabaah::error::AppError;
use mutabaah::report::{PersonFilter, PivotMatrix};
use mutabaah::service::{HouseholdService, LeaderboardView, PersonDaySummary};
use mutabaah::store::{HouseholdStore, InMemoryHouseholdStore};
use mutabaah::time::LeaderboardWindow;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ReportArgs {
    /// First day of the report (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) start: NaiveDate,
    /// Last day of the report, inclusive (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) end: NaiveDate,
    /// Restrict the report to one person id
    #[arg(long)]
    pub(crate) person: Option<i64>,
    /// Write the pivot as CSV to this path instead of printing it
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
    /// Timezone hint used when the household has no forced override
    #[arg(long)]
    pub(crate) tz: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct LeaderboardArgs {
    /// today, week, month or year
    #[arg(long, value_parser = parse_window, default_value = "week")]
    pub(crate) window: LeaderboardWindow,
    /// Timezone hint used when the household has no forced override
    #[arg(long)]
    pub(crate) tz: Option<String>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Household day the demo treats as today (defaults to the resolved local date)
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

fn open_household(
    config: &HouseholdConfig,
) -> Result<HouseholdService<HouseholdBackend>, AppError> {
    let backend = Arc::new(HouseholdBackend::open(config)?);
    Ok(household_service(backend, config))
}

pub(crate) fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let household = open_household(&config.household)?;
    let filter = PersonFilter::from(args.person.map(PersonId));

    match args.csv {
        Some(path) => {
            let writer = BufWriter::new(File::create(&path)?);
            let matrix =
                household.export_csv(args.start, args.end, filter, args.tz.as_deref(), writer)?;
            println!(
                "Wrote {} rows for {} days to {}",
                matrix.rows.len(),
                matrix.days.len(),
                path.display()
            );
        }
        None => {
            let matrix = household.report(args.start, args.end, filter, args.tz.as_deref())?;
            render_pivot(&matrix);
        }
    }
    Ok(())
}

pub(crate) fn run_leaderboard(args: LeaderboardArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let household = open_household(&config.household)?;
    let view = household.leaderboard(args.window, args.tz.as_deref())?;
    render_leaderboard(&view);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(InMemoryHouseholdStore::new());
    let household = household_service(store, &HouseholdConfig {
        database_path: None,
        default_timezone: mutabaah::time::DEFAULT_TIMEZONE.to_string(),
        eligibility_basis: Default::default(),
    });

    let today = match args.today {
        Some(today) => today,
        None => household.today(None)?.date,
    };

    println!("Mutabaah household demo ({today})");
    let members = seed_demo_household(&household, today)?;

    println!("\nToday's progress");
    for member in &members {
        let summary = household.day_summary(*member, today, None)?;
        render_day(&summary);
    }

    println!();
    let board = household.leaderboard_on(LeaderboardWindow::Week, today)?;
    render_leaderboard(&board);

    println!();
    let week_start = today - Duration::days(6);
    let matrix = household.report(week_start, today, PersonFilter::All, None)?;
    render_pivot(&matrix);

    Ok(())
}

/// Two guardians and two children with a week of deterministic logs.
fn seed_demo_household<S>(
    household: &HouseholdService<S>,
    today: NaiveDate,
) -> Result<Vec<PersonId>, AppError>
where
    S: HouseholdStore + 'static,
{
    household.seed_standard_catalog()?;
    let abi = household.add_person(NewPerson::guardian("Abi").with_gender(Gender::Male))?;
    let umi = household.add_person(
        NewPerson::guardian("Umi")
            .with_gender(Gender::Female)
            .with_target(120),
    )?;
    let hasan = household.add_person(
        NewPerson::dependent("Hasan", Some(today - Duration::days(365 * 10 + 40)))
            .with_gender(Gender::Male),
    )?;
    let aisyah = household.add_person(
        NewPerson::dependent("Aisyah", Some(today - Duration::days(365 * 5 + 10)))
            .with_gender(Gender::Female),
    )?;
    let members = vec![abi.id, umi.id, hasan.id, aisyah.id];

    let catalog = household.catalog()?;
    for offset in 0..7_i64 {
        let day = today - Duration::days(offset);
        for (position, member) in members.iter().enumerate() {
            let person = household.day_summary(*member, day, None)?;
            for (index, status) in person.items.iter().enumerate() {
                let Some(item) = catalog.get(status.item_id) else {
                    continue;
                };
                // Spread activity so people and days differ.
                let salt = offset as usize + position * 3 + index;
                let value = match &item.rule {
                    _ if item.is_infraction() => i64::from(salt % 11 == 0),
                    ScoringRule::Boolean => i64::from(salt % 4 != 0),
                    ScoringRule::Counter { target } => {
                        i64::from(target.unwrap_or(1)) * i64::from(salt % 3 != 0)
                    }
                    ScoringRule::LeveledChoice { levels } => match salt % 3 {
                        0 => 0,
                        1 => levels.options().first().map_or(0, |option| i64::from(option.points)),
                        _ => i64::from(levels.max_points().unwrap_or(0)),
                    },
                };
                if value != 0 {
                    household.record(*member, item.id, day, value, None)?;
                }
            }
        }
    }

    Ok(members)
}

fn render_day(summary: &PersonDaySummary) {
    println!(
        "- {} ({}): {} / {} pts, {}% of target {}",
        summary.person.display_name,
        summary.level.label(),
        summary.score.achieved,
        summary.score.max,
        summary.score.percentage,
        summary.person.target_points
    );
    for status in &summary.items {
        if status.points != 0 {
            println!("    {}: {:+}", status.name, status.points);
        }
    }
}

fn render_leaderboard(view: &LeaderboardView) {
    println!("Leaderboard: {} ({} to {})", view.label, view.start, view.end);
    for entry in &view.entries {
        println!(
            "  {}. {} - {} pts over {} active day(s)",
            entry.rank, entry.display_name, entry.total_points, entry.active_days
        );
    }
}

fn render_pivot(matrix: &PivotMatrix) {
    println!("Report {} to {}", matrix.start, matrix.end);
    let header: Vec<String> = matrix
        .days
        .iter()
        .map(|day| day.format("%d/%m").to_string())
        .collect();
    println!("  {:<12} {:<24} {} | total", "person", "item", header.join(" "));

    for row in matrix.rows.iter().filter(|row| row.eligible) {
        let cells: Vec<String> = row
            .cells
            .iter()
            .map(|cell| match cell {
                Some(points) => format!("{points:>5}"),
                None => format!("{:>5}", "."),
            })
            .collect();
        println!(
            "  {:<12} {:<24} {} | {}",
            row.person_name,
            row.item_name,
            cells.join(" "),
            row.total
        );
    }

    for total in matrix
        .person_totals
        .iter()
        .chain(matrix.household_total.iter())
    {
        let cells: Vec<String> = total
            .cells
            .iter()
            .map(|points| format!("{points:>5}"))
            .collect();
        println!(
            "  {:<12} {:<24} {} | {}",
            total.label,
            "TOTAL",
            cells.join(" "),
            total.total
        );
    }

    for issue in &matrix.issues {
        println!("  ! {}", issue.summary());
    }
}
