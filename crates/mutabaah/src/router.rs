use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::domain::{ItemId, NewPerson, PersonId, UpsertOutcome};
use crate::report::PersonFilter;
use crate::service::{HouseholdService, RecordedLog, ServiceError};
use crate::store::HouseholdStore;
use crate::time::LeaderboardWindow;

/// Router builder exposing the household tracking endpoints.
pub fn household_router<S>(service: Arc<HouseholdService<S>>) -> Router
where
    S: HouseholdStore + 'static,
{
    Router::new()
        .route("/api/v1/today", get(today_handler::<S>))
        .route(
            "/api/v1/persons",
            get(persons_handler::<S>).post(add_person_handler::<S>),
        )
        .route("/api/v1/persons/:person_id", delete(remove_person_handler::<S>))
        .route(
            "/api/v1/persons/:person_id/days/:date",
            get(day_summary_handler::<S>),
        )
        .route("/api/v1/catalog", get(catalog_handler::<S>))
        .route("/api/v1/logs", post(record_handler::<S>))
        .route("/api/v1/logs/toggle", post(toggle_handler::<S>))
        .route("/api/v1/logs/increment", post(increment_handler::<S>))
        .route("/api/v1/leaderboard", get(leaderboard_handler::<S>))
        .route("/api/v1/report", get(report_handler::<S>))
        .route("/api/v1/report/csv", get(report_csv_handler::<S>))
        .route("/api/v1/settings/timezone", put(timezone_handler::<S>))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ZoneQuery {
    tz: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LeaderboardQuery {
    window: Option<String>,
    tz: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReportQuery {
    start: Option<String>,
    end: Option<String>,
    person: Option<i64>,
    tz: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LogRequest {
    person_id: PersonId,
    item_id: ItemId,
    date: NaiveDate,
    value: i64,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToggleRequest {
    person_id: PersonId,
    item_id: ItemId,
    date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IncrementRequest {
    person_id: PersonId,
    item_id: ItemId,
    date: NaiveDate,
    #[serde(default = "default_delta")]
    delta: i64,
}

fn default_delta() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub(crate) struct TimezoneRequest {
    forced_timezone: Option<String>,
}

fn unprocessable(message: impl Into<String>) -> Response {
    let payload = json!({ "error": message.into() });
    (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
}

fn service_error(err: ServiceError) -> Response {
    let status = err.status_code();
    if status.is_server_error() {
        error!(error = %err, "household request failed");
    }
    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, Response> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| unprocessable(format!("{field} must be a YYYY-MM-DD date, got '{raw}'")))
}

fn report_bounds(query: &ReportQuery) -> Result<(NaiveDate, NaiveDate, PersonFilter), Response> {
    let start = query
        .start
        .as_deref()
        .ok_or_else(|| unprocessable("start is required"))
        .and_then(|raw| parse_date("start", raw))?;
    let end = query
        .end
        .as_deref()
        .ok_or_else(|| unprocessable("end is required"))
        .and_then(|raw| parse_date("end", raw))?;
    Ok((start, end, query.person.map(PersonId).into()))
}

fn recorded(log: RecordedLog) -> Response {
    let status = match log.outcome {
        UpsertOutcome::Inserted => StatusCode::CREATED,
        UpsertOutcome::Replaced => StatusCode::OK,
    };
    (status, Json(log)).into_response()
}

pub(crate) async fn today_handler<S>(
    State(service): State<Arc<HouseholdService<S>>>,
    Query(query): Query<ZoneQuery>,
) -> Response
where
    S: HouseholdStore + 'static,
{
    match service.today(query.tz.as_deref()) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn persons_handler<S>(State(service): State<Arc<HouseholdService<S>>>) -> Response
where
    S: HouseholdStore + 'static,
{
    match service.persons() {
        Ok(persons) => (StatusCode::OK, Json(persons)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn add_person_handler<S>(
    State(service): State<Arc<HouseholdService<S>>>,
    Json(person): Json<NewPerson>,
) -> Response
where
    S: HouseholdStore + 'static,
{
    if person.display_name.trim().is_empty() {
        return unprocessable("display_name must not be empty");
    }
    match service.add_person(person) {
        Ok(person) => (StatusCode::CREATED, Json(person)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn remove_person_handler<S>(
    State(service): State<Arc<HouseholdService<S>>>,
    Path(person_id): Path<i64>,
) -> Response
where
    S: HouseholdStore + 'static,
{
    match service.remove_person(PersonId(person_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn day_summary_handler<S>(
    State(service): State<Arc<HouseholdService<S>>>,
    Path((person_id, date)): Path<(i64, String)>,
    Query(query): Query<ZoneQuery>,
) -> Response
where
    S: HouseholdStore + 'static,
{
    let date = match parse_date("date", &date) {
        Ok(date) => date,
        Err(response) => return response,
    };
    match service.day_summary(PersonId(person_id), date, query.tz.as_deref()) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn catalog_handler<S>(State(service): State<Arc<HouseholdService<S>>>) -> Response
where
    S: HouseholdStore + 'static,
{
    match service.catalog() {
        Ok(catalog) => (StatusCode::OK, Json(catalog)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn record_handler<S>(
    State(service): State<Arc<HouseholdService<S>>>,
    Json(request): Json<LogRequest>,
) -> Response
where
    S: HouseholdStore + 'static,
{
    match service.record(
        request.person_id,
        request.item_id,
        request.date,
        request.value,
        request.note,
    ) {
        Ok(log) => recorded(log),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn toggle_handler<S>(
    State(service): State<Arc<HouseholdService<S>>>,
    Json(request): Json<ToggleRequest>,
) -> Response
where
    S: HouseholdStore + 'static,
{
    match service.toggle(request.person_id, request.item_id, request.date) {
        Ok(log) => recorded(log),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn increment_handler<S>(
    State(service): State<Arc<HouseholdService<S>>>,
    Json(request): Json<IncrementRequest>,
) -> Response
where
    S: HouseholdStore + 'static,
{
    match service.increment(
        request.person_id,
        request.item_id,
        request.date,
        request.delta,
    ) {
        Ok(log) => recorded(log),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn leaderboard_handler<S>(
    State(service): State<Arc<HouseholdService<S>>>,
    Query(query): Query<LeaderboardQuery>,
) -> Response
where
    S: HouseholdStore + 'static,
{
    let window = match query.window.as_deref() {
        None => LeaderboardWindow::default(),
        Some(raw) => match LeaderboardWindow::parse(raw) {
            Some(window) => window,
            None => {
                return unprocessable(format!(
                    "window must be one of today, week, month, year; got '{raw}'"
                ))
            }
        },
    };
    match service.leaderboard(window, query.tz.as_deref()) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn report_handler<S>(
    State(service): State<Arc<HouseholdService<S>>>,
    Query(query): Query<ReportQuery>,
) -> Response
where
    S: HouseholdStore + 'static,
{
    let (start, end, filter) = match report_bounds(&query) {
        Ok(bounds) => bounds,
        Err(response) => return response,
    };
    match service.report(start, end, filter, query.tz.as_deref()) {
        Ok(matrix) => (StatusCode::OK, Json(matrix)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn report_csv_handler<S>(
    State(service): State<Arc<HouseholdService<S>>>,
    Query(query): Query<ReportQuery>,
) -> Response
where
    S: HouseholdStore + 'static,
{
    let (start, end, filter) = match report_bounds(&query) {
        Ok(bounds) => bounds,
        Err(response) => return response,
    };
    let mut buffer = Vec::new();
    match service.export_csv(start, end, filter, query.tz.as_deref(), &mut buffer) {
        Ok(_) => {
            let disposition = format!("attachment; filename=\"mutabaah-{start}-{end}.csv\"");
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                buffer,
            )
                .into_response()
        }
        Err(err) => service_error(err),
    }
}

pub(crate) async fn timezone_handler<S>(
    State(service): State<Arc<HouseholdService<S>>>,
    Json(request): Json<TimezoneRequest>,
) -> Response
where
    S: HouseholdStore + 'static,
{
    match service.set_forced_timezone(request.forced_timezone) {
        Ok(()) => match service.today(None) {
            Ok(view) => (StatusCode::OK, Json(view)).into_response(),
            Err(err) => service_error(err),
        },
        Err(err) => service_error(err),
    }
}
