use crate::cli::ServeArgs;
use crate::infra::{household_service, AppState, HouseholdBackend};
use crate::routes::with_household_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use mutabaah::config::AppConfig;
use mutabaah::error::AppError;
use mutabaah::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let backend = Arc::new(HouseholdBackend::open(&config.household)?);
    let household = Arc::new(household_service(backend, &config.household));
    household.seed_standard_catalog()?;

    let app = with_household_routes(household)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        basis = ?config.household.eligibility_basis,
        timezone = %config.household.default_timezone,
        "mutabaah household service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
