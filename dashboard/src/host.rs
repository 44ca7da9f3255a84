use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::{net::TcpListener, sync::Mutex, task::JoinHandle};
use tower_http::services::ServeDir;
use tracing::{info, warn};

use heatdash_common::{
    ChartSeries, ChartState, DashboardConfig, LiveEngine, ScheduleToggle, SetpointUpdate,
    SetpointWrite, WeeklySchedule,
};

use crate::client::HeatApiClient;

#[derive(Clone)]
struct AppState {
    engine: Arc<Mutex<LiveEngine>>,
    client: HeatApiClient,
    config: DashboardConfig,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Cancellation handles for the two polling loops. Dropping the tasks via
/// `shutdown` guarantees no network activity after teardown.
struct Pollers {
    readings: JoinHandle<()>,
    setpoint: JoinHandle<()>,
}

impl Pollers {
    fn shutdown(self) {
        self.readings.abort();
        self.setpoint.abort();
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut config = load_config().await;
    config.sanitize();

    let client = HeatApiClient::new(&config.backend_url)?;
    let engine = LiveEngine::new(config.default_setpoint, config.edit_timeout_ms);

    let app_state = AppState {
        engine: Arc::new(Mutex::new(engine)),
        client,
        config: config.clone(),
    };

    initialize_setpoint(&app_state).await;

    let pollers = Pollers {
        readings: spawn_readings_loop(app_state.clone()),
        setpoint: spawn_setpoint_loop(app_state.clone()),
    };

    let web_root = format!("{}/web", env!("CARGO_MANIFEST_DIR"));
    let app = Router::new()
        .route("/api/live", get(handle_get_live))
        .route("/api/setpoint", post(handle_set_setpoint))
        .route("/api/setpoint/commit", post(handle_commit_setpoint))
        .route("/api/history/chart", get(handle_get_chart))
        .route(
            "/api/schedule",
            get(handle_get_schedule).put(handle_put_schedule),
        )
        .route("/api/schedule/toggle", post(handle_toggle_schedule))
        .fallback_service(ServeDir::new(web_root))
        .with_state(app_state);

    let port = std::env::var("DASHBOARD_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(config.http_port);
    let addr: SocketAddr = format!("0.0.0.0:{port}").parse().unwrap();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind dashboard server at {addr}"))?;

    info!("dashboard listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    pollers.shutdown();
    info!("polling stopped, dashboard down");
    Ok(())
}

async fn load_config() -> DashboardConfig {
    let mut config = match std::env::var("DASHBOARD_CONFIG") {
        Ok(path) => match tokio::fs::read(&path).await {
            Ok(raw) => serde_json::from_slice(&raw).unwrap_or_else(|err| {
                warn!("unparseable config file {path}: {err}");
                DashboardConfig::default()
            }),
            Err(err) => {
                warn!("failed to read config file {path}: {err}");
                DashboardConfig::default()
            }
        },
        Err(_) => DashboardConfig::default(),
    };

    if let Ok(url) = std::env::var("HEAT_API_URL") {
        config.backend_url = url;
    }

    config
}

/// One startup fetch of the remote setpoint. On failure the configured
/// default stays on display; the setpoint loop is the retry.
async fn initialize_setpoint(app_state: &AppState) {
    match app_state.client.setpoint().await {
        Ok(value) => {
            let mut engine = app_state.engine.lock().await;
            if let SetpointUpdate::Replaced { .. } = engine.apply_remote_setpoint(value) {
                info!("setpoint seeded from backend: {value}°C");
            }
        }
        Err(err) => warn!("initial setpoint fetch failed, keeping default: {err:#}"),
    }
}

fn spawn_readings_loop(app_state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_millis(app_state.config.poll_interval_ms));
        loop {
            interval.tick().await;
            poll_readings_once(&app_state).await;
        }
    })
}

fn spawn_setpoint_loop(app_state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_millis(app_state.config.poll_interval_ms));
        loop {
            interval.tick().await;
            poll_setpoint_once(&app_state, monotonic_ms()).await;
        }
    })
}

/// One fast-poll cycle: temperature and heater state fetched concurrently,
/// applied together or not at all. A failed half leaves the previous pair
/// on display; the next cycle is the retry.
async fn poll_readings_once(app_state: &AppState) {
    let (temperature, heater) = tokio::join!(
        app_state.client.temperature(),
        app_state.client.heater_state()
    );

    match (temperature, heater) {
        (Ok(temperature), Ok(heater_on)) => {
            let mut engine = app_state.engine.lock().await;
            engine.apply_reading(temperature, heater_on);
        }
        (Err(err), _) => warn!("temperature poll failed, keeping previous pair: {err:#}"),
        (_, Err(err)) => warn!("heater state poll failed, keeping previous pair: {err:#}"),
    }
}

/// One setpoint-poll cycle. While a drag is live the fetch is skipped
/// outright; stale sessions are expired first so an abandoned drag cannot
/// freeze reconciliation forever.
async fn poll_setpoint_once(app_state: &AppState, now_ms: u64) {
    {
        let mut engine = app_state.engine.lock().await;
        if engine.expire_stale_edit(now_ms) {
            info!("edit session expired without commit");
        }
        if engine.edit_active() {
            return;
        }
    }

    match app_state.client.setpoint().await {
        Ok(value) => {
            let mut engine = app_state.engine.lock().await;
            if let SetpointUpdate::Replaced { previous } = engine.apply_remote_setpoint(value) {
                info!("remote setpoint {value}°C replaced local {previous}°C");
            }
        }
        Err(err) => warn!("setpoint poll failed: {err:#}"),
    }
}

/// Ship a setpoint write without waiting for it. The outcome feeds the log
/// and nothing else; local state already echoes the value.
fn spawn_setpoint_write(client: HeatApiClient, write: SetpointWrite) {
    tokio::spawn(async move {
        if let Err(err) = client.write_setpoint(write).await {
            warn!("setpoint write-through failed: {err:#}");
        }
    });
}

async fn handle_get_live(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine.lock().await;
    Json(engine.status(state.config.slider_min, state.config.slider_max))
}

async fn handle_set_setpoint(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Ok(setpoint) = value.parse::<f64>() else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid setpoint value");
    };
    if !setpoint.is_finite()
        || !(state.config.slider_min..=state.config.slider_max).contains(&setpoint)
    {
        return error_response(StatusCode::BAD_REQUEST, "Setpoint outside the slider range");
    }

    let write = {
        let mut engine = state.engine.lock().await;
        engine.begin_edit(setpoint, monotonic_ms())
    };
    spawn_setpoint_write(state.client.clone(), write);

    handle_get_live(State(state)).await.into_response()
}

async fn handle_commit_setpoint(State(state): State<AppState>) -> impl IntoResponse {
    {
        let mut engine = state.engine.lock().await;
        engine.end_edit();
    }
    handle_get_live(State(state)).await.into_response()
}

/// Fetch and process one history snapshot through the chart state machine.
async fn fetch_chart(app_state: &AppState, rate: usize) -> ChartState {
    let mut chart = ChartState::Idle;
    chart.begin();

    let outcome = match app_state.client.full_history().await {
        Ok(doc) => ChartSeries::build(&doc, rate, app_state.config.timezone())
            .map_err(|err| err.to_string()),
        Err(err) => Err(format!("{err:#}")),
    };
    chart.resolve(outcome);

    chart
}

async fn handle_get_chart(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let rate = params
        .get("downsample")
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|rate| *rate > 0)
        .unwrap_or(state.config.downsample_rate);

    match fetch_chart(&state, rate).await {
        ChartState::Ready(series) => Json(series).into_response(),
        ChartState::Error(message) => {
            warn!("history refresh failed: {message}");
            error_response(StatusCode::BAD_GATEWAY, &message)
        }
        ChartState::Idle | ChartState::Loading => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "history refresh stalled")
        }
    }
}

async fn handle_get_schedule(State(state): State<AppState>) -> impl IntoResponse {
    match state.client.schedule().await {
        Ok(mut schedule) => {
            schedule.normalize();
            Json(schedule).into_response()
        }
        Err(err) => {
            warn!("schedule fetch failed: {err:#}");
            error_response(StatusCode::BAD_GATEWAY, "Backend schedule fetch failed")
        }
    }
}

async fn handle_put_schedule(
    State(state): State<AppState>,
    Json(mut schedule): Json<WeeklySchedule>,
) -> impl IntoResponse {
    if let Err(err) = schedule.validate(state.config.slider_min, state.config.slider_max) {
        return error_response(StatusCode::BAD_REQUEST, &err.to_string());
    }
    schedule.normalize();

    match state.client.write_schedule(&schedule).await {
        Ok(()) => Json(schedule).into_response(),
        Err(err) => {
            warn!("schedule write failed: {err:#}");
            error_response(StatusCode::BAD_GATEWAY, "Backend rejected the schedule write")
        }
    }
}

async fn handle_toggle_schedule(
    State(state): State<AppState>,
    Json(toggle): Json<ScheduleToggle>,
) -> impl IntoResponse {
    match state.client.toggle_schedule(toggle.state).await {
        Ok(()) => Json(toggle).into_response(),
        Err(err) => {
            warn!("schedule toggle failed: {err:#}");
            error_response(StatusCode::BAD_GATEWAY, "Backend rejected the schedule toggle")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
