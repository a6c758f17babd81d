use axum::{Json, body::Bytes, extract::State};
use chrono::{Duration, Utc};

use folio_db::models::NewVisit;
use folio_types::api::{
    AnalyticsReport, BrowserCount, CountryCount, DayCount, DeviceCounts, HourCount, OkResponse, PathCount,
    RecordDurationRequest, RecordVisitRequest, ReferrerCount, VisitCounter,
};

use crate::error::{ApiError, AppJson};
use crate::middleware::ClientMeta;
use crate::state::{AppState, run_db};

/// Sessions seen within this window count as live.
const LIVE_WINDOW_MINUTES: i64 = 5;
const DAILY_WINDOW_DAYS: i64 = 7;
const TOP_LIMIT: u32 = 5;

fn required_session(session_id: Option<String>) -> Result<String, ApiError> {
    session_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::validation("sessionId required"))
}

/// Whole seconds, negatives clamped to zero.
pub fn duration_secs(raw: Option<f64>) -> i64 {
    match raw {
        Some(d) if d.is_finite() && d > 0.0 => d.round() as i64,
        _ => 0,
    }
}

/// POST /analytics/visit
pub async fn record_visit(
    State(state): State<AppState>,
    client: ClientMeta,
    AppJson(req): AppJson<RecordVisitRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let session_id = required_session(req.session_id)?;
    let geo = state.geo.lookup(&client.ip).await.map(|g| g.to_json());

    run_db(&state, move |db| {
        db.insert_visit(
            &NewVisit {
                session_id: &session_id,
                ip: &client.ip,
                user_agent: &client.user_agent,
                geo: geo.as_deref(),
                referrer: req.referrer.as_deref().unwrap_or_default(),
                path: req.path.as_deref().filter(|p| !p.is_empty()).unwrap_or("/"),
            },
            Utc::now(),
        )
    })
    .await?;

    Ok(Json(OkResponse::OK))
}

async fn store_duration(state: &AppState, req: RecordDurationRequest) -> Result<Json<OkResponse>, ApiError> {
    let session_id = required_session(req.session_id)?;
    let secs = duration_secs(req.duration);
    run_db(state, move |db| db.update_latest_visit_duration(&session_id, secs)).await?;
    Ok(Json(OkResponse::OK))
}

/// PATCH /analytics/visit
pub async fn update_duration(
    State(state): State<AppState>,
    AppJson(req): AppJson<RecordDurationRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    store_duration(&state, req).await
}

/// POST /analytics/beacon
///
/// `navigator.sendBeacon` cannot set a JSON content type, so the body is
/// parsed as JSON whatever the header says.
pub async fn beacon(State(state): State<AppState>, body: Bytes) -> Result<Json<OkResponse>, ApiError> {
    let req: RecordDurationRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::validation(format!("Invalid beacon payload: {e}")))?;
    store_duration(&state, req).await
}

/// GET /analytics/counter
pub async fn counter(State(state): State<AppState>) -> Result<Json<VisitCounter>, ApiError> {
    let since = Utc::now() - Duration::minutes(LIVE_WINDOW_MINUTES);
    let (total, live) = run_db(&state, move |db| Ok((db.count_visits()?, db.live_sessions(since)?))).await?;
    Ok(Json(VisitCounter { total, live }))
}

/// GET /admin/analytics
pub async fn admin_report(State(state): State<AppState>) -> Result<Json<AnalyticsReport>, ApiError> {
    let now = Utc::now();
    let day_ago = now - Duration::days(1);

    let (summary, live, daily, hourly, referrers, paths, devices, browsers, countries) =
        run_db(&state, move |db| {
            Ok((
                db.visit_summary(day_ago)?,
                db.live_sessions(now - Duration::minutes(LIVE_WINDOW_MINUTES))?,
                db.daily_visits(now - Duration::days(DAILY_WINDOW_DAYS))?,
                db.hourly_visits(day_ago)?,
                db.top_referrers(TOP_LIMIT)?,
                db.top_paths(TOP_LIMIT)?,
                db.device_split()?,
                db.top_browsers(TOP_LIMIT)?,
                db.top_visit_countries(TOP_LIMIT)?,
            ))
        })
        .await?;

    let bounce_rate = if summary.total > 0 {
        (summary.bounces as f64 / summary.total as f64 * 100.0).round() as i64
    } else {
        0
    };

    Ok(Json(AnalyticsReport {
        total: summary.total,
        unique: summary.unique_ips,
        today: summary.since_day_ago,
        live,
        avg_duration: summary.avg_duration.round() as i64,
        bounce_rate,
        daily_visits: daily.into_iter().map(|(day, count)| DayCount { day, count }).collect(),
        hourly_visits: hourly.into_iter().map(|(hour, count)| HourCount { hour, count }).collect(),
        top_referrers: referrers
            .into_iter()
            .map(|(referrer, count)| ReferrerCount { referrer, count })
            .collect(),
        top_pages: paths.into_iter().map(|(path, count)| PathCount { path, count }).collect(),
        devices: DeviceCounts {
            mobile: devices.mobile,
            desktop: devices.desktop,
        },
        countries: countries
            .into_iter()
            .map(|(country, count)| CountryCount { country, count })
            .collect(),
        top_browsers: browsers
            .into_iter()
            .map(|(browser, count)| BrowserCount { browser, count })
            .collect(),
    }))
}
