use agency_store::{Filter, FindQuery, Sort};
use axum::extract::State;
use axum::Json;
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;

use super::activity::{sort_newest_first, ActivityItem};
use super::appointments::with_subjects;
use crate::auth::Session;
use crate::error::ApiResult;
use crate::models::{Appointment, AppointmentStatus, Client, Patient};
use crate::stats::percentage_change;
use crate::AppState;

const RECENT_ACTIVITY: u64 = 5;
const UPCOMING: u64 = 4;
const WINDOW_DAYS: i64 = 30;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_clients: u64,
    pub total_patients: u64,
    pub new_clients: u64,
    pub clients_change: String,
    pub appointments_today: u64,
    pub monthly_appointments: u64,
    pub appointments_change: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub recent_activity: Vec<ActivityItem>,
    pub upcoming_appointments: Vec<Value>,
}

fn day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Appointments whose `date` falls in `[from, to)`.
fn dated_between(from: NaiveDate, to: NaiveDate) -> Filter {
    Filter::gte("date", day(from)).and(Filter::lt("date", day(to)))
}

/// GET /api/dashboard
pub async fn summary(State(state): State<AppState>, _session: Session) -> ApiResult<Json<Dashboard>> {
    let now = Utc::now();
    let today = now.date_naive();
    let tomorrow = today + Duration::days(1);
    let window = Duration::days(WINDOW_DAYS);

    let clients = state.repo::<Client>();
    let patients = state.repo::<Patient>();
    let appointments = state.repo::<Appointment>();

    let recent = FindQuery::new()
        .sort_by(Sort::newest_first())
        .with_limit(RECENT_ACTIVITY);
    let upcoming = FindQuery::new()
        .with_filter(Filter::gte("date", day(today)).and(Filter::is_in(
            "status",
            [
                AppointmentStatus::Scheduled.as_str(),
                AppointmentStatus::Confirmed.as_str(),
            ],
        )))
        .sort_by(Sort::asc("date"))
        .sort_by(Sort::asc("time"))
        .with_limit(UPCOMING);

    let everything = Filter::all();
    let new_since = Filter::created_since(now - window);
    let previous_window = Filter::created_since(now - window * 2).and(Filter::created_before(now - window));
    let on_today = Filter::eq("date", day(today));
    let this_month = dated_between(today - window, tomorrow);
    let last_month = dated_between(today - window * 2, today - window);

    let (
        total_clients,
        total_patients,
        new_clients,
        previous_clients,
        appointments_today,
        monthly_appointments,
        previous_appointments,
        (recent_appointments, _),
        (recent_clients, _),
        (upcoming_appointments, _),
    ) = tokio::try_join!(
        clients.count(&everything),
        patients.count(&everything),
        clients.count(&new_since),
        clients.count(&previous_window),
        appointments.count(&on_today),
        appointments.count(&this_month),
        appointments.count(&last_month),
        appointments.find(&recent),
        clients.find(&recent),
        appointments.find(&upcoming),
    )?;

    let mut recent_activity: Vec<ActivityItem> = recent_appointments
        .iter()
        .map(|r| ActivityItem::appointment(r, now))
        .chain(recent_clients.iter().map(|r| ActivityItem::client(r, now)))
        .collect();
    sort_newest_first(&mut recent_activity);
    recent_activity.truncate(RECENT_ACTIVITY as usize);

    let stats = DashboardStats {
        total_clients,
        total_patients,
        new_clients,
        clients_change: percentage_change(new_clients as f64, previous_clients as f64),
        appointments_today,
        monthly_appointments,
        appointments_change: percentage_change(monthly_appointments as f64, previous_appointments as f64),
    };

    Ok(Json(Dashboard {
        stats,
        recent_activity,
        upcoming_appointments: with_subjects(&state, &upcoming_appointments).await?,
    }))
}
