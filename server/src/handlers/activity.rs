use agency_store::{FindQuery, Sort};
use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Session;
use crate::error::ApiResult;
use crate::extract::ApiQuery;
use crate::models::{Appointment, Client, Patient, Record};
use crate::stats::time_ago;
use crate::AppState;

const DEFAULT_ACTIVITY_LIMIT: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityKind {
    AppointmentCreated,
    ClientRegistered,
    PatientRegistered,
}

/// One entry of a merged, newest-first event stream.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub time_ago: String,
}

impl ActivityItem {
    pub fn appointment(record: &Record<Appointment>, now: DateTime<Utc>) -> Self {
        let appt = &record.body;
        Self {
            kind: ActivityKind::AppointmentCreated,
            id: record.id,
            title: "Appointment scheduled".to_string(),
            description: format!("With {} on {} at {}", appt.provider, appt.date, appt.time),
            created_at: record.created_at,
            time_ago: time_ago(record.created_at, now),
        }
    }

    pub fn client(record: &Record<Client>, now: DateTime<Utc>) -> Self {
        Self {
            kind: ActivityKind::ClientRegistered,
            id: record.id,
            title: "New client registered".to_string(),
            description: record.body.full_name(),
            created_at: record.created_at,
            time_ago: time_ago(record.created_at, now),
        }
    }

    pub fn patient(record: &Record<Patient>, now: DateTime<Utc>) -> Self {
        Self {
            kind: ActivityKind::PatientRegistered,
            id: record.id,
            title: "New patient registered".to_string(),
            description: record.body.full_name(),
            created_at: record.created_at,
            time_ago: time_ago(record.created_at, now),
        }
    }
}

/// Newest first; equal timestamps fall back to id so merges are stable.
pub fn sort_newest_first(items: &mut [ActivityItem]) {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

#[derive(Debug, Deserialize)]
pub struct ActivityParams {
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFeed {
    pub activities: Vec<ActivityItem>,
    pub total: u64,
    pub limit: u64,
    pub skip: u64,
    pub has_more: bool,
}

/// GET /api/activity?limit=&skip=
/// Appointment and patient creation events over the full history. Each
/// stream contributes its newest `skip + limit` events; the merge is then
/// windowed.
pub async fn feed(
    State(state): State<AppState>,
    _session: Session,
    ApiQuery(params): ApiQuery<ActivityParams>,
) -> ApiResult<Json<ActivityFeed>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, state.max_page_size);
    let skip = params.skip.unwrap_or(0);
    let window = FindQuery::new()
        .sort_by(Sort::newest_first())
        .with_limit(skip.saturating_add(limit));

    let appointments = state.repo::<Appointment>();
    let patients = state.repo::<Patient>();
    let ((recent_appointments, appointment_total), (recent_patients, patient_total)) =
        tokio::try_join!(appointments.find(&window), patients.find(&window))?;

    let now = Utc::now();
    let mut activities: Vec<ActivityItem> = recent_appointments
        .iter()
        .map(|r| ActivityItem::appointment(r, now))
        .chain(recent_patients.iter().map(|r| ActivityItem::patient(r, now)))
        .collect();
    sort_newest_first(&mut activities);

    let activities: Vec<ActivityItem> = activities
        .into_iter()
        .skip(usize::try_from(skip).unwrap_or(usize::MAX))
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .collect();
    let total = appointment_total + patient_total;

    Ok(Json(ActivityFeed {
        has_more: skip.saturating_add(activities.len() as u64) < total,
        activities,
        total,
        limit,
        skip,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(kind: ActivityKind, minutes_ago: i64, now: DateTime<Utc>) -> ActivityItem {
        ActivityItem {
            kind,
            id: Uuid::new_v4(),
            title: String::new(),
            description: String::new(),
            created_at: now - Duration::minutes(minutes_ago),
            time_ago: String::new(),
        }
    }

    #[test]
    fn merge_orders_newest_first() {
        let now = Utc::now();
        let mut items = vec![
            item(ActivityKind::AppointmentCreated, 30, now),
            item(ActivityKind::PatientRegistered, 5, now),
            item(ActivityKind::AppointmentCreated, 10, now),
        ];
        sort_newest_first(&mut items);
        let ages: Vec<i64> = items
            .iter()
            .map(|i| (now - i.created_at).num_minutes())
            .collect();
        assert_eq!(ages, vec![5, 10, 30]);
    }

    #[test]
    fn kinds_serialize_as_types() {
        let value = serde_json::to_value(item(ActivityKind::PatientRegistered, 1, Utc::now())).unwrap();
        assert_eq!(value["type"], "patient-registered");
        assert!(value.get("timeAgo").is_some());
    }
}
