use std::collections::HashMap;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::resource::{self, parse_id, public};
use crate::auth::Session;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiPath, ApiQuery};
use crate::models::{parse_reference, Appointment, Client, Patient, Record};
use crate::pagination::{ListParams, Paginated};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(resource::create::<Appointment>))
        .route(
            "/:id",
            get(get_one)
                .put(resource::update::<Appointment>)
                .patch(resource::patch::<Appointment>)
                .delete(resource::delete::<Appointment>),
        )
}

/// Who an appointment is for, resolved at read time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub kind: &'static str,
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_id: Option<String>,
    pub name: String,
}

/// Public JSON for each appointment with its `subject` attached, or `null`
/// when the referenced record no longer exists.
pub async fn with_subjects(state: &AppState, appointments: &[Record<Appointment>]) -> ApiResult<Vec<Value>> {
    let mut client_ids = Vec::new();
    let mut patient_ids = Vec::new();
    for appt in appointments {
        if let Ok(Some(id)) = parse_reference("clientId", &appt.body.client_id) {
            client_ids.push(id);
        }
        if let Ok(Some(id)) = parse_reference("patientId", &appt.body.patient_id) {
            patient_ids.push(id);
        }
    }

    let client_repo = state.repo::<Client>();
    let patient_repo = state.repo::<Patient>();
    let (clients, patients) = tokio::try_join!(
        client_repo.get_many(&client_ids),
        patient_repo.get_many(&patient_ids),
    )?;

    let mut subjects: HashMap<Uuid, Subject> = HashMap::new();
    for client in clients {
        subjects.insert(
            client.id,
            Subject {
                kind: "client",
                id: client.id,
                display_id: client.body.client_id.clone(),
                name: client.body.full_name(),
            },
        );
    }
    for patient in patients {
        subjects.insert(
            patient.id,
            Subject {
                kind: "patient",
                id: patient.id,
                display_id: patient.body.patient_id.clone(),
                name: patient.body.full_name(),
            },
        );
    }

    appointments
        .iter()
        .map(|appt| {
            let mut value = public(appt)?;
            let subject_id = parse_reference("clientId", &appt.body.client_id)
                .ok()
                .flatten()
                .or_else(|| parse_reference("patientId", &appt.body.patient_id).ok().flatten());
            let subject = subject_id
                .and_then(|id| subjects.get(&id))
                .map(serde_json::to_value)
                .transpose()
                .map_err(ApiError::internal)?
                .unwrap_or(Value::Null);
            if let Value::Object(map) = &mut value {
                map.insert("subject".to_string(), subject);
            }
            Ok(value)
        })
        .collect()
}

pub async fn list(
    State(state): State<AppState>,
    _session: Session,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Json<Paginated<Value>>> {
    let page = state
        .repo::<Appointment>()
        .list(&params, state.max_page_size)
        .await?;
    let items = with_subjects(&state, &page.items).await?;
    Ok(Json(Paginated {
        items,
        total: page.total,
        page: page.page,
        limit: page.limit,
        total_pages: page.total_pages,
    }))
}

pub async fn get_one(
    State(state): State<AppState>,
    _session: Session,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<Value>> {
    let record = state
        .repo::<Appointment>()
        .get_or_404(parse_id::<Appointment>(&id)?)
        .await?;
    let mut items = with_subjects(&state, std::slice::from_ref(&record)).await?;
    Ok(Json(items.pop().unwrap_or(Value::Null)))
}
