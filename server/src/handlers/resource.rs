//! CRUD handlers shared by every [`Resource`].

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::Session;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::{Record, Resource};
use crate::pagination::{ListParams, Paginated};
use crate::AppState;

/// `GET /` + `POST /` and `GET|PUT|PATCH|DELETE /:id` for `T`.
pub fn resource_routes<T: Resource>() -> Router<AppState> {
    Router::new()
        .route("/", get(list::<T>).post(create::<T>))
        .route(
            "/:id",
            get(get_one::<T>)
                .put(update::<T>)
                .patch(patch::<T>)
                .delete(delete::<T>),
        )
}

/// Ids that do not parse cannot name a stored record.
pub fn parse_id<T: Resource>(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(T::NAME))
}

pub fn public<T: Resource>(record: &Record<T>) -> ApiResult<Value> {
    record.to_public().map_err(ApiError::internal)
}

pub fn public_page<T: Resource>(page: Paginated<Record<T>>) -> ApiResult<Paginated<Value>> {
    let items = page.items.iter().map(public).collect::<ApiResult<Vec<_>>>()?;
    Ok(Paginated {
        items,
        total: page.total,
        page: page.page,
        limit: page.limit,
        total_pages: page.total_pages,
    })
}

fn authorize<T: Resource>(session: &Session) -> ApiResult<()> {
    if T::ADMIN_ONLY {
        session.require_admin()?;
    }
    Ok(())
}

pub async fn list<T: Resource>(
    State(state): State<AppState>,
    session: Session,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Json<Paginated<Value>>> {
    authorize::<T>(&session)?;
    let page = state.repo::<T>().list(&params, state.max_page_size).await?;
    Ok(Json(public_page(page)?))
}

pub async fn get_one<T: Resource>(
    State(state): State<AppState>,
    session: Session,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<Value>> {
    authorize::<T>(&session)?;
    let record = state.repo::<T>().get_or_404(parse_id::<T>(&id)?).await?;
    Ok(Json(public(&record)?))
}

pub async fn create<T: Resource>(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    authorize::<T>(&session)?;
    let record = state.repo::<T>().create_from_value(body).await?;
    Ok((StatusCode::CREATED, Json(public(&record)?)))
}

pub async fn update<T: Resource>(
    State(state): State<AppState>,
    session: Session,
    ApiPath(id): ApiPath<String>,
    ApiJson(changes): ApiJson<Value>,
) -> ApiResult<Json<Value>> {
    authorize::<T>(&session)?;
    let record = state.repo::<T>().update(parse_id::<T>(&id)?, changes).await?;
    Ok(Json(public(&record)?))
}

pub async fn patch<T: Resource>(
    State(state): State<AppState>,
    session: Session,
    ApiPath(id): ApiPath<String>,
    ApiJson(patch): ApiJson<json_patch::Patch>,
) -> ApiResult<Json<Value>> {
    authorize::<T>(&session)?;
    let record = state.repo::<T>().patch(parse_id::<T>(&id)?, &patch).await?;
    Ok(Json(public(&record)?))
}

pub async fn delete<T: Resource>(
    State(state): State<AppState>,
    session: Session,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<Value>> {
    authorize::<T>(&session)?;
    let id = parse_id::<T>(&id)?;
    if !state.repo::<T>().delete(id).await? {
        return Err(ApiError::NotFound(T::NAME));
    }
    Ok(Json(json!({
        "message": format!("{} deleted successfully", T::NAME),
        "id": id,
    })))
}
