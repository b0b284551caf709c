use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use teaspin_core::{item::normalize_name, Category};
use teaspin_shared::{ApiError, CreateItemRequest, ItemList, ItemRecord};

use crate::store::SqliteItemStore;

#[derive(Clone)]
pub struct AppState {
    pub store: SqliteItemStore,
    pub api_key: String,
}

pub struct HttpError(ApiError);

impl From<ApiError> for HttpError {
    fn from(err: ApiError) -> Self {
        HttpError(err)
    }
}

impl From<sqlx::Error> for HttpError {
    fn from(err: sqlx::Error) -> Self {
        error!(error = %err, "items table query failed");
        HttpError(ApiError::Internal)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0.body())).into_response()
    }
}

type BearerAuth = Option<TypedHeader<Authorization<Bearer>>>;

fn authorize(state: &AppState, auth: BearerAuth) -> Result<(), HttpError> {
    match auth {
        Some(TypedHeader(Authorization(bearer))) if bearer.token() == state.api_key => Ok(()),
        _ => Err(ApiError::Unauthorized.into()),
    }
}

async fn route_list(State(state): State<Arc<AppState>>) -> Result<Json<ItemList>, HttpError> {
    let rows = state.store.rows().await?;
    Ok(Json(ItemList {
        items: rows.into_iter().map(ItemRecord::from).collect(),
    }))
}

async fn route_create(
    State(state): State<Arc<AppState>>,
    auth: BearerAuth,
    Json(req): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<ItemRecord>), HttpError> {
    authorize(&state, auth)?;
    let name = normalize_name(&req.name)
        .ok_or_else(|| ApiError::Invalid("name must not be empty".into()))?;
    let category = match req.category.as_deref() {
        None => None,
        Some(label) => Some(
            Category::parse(label)
                .ok_or_else(|| ApiError::Invalid(format!("unknown category {label:?}")))?,
        ),
    };
    let row = state
        .store
        .create(&name, category.map(Category::as_str))
        .await?;
    info!(id = row.id, name = %row.name, "item created");
    Ok((StatusCode::CREATED, Json(row.into())))
}

async fn route_delete(
    State(state): State<Arc<AppState>>,
    auth: BearerAuth,
    Path(id): Path<i64>,
) -> Result<StatusCode, HttpError> {
    authorize(&state, auth)?;
    if !state.store.remove(id).await? {
        return Err(ApiError::NotFound(id).into());
    }
    info!(id, "item deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/items", get(route_list).post(route_create))
        .route("/items/:id", delete(route_delete))
        .with_state(Arc::new(state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
