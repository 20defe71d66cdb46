use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    attachments::{self, AttachmentKind, UploadItem},
    dto::{reference_date, ListQuery, TodayQuery, WarrantyList, WarrantyRequest, WarrantyView},
    filter::distinct_categories,
    portfolio::{summarize, PortfolioSummary},
    repo,
};
use crate::{
    auth::services::AuthUser,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    state::AppState,
};

pub fn record_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/warranties", get(list_warranties).post(create_warranty))
        .route("/warranties/categories", get(list_categories))
        .route(
            "/warranties/:id",
            get(get_warranty).put(update_warranty).delete(delete_warranty),
        )
}

pub fn file_routes(max_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/warranties/:id/receipt", get(get_receipt).put(upload_receipt))
        .route("/warranties/:id/image", get(get_image).put(upload_image))
        .layer(DefaultBodyLimit::max(max_bytes))
}

#[instrument(skip(state))]
pub async fn dashboard(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiQuery(q): ApiQuery<TodayQuery>,
) -> ApiResult<Json<PortfolioSummary>> {
    let records = repo::list_by_user(&state.db, user_id).await?;
    let summary = summarize(&records, reference_date(q.today));
    Ok(Json(summary))
}

#[instrument(skip(state))]
pub async fn list_warranties(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiQuery(q): ApiQuery<ListQuery>,
) -> ApiResult<Json<WarrantyList>> {
    let today = reference_date(q.today);
    let records = repo::list_by_user(&state.db, user_id).await?;
    let categories = distinct_categories(&records);
    let items = q
        .filter()
        .apply(records)
        .into_iter()
        .map(|w| WarrantyView::new(w, today))
        .collect();
    Ok(Json(WarrantyList { items, categories }))
}

#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Vec<String>>> {
    let records = repo::list_by_user(&state.db, user_id).await?;
    Ok(Json(distinct_categories(&records)))
}

#[instrument(skip(state))]
pub async fn get_warranty(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(q): ApiQuery<TodayQuery>,
) -> ApiResult<Json<WarrantyView>> {
    let warranty = repo::find(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Warranty not found"))?;
    Ok(Json(WarrantyView::new(warranty, reference_date(q.today))))
}

#[instrument(skip(state, body))]
pub async fn create_warranty(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<WarrantyRequest>,
) -> ApiResult<(StatusCode, HeaderMap, Json<WarrantyView>)> {
    let draft = body.validate()?;
    let expiry = draft.expiry_date()?;
    let warranty = repo::insert(&state.db, user_id, &draft, expiry).await?;
    info!(%user_id, warranty_id = %warranty.id, %expiry, "warranty created");

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/warranties/{}", warranty.id)) {
        headers.insert(header::LOCATION, location);
    }
    let view = WarrantyView::new(warranty, reference_date(None));
    Ok((StatusCode::CREATED, headers, Json(view)))
}

#[instrument(skip(state, body))]
pub async fn update_warranty(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<WarrantyRequest>,
) -> ApiResult<Json<WarrantyView>> {
    let draft = body.validate()?;
    let expiry = draft.expiry_date()?;
    let warranty = repo::update(&state.db, user_id, id, &draft, expiry)
        .await?
        .ok_or_else(|| ApiError::not_found("Warranty not found"))?;
    info!(%user_id, warranty_id = %id, %expiry, "warranty updated");
    Ok(Json(WarrantyView::new(warranty, reference_date(None))))
}

#[instrument(skip(state))]
pub async fn delete_warranty(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    let warranty = repo::delete(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Warranty not found"))?;
    let released = attachments::release_all(state.storage.as_ref(), &warranty).await;
    info!(%user_id, warranty_id = %id, released, "warranty deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, mp))]
pub async fn upload_receipt(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    mp: Multipart,
) -> ApiResult<Json<WarrantyView>> {
    upload(state, user_id, id, AttachmentKind::Receipt, mp).await
}

#[instrument(skip(state, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    mp: Multipart,
) -> ApiResult<Json<WarrantyView>> {
    upload(state, user_id, id, AttachmentKind::Image, mp).await
}

async fn upload(
    state: AppState,
    user_id: Uuid,
    id: Uuid,
    kind: AttachmentKind,
    mut mp: Multipart,
) -> ApiResult<Json<WarrantyView>> {
    let mut item = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let body = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("failed to read upload: {e}")))?;
        item = Some(UploadItem { file_name, body });
        break;
    }
    let Some(item) = item else {
        warn!(%user_id, warranty_id = %id, "upload without file field");
        return Err(ApiError::validation("multipart field `file` is required"));
    };

    let warranty = attachments::attach(&state, user_id, id, kind, item).await?;
    Ok(Json(WarrantyView::new(warranty, reference_date(None))))
}

#[instrument(skip(state))]
pub async fn get_receipt(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Response> {
    redirect_to(state, user_id, id, AttachmentKind::Receipt).await
}

#[instrument(skip(state))]
pub async fn get_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Response> {
    redirect_to(state, user_id, id, AttachmentKind::Image).await
}

async fn redirect_to(
    state: AppState,
    user_id: Uuid,
    id: Uuid,
    kind: AttachmentKind,
) -> ApiResult<Response> {
    let warranty = repo::find(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Warranty not found"))?;
    let url = attachments::presign(&state, &warranty, kind).await?;
    Ok(found(&url))
}

/// 302 to a presigned object URL.
fn found(url: &str) -> Response {
    match HeaderValue::from_str(url) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(e) => ApiError::Internal(anyhow::anyhow!("presigned url is not a header value: {e}"))
            .into_response(),
    }
}
