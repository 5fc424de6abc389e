use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

use super::extract::{Params, Payload};
use super::restaurant::{ensure_member, load_restaurant};
use super::{paginate, PageQuery};
use crate::entities::{category, item, item::Entity as ItemEntity, item_size, item_size_details};
use crate::error::ApiError;
use crate::middleware::auth::Claims;
use crate::middleware::logging::to_response;
use crate::services::menu::{ensure_unreferenced, reconcile_size_details, SizePrice};

//ROUTERS
pub fn item_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route(
            "/restaurants/:restaurant_id/items",
            get(list_items).post(create_item),
        )
        .route(
            "/restaurants/:restaurant_id/items/:id",
            get(get_item)
                .put(update_item)
                .patch(patch_item)
                .delete(delete_item),
        )
        .layer(Extension(db))
}

//ROUTES
async fn list_items(
    Path(restaurant_id): Path<i32>,
    Params(params): Params<PageQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    load_restaurant(&txn, restaurant_id).await?;
    let page = paginate(
        &txn,
        ItemEntity::find()
            .filter(item::Column::RestaurantId.eq(restaurant_id))
            .order_by_desc(item::Column::Modified)
            .order_by_desc(item::Column::Created),
        &params,
    )
    .await?;

    let ids = page.results.iter().map(|i| i.id).collect();
    let mut details = size_details_of(&txn, ids).await?;
    let page = page.map(|model| {
        let sizes = details.remove(&model.id).unwrap_or_default();
        ItemResponse::new(model, sizes)
    });
    txn.commit().await?;

    Ok(to_response((StatusCode::OK, Json(page)), Ok(())))
}

async fn get_item(
    Path((restaurant_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let model = find_scoped(&txn, restaurant_id, id).await?;
    let response = respond(&txn, model).await?;
    txn.commit().await?;

    Ok(to_response((StatusCode::OK, Json(response)), Ok(())))
}

async fn create_item(
    Path(restaurant_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Payload(payload): Payload<CreateItem>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    let txn = db.begin().await?;
    ensure_member(&txn, restaurant_id, claims.user_id).await?;
    ensure_category(&txn, restaurant_id, payload.category).await?;

    let now = Utc::now();
    let model = item::ActiveModel {
        restaurant_id: Set(restaurant_id),
        category_id: Set(payload.category),
        name: Set(payload.name),
        short_description: Set(payload.short_description),
        created: Set(now),
        modified: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    reconcile_size_details(&txn, restaurant_id, model.id, &payload.item_sizes).await?;
    let response = respond(&txn, model).await?;
    txn.commit().await?;

    tracing::info!("Created item {} in restaurant {restaurant_id}", response.id);
    Ok(to_response((StatusCode::CREATED, Json(response)), Ok(())))
}

async fn update_item(
    Path((restaurant_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Payload(payload): Payload<CreateItem>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    let patch = PatchItem {
        category: Some(payload.category),
        name: Some(payload.name),
        short_description: Some(payload.short_description),
        item_sizes: Some(payload.item_sizes),
    };
    apply_update(db, restaurant_id, id, claims, patch).await
}

async fn patch_item(
    Path((restaurant_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Payload(payload): Payload<PatchItem>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    apply_update(db, restaurant_id, id, claims, payload).await
}

async fn apply_update(
    db: Arc<DatabaseConnection>,
    restaurant_id: i32,
    id: i32,
    claims: Claims,
    payload: PatchItem,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    ensure_member(&txn, restaurant_id, claims.user_id).await?;
    let existing = find_scoped(&txn, restaurant_id, id).await?;

    let mut model: item::ActiveModel = existing.into();
    if let Some(category_id) = payload.category {
        ensure_category(&txn, restaurant_id, category_id).await?;
        model.category_id = Set(category_id);
    }
    if let Some(name) = payload.name {
        model.name = Set(name);
    }
    if let Some(short_description) = payload.short_description {
        model.short_description = Set(short_description);
    }
    model.modified = Set(Utc::now());
    let model = model.update(&txn).await?;

    if let Some(item_sizes) = payload.item_sizes {
        reconcile_size_details(&txn, restaurant_id, model.id, &item_sizes).await?;
    }

    let response = respond(&txn, model).await?;
    txn.commit().await?;

    Ok(to_response((StatusCode::OK, Json(response)), Ok(())))
}

async fn delete_item(
    Path((restaurant_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    ensure_member(&txn, restaurant_id, claims.user_id).await?;
    let model = find_scoped(&txn, restaurant_id, id).await?;

    let details: Vec<i32> = item_size_details::Entity::find()
        .filter(item_size_details::Column::ItemId.eq(model.id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|d| d.id)
        .collect();
    ensure_unreferenced(&txn, &details).await?;

    item_size_details::Entity::delete_many()
        .filter(item_size_details::Column::ItemId.eq(model.id))
        .exec(&txn)
        .await?;
    ItemEntity::delete_by_id(model.id).exec(&txn).await?;
    txn.commit().await?;

    Ok(to_response(StatusCode::NO_CONTENT, Ok(())))
}

//HELPERS
async fn find_scoped<C: ConnectionTrait>(
    db: &C,
    restaurant_id: i32,
    id: i32,
) -> Result<item::Model, ApiError> {
    ItemEntity::find_by_id(id)
        .filter(item::Column::RestaurantId.eq(restaurant_id))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("item", id))
}

async fn ensure_category<C: ConnectionTrait>(
    db: &C,
    restaurant_id: i32,
    category_id: i32,
) -> Result<(), ApiError> {
    let found = category::Entity::find_by_id(category_id)
        .filter(category::Column::RestaurantId.eq(restaurant_id))
        .one(db)
        .await?;
    match found {
        Some(_) => Ok(()),
        None => Err(ApiError::field(
            "category",
            "does_not_exist",
            format!("Invalid pk \"{category_id}\" - object does not exist."),
        )),
    }
}

async fn size_details_of<C: ConnectionTrait>(
    db: &C,
    item_ids: Vec<i32>,
) -> Result<HashMap<i32, Vec<SizeDetailResponse>>, ApiError> {
    let rows = item_size_details::Entity::find()
        .filter(item_size_details::Column::ItemId.is_in(item_ids))
        .order_by_asc(item_size_details::Column::Id)
        .find_also_related(item_size::Entity)
        .all(db)
        .await?;

    let mut grouped: HashMap<i32, Vec<SizeDetailResponse>> = HashMap::new();
    for (details, size) in rows {
        grouped
            .entry(details.item_id)
            .or_default()
            .push(SizeDetailResponse {
                id: details.id,
                size: details.size_id,
                size_name: size.map(|s| s.name).unwrap_or_default(),
                price: details.price,
            });
    }
    Ok(grouped)
}

async fn respond<C: ConnectionTrait>(db: &C, model: item::Model) -> Result<ItemResponse, ApiError> {
    let sizes = size_details_of(db, vec![model.id])
        .await?
        .remove(&model.id)
        .unwrap_or_default();
    Ok(ItemResponse::new(model, sizes))
}

//Structs
#[derive(Deserialize, Validate, Debug)]
struct CreateItem {
    category: i32,
    #[validate(length(min = 1, max = 128))]
    name: String,
    #[validate(length(max = 128))]
    short_description: String,
    #[validate(nested)]
    item_sizes: Vec<SizePrice>,
}

#[derive(Deserialize, Validate, Debug)]
struct PatchItem {
    category: Option<i32>,
    #[validate(length(min = 1, max = 128))]
    name: Option<String>,
    #[validate(length(max = 128))]
    short_description: Option<String>,
    #[validate(nested)]
    item_sizes: Option<Vec<SizePrice>>,
}

#[derive(Serialize, Debug)]
struct SizeDetailResponse {
    id: i32,
    size: i32,
    size_name: String,
    price: i32,
}

#[derive(Serialize, Debug)]
struct ItemResponse {
    id: i32,
    restaurant: i32,
    category: i32,
    name: String,
    short_description: String,
    size_details: Vec<SizeDetailResponse>,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

impl ItemResponse {
    fn new(value: item::Model, size_details: Vec<SizeDetailResponse>) -> ItemResponse {
        ItemResponse {
            id: value.id,
            restaurant: value.restaurant_id,
            category: value.category_id,
            name: value.name,
            short_description: value.short_description,
            size_details,
            created: value.created,
            modified: value.modified,
        }
    }
}
