use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::extract::{Params, Payload};
use super::restaurant::{ensure_member, load_restaurant};
use super::{paginate, PageQuery};
use crate::entities::{item_size, item_size::Entity as ItemSizeEntity, item_size_details};
use crate::error::ApiError;
use crate::middleware::auth::Claims;
use crate::middleware::logging::to_response;
use crate::services::menu::ensure_unreferenced;

//ROUTERS
pub fn item_size_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route(
            "/restaurants/:restaurant_id/item_sizes",
            get(list_item_sizes).post(create_item_size),
        )
        .route(
            "/restaurants/:restaurant_id/item_sizes/:id",
            get(get_item_size)
                .put(update_item_size)
                .patch(patch_item_size)
                .delete(delete_item_size),
        )
        .layer(Extension(db))
}

//ROUTES
async fn list_item_sizes(
    Path(restaurant_id): Path<i32>,
    Params(params): Params<PageQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    load_restaurant(&txn, restaurant_id).await?;
    let page = paginate(
        &txn,
        ItemSizeEntity::find()
            .filter(item_size::Column::RestaurantId.eq(restaurant_id))
            .order_by_desc(item_size::Column::Modified)
            .order_by_desc(item_size::Column::Created),
        &params,
    )
    .await?;
    txn.commit().await?;

    Ok(to_response((StatusCode::OK, Json(page)), Ok(())))
}

async fn get_item_size(
    Path((restaurant_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let size = find_scoped(&*db, restaurant_id, id).await?;
    Ok(to_response((StatusCode::OK, Json(size)), Ok(())))
}

async fn create_item_size(
    Path(restaurant_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Payload(payload): Payload<CreateItemSize>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    let txn = db.begin().await?;
    ensure_member(&txn, restaurant_id, claims.user_id).await?;
    ensure_unique_name(&txn, restaurant_id, &payload.name, None).await?;

    let now = Utc::now();
    let size = item_size::ActiveModel {
        name: Set(payload.name),
        restaurant_id: Set(restaurant_id),
        created: Set(now),
        modified: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!("Created item size {} in restaurant {restaurant_id}", size.id);
    Ok(to_response((StatusCode::CREATED, Json(size)), Ok(())))
}

async fn update_item_size(
    Path((restaurant_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Payload(payload): Payload<CreateItemSize>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    rename(db, restaurant_id, id, claims, Some(payload.name)).await
}

async fn patch_item_size(
    Path((restaurant_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Payload(payload): Payload<PatchItemSize>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    rename(db, restaurant_id, id, claims, payload.name).await
}

async fn rename(
    db: Arc<DatabaseConnection>,
    restaurant_id: i32,
    id: i32,
    claims: Claims,
    name: Option<String>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    ensure_member(&txn, restaurant_id, claims.user_id).await?;
    let size = find_scoped(&txn, restaurant_id, id).await?;

    let mut size: item_size::ActiveModel = size.into();
    if let Some(name) = name {
        ensure_unique_name(&txn, restaurant_id, &name, Some(id)).await?;
        size.name = Set(name);
    }
    size.modified = Set(Utc::now());
    let size = size.update(&txn).await?;
    txn.commit().await?;

    Ok(to_response((StatusCode::OK, Json(size)), Ok(())))
}

async fn delete_item_size(
    Path((restaurant_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    ensure_member(&txn, restaurant_id, claims.user_id).await?;
    let size = find_scoped(&txn, restaurant_id, id).await?;

    let details: Vec<i32> = item_size_details::Entity::find()
        .filter(item_size_details::Column::SizeId.eq(size.id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|d| d.id)
        .collect();
    ensure_unreferenced(&txn, &details).await?;

    item_size_details::Entity::delete_many()
        .filter(item_size_details::Column::SizeId.eq(size.id))
        .exec(&txn)
        .await?;
    ItemSizeEntity::delete_by_id(size.id).exec(&txn).await?;
    txn.commit().await?;

    Ok(to_response(StatusCode::NO_CONTENT, Ok(())))
}

//HELPERS
pub async fn find_scoped<C: ConnectionTrait>(
    db: &C,
    restaurant_id: i32,
    id: i32,
) -> Result<item_size::Model, ApiError> {
    ItemSizeEntity::find_by_id(id)
        .filter(item_size::Column::RestaurantId.eq(restaurant_id))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("item size", id))
}

async fn ensure_unique_name<C: ConnectionTrait>(
    db: &C,
    restaurant_id: i32,
    name: &str,
    except: Option<i32>,
) -> Result<(), ApiError> {
    let mut query = ItemSizeEntity::find()
        .filter(item_size::Column::RestaurantId.eq(restaurant_id))
        .filter(item_size::Column::Name.eq(name));
    if let Some(id) = except {
        query = query.filter(item_size::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(ApiError::field(
            "name",
            "unique",
            "Item size with this name already exists in this restaurant.",
        ));
    }
    Ok(())
}

//Structs
#[derive(Deserialize, Validate, Debug)]
struct CreateItemSize {
    #[validate(length(min = 1, max = 128))]
    name: String,
}

#[derive(Deserialize, Validate, Debug)]
struct PatchItemSize {
    #[validate(length(min = 1, max = 128))]
    name: Option<String>,
}
