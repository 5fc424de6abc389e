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
use crate::entities::{category, category::Entity as CategoryEntity, item};
use crate::error::ApiError;
use crate::middleware::auth::Claims;
use crate::middleware::logging::to_response;

//ROUTERS
pub fn category_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route(
            "/restaurants/:restaurant_id/categories",
            get(list_categories).post(create_category),
        )
        .route(
            "/restaurants/:restaurant_id/categories/:id",
            get(get_category)
                .put(update_category)
                .patch(patch_category)
                .delete(delete_category),
        )
        .layer(Extension(db))
}

//ROUTES
async fn list_categories(
    Path(restaurant_id): Path<i32>,
    Params(params): Params<PageQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    load_restaurant(&txn, restaurant_id).await?;
    let page = paginate(
        &txn,
        CategoryEntity::find()
            .filter(category::Column::RestaurantId.eq(restaurant_id))
            .order_by_desc(category::Column::Modified)
            .order_by_desc(category::Column::Created),
        &params,
    )
    .await?;
    txn.commit().await?;

    Ok(to_response((StatusCode::OK, Json(page)), Ok(())))
}

async fn get_category(
    Path((restaurant_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let category = find_scoped(&*db, restaurant_id, id).await?;
    Ok(to_response((StatusCode::OK, Json(category)), Ok(())))
}

async fn create_category(
    Path(restaurant_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Payload(payload): Payload<CreateCategory>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    let txn = db.begin().await?;
    ensure_member(&txn, restaurant_id, claims.user_id).await?;
    ensure_unique_name(&txn, restaurant_id, &payload.name, None).await?;

    let now = Utc::now();
    let category = category::ActiveModel {
        name: Set(payload.name),
        restaurant_id: Set(restaurant_id),
        created: Set(now),
        modified: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!("Created category {} in restaurant {restaurant_id}", category.id);
    Ok(to_response((StatusCode::CREATED, Json(category)), Ok(())))
}

async fn update_category(
    Path((restaurant_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Payload(payload): Payload<CreateCategory>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    rename(db, restaurant_id, id, claims, Some(payload.name)).await
}

async fn patch_category(
    Path((restaurant_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Payload(payload): Payload<PatchCategory>,
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
    let category = find_scoped(&txn, restaurant_id, id).await?;

    let mut category: category::ActiveModel = category.into();
    if let Some(name) = name {
        ensure_unique_name(&txn, restaurant_id, &name, Some(id)).await?;
        category.name = Set(name);
    }
    category.modified = Set(Utc::now());
    let category = category.update(&txn).await?;
    txn.commit().await?;

    Ok(to_response((StatusCode::OK, Json(category)), Ok(())))
}

async fn delete_category(
    Path((restaurant_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    ensure_member(&txn, restaurant_id, claims.user_id).await?;
    let category = find_scoped(&txn, restaurant_id, id).await?;

    let items = item::Entity::find()
        .filter(item::Column::CategoryId.eq(category.id))
        .count(&txn)
        .await?;
    if items > 0 {
        return Err(ApiError::ReferencedEntity(format!(
            "Cannot delete category {} because {items} items still use it",
            category.id
        )));
    }

    CategoryEntity::delete_by_id(category.id).exec(&txn).await?;
    txn.commit().await?;

    Ok(to_response(StatusCode::NO_CONTENT, Ok(())))
}

//HELPERS
pub async fn find_scoped<C: ConnectionTrait>(
    db: &C,
    restaurant_id: i32,
    id: i32,
) -> Result<category::Model, ApiError> {
    CategoryEntity::find_by_id(id)
        .filter(category::Column::RestaurantId.eq(restaurant_id))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("category", id))
}

async fn ensure_unique_name<C: ConnectionTrait>(
    db: &C,
    restaurant_id: i32,
    name: &str,
    except: Option<i32>,
) -> Result<(), ApiError> {
    let mut query = CategoryEntity::find()
        .filter(category::Column::RestaurantId.eq(restaurant_id))
        .filter(category::Column::Name.eq(name));
    if let Some(id) = except {
        query = query.filter(category::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(ApiError::field(
            "name",
            "unique",
            "Category with this name already exists in this restaurant.",
        ));
    }
    Ok(())
}

//Structs
#[derive(Deserialize, Validate, Debug)]
struct CreateCategory {
    #[validate(length(min = 1, max = 128))]
    name: String,
}

#[derive(Deserialize, Validate, Debug)]
struct PatchCategory {
    #[validate(length(min = 1, max = 128))]
    name: Option<String>,
}
