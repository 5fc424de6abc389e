use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use validator::Validate;

use super::extract::{Params, Payload};
use super::{paginate, PageQuery};
use crate::entities::{
    category, item, item_order_details, item_size, item_size_details, order,
    restaurant::{self, Entity as RestaurantEntity},
    restaurant_user, user,
};
use crate::error::ApiError;
use crate::middleware::auth::Claims;
use crate::middleware::logging::to_response;

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?1?\d{9,15}$").unwrap());

//ROUTERS
pub fn restaurant_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/restaurants", get(list_restaurants).post(create_restaurant))
        .route(
            "/restaurants/:restaurant_id",
            get(get_restaurant)
                .put(update_restaurant)
                .patch(patch_restaurant)
                .delete(delete_restaurant),
        )
        .layer(Extension(db))
}

//ROUTES
async fn list_restaurants(
    Params(params): Params<PageQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let page = paginate(
        &txn,
        RestaurantEntity::find()
            .order_by_desc(restaurant::Column::Modified)
            .order_by_desc(restaurant::Column::Created),
        &params,
    )
    .await?;

    let ids = page.results.iter().map(|r| r.id).collect();
    let mut members = members_of(&txn, ids).await?;
    let page = page.map(|model| {
        let users = members.remove(&model.id).unwrap_or_default();
        RestaurantResponse::new(model, users)
    });
    txn.commit().await?;

    Ok(to_response((StatusCode::OK, Json(page)), Ok(())))
}

async fn get_restaurant(
    Path(restaurant_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let model = load_restaurant(&txn, restaurant_id).await?;
    let response = respond(&txn, model).await?;
    txn.commit().await?;

    Ok(to_response((StatusCode::OK, Json(response)), Ok(())))
}

async fn create_restaurant(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Payload(payload): Payload<CreateRestaurant>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    tracing::info!("Creating restaurant {:?} for user {}", payload.name, claims.user_id);

    let txn = db.begin().await?;
    let owner_id = payload.owner.unwrap_or(claims.user_id);
    ensure_users_exist(&txn, "owner", &[owner_id]).await?;
    ensure_users_exist(&txn, "users", &payload.users).await?;

    let now = Utc::now();
    let model = restaurant::ActiveModel {
        owner_id: Set(owner_id),
        name: Set(payload.name),
        phone: Set(payload.phone),
        address: Set(payload.address),
        logo: Set(payload.logo),
        created: Set(now),
        modified: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    set_members(&txn, model.id, &payload.users).await?;
    add_owner_if_missing(&txn, &model).await?;

    let response = respond(&txn, model).await?;
    txn.commit().await?;

    Ok(to_response((StatusCode::CREATED, Json(response)), Ok(())))
}

async fn update_restaurant(
    Path(restaurant_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Payload(payload): Payload<CreateRestaurant>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    let patch = PatchRestaurant {
        owner: payload.owner,
        users: Some(payload.users),
        name: Some(payload.name),
        phone: Some(payload.phone),
        address: Some(payload.address),
        logo: Some(payload.logo),
    };
    apply_update(db, restaurant_id, claims, patch).await
}

async fn patch_restaurant(
    Path(restaurant_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Payload(payload): Payload<PatchRestaurant>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    apply_update(db, restaurant_id, claims, payload).await
}

async fn apply_update(
    db: Arc<DatabaseConnection>,
    restaurant_id: i32,
    claims: Claims,
    payload: PatchRestaurant,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let existing = ensure_member(&txn, restaurant_id, claims.user_id).await?;
    let mut model: restaurant::ActiveModel = existing.into();

    if let Some(owner_id) = payload.owner {
        ensure_users_exist(&txn, "owner", &[owner_id]).await?;
        model.owner_id = Set(owner_id);
    }
    if let Some(name) = payload.name {
        model.name = Set(name);
    }
    if let Some(phone) = payload.phone {
        model.phone = Set(phone);
    }
    if let Some(address) = payload.address {
        model.address = Set(address);
    }
    if let Some(logo) = payload.logo {
        model.logo = Set(logo);
    }
    model.modified = Set(Utc::now());
    let model = model.update(&txn).await?;

    if let Some(users) = payload.users {
        ensure_users_exist(&txn, "users", &users).await?;
        set_members(&txn, model.id, &users).await?;
    }
    add_owner_if_missing(&txn, &model).await?;

    let response = respond(&txn, model).await?;
    txn.commit().await?;

    Ok(to_response((StatusCode::OK, Json(response)), Ok(())))
}

async fn delete_restaurant(
    Path(restaurant_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    ensure_member(&txn, restaurant_id, claims.user_id).await?;

    // Children first so protected references never dangle mid-way.
    let order_ids: Vec<i32> = order::Entity::find()
        .filter(order::Column::RestaurantId.eq(restaurant_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|o| o.id)
        .collect();
    item_order_details::Entity::delete_many()
        .filter(item_order_details::Column::OrderId.is_in(order_ids))
        .exec(&txn)
        .await?;
    order::Entity::delete_many()
        .filter(order::Column::RestaurantId.eq(restaurant_id))
        .exec(&txn)
        .await?;

    let item_ids: Vec<i32> = item::Entity::find()
        .filter(item::Column::RestaurantId.eq(restaurant_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|i| i.id)
        .collect();
    item_size_details::Entity::delete_many()
        .filter(item_size_details::Column::ItemId.is_in(item_ids))
        .exec(&txn)
        .await?;
    item::Entity::delete_many()
        .filter(item::Column::RestaurantId.eq(restaurant_id))
        .exec(&txn)
        .await?;
    category::Entity::delete_many()
        .filter(category::Column::RestaurantId.eq(restaurant_id))
        .exec(&txn)
        .await?;
    item_size::Entity::delete_many()
        .filter(item_size::Column::RestaurantId.eq(restaurant_id))
        .exec(&txn)
        .await?;
    restaurant_user::Entity::delete_many()
        .filter(restaurant_user::Column::RestaurantId.eq(restaurant_id))
        .exec(&txn)
        .await?;
    RestaurantEntity::delete_by_id(restaurant_id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!("Deleted restaurant {restaurant_id}");
    Ok(to_response(StatusCode::NO_CONTENT, Ok(())))
}

//SCOPE HELPERS
pub async fn load_restaurant<C: ConnectionTrait>(
    db: &C,
    restaurant_id: i32,
) -> Result<restaurant::Model, ApiError> {
    RestaurantEntity::find_by_id(restaurant_id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("restaurant", restaurant_id))
}

pub async fn is_member<C: ConnectionTrait>(
    db: &C,
    restaurant_id: i32,
    user_id: i32,
) -> Result<bool, ApiError> {
    let memberships = restaurant_user::Entity::find()
        .filter(restaurant_user::Column::RestaurantId.eq(restaurant_id))
        .filter(restaurant_user::Column::UserId.eq(user_id))
        .count(db)
        .await?;
    Ok(memberships > 0)
}

/// Loads the restaurant and checks the caller may manage it.
pub async fn ensure_member<C: ConnectionTrait>(
    db: &C,
    restaurant_id: i32,
    user_id: i32,
) -> Result<restaurant::Model, ApiError> {
    let model = load_restaurant(db, restaurant_id).await?;
    if !is_member(db, restaurant_id, user_id).await? {
        return Err(ApiError::Forbidden(
            "You are not an authorized user of this restaurant.".to_string(),
        ));
    }
    Ok(model)
}

async fn ensure_users_exist<C: ConnectionTrait>(
    db: &C,
    field: &'static str,
    ids: &[i32],
) -> Result<(), ApiError> {
    let wanted: BTreeSet<i32> = ids.iter().copied().collect();
    if wanted.is_empty() {
        return Ok(());
    }
    let found = user::Entity::find()
        .filter(user::Column::Id.is_in(wanted.iter().copied().collect::<Vec<_>>()))
        .count(db)
        .await?;
    if found as usize != wanted.len() {
        return Err(ApiError::field(field, "does_not_exist", "Invalid pk - user does not exist."));
    }
    Ok(())
}

async fn set_members<C: ConnectionTrait>(
    db: &C,
    restaurant_id: i32,
    users: &[i32],
) -> Result<(), ApiError> {
    restaurant_user::Entity::delete_many()
        .filter(restaurant_user::Column::RestaurantId.eq(restaurant_id))
        .exec(db)
        .await?;

    let unique: BTreeSet<i32> = users.iter().copied().collect();
    for user_id in unique {
        restaurant_user::ActiveModel {
            restaurant_id: Set(restaurant_id),
            user_id: Set(user_id),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

/// The owner is always one of the restaurant's authorized users.
pub async fn add_owner_if_missing<C: ConnectionTrait>(
    db: &C,
    model: &restaurant::Model,
) -> Result<(), ApiError> {
    if is_member(db, model.id, model.owner_id).await? {
        return Ok(());
    }
    restaurant_user::ActiveModel {
        restaurant_id: Set(model.id),
        user_id: Set(model.owner_id),
        ..Default::default()
    }
    .insert(db)
    .await?;
    tracing::debug!("Added owner {} to restaurant {}", model.owner_id, model.id);
    Ok(())
}

async fn members_of<C: ConnectionTrait>(
    db: &C,
    restaurant_ids: Vec<i32>,
) -> Result<HashMap<i32, Vec<UserSummary>>, ApiError> {
    let rows = restaurant_user::Entity::find()
        .filter(restaurant_user::Column::RestaurantId.is_in(restaurant_ids))
        .order_by_asc(restaurant_user::Column::UserId)
        .find_also_related(user::Entity)
        .all(db)
        .await?;

    let mut grouped: HashMap<i32, Vec<UserSummary>> = HashMap::new();
    for (membership, member) in rows {
        if let Some(member) = member {
            grouped
                .entry(membership.restaurant_id)
                .or_default()
                .push(UserSummary::new(member));
        }
    }
    Ok(grouped)
}

async fn respond<C: ConnectionTrait>(
    db: &C,
    model: restaurant::Model,
) -> Result<RestaurantResponse, ApiError> {
    let users = members_of(db, vec![model.id])
        .await?
        .remove(&model.id)
        .unwrap_or_default();
    Ok(RestaurantResponse::new(model, users))
}

//Structs
#[derive(Deserialize, Validate, Debug)]
struct CreateRestaurant {
    owner: Option<i32>,
    #[serde(default)]
    users: Vec<i32>,
    #[validate(length(min = 1, max = 128))]
    name: String,
    #[validate(regex(
        path = *PHONE_REGEX,
        message = "Phone number must be entered in the format: '+9999999'. Up to 15 digits allowed."
    ))]
    phone: String,
    #[validate(length(min = 1, max = 128))]
    address: String,
    logo: Option<String>,
}

#[derive(Deserialize, Validate, Debug)]
struct PatchRestaurant {
    owner: Option<i32>,
    users: Option<Vec<i32>>,
    #[validate(length(min = 1, max = 128))]
    name: Option<String>,
    #[validate(regex(
        path = *PHONE_REGEX,
        message = "Phone number must be entered in the format: '+9999999'. Up to 15 digits allowed."
    ))]
    phone: Option<String>,
    #[validate(length(min = 1, max = 128))]
    address: Option<String>,
    #[serde(default, deserialize_with = "present")]
    logo: Option<Option<String>>,
}

// Absent stays `None`; an explicit `null` becomes `Some(None)` and clears the field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Serialize, Debug)]
struct UserSummary {
    id: i32,
    username: String,
    name: String,
}

impl UserSummary {
    fn new(value: user::Model) -> UserSummary {
        UserSummary {
            id: value.id,
            username: value.username,
            name: value.name,
        }
    }
}

#[derive(Serialize, Debug)]
struct RestaurantResponse {
    id: i32,
    owner: i32,
    users: Vec<UserSummary>,
    name: String,
    phone: String,
    address: String,
    logo: Option<String>,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

impl RestaurantResponse {
    fn new(value: restaurant::Model, users: Vec<UserSummary>) -> RestaurantResponse {
        RestaurantResponse {
            id: value.id,
            owner: value.owner_id,
            users,
            name: value.name,
            phone: value.phone,
            address: value.address,
            logo: value.logo,
            created: value.created,
            modified: value.modified,
        }
    }
}
