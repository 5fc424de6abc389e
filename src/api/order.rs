use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

use super::extract::{Params, Payload};
use super::restaurant::{is_member, load_restaurant};
use super::{paginate, PageQuery};
use crate::entities::{
    item_order_details,
    order::{self, Entity as OrderEntity, Status},
};
use crate::error::ApiError;
use crate::middleware::auth::Claims;
use crate::middleware::logging::to_response;
use crate::services::{
    lifecycle,
    order_lines::{lines_of, replace_lines, LineRequest},
    pricing::line_price,
};

//ROUTERS
pub fn order_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route(
            "/restaurants/:restaurant_id/orders",
            get(list_orders).post(create_order),
        )
        .route(
            "/restaurants/:restaurant_id/orders/:id",
            get(get_order)
                .put(update_order)
                .patch(patch_order)
                .delete(delete_order),
        )
        .route(
            "/restaurants/:restaurant_id/orders/:id/status",
            post(advance_status).delete(cancel_order),
        )
        .layer(Extension(db))
}

//ROUTES
async fn list_orders(
    Path(restaurant_id): Path<i32>,
    Params(params): Params<OrderListQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    load_restaurant(&txn, restaurant_id).await?;

    let mut select = OrderEntity::find().filter(order::Column::RestaurantId.eq(restaurant_id));
    if let Some(customer) = params.customer {
        select = select.filter(order::Column::CustomerId.eq(customer));
    }
    if let Some(status) = params.status {
        let status = Status::try_from_value(&status).map_err(|_| {
            ApiError::field(
                "status",
                "invalid_choice",
                format!("Select a valid choice. {status} is not one of the available choices."),
            )
        })?;
        select = select.filter(order::Column::Status.eq(status));
    }
    let select = select
        .order_by_desc(order::Column::Modified)
        .order_by_desc(order::Column::Created);

    let page_query = PageQuery {
        page: params.page,
        page_size: params.page_size,
    };
    let page = paginate(&txn, select, &page_query).await?;

    let ids = page.results.iter().map(|o| o.id).collect();
    let mut details = details_of(&txn, ids).await?;
    let page = page.map(|model| {
        let lines = details.remove(&model.id).unwrap_or_default();
        OrderResponse::new(model, lines)
    });
    txn.commit().await?;

    Ok(to_response((StatusCode::OK, Json(page)), Ok(())))
}

async fn get_order(
    Path((restaurant_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let model = find_scoped(&txn, restaurant_id, id).await?;
    let response = respond(&txn, model).await?;
    txn.commit().await?;

    Ok(to_response((StatusCode::OK, Json(response)), Ok(())))
}

async fn create_order(
    Path(restaurant_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Payload(payload): Payload<CreateOrder>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    let txn = db.begin().await?;
    load_restaurant(&txn, restaurant_id).await?;

    let now = Utc::now();
    let model = order::ActiveModel {
        customer_id: Set(claims.user_id),
        restaurant_id: Set(restaurant_id),
        address: Set(payload.address),
        status: Set(Status::Picked),
        total_price: Set(0),
        cooked_at: Set(None),
        ready_at: Set(None),
        on_the_way_at: Set(None),
        delivered_at: Set(None),
        created: Set(now),
        modified: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let model = replace_lines(&txn, model, &payload.items_sizes).await?;
    let response = respond(&txn, model).await?;
    txn.commit().await?;

    tracing::info!(
        order_id = response.id,
        restaurant_id,
        total_price = response.total_price,
        "Order placed"
    );
    Ok(to_response((StatusCode::CREATED, Json(response)), Ok(())))
}

async fn update_order(
    Path((restaurant_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Payload(payload): Payload<CreateOrder>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    let patch = PatchOrder {
        items_sizes: Some(payload.items_sizes),
        address: Some(payload.address),
    };
    apply_update(db, restaurant_id, id, claims, patch).await
}

async fn patch_order(
    Path((restaurant_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Payload(payload): Payload<PatchOrder>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    apply_update(db, restaurant_id, id, claims, payload).await
}

async fn apply_update(
    db: Arc<DatabaseConnection>,
    restaurant_id: i32,
    id: i32,
    claims: Claims,
    payload: PatchOrder,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let existing = find_scoped(&txn, restaurant_id, id).await?;
    ensure_can_manage(&txn, &existing, claims.user_id).await?;

    let mut model: order::ActiveModel = existing.into();
    if let Some(address) = payload.address {
        model.address = Set(address);
    }
    model.modified = Set(Utc::now());
    let mut model = model.update(&txn).await?;

    if let Some(items_sizes) = payload.items_sizes {
        model = replace_lines(&txn, model, &items_sizes).await?;
    }

    let response = respond(&txn, model).await?;
    txn.commit().await?;

    Ok(to_response((StatusCode::OK, Json(response)), Ok(())))
}

async fn delete_order(
    Path((restaurant_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let model = find_scoped(&txn, restaurant_id, id).await?;
    ensure_can_manage(&txn, &model, claims.user_id).await?;

    item_order_details::Entity::delete_many()
        .filter(item_order_details::Column::OrderId.eq(model.id))
        .exec(&txn)
        .await?;
    OrderEntity::delete_by_id(model.id).exec(&txn).await?;
    txn.commit().await?;

    Ok(to_response(StatusCode::NO_CONTENT, Ok(())))
}

async fn advance_status(
    Path((restaurant_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let mut model = find_scoped(&txn, restaurant_id, id).await?;
    ensure_can_manage(&txn, &model, claims.user_id).await?;

    if lifecycle::advance(&mut model, Utc::now()) {
        model = lifecycle::persist(&txn, model).await?;
        tracing::info!(order_id = model.id, status = model.status.label(), "Order advanced");
    }

    let response = respond(&txn, model).await?;
    txn.commit().await?;

    Ok(to_response((StatusCode::OK, Json(response)), Ok(())))
}

async fn cancel_order(
    Path((restaurant_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let mut model = find_scoped(&txn, restaurant_id, id).await?;
    ensure_can_manage(&txn, &model, claims.user_id).await?;

    lifecycle::cancel(&mut model, Utc::now())?;
    let model = lifecycle::persist(&txn, model).await?;
    tracing::info!(order_id = model.id, "Order cancelled");

    let response = respond(&txn, model).await?;
    txn.commit().await?;

    Ok(to_response((StatusCode::OK, Json(response)), Ok(())))
}

//HELPERS
async fn find_scoped<C: ConnectionTrait>(
    db: &C,
    restaurant_id: i32,
    id: i32,
) -> Result<order::Model, ApiError> {
    OrderEntity::find_by_id(id)
        .filter(order::Column::RestaurantId.eq(restaurant_id))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("order", id))
}

// The customer and the restaurant's staff may change an order.
async fn ensure_can_manage<C: ConnectionTrait>(
    db: &C,
    model: &order::Model,
    user_id: i32,
) -> Result<(), ApiError> {
    if model.customer_id == user_id || is_member(db, model.restaurant_id, user_id).await? {
        return Ok(());
    }
    Err(ApiError::Forbidden(
        "Only the customer or the restaurant staff may change this order.".to_string(),
    ))
}

async fn details_of<C: ConnectionTrait>(
    db: &C,
    order_ids: Vec<i32>,
) -> Result<HashMap<i32, Vec<OrderDetailResponse>>, ApiError> {
    let mut grouped: HashMap<i32, Vec<OrderDetailResponse>> = HashMap::new();
    for (line, size_details) in lines_of(db, order_ids).await? {
        let unit_price = size_details.map(|d| d.price).unwrap_or_default();
        grouped
            .entry(line.order_id)
            .or_default()
            .push(OrderDetailResponse {
                id: line.id,
                item_size: line.item_size_id,
                count: line.count,
                price: line_price(unit_price, line.count),
            });
    }
    Ok(grouped)
}

async fn respond<C: ConnectionTrait>(db: &C, model: order::Model) -> Result<OrderResponse, ApiError> {
    let lines = details_of(db, vec![model.id])
        .await?
        .remove(&model.id)
        .unwrap_or_default();
    Ok(OrderResponse::new(model, lines))
}

//Structs
#[derive(Deserialize, Debug)]
struct OrderListQuery {
    customer: Option<i32>,
    status: Option<i32>,
    page: Option<u64>,
    page_size: Option<u64>,
}

#[derive(Deserialize, Validate, Debug)]
struct CreateOrder {
    #[validate(nested)]
    items_sizes: Vec<LineRequest>,
    #[validate(length(min = 1, max = 500))]
    address: String,
}

#[derive(Deserialize, Validate, Debug)]
struct PatchOrder {
    #[validate(nested)]
    items_sizes: Option<Vec<LineRequest>>,
    #[validate(length(min = 1, max = 500))]
    address: Option<String>,
}

#[derive(Serialize, Debug)]
struct OrderDetailResponse {
    id: i32,
    item_size: i32,
    count: i32,
    /// Live price of the line: current unit price times count.
    price: i64,
}

#[derive(Serialize, Debug)]
struct OrderResponse {
    id: i32,
    customer: i32,
    restaurant: i32,
    address: String,
    status: Status,
    status_display: &'static str,
    total_price: i64,
    orders_details: Vec<OrderDetailResponse>,
    cooked_at: Option<DateTime<Utc>>,
    ready_at: Option<DateTime<Utc>>,
    on_the_way_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

impl OrderResponse {
    fn new(value: order::Model, orders_details: Vec<OrderDetailResponse>) -> OrderResponse {
        OrderResponse {
            id: value.id,
            customer: value.customer_id,
            restaurant: value.restaurant_id,
            address: value.address,
            status: value.status,
            status_display: value.status.label(),
            total_price: value.total_price,
            orders_details,
            cooked_at: value.cooked_at,
            ready_at: value.ready_at,
            on_the_way_at: value.on_the_way_at,
            delivered_at: value.delivered_at,
            created: value.created,
            modified: value.modified,
        }
    }
}
