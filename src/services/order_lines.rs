use std::collections::HashSet;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use validator::Validate;

use crate::entities::{item, item_order_details, item_size_details, order};
use crate::error::ApiError;
use crate::services::pricing;

#[derive(Deserialize, Validate, Clone, Debug)]
pub struct LineRequest {
    pub item_size: i32,
    #[validate(range(min = 1))]
    pub count: i32,
}

/// Replaces every line of the order with `lines` and freezes the new total.
///
/// Used for both creation and update: there is no diffing, old lines are
/// dropped unconditionally. Returns the order with its refreshed
/// `total_price`.
pub async fn replace_lines<C: ConnectionTrait>(
    db: &C,
    order: order::Model,
    lines: &[LineRequest],
) -> Result<order::Model, ApiError> {
    check_item_sizes(db, order.restaurant_id, lines).await?;

    let removed = item_order_details::Entity::delete_many()
        .filter(item_order_details::Column::OrderId.eq(order.id))
        .exec(db)
        .await?
        .rows_affected;

    for line in lines {
        item_order_details::ActiveModel {
            order_id: Set(order.id),
            item_size_id: Set(line.item_size),
            count: Set(line.count),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    let total_price = pricing::current_total(db, order.id).await?;
    tracing::debug!(
        order_id = order.id,
        removed,
        added = lines.len(),
        total_price,
        "Replaced order lines"
    );

    let mut order: order::ActiveModel = order.into();
    order.total_price = Set(total_price);
    Ok(order.update(db).await?)
}

pub async fn lines_of<C: ConnectionTrait>(
    db: &C,
    order_ids: Vec<i32>,
) -> Result<Vec<(item_order_details::Model, Option<item_size_details::Model>)>, ApiError> {
    Ok(item_order_details::Entity::find()
        .filter(item_order_details::Column::OrderId.is_in(order_ids))
        .find_also_related(item_size_details::Entity)
        .order_by_asc(item_order_details::Column::Id)
        .all(db)
        .await?)
}

// Every referenced size detail must belong to an item of the order's restaurant.
async fn check_item_sizes<C: ConnectionTrait>(
    db: &C,
    restaurant_id: i32,
    lines: &[LineRequest],
) -> Result<(), ApiError> {
    let wanted: HashSet<i32> = lines.iter().map(|line| line.item_size).collect();
    if wanted.is_empty() {
        return Ok(());
    }

    let found = item_size_details::Entity::find()
        .inner_join(item::Entity)
        .filter(item::Column::RestaurantId.eq(restaurant_id))
        .filter(item_size_details::Column::Id.is_in(wanted.iter().copied().collect::<Vec<_>>()))
        .count(db)
        .await?;

    if found as usize != wanted.len() {
        return Err(ApiError::field(
            "items_sizes",
            "does_not_exist",
            "Invalid pk - item size does not exist in this restaurant.",
        ));
    }
    Ok(())
}
