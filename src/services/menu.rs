use std::collections::HashSet;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use validator::Validate;

use crate::entities::{item_order_details, item_size, item_size_details};
use crate::error::ApiError;

#[derive(Deserialize, Validate, Clone, Debug)]
pub struct SizePrice {
    pub size: i32,
    #[validate(range(min = 0))]
    pub price: i32,
}

/// Makes the item's size details match `desired` exactly.
///
/// Existing (item, size) rows get the new price, missing ones are created,
/// then every row of this item whose size was not submitted is removed.
/// Removing a row still referenced by an order line fails the whole call,
/// so it must run inside the caller's transaction.
pub async fn reconcile_size_details<C: ConnectionTrait>(
    db: &C,
    restaurant_id: i32,
    item_id: i32,
    desired: &[SizePrice],
) -> Result<Vec<item_size_details::Model>, ApiError> {
    check_sizes(db, restaurant_id, desired).await?;

    let mut kept = Vec::with_capacity(desired.len());
    for entry in desired {
        let existing = item_size_details::Entity::find()
            .filter(item_size_details::Column::ItemId.eq(item_id))
            .filter(item_size_details::Column::SizeId.eq(entry.size))
            .one(db)
            .await?;

        let model = match existing {
            Some(row) if row.price == entry.price => row,
            Some(row) => {
                let mut row: item_size_details::ActiveModel = row.into();
                row.price = Set(entry.price);
                row.update(db).await?
            }
            None => {
                item_size_details::ActiveModel {
                    item_id: Set(item_id),
                    size_id: Set(entry.size),
                    price: Set(entry.price),
                    ..Default::default()
                }
                .insert(db)
                .await?
            }
        };
        kept.push(model.id);
    }

    let stale = item_size_details::Entity::find()
        .filter(item_size_details::Column::ItemId.eq(item_id))
        .filter(item_size_details::Column::Id.is_not_in(kept.clone()))
        .all(db)
        .await?;
    let stale_ids: Vec<i32> = stale.iter().map(|row| row.id).collect();
    ensure_unreferenced(db, &stale_ids).await?;

    if !stale_ids.is_empty() {
        item_size_details::Entity::delete_many()
            .filter(item_size_details::Column::Id.is_in(stale_ids.clone()))
            .exec(db)
            .await?;
        tracing::debug!("Removed size details {stale_ids:?} from item {item_id}");
    }

    Ok(item_size_details::Entity::find()
        .filter(item_size_details::Column::ItemId.eq(item_id))
        .order_by_asc(item_size_details::Column::Id)
        .all(db)
        .await?)
}

/// Refuses when any of the given size details is used by an order line.
pub async fn ensure_unreferenced<C: ConnectionTrait>(
    db: &C,
    size_detail_ids: &[i32],
) -> Result<(), ApiError> {
    if size_detail_ids.is_empty() {
        return Ok(());
    }

    let references = item_order_details::Entity::find()
        .filter(item_order_details::Column::ItemSizeId.is_in(size_detail_ids.to_vec()))
        .count(db)
        .await?;

    if references > 0 {
        return Err(ApiError::ReferencedEntity(format!(
            "Cannot delete some instances of model 'ItemSizeDetails' because they are referenced \
             through protected foreign key 'ItemOrderDetails.item_size' ({references} order lines)"
        )));
    }
    Ok(())
}

async fn check_sizes<C: ConnectionTrait>(
    db: &C,
    restaurant_id: i32,
    desired: &[SizePrice],
) -> Result<(), ApiError> {
    let mut seen = HashSet::new();
    for entry in desired {
        if !seen.insert(entry.size) {
            return Err(ApiError::field(
                "item_sizes",
                "unique",
                format!("Size {} is listed more than once.", entry.size),
            ));
        }
    }

    let sizes: Vec<i32> = seen.into_iter().collect();
    let known = item_size::Entity::find()
        .filter(item_size::Column::RestaurantId.eq(restaurant_id))
        .filter(item_size::Column::Id.is_in(sizes.clone()))
        .count(db)
        .await?;

    if known as usize != sizes.len() {
        return Err(ApiError::field(
            "item_sizes",
            "does_not_exist",
            "Invalid pk - size does not exist in this restaurant.",
        ));
    }
    Ok(())
}
