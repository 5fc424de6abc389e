use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter};

use crate::entities::{item_order_details, item_size_details};

pub fn line_price(unit_price: i32, count: i32) -> i64 {
    i64::from(unit_price) * i64::from(count)
}

pub fn sum_lines<I>(lines: I) -> i64
where
    I: IntoIterator<Item = (i32, i32)>,
{
    lines
        .into_iter()
        .map(|(unit_price, count)| line_price(unit_price, count))
        .sum()
}

/// Live total of an order, priced from the catalog as it is now.
///
/// This is what gets frozen into `orders.total_price` when lines are written;
/// reading it later may differ from the stored snapshot and is never written
/// back on its own.
pub async fn current_total<C: ConnectionTrait>(db: &C, order_id: i32) -> Result<i64, DbErr> {
    let lines = item_order_details::Entity::find()
        .filter(item_order_details::Column::OrderId.eq(order_id))
        .find_also_related(item_size_details::Entity)
        .all(db)
        .await?;

    Ok(sum_lines(lines.into_iter().filter_map(|(line, details)| {
        details.map(|details| (details.price, line.count))
    })))
}
