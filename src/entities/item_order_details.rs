use sea_orm::entity::prelude::*;
use serde::Serialize;

/// One order line: `count` units of a priced item size.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "item_order_details")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub order_id: i32,
    pub item_size_id: i32,
    pub count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::entities::order::Entity",
        from = "Column::OrderId",
        to = "crate::entities::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
    #[sea_orm(
        belongs_to = "crate::entities::item_size_details::Entity",
        from = "Column::ItemSizeId",
        to = "crate::entities::item_size_details::Column::Id",
        on_delete = "Restrict"
    )]
    ItemSize,
}

impl Related<crate::entities::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<crate::entities::item_size_details::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ItemSize.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
