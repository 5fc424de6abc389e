use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Price of one item in one size. At most one row per (item, size).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "item_size_details")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub item_id: i32,
    pub size_id: i32,
    pub price: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::entities::item::Entity",
        from = "Column::ItemId",
        to = "crate::entities::item::Column::Id",
        on_delete = "Cascade"
    )]
    Item,
    #[sea_orm(
        belongs_to = "crate::entities::item_size::Entity",
        from = "Column::SizeId",
        to = "crate::entities::item_size::Column::Id",
        on_delete = "Cascade"
    )]
    Size,
    #[sea_orm(has_many = "crate::entities::item_order_details::Entity")]
    OrderDetails,
}

impl Related<crate::entities::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl Related<crate::entities::item_size::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Size.def()
    }
}

impl Related<crate::entities::item_order_details::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderDetails.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
