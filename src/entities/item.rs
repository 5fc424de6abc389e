use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub restaurant_id: i32,
    pub category_id: i32,
    pub name: String,
    pub short_description: String,
    pub created: DateTimeUtc,
    pub modified: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::entities::restaurant::Entity",
        from = "Column::RestaurantId",
        to = "crate::entities::restaurant::Column::Id",
        on_delete = "Cascade"
    )]
    Restaurant,
    #[sea_orm(
        belongs_to = "crate::entities::category::Entity",
        from = "Column::CategoryId",
        to = "crate::entities::category::Column::Id",
        on_delete = "Restrict"
    )]
    Category,
    #[sea_orm(has_many = "crate::entities::item_size_details::Entity")]
    SizeDetails,
}

impl Related<crate::entities::restaurant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Restaurant.def()
    }
}

impl Related<crate::entities::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<crate::entities::item_size_details::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SizeDetails.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
