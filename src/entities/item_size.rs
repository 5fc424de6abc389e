use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A size label such as "Large", priced per item through `item_size_details`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "item_sizes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(indexed)]
    #[serde(rename = "restaurant")]
    pub restaurant_id: i32,
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
}

impl Related<crate::entities::restaurant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Restaurant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
