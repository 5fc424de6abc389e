use sea_orm::entity::prelude::*;
use serde::{Serialize, Serializer};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub customer_id: i32,
    #[sea_orm(indexed)]
    pub restaurant_id: i32,
    pub address: String,
    pub status: Status,
    /// Sum of line prices at the time the lines were last written.
    pub total_price: i64,
    pub cooked_at: Option<DateTimeUtc>,
    pub ready_at: Option<DateTimeUtc>,
    pub on_the_way_at: Option<DateTimeUtc>,
    pub delivered_at: Option<DateTimeUtc>,
    pub created: DateTimeUtc,
    pub modified: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::entities::user::Entity",
        from = "Column::CustomerId",
        to = "crate::entities::user::Column::Id",
        on_delete = "Cascade"
    )]
    Customer,
    #[sea_orm(
        belongs_to = "crate::entities::restaurant::Entity",
        from = "Column::RestaurantId",
        to = "crate::entities::restaurant::Column::Id",
        on_delete = "Cascade"
    )]
    Restaurant,
    #[sea_orm(has_many = "crate::entities::item_order_details::Entity")]
    Details,
}

impl Related<crate::entities::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<crate::entities::restaurant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Restaurant.def()
    }
}

impl Related<crate::entities::item_order_details::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Details.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum Status {
    #[sea_orm(num_value = 1)]
    Picked,
    #[sea_orm(num_value = 2)]
    Cooking,
    #[sea_orm(num_value = 3)]
    Ready,
    #[sea_orm(num_value = 4)]
    OnTheWay,
    #[sea_orm(num_value = 5)]
    Delivered,
    #[sea_orm(num_value = 6)]
    Cancelled,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Picked => "Picked",
            Self::Cooking => "Cooking",
            Self::Ready => "Ready",
            Self::OnTheWay => "On the way",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }
}

// Clients see the numeric code.
impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.to_value())
    }
}
