pub mod category;
pub mod item;
pub mod item_order_details;
pub mod item_size;
pub mod item_size_details;
pub mod order;
pub mod restaurant;
pub mod restaurant_user;
pub mod user;

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};

pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    // Every pooled connection to `:memory:` would open its own empty database.
    if database_url.contains(":memory:") {
        options.max_connections(1).min_connections(1);
    }
    options.sqlx_logging(false);
    Database::connect(options).await
}

pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, user::Entity).await?;
    create_table(db, restaurant::Entity).await?;
    create_table(db, restaurant_user::Entity).await?;
    create_table(db, category::Entity).await?;
    create_table(db, item_size::Entity).await?;
    create_table(db, item::Entity).await?;
    create_table(db, item_size_details::Entity).await?;
    create_table(db, order::Entity).await?;
    create_table(db, item_order_details::Entity).await?;
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(backend.build(&statement)).await?;
    tracing::debug!("Ensured table {}", entity.table_name());
    Ok(())
}
