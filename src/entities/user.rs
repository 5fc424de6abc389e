use sea_orm::entity::prelude::*;

use argon2::{password_hash::PasswordVerifier, Argon2, PasswordHash};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    pub password: String,
    pub name: String,
    pub address: String,
    pub created: DateTimeUtc,
}

impl Model {
    pub fn check_hash(&self, password: &str) -> Result<(), String> {
        let parsed_hash =
            PasswordHash::new(&self.password).map_err(|_| "Stored password hash is malformed")?;

        let argon2 = Argon2::default();
        argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| "Password verification failed")?;

        Ok(())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
