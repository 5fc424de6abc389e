pub mod auth;
pub mod category;
pub mod extract;
pub mod item;
pub mod item_size;
pub mod order;
pub mod restaurant;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use sea_orm::{ConnectionTrait, EntityTrait, FromQueryResult, PaginatorTrait, QuerySelect, Select};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::ApiError;
use crate::middleware::auth::{auth_middleware, AuthState};
use crate::middleware::logging::logging_middleware;

use auth::auth_router;
use category::category_router;
use item::item_router;
use item_size::item_size_router;
use order::order_router;
use restaurant::restaurant_router;

const DEFAULT_PAGE_SIZE: u64 = 10;
const MAX_PAGE_SIZE: u64 = 100;

pub fn create_api_router(shared_db: Arc<sea_orm::DatabaseConnection>, config: Arc<Config>) -> Router {
    let auth_state = AuthState {
        db: shared_db.clone(),
        secret: config.secret.clone(),
    };

    let protected = Router::new()
        .merge(restaurant_router(shared_db.clone()))
        .merge(category_router(shared_db.clone()))
        .merge(item_size_router(shared_db.clone()))
        .merge(item_router(shared_db.clone()))
        .merge(order_router(shared_db.clone()))
        .layer(from_fn_with_state(auth_state, auth_middleware));

    Router::new()
        .nest("/api/auth", auth_router(shared_db, config))
        .nest("/api", protected)
        .layer(from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}

#[derive(Deserialize, Debug, Default)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl PageQuery {
    fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    fn page_size(&self) -> u64 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    // SQLite binds OFFSET as a signed 64-bit integer.
    fn offset(&self) -> Result<u64, ApiError> {
        (self.page() - 1)
            .checked_mul(self.page_size())
            .filter(|offset| i64::try_from(*offset).is_ok())
            .ok_or_else(|| ApiError::field("page", "max_value", "Page number is too large."))
    }
}

#[derive(Serialize, Debug)]
pub struct Paginated<T> {
    pub count: u64,
    pub page: u64,
    pub page_size: u64,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            count: self.count,
            page: self.page,
            page_size: self.page_size,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

/// Runs `select` for one page; `count` is the size of the whole result set.
pub async fn paginate<C, E>(
    db: &C,
    select: Select<E>,
    query: &PageQuery,
) -> Result<Paginated<E::Model>, ApiError>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: FromQueryResult + Send + Sync + 'static,
{
    let page = query.page();
    let page_size = query.page_size();
    let offset = query.offset()?;

    let count = select.clone().count(db).await?;
    let results = select
        .limit(page_size)
        .offset(offset)
        .all(db)
        .await?;

    Ok(Paginated {
        count,
        page,
        page_size,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: u64, page_size: u64) -> PageQuery {
        PageQuery {
            page: Some(page),
            page_size: Some(page_size),
        }
    }

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(query(1, 0).page_size(), 1);
        assert_eq!(query(1, 5000).page_size(), MAX_PAGE_SIZE);
        assert_eq!(PageQuery::default().page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(query(0, 10).page(), 1);
    }

    #[test]
    fn offset_stays_within_sqlite_range() {
        assert_eq!(query(3, 10).offset().unwrap(), 20);
        assert_eq!(query(92_233_720_368_547_759, 100).offset().unwrap(), 9_223_372_036_854_775_800);
        assert!(query(92_233_720_368_547_760, 100).offset().is_err());
        assert!(query(u64::MAX, 100).offset().is_err());
    }
}
