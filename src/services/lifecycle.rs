use sea_orm::{prelude::DateTimeUtc, ActiveModelTrait, ConnectionTrait, DbErr, IntoActiveModel};

use crate::entities::order::{self, Status};
use crate::error::ApiError;

impl Status {
    /// The step `advance` moves to, if any. Delivered and Cancelled are terminal.
    pub fn next(self) -> Option<Status> {
        match self {
            Status::Picked => Some(Status::Cooking),
            Status::Cooking => Some(Status::Ready),
            Status::Ready => Some(Status::OnTheWay),
            Status::OnTheWay => Some(Status::Delivered),
            Status::Delivered | Status::Cancelled => None,
        }
    }

    pub fn can_cancel(self) -> bool {
        self < Status::OnTheWay
    }
}

/// Moves the order one step forward and stamps the matching timestamp.
/// Returns `false` and leaves the order untouched at a terminal status.
pub fn advance(order: &mut order::Model, now: DateTimeUtc) -> bool {
    let Some(next) = order.status.next() else {
        return false;
    };

    order.status = next;
    match next {
        Status::Cooking => order.cooked_at = Some(now),
        Status::Ready => order.ready_at = Some(now),
        Status::OnTheWay => order.on_the_way_at = Some(now),
        Status::Delivered => order.delivered_at = Some(now),
        Status::Picked | Status::Cancelled => {}
    }
    order.modified = now;
    true
}

pub fn cancel(order: &mut order::Model, now: DateTimeUtc) -> Result<(), ApiError> {
    if !order.status.can_cancel() {
        return Err(ApiError::InvalidTransition);
    }
    order.status = Status::Cancelled;
    order.modified = now;
    Ok(())
}

pub async fn persist<C: ConnectionTrait>(db: &C, order: order::Model) -> Result<order::Model, DbErr> {
    order.into_active_model().reset_all().update(db).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn picked_order() -> order::Model {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        order::Model {
            id: 1,
            customer_id: 1,
            restaurant_id: 1,
            address: "Cairo".to_string(),
            status: Status::Picked,
            total_price: 0,
            cooked_at: None,
            ready_at: None,
            on_the_way_at: None,
            delivered_at: None,
            created,
            modified: created,
        }
    }

    #[test]
    fn advance_walks_to_delivered_stamping_each_step() {
        let mut order = picked_order();
        let t = |minute| Utc.with_ymd_and_hms(2024, 1, 1, 12, minute, 0).unwrap();

        assert!(advance(&mut order, t(1)));
        assert_eq!(order.status, Status::Cooking);
        assert_eq!(order.cooked_at, Some(t(1)));
        assert_eq!(order.ready_at, None);

        assert!(advance(&mut order, t(2)));
        assert_eq!(order.status, Status::Ready);
        assert_eq!(order.ready_at, Some(t(2)));
        assert_eq!(order.on_the_way_at, None);

        assert!(advance(&mut order, t(3)));
        assert_eq!(order.status, Status::OnTheWay);
        assert_eq!(order.on_the_way_at, Some(t(3)));
        assert_eq!(order.delivered_at, None);

        assert!(advance(&mut order, t(4)));
        assert_eq!(order.status, Status::Delivered);
        assert_eq!(order.delivered_at, Some(t(4)));

        let before = order.clone();
        assert!(!advance(&mut order, t(5)));
        assert_eq!(order, before);
    }

    #[test]
    fn cancelled_order_does_not_advance() {
        let mut order = picked_order();
        order.status = Status::Cancelled;
        let before = order.clone();

        assert!(!advance(&mut order, Utc::now()));
        assert_eq!(order, before);
    }

    #[test]
    fn cancel_allowed_before_dispatch() {
        for status in [Status::Picked, Status::Cooking, Status::Ready] {
            let mut order = picked_order();
            order.status = status;
            assert!(cancel(&mut order, Utc::now()).is_ok());
            assert_eq!(order.status, Status::Cancelled);
        }
    }

    #[test]
    fn cancel_refused_once_dispatched_or_terminal() {
        for status in [Status::OnTheWay, Status::Delivered, Status::Cancelled] {
            let mut order = picked_order();
            order.status = status;
            let err = cancel(&mut order, Utc::now()).unwrap_err();
            assert_eq!(err.to_string(), "Can't cancel this order");
            assert_eq!(order.status, status);
        }
    }
}
