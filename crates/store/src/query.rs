use chrono::{DateTime, Utc};
use common::{Order, OrderStatus, UserId};

/// Builder for constructing order queries.
///
/// Allows filtering orders by owner, status and order date range. Results
/// are returned newest first.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Filter by owning user.
    pub user_id: Option<UserId>,

    /// Filter by fulfilment status.
    pub status: Option<OrderStatus>,

    /// Filter by orders placed at or after this timestamp.
    pub from_date: Option<DateTime<Utc>>,

    /// Filter by orders placed at or before this timestamp.
    pub to_date: Option<DateTime<Utc>>,

    /// Maximum number of orders to return.
    pub limit: Option<usize>,

    /// Number of orders to skip.
    pub offset: Option<usize>,
}

impl OrderQuery {
    /// Creates a new empty query matching every order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for the orders of one user.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    /// Creates a query for orders in a given status.
    pub fn for_status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Filters by owning user.
    pub fn user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Filters by status.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filters by orders placed at or after the given timestamp.
    pub fn from_date(mut self, date: DateTime<Utc>) -> Self {
        self.from_date = Some(date);
        self
    }

    /// Filters by orders placed at or before the given timestamp.
    pub fn to_date(mut self, date: DateTime<Utc>) -> Self {
        self.to_date = Some(date);
        self
    }

    /// Filters by an inclusive date range.
    pub fn date_range(self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from_date(from).to_date(to)
    }

    /// Limits the number of orders returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first N orders.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Selects one zero-based page of `size` orders.
    pub fn page(self, page: usize, size: usize) -> Self {
        self.offset(page.saturating_mul(size)).limit(size)
    }

    /// Returns true if the order passes every filter (paging excluded).
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(user_id) = self.user_id
            && order.user_id != user_id
        {
            return false;
        }
        if let Some(status) = self.status
            && order.status != status
        {
            return false;
        }
        if let Some(from) = self.from_date
            && order.order_date < from
        {
            return false;
        }
        if let Some(to) = self.to_date
            && order.order_date > to
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::{Money, NewOrder, OrderId, PaymentStatus};

    fn order_at(user: i64, status: OrderStatus, date: DateTime<Utc>) -> Order {
        Order::from_new(
            OrderId::new(1),
            NewOrder {
                user_id: UserId::new(user),
                order_date: date,
                status,
                payment_status: PaymentStatus::Pending,
                total_amount: Money::zero(),
                payment_method: None,
                shipping_address: None,
                transaction_id: None,
                items: vec![],
            },
        )
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let order = order_at(1, OrderStatus::Pending, Utc::now());
        assert!(OrderQuery::new().matches(&order));
    }

    #[test]
    fn test_user_and_status_filters() {
        let order = order_at(1, OrderStatus::Shipped, Utc::now());
        assert!(OrderQuery::for_user(UserId::new(1)).matches(&order));
        assert!(!OrderQuery::for_user(UserId::new(2)).matches(&order));
        assert!(OrderQuery::for_status(OrderStatus::Shipped).matches(&order));
        assert!(
            !OrderQuery::for_user(UserId::new(1))
                .status(OrderStatus::Pending)
                .matches(&order)
        );
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let now = Utc::now();
        let order = order_at(1, OrderStatus::Pending, now);
        assert!(OrderQuery::new().date_range(now, now).matches(&order));
        assert!(
            !OrderQuery::new()
                .from_date(now + Duration::seconds(1))
                .matches(&order)
        );
        assert!(
            !OrderQuery::new()
                .to_date(now - Duration::seconds(1))
                .matches(&order)
        );
    }

    #[test]
    fn test_page_sets_offset_and_limit() {
        let query = OrderQuery::new().page(2, 10);
        assert_eq!(query.offset, Some(20));
        assert_eq!(query.limit, Some(10));
    }
}
