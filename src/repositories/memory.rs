use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::errors::ServiceError;
use crate::models::Order;
use crate::repositories::OrderStore;

/// Process-local order store. Used by tests and by the CLI's dry-run mode.
#[derive(Debug)]
pub struct InMemoryOrderStore {
    orders: DashMap<i32, Order>,
    next_id: AtomicI32,
    next_item_id: AtomicI32,
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            next_id: AtomicI32::new(1),
            next_item_id: AtomicI32::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn load_order(&self, id: i32) -> Result<Order, ServiceError> {
        self.orders
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::order_not_found(id))
    }

    async fn save_order(&self, order: &Order) -> Result<Order, ServiceError> {
        let mut entry = self
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| ServiceError::order_not_found(order.id))?;

        if entry.version != order.version {
            return Err(ServiceError::ConcurrentModification(order.id));
        }

        // Totals, customer details and items are fixed after checkout.
        let stored = entry.value_mut();
        stored.status = order.status;
        stored.stored_status = order.stored_status.clone();
        stored.is_returned = order.is_returned;
        stored.payment_status = order.payment_status;
        stored.payment_proof_path = order.payment_proof_path.clone();
        stored.payment_reference = order.payment_reference.clone();
        stored.payment_rejection_reason = order.payment_rejection_reason.clone();
        stored.payment_submitted_at = order.payment_submitted_at;
        stored.payment_approved_at = order.payment_approved_at;
        stored.payment_approved_by = order.payment_approved_by;
        stored.updated_at = Some(Utc::now());
        stored.version += 1;

        Ok(stored.clone())
    }

    async fn insert_order(&self, mut order: Order) -> Result<Order, ServiceError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        order.id = id;
        order.version = 1;
        order.updated_at = None;
        for item in order.items.iter_mut() {
            item.id = self.next_item_id.fetch_add(1, Ordering::SeqCst);
            item.order_id = id;
        }
        self.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn list_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, ServiceError> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.created_at >= start && entry.created_at <= end)
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::order::test_support::order_with_status;
    use crate::models::OrderStatus;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn save_is_a_compare_and_swap_on_version() {
        let store = InMemoryOrderStore::new();
        let order = store.insert_order(order_with_status("pending")).await.unwrap();

        let mut first = order.clone();
        first.set_status(OrderStatus::Approved);
        let saved = store.save_order(&first).await.unwrap();
        assert_eq!(saved.version, 2);

        let mut stale = order.clone();
        stale.set_status(OrderStatus::Rejected);
        assert_matches!(
            store.save_order(&stale).await,
            Err(ServiceError::ConcurrentModification(id)) if id == order.id
        );
        assert_eq!(store.load_order(order.id).await.unwrap().stored_status, "approved");
    }

    #[tokio::test]
    async fn keeps_legacy_status_strings_verbatim() {
        let store = InMemoryOrderStore::new();
        let order = store
            .insert_order(order_with_status("payment_approved"))
            .await
            .unwrap();
        let mut loaded = store.load_order(order.id).await.unwrap();
        loaded.notes = Some("ignored".into());
        let saved = store.save_order(&loaded).await.unwrap();
        assert_eq!(saved.stored_status, "payment_approved");
        assert_eq!(saved.status, Some(OrderStatus::Approved));
        assert_eq!(saved.notes, None);
    }

    #[tokio::test]
    async fn missing_orders_are_not_found() {
        let store = InMemoryOrderStore::new();
        assert_matches!(store.load_order(99).await, Err(ServiceError::NotFound(_)));
        let ghost = order_with_status("pending");
        assert_matches!(store.save_order(&ghost).await, Err(ServiceError::NotFound(_)));
    }
}
