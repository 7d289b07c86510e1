use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::{errors::ServiceError, models::Order};

pub mod memory;
pub mod order_repository;

pub use memory::InMemoryOrderStore;
pub use order_repository::OrderRepository;

/// Persistence collaborator of the lifecycle engine.
///
/// Implementations must keep stored status strings verbatim and must make
/// `save_order` a compare-and-swap on `Order::version`.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Loads one order with its items, or `ServiceError::NotFound`.
    async fn load_order(&self, id: i32) -> Result<Order, ServiceError>;

    /// Persists the mutable fields of `order` if the stored version still equals
    /// `order.version`, and returns the saved order with its version bumped.
    /// A version mismatch yields `ServiceError::ConcurrentModification`.
    async fn save_order(&self, order: &Order) -> Result<Order, ServiceError>;

    /// Inserts a new order and its items atomically; the id in `order` is ignored.
    async fn insert_order(&self, order: Order) -> Result<Order, ServiceError>;

    /// Orders created in `[start, end]`, newest first.
    async fn list_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, ServiceError>;
}

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}
