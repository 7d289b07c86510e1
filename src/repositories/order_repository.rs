use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, instrument, warn};

use crate::entities::order::{
    ActiveModel as OrderActiveModel, Column, Entity as OrderEntity, Model as OrderModel,
};
use crate::entities::order_item::{
    ActiveModel as OrderItemActiveModel, Column as ItemColumn, Entity as OrderItemEntity,
    Model as OrderItemModel,
};
use crate::errors::ServiceError;
use crate::models::{
    canonicalize, FulfillmentMode, Order, OrderItem, PaymentMethod, PaymentStatus,
};
use crate::repositories::{BaseRepository, OrderStore, Repository};

/// sea-orm backed order store.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    async fn items_for(&self, order_ids: &[i32]) -> Result<Vec<OrderItemModel>, ServiceError> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }
        OrderItemEntity::find()
            .filter(ItemColumn::OrderId.is_in(order_ids.iter().copied()))
            .order_by_asc(ItemColumn::Id)
            .all(self.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }
}

impl Repository for OrderRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}

fn parse_stored<T: FromStr>(order_id: i32, field: &str, raw: &str) -> Result<T, ServiceError> {
    T::from_str(raw).map_err(|_| {
        ServiceError::InvalidStatus(format!(
            "order {} has unrecognised {} '{}'",
            order_id, field, raw
        ))
    })
}

/// Builds the engine's view of a stored row. The status string is resolved once here.
pub(crate) fn order_from_model(
    model: OrderModel,
    items: Vec<OrderItemModel>,
) -> Result<Order, ServiceError> {
    let status = canonicalize(&model.status, model.is_returned);
    if status.is_none() {
        warn!(
            order_id = model.id,
            stored_status = %model.status,
            "Order has an unrecognised status; treating it as terminal"
        );
    }

    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        status,
        fulfillment: parse_stored::<FulfillmentMode>(
            model.id,
            "fulfillment mode",
            &model.pickup_or_delivery,
        )?,
        payment_method: parse_stored::<PaymentMethod>(
            model.id,
            "payment method",
            &model.payment_method,
        )?,
        payment_status: parse_stored::<PaymentStatus>(
            model.id,
            "payment status",
            &model.payment_status,
        )?,
        stored_status: model.status,
        is_returned: model.is_returned,
        payment_proof_path: model.payment_proof_path,
        payment_reference: model.payment_reference,
        payment_rejection_reason: model.payment_rejection_reason,
        payment_submitted_at: model.payment_submitted_at,
        payment_approved_at: model.payment_approved_at,
        payment_approved_by: model.payment_approved_by,
        total_amount: model.total_amount,
        is_senior_discount: model.is_senior_discount,
        discount_amount: model.discount_amount,
        customer_name: model.customer_name,
        customer_phone: model.customer_phone,
        customer_email: model.customer_email,
        delivery_address: model.delivery_address,
        notes: model.notes,
        created_at: model.created_at,
        updated_at: model.updated_at,
        version: model.version,
        items: items
            .into_iter()
            .map(|item| OrderItem {
                id: item.id,
                order_id: item.order_id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.price,
                line_total: item.total_price,
            })
            .collect(),
    })
}

/// Columns the engine is allowed to change after checkout. Totals, customer details
/// and items are deliberately absent.
fn mutable_columns(order: &Order) -> OrderActiveModel {
    OrderActiveModel {
        status: Set(order.stored_status.clone()),
        is_returned: Set(order.is_returned),
        payment_status: Set(order.payment_status.to_string()),
        payment_proof_path: Set(order.payment_proof_path.clone()),
        payment_reference: Set(order.payment_reference.clone()),
        payment_rejection_reason: Set(order.payment_rejection_reason.clone()),
        payment_submitted_at: Set(order.payment_submitted_at),
        payment_approved_at: Set(order.payment_approved_at),
        payment_approved_by: Set(order.payment_approved_by),
        updated_at: Set(Some(Utc::now())),
        version: Set(order.version + 1),
        ..Default::default()
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    #[instrument(skip(self))]
    async fn load_order(&self, id: i32) -> Result<Order, ServiceError> {
        let model = OrderEntity::find_by_id(id)
            .one(self.get_db())
            .await
            .map_err(|e| {
                error!("Failed to fetch order {}: {}", id, e);
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::order_not_found(id))?;

        let items = self.items_for(&[id]).await?;
        order_from_model(model, items)
    }

    #[instrument(skip(self, order), fields(order_id = order.id, version = order.version))]
    async fn save_order(&self, order: &Order) -> Result<Order, ServiceError> {
        let result = OrderEntity::update_many()
            .set(mutable_columns(order))
            .filter(Column::Id.eq(order.id))
            .filter(Column::Version.eq(order.version))
            .exec(self.get_db())
            .await
            .map_err(|e| {
                error!("Failed to update order {}: {}", order.id, e);
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            let exists = OrderEntity::find_by_id(order.id)
                .one(self.get_db())
                .await?
                .is_some();
            if !exists {
                return Err(ServiceError::order_not_found(order.id));
            }
            warn!("Concurrent modification detected for order {}", order.id);
            return Err(ServiceError::ConcurrentModification(order.id));
        }

        self.load_order(order.id).await
    }

    #[instrument(skip(self, order), fields(items = order.items.len()))]
    async fn insert_order(&self, order: Order) -> Result<Order, ServiceError> {
        let txn = self.get_db().begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let inserted = OrderActiveModel {
            user_id: Set(order.user_id),
            status: Set(order.stored_status.clone()),
            is_returned: Set(order.is_returned),
            total_amount: Set(order.total_amount),
            pickup_or_delivery: Set(order.fulfillment.to_string()),
            notes: Set(order.notes.clone()),
            customer_name: Set(order.customer_name.clone()),
            customer_phone: Set(order.customer_phone.clone()),
            customer_email: Set(order.customer_email.clone()),
            delivery_address: Set(order.delivery_address.clone()),
            payment_method: Set(order.payment_method.to_string()),
            payment_proof_path: Set(order.payment_proof_path.clone()),
            payment_reference: Set(order.payment_reference.clone()),
            payment_status: Set(order.payment_status.to_string()),
            payment_rejection_reason: Set(order.payment_rejection_reason.clone()),
            payment_submitted_at: Set(order.payment_submitted_at),
            payment_approved_at: Set(order.payment_approved_at),
            payment_approved_by: Set(order.payment_approved_by),
            is_senior_discount: Set(order.is_senior_discount),
            discount_amount: Set(order.discount_amount),
            created_at: Set(order.created_at),
            updated_at: Set(None),
            version: Set(1),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!("Failed to insert order: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        for item in &order.items {
            OrderItemActiveModel {
                order_id: Set(inserted.id),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                price: Set(item.unit_price),
                total_price: Set(item.line_total),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(|e| {
                error!("Failed to insert item for order {}: {}", inserted.id, e);
                ServiceError::DatabaseError(e)
            })?;
        }

        txn.commit().await.map_err(|e| {
            error!("Failed to commit order {}: {}", inserted.id, e);
            ServiceError::DatabaseError(e)
        })?;

        self.load_order(inserted.id).await
    }

    #[instrument(skip(self))]
    async fn list_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, ServiceError> {
        let models = OrderEntity::find()
            .filter(Column::CreatedAt.between(start, end))
            .order_by_desc(Column::CreatedAt)
            .all(self.get_db())
            .await?;

        let ids: Vec<i32> = models.iter().map(|m| m.id).collect();
        let mut items_by_order: HashMap<i32, Vec<OrderItemModel>> = HashMap::new();
        for item in self.items_for(&ids).await? {
            items_by_order.entry(item.order_id).or_default().push(item);
        }

        models
            .into_iter()
            .map(|model| {
                let items = items_by_order.remove(&model.id).unwrap_or_default();
                order_from_model(model, items)
            })
            .collect()
    }
}
