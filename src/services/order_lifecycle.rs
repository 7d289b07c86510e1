use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::{
    audit::{
        record_best_effort, AuditEntry, AuditSink, ACTION_ORDER_CREATED,
        ACTION_ORDER_STATUS_UPDATED, ACTION_PAYMENT_APPROVED, ACTION_PAYMENT_REJECTED,
        ACTION_PAYMENT_SUBMITTED,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::{ORDERS_PLACED, ORDER_TRANSITIONS, ORDER_TRANSITION_FAILURES, PAYMENT_REVIEWS},
    models::{
        order::calculate_senior_discount, Actor, NewOrder, Order, OrderItem, OrderStatus,
        OrderView, PaymentStatus,
    },
    repositories::OrderStore,
};

/// 20% off for senior citizens and persons with disability.
pub const DEFAULT_SENIOR_DISCOUNT_RATE: Decimal = Decimal::from_parts(20, 0, 0, false, 2);

/// Input for rejecting a submitted payment.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RejectPaymentCommand {
    pub order_id: i32,
    #[validate(length(
        min = 1,
        max = 500,
        message = "Rejection reason must be between 1 and 500 characters"
    ))]
    pub reason: String,
}

/// Input for a customer (or staff on their behalf) handing in proof of payment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SubmitPaymentCommand {
    pub order_id: i32,
    #[validate(length(max = 255, message = "Proof path is too long"))]
    pub proof_path: Option<String>,
    #[validate(length(max = 100, message = "Payment reference is too long"))]
    pub reference: Option<String>,
}

/// Drives orders through their lifecycle and the payment review that runs beside it.
///
/// Every call takes the acting user explicitly. Writes go through
/// [`OrderStore::save_order`], so two callers racing on the same order cannot both win.
#[derive(Clone)]
pub struct OrderLifecycleService {
    store: Arc<dyn OrderStore>,
    audit: Arc<dyn AuditSink>,
    events: Option<EventSender>,
    senior_discount_rate: Decimal,
}

impl OrderLifecycleService {
    pub fn new(store: Arc<dyn OrderStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            store,
            audit,
            events: None,
            senior_discount_rate: DEFAULT_SENIOR_DISCOUNT_RATE,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_senior_discount_rate(mut self, rate: Decimal) -> Self {
        self.senior_discount_rate = rate;
        self
    }

    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    /// Loads an order and renders its presentation snapshot.
    #[instrument(skip(self))]
    pub async fn view(&self, order_id: i32) -> Result<OrderView, ServiceError> {
        let order = self.store.load_order(order_id).await?;
        Ok(OrderView::from(&order))
    }

    /// Moves an order to `target`.
    ///
    /// Only staff may change status. When `expected_version` is given the call fails
    /// with `ConcurrentModification` if the order has moved on since the caller read it.
    /// Payment state is not consulted here.
    #[instrument(skip(self, actor), fields(actor_id = ?actor.user_id))]
    pub async fn apply_transition(
        &self,
        order_id: i32,
        target: OrderStatus,
        actor: &Actor,
        expected_version: Option<i32>,
    ) -> Result<Order, ServiceError> {
        require_staff(actor, "change order status")?;

        let mut order = self.store.load_order(order_id).await?;

        if let Some(expected) = expected_version {
            if expected != order.version {
                ORDER_TRANSITION_FAILURES
                    .with_label_values(&["stale_version"])
                    .inc();
                warn!(
                    expected,
                    actual = order.version,
                    "Order {} changed since it was read",
                    order_id
                );
                return Err(ServiceError::ConcurrentModification(order_id));
            }
        }

        if !order.can_transition_to(target) {
            ORDER_TRANSITION_FAILURES
                .with_label_values(&["invalid_transition"])
                .inc();
            warn!(
                "Rejected transition of order {} from '{}' to '{}'",
                order_id, order.stored_status, target
            );
            return Err(ServiceError::InvalidTransition {
                from: order.status_token(),
                to: target,
            });
        }

        let old_label = order.status_label();
        let old_token = order.status_token();
        order.set_status(target);

        let saved = self.store.save_order(&order).await.map_err(|e| {
            let error_type = match &e {
                ServiceError::ConcurrentModification(_) => "concurrent_modification",
                ServiceError::NotFound(_) => "not_found",
                _ => "storage",
            };
            ORDER_TRANSITION_FAILURES
                .with_label_values(&[error_type])
                .inc();
            error!("Failed to save transition of order {}: {}", order_id, e);
            e
        })?;

        ORDER_TRANSITIONS.with_label_values(&[target.as_ref()]).inc();
        info!(
            "Order {} status updated from '{}' to '{}'",
            order_id, old_token, target
        );

        let description = format!(
            "Order {} status changed from {} to {}",
            saved.invoice_number(),
            old_label,
            saved.status_label()
        );
        record_best_effort(
            self.audit.as_ref(),
            AuditEntry::for_order(actor, ACTION_ORDER_STATUS_UPDATED, description, order_id),
        )
        .await;

        self.emit(Event::OrderStatusChanged {
            order_id,
            from: old_token,
            to: target,
            actor_id: actor.user_id,
            at: Utc::now(),
        });

        Ok(saved)
    }

    /// Records a proof of payment. Allowed while payment is pending or after a
    /// rejection; QR payments must carry a proof path.
    #[instrument(skip(self, actor, command), fields(order_id = command.order_id, actor_id = ?actor.user_id))]
    pub async fn submit_payment_proof(
        &self,
        command: SubmitPaymentCommand,
        actor: &Actor,
    ) -> Result<Order, ServiceError> {
        command.validate()?;

        let mut order = self.store.load_order(command.order_id).await?;
        if !actor.can_act_for(order.user_id) {
            return Err(ServiceError::Forbidden(format!(
                "Not allowed to submit payment for order {}",
                order.id
            )));
        }

        if !order.payment_status.accepts_submission() {
            return Err(ServiceError::InvalidPaymentTransition(format!(
                "Payment for order {} is {} and cannot be resubmitted",
                order.id, order.payment_status
            )));
        }

        let proof_path = command
            .proof_path
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        if order.payment_method.requires_proof() && proof_path.is_none() {
            return Err(ServiceError::ValidationError(
                "A payment proof is required for QR payments".to_string(),
            ));
        }

        let resubmission = order.payment_status == PaymentStatus::Rejected;
        order.payment_status = PaymentStatus::Submitted;
        if proof_path.is_some() {
            order.payment_proof_path = proof_path;
        }
        if command.reference.is_some() {
            order.payment_reference = command.reference;
        }
        order.payment_submitted_at = Some(Utc::now());
        order.payment_rejection_reason = None;

        let saved = self.store.save_order(&order).await?;
        PAYMENT_REVIEWS.with_label_values(&["submitted"]).inc();
        info!(resubmission, "Payment proof submitted for order {}", saved.id);

        let description = if resubmission {
            format!("Payment proof resubmitted for order {}", saved.invoice_number())
        } else {
            format!("Payment proof submitted for order {}", saved.invoice_number())
        };
        record_best_effort(
            self.audit.as_ref(),
            AuditEntry::for_order(actor, ACTION_PAYMENT_SUBMITTED, description, saved.id),
        )
        .await;

        self.emit(Event::PaymentSubmitted {
            order_id: saved.id,
            method: saved.payment_method,
            at: Utc::now(),
        });

        Ok(saved)
    }

    /// Marks the payment approved. The order's status is left alone.
    #[instrument(skip(self, actor), fields(actor_id = ?actor.user_id))]
    pub async fn approve_payment(&self, order_id: i32, actor: &Actor) -> Result<Order, ServiceError> {
        require_staff(actor, "approve payments")?;

        let mut order = self.store.load_order(order_id).await?;
        ensure_reviewable(&order, "approved")?;

        order.payment_status = PaymentStatus::Approved;
        order.payment_approved_at = Some(Utc::now());
        order.payment_approved_by = actor.user_id;
        order.payment_rejection_reason = None;

        let saved = self.store.save_order(&order).await?;
        PAYMENT_REVIEWS.with_label_values(&["approved"]).inc();
        info!("Payment approved for order {}", order_id);

        let description = format!("Payment approved for order {}", saved.invoice_number());
        record_best_effort(
            self.audit.as_ref(),
            AuditEntry::for_order(actor, ACTION_PAYMENT_APPROVED, description, order_id),
        )
        .await;

        self.emit(Event::PaymentApproved {
            order_id,
            approved_by: actor.user_id,
            at: Utc::now(),
        });

        Ok(saved)
    }

    /// Marks the payment rejected with a mandatory reason. The order's status is left
    /// alone; the customer may resubmit.
    #[instrument(skip(self, actor, command), fields(order_id = command.order_id, actor_id = ?actor.user_id))]
    pub async fn reject_payment(
        &self,
        command: RejectPaymentCommand,
        actor: &Actor,
    ) -> Result<Order, ServiceError> {
        require_staff(actor, "reject payments")?;
        if command.reason.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Rejection reason is required".to_string(),
            ));
        }
        command.validate()?;

        let mut order = self.store.load_order(command.order_id).await?;
        ensure_reviewable(&order, "rejected")?;

        order.payment_status = PaymentStatus::Rejected;
        order.payment_rejection_reason = Some(command.reason.clone());

        let saved = self.store.save_order(&order).await?;
        PAYMENT_REVIEWS.with_label_values(&["rejected"]).inc();
        info!("Payment rejected for order {}", saved.id);

        let description = format!(
            "Payment rejected for order {}: {}",
            saved.invoice_number(),
            command.reason
        );
        record_best_effort(
            self.audit.as_ref(),
            AuditEntry::for_order(actor, ACTION_PAYMENT_REJECTED, description, saved.id),
        )
        .await;

        self.emit(Event::PaymentRejected {
            order_id: saved.id,
            reason: command.reason,
            at: Utc::now(),
        });

        Ok(saved)
    }

    /// Creates an order from checkout input. Line prices are captured as given.
    #[instrument(skip(self, new_order, actor), fields(items = new_order.items.len(), actor_id = ?actor.user_id))]
    pub async fn place_order(&self, new_order: NewOrder, actor: &Actor) -> Result<Order, ServiceError> {
        new_order.validate()?;
        if new_order.customer_name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Customer name is required".to_string(),
            ));
        }
        if new_order.items.is_empty() {
            return Err(ServiceError::InvalidInput(
                "An order needs at least one item".to_string(),
            ));
        }
        if let Some(item) = new_order.items.iter().find(|i| i.quantity < 1) {
            return Err(ServiceError::InvalidInput(format!(
                "Quantity for product {} must be at least 1",
                item.product_id
            )));
        }
        if let Some(item) = new_order.items.iter().find(|i| i.unit_price < Decimal::ZERO) {
            return Err(ServiceError::InvalidInput(format!(
                "Price for product {} cannot be negative",
                item.product_id
            )));
        }

        for item in &new_order.items {
            item.validate()?;
        }

        let line_totals = new_order
            .items
            .iter()
            .map(|item| item.line_total().ok_or_else(|| amount_overflow(item.product_id)))
            .collect::<Result<Vec<Decimal>, ServiceError>>()?;
        let subtotal = line_totals
            .iter()
            .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(*line))
            .ok_or_else(|| {
                ServiceError::InvalidInput("Order total is too large".to_string())
            })?;
        let discount_amount = if new_order.is_senior_discount {
            calculate_senior_discount(subtotal, self.senior_discount_rate)
        } else {
            Decimal::ZERO
        };

        let proof_path = new_order
            .payment_proof_path
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        let now = Utc::now();
        let (payment_status, payment_submitted_at) = match proof_path {
            Some(_) => (PaymentStatus::Submitted, Some(now)),
            None => (PaymentStatus::Pending, None),
        };

        let order = Order {
            id: 0,
            user_id: if actor.is_staff() {
                new_order.user_id.or(actor.user_id)
            } else {
                actor.user_id
            },
            status: Some(OrderStatus::Pending),
            stored_status: OrderStatus::Pending.to_string(),
            is_returned: false,
            fulfillment: new_order.fulfillment,
            payment_method: new_order.payment_method,
            payment_status,
            payment_proof_path: proof_path,
            payment_reference: new_order.payment_reference,
            payment_rejection_reason: None,
            payment_submitted_at,
            payment_approved_at: None,
            payment_approved_by: None,
            total_amount: subtotal - discount_amount,
            is_senior_discount: new_order.is_senior_discount,
            discount_amount,
            customer_name: new_order.customer_name.trim().to_string(),
            customer_phone: new_order.customer_phone,
            customer_email: new_order.customer_email,
            delivery_address: new_order.delivery_address,
            notes: new_order.notes,
            created_at: now,
            updated_at: None,
            version: 1,
            items: new_order
                .items
                .iter()
                .zip(line_totals)
                .map(|(item, line_total)| OrderItem {
                    id: 0,
                    order_id: 0,
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    line_total,
                })
                .collect(),
        };

        let created = self.store.insert_order(order).await?;
        ORDERS_PLACED.inc();
        info!(
            "Order {} created ({} items, total {})",
            created.invoice_number(),
            created.items.len(),
            created.total_amount
        );

        let description = format!(
            "Order {} placed by {}",
            created.invoice_number(),
            created.customer_name
        );
        record_best_effort(
            self.audit.as_ref(),
            AuditEntry::for_order(actor, ACTION_ORDER_CREATED, description, created.id),
        )
        .await;

        self.emit(Event::OrderCreated {
            order_id: created.id,
            invoice_number: created.invoice_number(),
            at: now,
        });

        Ok(created)
    }

    fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            events.send_or_log(event);
        }
    }
}

fn require_staff(actor: &Actor, action: &str) -> Result<(), ServiceError> {
    if actor.is_staff() {
        Ok(())
    } else {
        warn!(actor_id = ?actor.user_id, role = %actor.role, "Denied attempt to {}", action);
        Err(ServiceError::Forbidden(format!("Only staff may {}", action)))
    }
}

fn amount_overflow(product_id: i32) -> ServiceError {
    ServiceError::InvalidInput(format!(
        "Line amount for product {} is too large",
        product_id
    ))
}

fn ensure_reviewable(order: &Order, outcome: &str) -> Result<(), ServiceError> {
    if order.payment_status.is_reviewable(order.payment_method) {
        Ok(())
    } else {
        Err(ServiceError::InvalidPaymentTransition(format!(
            "{} payment for order {} is {} and cannot be {}",
            order.payment_method.label(),
            order.id,
            order.payment_status,
            outcome
        )))
    }
}
