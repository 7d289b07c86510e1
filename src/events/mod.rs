use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{error, info, warn};

use crate::metrics::EVENTS_DROPPED;
use crate::models::{OrderStatus, PaymentMethod};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with the receiving end of a bounded channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Hands an event to the consumer without waiting. A full or closed channel drops
    /// the event with a warning; callers have already committed their change.
    pub fn send_or_log(&self, event: Event) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                EVENTS_DROPPED.with_label_values(&["full"]).inc();
                warn!(
                    order_id = event.order_id(),
                    "Event channel full; dropping {} event",
                    event.name()
                );
            }
            Err(TrySendError::Closed(event)) => {
                EVENTS_DROPPED.with_label_values(&["closed"]).inc();
                warn!(
                    order_id = event.order_id(),
                    "Event channel closed; dropping {} event",
                    event.name()
                );
            }
        }
    }
}

/// Domain events emitted after a change has been committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: i32,
        invoice_number: String,
        at: DateTime<Utc>,
    },
    OrderStatusChanged {
        order_id: i32,
        from: String,
        to: OrderStatus,
        actor_id: Option<i32>,
        at: DateTime<Utc>,
    },
    PaymentSubmitted {
        order_id: i32,
        method: PaymentMethod,
        at: DateTime<Utc>,
    },
    PaymentApproved {
        order_id: i32,
        approved_by: Option<i32>,
        at: DateTime<Utc>,
    },
    PaymentRejected {
        order_id: i32,
        reason: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn order_id(&self) -> i32 {
        match self {
            Event::OrderCreated { order_id, .. }
            | Event::OrderStatusChanged { order_id, .. }
            | Event::PaymentSubmitted { order_id, .. }
            | Event::PaymentApproved { order_id, .. }
            | Event::PaymentRejected { order_id, .. } => *order_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::OrderCreated { .. } => "order_created",
            Event::OrderStatusChanged { .. } => "order_status_changed",
            Event::PaymentSubmitted { .. } => "payment_submitted",
            Event::PaymentApproved { .. } => "payment_approved",
            Event::PaymentRejected { .. } => "payment_rejected",
        }
    }
}

// Handlers run after the change is durable; their failures never roll anything back.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: &Event) -> Result<(), String>;
}

/// Writes every event to the log. Installed by the CLI when nothing else listens.
pub struct LoggingEventHandler;

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn handle_event(&self, event: &Event) -> Result<(), String> {
        match event {
            Event::OrderStatusChanged { order_id, from, to, .. } => {
                info!(order_id, from = %from, to = %to, "Order status changed");
            }
            Event::PaymentRejected { order_id, reason, .. } => {
                info!(order_id, reason = %reason, "Payment rejected");
            }
            other => info!(order_id = other.order_id(), event = other.name(), "Order event"),
        }
        Ok(())
    }
}

/// Drains `rx`, dispatching each event to every handler in turn.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, handlers: Vec<Arc<dyn EventHandler>>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        for handler in &handlers {
            if let Err(e) = handler.handle_event(&event).await {
                error!(
                    "Failed to handle {} event: order_id={}, error={}",
                    event.name(),
                    event.order_id(),
                    e
                );
            }
        }
    }

    info!("Event channel closed; stopping event processing");
}
