//! Prometheus counters for the order workflow.
//!
//! Counters live in a crate-local [`Registry`] so embedding applications can merge
//! them into their own exposition endpoint via [`gather_text`].

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref ORDER_TRANSITIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("order_transitions_total", "Applied order status transitions"),
        &["to"]
    )
    .expect("metric can be created");
    pub static ref ORDER_TRANSITION_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "order_transition_failures_total",
            "Rejected or failed order status transitions"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
    pub static ref PAYMENT_REVIEWS: IntCounterVec = IntCounterVec::new(
        Opts::new("payment_reviews_total", "Payment proof submissions and reviews"),
        &["outcome"]
    )
    .expect("metric can be created");
    pub static ref ORDERS_PLACED: IntCounter =
        IntCounter::new("orders_placed_total", "Orders created at checkout")
            .expect("metric can be created");
    pub static ref AUDIT_FAILURES: IntCounter = IntCounter::new(
        "audit_record_failures_total",
        "Audit entries that could not be written"
    )
    .expect("metric can be created");
    pub static ref EVENTS_DROPPED: IntCounterVec = IntCounterVec::new(
        Opts::new("events_dropped_total", "Domain events not handed to the consumer"),
        &["reason"]
    )
    .expect("metric can be created");
}

/// Registers all counters with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(ORDER_TRANSITIONS.clone()),
        Box::new(ORDER_TRANSITION_FAILURES.clone()),
        Box::new(PAYMENT_REVIEWS.clone()),
        Box::new(ORDERS_PLACED.clone()),
        Box::new(AUDIT_FAILURES.clone()),
        Box::new(EVENTS_DROPPED.clone()),
    ];
    for collector in collectors {
        if let Err(e) = REGISTRY.register(collector) {
            if !matches!(e, prometheus::Error::AlreadyReg) {
                error!("Failed to register metric: {}", e);
            }
        }
    }
}

/// Text exposition of the registry.
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
