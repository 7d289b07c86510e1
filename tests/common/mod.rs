#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use rmp_backoffice::{
    audit::InMemoryAuditSink,
    models::{canonicalize, FulfillmentMode, Order, OrderItem, PaymentMethod, PaymentStatus},
    repositories::{InMemoryOrderStore, OrderStore},
    services::OrderLifecycleService,
};
use rust_decimal_macros::dec;

pub const CUSTOMER_ID: i32 = 42;
pub const ADMIN_ID: i32 = 1;

pub struct TestEngine {
    pub service: OrderLifecycleService,
    pub store: Arc<InMemoryOrderStore>,
    pub audit: Arc<InMemoryAuditSink>,
}

impl TestEngine {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryOrderStore::new());
        let audit = Arc::new(InMemoryAuditSink::new());
        let service = OrderLifecycleService::new(store.clone(), audit.clone());
        Self {
            service,
            store,
            audit,
        }
    }

    /// Inserts an order whose stored status string is `raw`, exactly as written.
    pub async fn seed(&self, raw: &str, method: PaymentMethod, payment: PaymentStatus) -> Order {
        let mut order = order_fixture(raw);
        order.payment_method = method;
        order.payment_status = payment;
        self.store.insert_order(order).await.unwrap()
    }
}

pub fn order_fixture(raw: &str) -> Order {
    Order {
        id: 0,
        user_id: Some(CUSTOMER_ID),
        status: canonicalize(raw, false),
        stored_status: raw.to_string(),
        is_returned: false,
        fulfillment: FulfillmentMode::Pickup,
        payment_method: PaymentMethod::Qr,
        payment_status: PaymentStatus::Pending,
        payment_proof_path: None,
        payment_reference: None,
        payment_rejection_reason: None,
        payment_submitted_at: None,
        payment_approved_at: None,
        payment_approved_by: None,
        total_amount: dec!(100),
        is_senior_discount: false,
        discount_amount: dec!(0),
        customer_name: "Maria Santos".to_string(),
        customer_phone: Some("09171234567".to_string()),
        customer_email: Some("maria@example.com".to_string()),
        delivery_address: None,
        notes: None,
        created_at: Utc::now(),
        updated_at: None,
        version: 1,
        items: vec![OrderItem {
            id: 0,
            order_id: 0,
            product_id: 7,
            quantity: 2,
            unit_price: dec!(50),
            line_total: dec!(100),
        }],
    }
}
