//! Payment proof submission and review, and their independence from order status.

mod common;

use assert_matches::assert_matches;
use common::{TestEngine, ADMIN_ID, CUSTOMER_ID};
use rmp_backoffice::{
    audit::{ACTION_ORDER_CREATED, ACTION_PAYMENT_REJECTED, ACTION_PAYMENT_SUBMITTED},
    errors::ServiceError,
    models::{Actor, FulfillmentMode, NewOrder, NewOrderItem, OrderStatus, PaymentMethod, PaymentStatus},
    repositories::OrderStore,
    services::{RejectPaymentCommand, SubmitPaymentCommand},
};
use rust_decimal_macros::dec;

fn reject(order_id: i32, reason: &str) -> RejectPaymentCommand {
    RejectPaymentCommand {
        order_id,
        reason: reason.to_string(),
    }
}

#[tokio::test]
async fn rejecting_a_payment_leaves_the_order_pending() {
    let engine = TestEngine::new();
    let order = engine
        .seed("pending", PaymentMethod::Qr, PaymentStatus::Submitted)
        .await;
    assert_eq!(order.id, 1);

    let rejected = engine
        .service
        .reject_payment(reject(order.id, "blurry proof"), &Actor::admin(ADMIN_ID))
        .await
        .unwrap();

    assert_eq!(rejected.payment_status, PaymentStatus::Rejected);
    assert_eq!(rejected.payment_rejection_reason.as_deref(), Some("blurry proof"));
    assert_eq!(rejected.status, Some(OrderStatus::Pending));
    assert_eq!(rejected.stored_status, "pending");

    let entries = engine.audit.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].action.contains("rejected"));
    assert_eq!(entries[0].action, ACTION_PAYMENT_REJECTED);
    assert!(entries[0].description.contains("blurry proof"));
    assert_eq!(entries[0].actor_id, Some(ADMIN_ID));

    // Status and payment review are independent.
    assert!(rejected.can_transition_to(OrderStatus::Approved));
    let approved = engine
        .service
        .apply_transition(order.id, OrderStatus::Approved, &Actor::admin(ADMIN_ID), None)
        .await
        .unwrap();
    assert_eq!(approved.status, Some(OrderStatus::Approved));
    assert_eq!(approved.payment_status, PaymentStatus::Rejected);
}

#[tokio::test]
async fn qr_orders_offer_status_actions_only_after_approval() {
    let engine = TestEngine::new();
    let order = engine
        .seed("pending", PaymentMethod::Qr, PaymentStatus::Pending)
        .await;
    let customer = Actor::customer(CUSTOMER_ID);

    let view = engine.service.view(order.id).await.unwrap();
    assert!(view.requires_approved_payment);
    assert!(!view.status_actions_offered);

    engine
        .service
        .submit_payment_proof(
            SubmitPaymentCommand {
                order_id: order.id,
                proof_path: Some("payment_proofs/rmp-10000.jpg".into()),
                reference: Some("REF-5512".into()),
            },
            &customer,
        )
        .await
        .unwrap();
    assert!(!engine.service.view(order.id).await.unwrap().status_actions_offered);

    let approved = engine
        .service
        .approve_payment(order.id, &Actor::admin(ADMIN_ID))
        .await
        .unwrap();
    assert_eq!(approved.payment_approved_by, Some(ADMIN_ID));
    assert_eq!(approved.status, Some(OrderStatus::Pending));

    let view = engine.service.view(order.id).await.unwrap();
    assert!(view.status_actions_offered);
    assert_eq!(view.payment_reference.as_deref(), Some("REF-5512"));
}

#[tokio::test]
async fn review_requires_a_reviewable_payment_state() {
    let engine = TestEngine::new();
    let admin = Actor::admin(ADMIN_ID);

    let approved = engine
        .seed("approved", PaymentMethod::Qr, PaymentStatus::Approved)
        .await;
    assert_matches!(
        engine.service.reject_payment(reject(approved.id, "late"), &admin).await,
        Err(ServiceError::InvalidPaymentTransition(_))
    );
    assert_matches!(
        engine.service.approve_payment(approved.id, &admin).await,
        Err(ServiceError::InvalidPaymentTransition(_))
    );
    assert_matches!(
        engine
            .service
            .submit_payment_proof(
                SubmitPaymentCommand {
                    order_id: approved.id,
                    proof_path: Some("again.jpg".into()),
                    reference: None,
                },
                &Actor::customer(CUSTOMER_ID),
            )
            .await,
        Err(ServiceError::InvalidPaymentTransition(_))
    );

    let cash = engine
        .seed("pending", PaymentMethod::Cash, PaymentStatus::Pending)
        .await;
    let rejected = engine
        .service
        .reject_payment(reject(cash.id, "no show at counter"), &admin)
        .await
        .unwrap();
    assert_eq!(rejected.payment_status, PaymentStatus::Rejected);
}

#[tokio::test]
async fn customers_cannot_review_payments() {
    let engine = TestEngine::new();
    let order = engine
        .seed("pending", PaymentMethod::Qr, PaymentStatus::Submitted)
        .await;
    let customer = Actor::customer(CUSTOMER_ID);

    assert_matches!(
        engine.service.approve_payment(order.id, &customer).await,
        Err(ServiceError::Forbidden(_))
    );
    assert_matches!(
        engine
            .service
            .reject_payment(reject(order.id, "self-rejection"), &customer)
            .await,
        Err(ServiceError::Forbidden(_))
    );
    let stored = engine.store.load_order(order.id).await.unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Submitted);
}

#[tokio::test]
async fn resubmission_after_rejection_is_audited() {
    let engine = TestEngine::new();
    let order = engine
        .seed("pending", PaymentMethod::Qr, PaymentStatus::Submitted)
        .await;
    engine
        .service
        .reject_payment(reject(order.id, "amount mismatch"), &Actor::admin(ADMIN_ID))
        .await
        .unwrap();

    let resubmitted = engine
        .service
        .submit_payment_proof(
            SubmitPaymentCommand {
                order_id: order.id,
                proof_path: Some("payment_proofs/second.jpg".into()),
                reference: None,
            },
            &Actor::customer(CUSTOMER_ID),
        )
        .await
        .unwrap();
    assert_eq!(resubmitted.payment_status, PaymentStatus::Submitted);
    assert!(resubmitted.payment_rejection_reason.is_none());
    assert_eq!(
        resubmitted.payment_proof_path.as_deref(),
        Some("payment_proofs/second.jpg")
    );

    let last = engine.audit.entries().pop().unwrap();
    assert_eq!(last.action, ACTION_PAYMENT_SUBMITTED);
    assert!(last.description.contains("resubmitted"));
}

#[tokio::test]
async fn checkout_creates_a_pending_order() {
    let engine = TestEngine::new();
    let new_order = NewOrder {
        user_id: Some(CUSTOMER_ID),
        customer_name: "Maria Santos".into(),
        customer_phone: Some("09171234567".into()),
        customer_email: Some("maria@example.com".into()),
        delivery_address: Some("12 Mabini St".into()),
        notes: None,
        fulfillment: FulfillmentMode::Delivery,
        payment_method: PaymentMethod::Cash,
        payment_proof_path: None,
        payment_reference: None,
        is_senior_discount: false,
        items: vec![NewOrderItem {
            product_id: 11,
            quantity: 3,
            unit_price: dec!(12.50),
        }],
    };

    let order = engine
        .service
        .place_order(new_order, &Actor::customer(CUSTOMER_ID))
        .await
        .unwrap();
    assert_eq!(order.stored_status, "pending");
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.total_amount, dec!(37.50));
    assert_eq!(order.discount_amount, dec!(0));
    assert_eq!(order.items[0].line_total, dec!(37.50));
    assert_eq!(order.version, 1);

    let entries = engine.audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, ACTION_ORDER_CREATED);

    let view = engine.service.view(order.id).await.unwrap();
    assert_eq!(view.invoice_number, "RMP-10000");
    assert!(!view.requires_approved_payment);
    assert!(view.status_actions_offered);
}

#[tokio::test]
async fn checkout_validates_input() {
    let engine = TestEngine::new();
    let base = NewOrder {
        user_id: None,
        customer_name: "Guest".into(),
        customer_phone: None,
        customer_email: Some("not-an-email".into()),
        delivery_address: None,
        notes: None,
        fulfillment: FulfillmentMode::Pickup,
        payment_method: PaymentMethod::Cash,
        payment_proof_path: None,
        payment_reference: None,
        is_senior_discount: false,
        items: vec![NewOrderItem {
            product_id: 1,
            quantity: 1,
            unit_price: dec!(5),
        }],
    };
    assert_matches!(
        engine.service.place_order(base.clone(), &Actor::guest()).await,
        Err(ServiceError::ValidationError(_))
    );

    let mut zero_quantity = base.clone();
    zero_quantity.customer_email = None;
    zero_quantity.items[0].quantity = 0;
    assert_matches!(
        engine.service.place_order(zero_quantity, &Actor::guest()).await,
        Err(ServiceError::InvalidInput(_))
    );

    let mut negative_price = base;
    negative_price.customer_email = None;
    negative_price.items[0].unit_price = dec!(-1);
    assert_matches!(
        engine.service.place_order(negative_price, &Actor::guest()).await,
        Err(ServiceError::InvalidInput(_))
    );
    assert!(engine.store.is_empty());
}
