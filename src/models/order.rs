use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{
    order_status::{humanize_status_token, OrderStatus},
    payment::{FulfillmentMode, PaymentMethod, PaymentStatus},
};

/// Prefix of the human-facing invoice number.
pub const INVOICE_PREFIX: &str = "RMP";
/// Invoice number assigned to order id 1.
pub const INVOICE_BASE: i32 = 10000;

/// An order as seen by the lifecycle engine.
///
/// `status` is the canonical stage resolved at load time; `stored_status` is the exact
/// string found in storage and is written back untouched unless a transition replaces
/// it. `status == None` means the stored string was not recognised.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i32,
    pub user_id: Option<i32>,
    pub status: Option<OrderStatus>,
    pub stored_status: String,
    pub is_returned: bool,
    pub fulfillment: FulfillmentMode,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_proof_path: Option<String>,
    pub payment_reference: Option<String>,
    pub payment_rejection_reason: Option<String>,
    pub payment_submitted_at: Option<DateTime<Utc>>,
    pub payment_approved_at: Option<DateTime<Utc>>,
    pub payment_approved_by: Option<i32>,
    pub total_amount: Decimal,
    pub is_senior_discount: bool,
    pub discount_amount: Decimal,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
    pub items: Vec<OrderItem>,
}

/// A purchased line. Captures the unit price at checkout; never updated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl Order {
    /// `RMP-10000` for id 1, `RMP-10001` for id 2, ...
    pub fn invoice_number(&self) -> String {
        format!("{}-{}", INVOICE_PREFIX, INVOICE_BASE + self.id - 1)
    }

    /// Amount before the senior discount was taken off.
    pub fn subtotal(&self) -> Decimal {
        if self.is_senior_discount && self.discount_amount > Decimal::ZERO {
            self.total_amount + self.discount_amount
        } else {
            self.total_amount
        }
    }

    pub fn allowed_next_statuses(&self) -> Vec<OrderStatus> {
        self.status
            .map(|status| status.next_statuses().to_vec())
            .unwrap_or_default()
    }

    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.status
            .map(|status| status.can_transition_to(target))
            .unwrap_or(false)
    }

    pub fn status_label(&self) -> String {
        if let Some(label) = self.legacy_label() {
            return label.to_string();
        }
        match self.status {
            Some(OrderStatus::Pending) => "Pending".to_string(),
            Some(OrderStatus::Approved) => "Approved".to_string(),
            Some(OrderStatus::Rejected) => "Rejected".to_string(),
            Some(OrderStatus::Preparing) => "Preparing".to_string(),
            Some(OrderStatus::Ready) => format!("Ready for {}", self.ready_mode().label()),
            Some(OrderStatus::Completed) => "Completed".to_string(),
            Some(OrderStatus::Returned) => "Returned".to_string(),
            Some(OrderStatus::Cancelled) => "Cancelled".to_string(),
            None => "Unknown".to_string(),
        }
    }

    /// Legacy rows whose stage had its own name keep showing it until they move on.
    fn legacy_label(&self) -> Option<&'static str> {
        self.status?;
        match self.stored_status.as_str() {
            "awaiting_payment" => Some("Awaiting Payment"),
            "payment_submitted" => Some("Payment Submitted"),
            "confirmed" => Some("Confirmed"),
            _ => None,
        }
    }

    /// Legacy `ready_for_*` rows name their mode explicitly; otherwise the order's
    /// fulfillment choice decides.
    fn ready_mode(&self) -> FulfillmentMode {
        match self.stored_status.as_str() {
            "ready_for_pickup" => FulfillmentMode::Pickup,
            "ready_for_delivery" => FulfillmentMode::Delivery,
            _ => self.fulfillment,
        }
    }

    pub fn is_final_status(&self) -> bool {
        self.status.map(OrderStatus::is_final).unwrap_or(false)
    }

    pub fn can_be_cancelled(&self) -> bool {
        self.status.map(OrderStatus::can_be_cancelled).unwrap_or(false)
    }

    /// Action label for every legal next status, in table order.
    pub fn next_status_option_labels(&self) -> Vec<(OrderStatus, &'static str)> {
        self.allowed_next_statuses()
            .into_iter()
            .map(|status| (status, status.action_label()))
            .collect()
    }

    /// QR orders must have their payment approved before status actions are offered.
    pub fn requires_approved_payment(&self) -> bool {
        self.payment_method == PaymentMethod::Qr
    }

    pub fn status_actions_offered(&self) -> bool {
        if self.allowed_next_statuses().is_empty() {
            return false;
        }
        !self.requires_approved_payment() || self.payment_status == PaymentStatus::Approved
    }

    /// Canonical token for display, or the raw stored value when unrecognised.
    pub fn status_token(&self) -> String {
        match self.status {
            Some(status) => status.to_string(),
            None => self.stored_status.clone(),
        }
    }

    /// Moves the order to `target` and replaces the stored string with the canonical one.
    pub(crate) fn set_status(&mut self, target: OrderStatus) {
        self.status = Some(target);
        self.stored_status = target.to_string();
        if target == OrderStatus::Returned {
            self.is_returned = true;
        }
    }
}

/// Senior discount for `subtotal` at `rate`, rounded half away from zero to cents.
pub fn calculate_senior_discount(subtotal: Decimal, rate: Decimal) -> Decimal {
    (subtotal * rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Checkout input for a new order.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct NewOrder {
    pub user_id: Option<i32>,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Customer name must be between 1 and 255 characters"
    ))]
    pub customer_name: String,
    #[validate(length(max = 32, message = "Phone number is too long"))]
    pub customer_phone: Option<String>,
    #[validate(email(message = "Customer email must be a valid email address"))]
    pub customer_email: Option<String>,
    pub delivery_address: Option<String>,
    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,
    pub fulfillment: FulfillmentMode,
    pub payment_method: PaymentMethod,
    pub payment_proof_path: Option<String>,
    pub payment_reference: Option<String>,
    pub is_senior_discount: bool,
    pub items: Vec<NewOrderItem>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct NewOrderItem {
    pub product_id: i32,
    #[validate(range(min = 1, max = 10000, message = "Quantity must be between 1 and 10000"))]
    pub quantity: i32,
    #[validate(custom = "validate_unit_price")]
    pub unit_price: Decimal,
}

/// Largest accepted unit price at checkout.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 2);

fn validate_unit_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() || *price > MAX_UNIT_PRICE {
        let mut err = ValidationError::new("unit_price");
        err.message = Some("Unit price must be between 0 and 10000000".into());
        return Err(err);
    }
    Ok(())
}

impl NewOrderItem {
    /// `None` when the line cannot be represented as a `Decimal`.
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Presentation snapshot of an order for action menus and listings.
#[derive(Clone, Debug, Serialize)]
pub struct OrderView {
    pub id: i32,
    pub invoice_number: String,
    pub status: String,
    pub status_label: String,
    pub next_status_options: Vec<StatusOption>,
    pub is_final_status: bool,
    pub can_be_cancelled: bool,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub requires_approved_payment: bool,
    pub status_actions_offered: bool,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusOption {
    pub status: OrderStatus,
    pub label: &'static str,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            invoice_number: order.invoice_number(),
            status: order.status_token(),
            status_label: order.status_label(),
            next_status_options: order
                .next_status_option_labels()
                .into_iter()
                .map(|(status, label)| StatusOption { status, label })
                .collect(),
            is_final_status: order.is_final_status(),
            can_be_cancelled: order.can_be_cancelled(),
            payment_status: order.payment_status,
            payment_method: order.payment_method,
            payment_reference: order.payment_reference.clone(),
            requires_approved_payment: order.requires_approved_payment(),
            status_actions_offered: order.status_actions_offered(),
            subtotal: order.subtotal(),
            discount_amount: order.discount_amount,
            total_amount: order.total_amount,
            created_at: order.created_at,
        }
    }
}

/// Human label for a raw status token that has no canonical meaning.
pub fn fallback_status_label(token: &str) -> String {
    humanize_status_token(token)
}
