// Order lifecycle and payment review
pub mod order_lifecycle;

pub use order_lifecycle::{
    OrderLifecycleService, RejectPaymentCommand, SubmitPaymentCommand,
    DEFAULT_SENIOR_DISCOUNT_RATE,
};
