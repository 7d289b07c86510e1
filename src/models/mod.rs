//! Domain types for the order back office.

pub mod actor;
pub mod order;
pub mod order_status;
pub mod payment;

pub use actor::{Actor, UserRole};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderView, StatusOption};
pub use order_status::{canonicalize, OrderStatus};
pub use payment::{FulfillmentMode, PaymentMethod, PaymentStatus};
