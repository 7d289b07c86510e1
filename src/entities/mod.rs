//! sea-orm entities for the tables the back office reads and writes.

pub mod activity_log;
pub mod order;
pub mod order_item;
