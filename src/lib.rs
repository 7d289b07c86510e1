//! RMP back office
//!
//! Order lifecycle and payment-review engine for a small e-commerce back office:
//! canonical order statuses with legacy aliasing, role-gated transitions under
//! optimistic concurrency, payment proof review, best-effort auditing, domain events
//! and period reports.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod audit;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod migrator;
pub mod models;
pub mod reports;
pub mod repositories;
pub mod services;

pub mod prelude {
    pub use crate::audit::{ActivityLogSink, AuditEntry, AuditSink, InMemoryAuditSink};
    pub use crate::errors::*;
    pub use crate::events::{Event, EventHandler, EventSender};
    pub use crate::models::*;
    pub use crate::reports::{OrderReport, OrderReportService, ReportPeriod};
    pub use crate::repositories::{InMemoryOrderStore, OrderRepository, OrderStore};
    pub use crate::services::*;
}
