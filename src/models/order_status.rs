//! Canonical order lifecycle statuses and the legal transition table.
//!
//! Stored rows may carry status strings from earlier schema revisions
//! (`payment_approved`, `ready_for_pickup`, ...). Those are normalised exactly once,
//! when an order is loaded, through [`canonicalize`]. Everything past that point works
//! with [`OrderStatus`] and never sees a legacy token again.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The eight canonical lifecycle stages.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Approved,
    Rejected,
    Preparing,
    Ready,
    Completed,
    Returned,
    Cancelled,
}

/// Status strings still accepted on read, with the canonical stage they stand for.
pub const LEGACY_ALIASES: &[(&str, OrderStatus)] = &[
    ("awaiting_payment", OrderStatus::Pending),
    ("payment_submitted", OrderStatus::Pending),
    ("payment_approved", OrderStatus::Approved),
    ("confirmed", OrderStatus::Approved),
    ("payment_rejected", OrderStatus::Rejected),
    ("ready_for_pickup", OrderStatus::Ready),
    ("ready_for_delivery", OrderStatus::Ready),
];

/// Resolves a stored status string to its canonical stage.
///
/// `cancelled` rows flagged with `is_returned` are the old encoding of a post-completion
/// return and resolve to [`OrderStatus::Returned`]. Unrecognised strings yield `None`;
/// callers treat such orders as terminal.
pub fn canonicalize(raw: &str, is_returned: bool) -> Option<OrderStatus> {
    let status = LEGACY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == raw)
        .map(|(_, status)| *status)
        .or_else(|| OrderStatus::from_str(raw).ok())?;

    if status == OrderStatus::Cancelled && is_returned {
        Some(OrderStatus::Returned)
    } else {
        Some(status)
    }
}

impl OrderStatus {
    /// Legal next statuses, in the order the UI should offer them.
    pub fn next_statuses(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Approved, Rejected, Cancelled],
            Approved => &[Preparing, Cancelled],
            Preparing => &[Ready, Cancelled],
            Ready => &[Completed, Cancelled],
            Completed => &[Returned],
            Returned | Cancelled | Rejected => &[],
        }
    }

    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        self.next_statuses().contains(&target)
    }

    /// Final for progression purposes. `Completed` is final but still allows the
    /// return edge, so check [`OrderStatus::next_statuses`] before hiding actions.
    pub fn is_final(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed
                | OrderStatus::Cancelled
                | OrderStatus::Returned
                | OrderStatus::Rejected
        )
    }

    pub fn can_be_cancelled(self) -> bool {
        !self.is_final() && self != OrderStatus::Completed
    }

    /// Label for the action that moves an order *into* this status.
    pub fn action_label(self) -> &'static str {
        match self {
            OrderStatus::Approved => "Approve Payment",
            OrderStatus::Rejected => "Reject Payment",
            OrderStatus::Preparing => "Mark as Preparing",
            OrderStatus::Ready => "Mark as Ready",
            OrderStatus::Completed => "Complete Order",
            OrderStatus::Cancelled => "Cancel Order",
            OrderStatus::Returned => "Process Return",
            OrderStatus::Pending => "Mark as Pending",
        }
    }
}

/// Generic rendering for a raw status token: underscores become spaces and the first
/// letter is upper-cased (`ready_for_pickup` -> `Ready for pickup`).
pub fn humanize_status_token(token: &str) -> String {
    let spaced = token.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    #[test]
    fn terminal_statuses_have_no_outgoing_edges() {
        for status in OrderStatus::iter() {
            let terminal = matches!(
                status,
                OrderStatus::Returned | OrderStatus::Cancelled | OrderStatus::Rejected
            );
            assert_eq!(status.next_statuses().is_empty(), terminal, "{status}");
        }
        assert_eq!(OrderStatus::Completed.next_statuses(), &[OrderStatus::Returned]);
    }

    #[rstest]
    #[case("awaiting_payment", OrderStatus::Pending)]
    #[case("payment_submitted", OrderStatus::Pending)]
    #[case("payment_approved", OrderStatus::Approved)]
    #[case("confirmed", OrderStatus::Approved)]
    #[case("payment_rejected", OrderStatus::Rejected)]
    #[case("ready_for_pickup", OrderStatus::Ready)]
    #[case("ready_for_delivery", OrderStatus::Ready)]
    #[case("preparing", OrderStatus::Preparing)]
    #[case("returned", OrderStatus::Returned)]
    fn legacy_and_canonical_tokens_resolve(#[case] raw: &str, #[case] expected: OrderStatus) {
        assert_eq!(canonicalize(raw, false), Some(expected));
    }

    #[test]
    fn cancelled_with_returned_flag_is_a_return() {
        assert_eq!(canonicalize("cancelled", true), Some(OrderStatus::Returned));
        assert_eq!(canonicalize("cancelled", false), Some(OrderStatus::Cancelled));
        // the flag only reinterprets cancellations
        assert_eq!(canonicalize("completed", true), Some(OrderStatus::Completed));
    }

    #[test]
    fn unknown_tokens_do_not_resolve() {
        assert_eq!(canonicalize("on_hold", false), None);
        assert_eq!(canonicalize("Pending", false), None);
        assert_eq!(canonicalize("", false), None);
    }

    #[test]
    fn completed_is_final_but_not_cancellable() {
        assert!(OrderStatus::Completed.is_final());
        assert!(!OrderStatus::Completed.can_be_cancelled());
        assert!(OrderStatus::Ready.can_be_cancelled());
        assert!(!OrderStatus::Rejected.can_be_cancelled());
    }

    #[test]
    fn humanizes_tokens() {
        assert_eq!(humanize_status_token("ready_for_pickup"), "Ready for pickup");
        assert_eq!(humanize_status_token("on_hold"), "On hold");
        assert_eq!(humanize_status_token(""), "");
    }

    #[test]
    fn canonical_tokens_round_trip_through_strum() {
        for status in OrderStatus::iter() {
            assert_eq!(canonicalize(status.as_ref(), false), Some(status));
            assert!(LEGACY_ALIASES.iter().all(|(alias, _)| *alias != status.as_ref()));
        }
    }
}
