use serde::{Deserialize, Serialize};

/// Review state of the customer's proof of payment. Independent of the order status.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
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
pub enum PaymentStatus {
    #[default]
    Pending,
    Submitted,
    Approved,
    Rejected,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
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
pub enum PaymentMethod {
    Qr,
    #[default]
    Cash,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
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
pub enum FulfillmentMode {
    #[default]
    Pickup,
    Delivery,
}

impl FulfillmentMode {
    pub fn label(self) -> &'static str {
        match self {
            FulfillmentMode::Pickup => "Pickup",
            FulfillmentMode::Delivery => "Delivery",
        }
    }
}

impl PaymentMethod {
    pub fn label(self) -> &'static str {
        match self {
            PaymentMethod::Qr => "QR",
            PaymentMethod::Cash => "Cash",
        }
    }

    /// QR payments need an uploaded proof before review can begin.
    pub fn requires_proof(self) -> bool {
        self == PaymentMethod::Qr
    }
}

impl PaymentStatus {
    /// A proof may be (re)submitted while nothing is under review or after a rejection.
    pub fn accepts_submission(self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Rejected)
    }

    /// Whether a reviewer may approve or reject in this state.
    ///
    /// QR payments are only reviewable once a proof is in; cash payments may be settled
    /// straight from `pending`.
    pub fn is_reviewable(self, method: PaymentMethod) -> bool {
        match method {
            PaymentMethod::Qr => self == PaymentStatus::Submitted,
            PaymentMethod::Cash => {
                matches!(self, PaymentStatus::Pending | PaymentStatus::Submitted)
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Submitted => "Submitted",
            PaymentStatus::Approved => "Approved",
            PaymentStatus::Rejected => "Rejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn submission_allowed_only_before_review_or_after_rejection() {
        assert!(PaymentStatus::Pending.accepts_submission());
        assert!(PaymentStatus::Rejected.accepts_submission());
        assert!(!PaymentStatus::Submitted.accepts_submission());
        assert!(!PaymentStatus::Approved.accepts_submission());
    }

    #[test]
    fn qr_reviews_need_a_submitted_proof() {
        assert!(PaymentStatus::Submitted.is_reviewable(PaymentMethod::Qr));
        assert!(!PaymentStatus::Pending.is_reviewable(PaymentMethod::Qr));
        assert!(PaymentStatus::Pending.is_reviewable(PaymentMethod::Cash));
        assert!(!PaymentStatus::Approved.is_reviewable(PaymentMethod::Cash));
    }

    #[test]
    fn parses_stored_tokens() {
        assert_eq!(PaymentMethod::from_str("qr").unwrap(), PaymentMethod::Qr);
        assert_eq!(FulfillmentMode::from_str("delivery").unwrap(), FulfillmentMode::Delivery);
        assert_eq!(PaymentStatus::Submitted.as_ref(), "submitted");
        assert!(PaymentStatus::from_str("paid").is_err());
    }

    #[test]
    fn method_labels() {
        assert_eq!(PaymentMethod::Qr.label(), "QR");
        assert_eq!(PaymentMethod::Cash.label(), "Cash");
    }
}
