//! Payment gateway types and data structures
//!
//! Card and money values consumed by the adapters, per-call options, and the
//! normalized response every adapter returns.

use serde::{Deserialize, Serialize};

use crate::payments::attributes::{Attributes, Field};

/// Card scheme, used by gateways that encode the product on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardBrand {
    Visa,
    Master,
    AmericanExpress,
    Discover,
    Jcb,
    Switch,
    Solo,
    Dankort,
    Laser,
}

/// Read-only card value.
#[derive(Clone, Serialize, Deserialize)]
pub struct CreditCard {
    pub number: String,
    pub month: u8,
    pub year: u16,
    pub first_name: String,
    pub last_name: String,
    pub verification_value: Option<String>,
    pub brand: CardBrand,
}

impl CreditCard {
    pub fn name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Month, zero-padded to two digits
    pub fn two_digit_month(&self) -> String {
        format!("{:02}", self.month)
    }

    /// Last two digits of the year, zero-padded
    pub fn two_digit_year(&self) -> String {
        format!("{:02}", self.year % 100)
    }

    /// Every character but the last four replaced by `*`.
    pub fn masked_number(&self) -> String {
        let hidden = self.number.chars().count().saturating_sub(4);
        let tail: String = self.number.chars().skip(hidden).collect();
        format!("{}{}", "*".repeat(hidden), tail)
    }
}

impl std::fmt::Debug for CreditCard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreditCard")
            .field("number", &self.masked_number())
            .field("month", &self.month)
            .field("year", &self.year)
            .field("brand", &self.brand)
            .finish_non_exhaustive()
    }
}

/// Amount in the currency's minor unit plus ISO 4217 alpha code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub cents: i64,
    pub currency: String,
}

impl Money {
    pub fn new(cents: i64, currency: impl Into<String>) -> Self {
        Self {
            cents,
            currency: currency.into(),
        }
    }

    /// Integer minor units, e.g. `29990`
    pub fn cents_string(&self) -> String {
        self.cents.to_string()
    }

    /// Major units with two decimals, e.g. `299.90`
    pub fn decimal_string(&self) -> String {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        format!("{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// Per-call options supplied alongside the amount and card.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionOptions {
    pub order_id: Option<String>,
    pub merchant_reference: Option<String>,
    /// Overrides the money's own currency.
    pub currency: Option<String>,
    /// ISO 3166 alpha-2 billing country.
    pub country: Option<String>,
    pub payer_security_level: Option<String>,
    pub payer_authentication_code: Option<String>,
    pub payer_txn_id: Option<String>,
    pub cardholder_present_code: Option<String>,
}

impl TransactionOptions {
    pub fn with_order_id(order_id: impl Into<String>) -> Self {
        Self {
            order_id: Some(order_id.into()),
            ..Self::default()
        }
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn merchant_reference(mut self, reference: impl Into<String>) -> Self {
        self.merchant_reference = Some(reference.into());
        self
    }
}

/// Outcome of one round-trip or of a whole operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    /// Cardholder must complete a 3-D Secure challenge before authorization.
    PendingChallenge,
}

/// What a response parser extracts from one raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub outcome: Outcome,
    pub message: String,
    pub attributes: Attributes,
}

impl ParsedResponse {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudReview {
    pub fraud_result: Option<String>,
    pub fraud_code: Option<String>,
    pub score: Option<String>,
}

/// Redirect data for a pending 3-D Secure challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreeDSecureChallenge {
    pub acs_url: String,
    pub pareq: Option<String>,
    pub md: Option<String>,
}

/// Normalized result returned to callers by every adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub outcome: Outcome,
    pub message: String,
    pub authorization: Option<String>,
    pub attributes: Attributes,
    pub test: bool,
}

impl Response {
    /// Wrap a parsed round-trip; `authorization` names the field holding the
    /// gateway's reference for follow-up calls.
    pub fn from_parsed(parsed: ParsedResponse, authorization: Field, test: bool) -> Self {
        Self {
            authorization: parsed.attributes.get(authorization).map(str::to_string),
            outcome: parsed.outcome,
            message: parsed.message,
            attributes: parsed.attributes,
            test,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Same response, reported as a failure with `message`. Used when a follow-up
    /// step cannot be built from what the gateway answered.
    pub fn into_failure(self, message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failure,
            message: message.into(),
            ..self
        }
    }

    pub fn is_pending(&self) -> bool {
        self.outcome == Outcome::PendingChallenge
    }

    pub fn fraud_review(&self) -> FraudReview {
        FraudReview {
            fraud_result: self.attributes.fraud_result.clone(),
            fraud_code: self.attributes.fraud_code.clone(),
            score: self.attributes.fraud_score.clone(),
        }
    }

    pub fn challenge(&self) -> Option<ThreeDSecureChallenge> {
        if !self.is_pending() {
            return None;
        }
        Some(ThreeDSecureChallenge {
            acs_url: self.attributes.acs_url.clone()?,
            pareq: self.attributes.pareq.clone(),
            md: self.attributes.md.clone(),
        })
    }
}
