//! Payment gateway trait definitions
//!
//! `PaymentGateway` is the uniform "charge a card" surface every adapter offers.
//! `RequestBuilder` and `ResponseParser` are the per-gateway transcoding seams the
//! adapters are assembled from.

use async_trait::async_trait;

use crate::error::{GatewayError, GatewayResult};
use crate::payments::attributes::Attributes;
use crate::payments::types::{CreditCard, Money, ParsedResponse, Response, TransactionOptions};

/// Serialized request for one round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    /// Payload in the gateway's wire format.
    pub body: String,
    /// Companion parameters sent outside the payload, already encoded.
    pub query: Vec<(&'static str, String)>,
}

impl WireRequest {
    pub fn body(body: String) -> Self {
        Self {
            body,
            query: Vec::new(),
        }
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Turns a canonical attribute set into the wire payload of one operation.
pub trait RequestBuilder {
    type Operation: Copy + std::fmt::Debug;

    /// Fails with a validation error, before anything is serialized, when a field
    /// the operation requires is absent.
    fn build(&self, operation: Self::Operation, attrs: &Attributes) -> GatewayResult<WireRequest>;
}

/// Extracts attributes and an outcome from a raw response body.
pub trait ResponseParser {
    /// Missing fields are normal; only a body without the expected envelope or
    /// document structure is an error.
    fn parse(&self, body: &str) -> GatewayResult<ParsedResponse>;
}

/// Uniform interface implemented by every gateway adapter.
///
/// Operations a gateway does not offer fail with
/// [`GatewayError::UnsupportedOperation`].
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Reserve `money` on the card without settling it.
    async fn authorize(
        &self,
        money: &Money,
        card: &CreditCard,
        options: &TransactionOptions,
    ) -> GatewayResult<Response>;

    /// Authorize and settle in one logical operation.
    async fn purchase(
        &self,
        money: &Money,
        card: &CreditCard,
        options: &TransactionOptions,
    ) -> GatewayResult<Response>;

    /// Settle a previous authorization.
    async fn capture(
        &self,
        money: &Money,
        authorization: &str,
        options: &TransactionOptions,
    ) -> GatewayResult<Response>;

    /// Cancel a previous authorization.
    async fn void(
        &self,
        _authorization: &str,
        _options: &TransactionOptions,
    ) -> GatewayResult<Response> {
        Err(GatewayError::unsupported(self.name(), "void"))
    }

    /// Return settled funds to the cardholder.
    async fn refund(
        &self,
        _money: &Money,
        _authorization: &str,
        _options: &TransactionOptions,
    ) -> GatewayResult<Response> {
        Err(GatewayError::unsupported(self.name(), "refund"))
    }
}
