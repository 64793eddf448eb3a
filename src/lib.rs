//! Card payment gateway adapters for Gestpay, GlobalCollect and HSBC.
//!
//! Each adapter implements [`PaymentGateway`]: it maps the call onto a canonical
//! attribute set, serializes it in the gateway's wire format, sends it through a
//! [`Transport`] and normalizes the answer into a [`Response`].

pub mod config;
pub mod error;
pub mod logging;
pub mod payments;

pub use config::{GatewaysConfig, GestpayConfig, GlobalCollectConfig, HsbcConfig, Security};
pub use error::{GatewayError, GatewayResult};
pub use payments::attributes::{Attributes, Field};
pub use payments::fraud::apply_fraud_override;
pub use payments::providers::{GestpayGateway, GlobalCollectGateway, HsbcGateway};
pub use payments::traits::PaymentGateway;
pub use payments::transport::Transport;
#[cfg(feature = "http")]
pub use payments::transport::{HttpTransport, HttpTransportConfig};
pub use payments::types::{
    CardBrand, CreditCard, Money, Outcome, Response, ThreeDSecureChallenge, TransactionOptions,
};
