//! Payment gateway implementations
//!
//! Concrete implementations of the PaymentGateway trait for each gateway.

pub mod gestpay;
pub mod global_collect;
pub mod hsbc;

pub use gestpay::GestpayGateway;
pub use global_collect::GlobalCollectGateway;
pub use hsbc::HsbcGateway;
