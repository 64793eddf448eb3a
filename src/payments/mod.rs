//! Payment gateway integration module
//!
//! Adapters translating a uniform "charge a card" call into the Gestpay,
//! GlobalCollect and HSBC wire formats and normalizing their answers.

pub mod attributes;
pub mod fraud;
pub mod mapping;
pub mod providers;
pub mod traits;
pub mod transport;
pub mod types;
pub mod wire;
