//! Wire formats shared by the adapters.

pub mod delimited;
pub mod xml;
