//! Webhook relay services — signature checks and build triggering.

pub mod bamboo_service;
pub mod signature;
pub mod test_delivery;
