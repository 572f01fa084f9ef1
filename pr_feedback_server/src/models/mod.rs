//! Webhook payload models.

pub mod event;
