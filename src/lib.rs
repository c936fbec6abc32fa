//! Simulated point-of-sale payments.
//!
//! A client creates a transaction, a POS terminal confirms and authorizes it, and
//! both sides observe progress by polling. Access is gated by short-lived,
//! role-scoped HMAC tokens; records expire after a fixed time-to-live.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
