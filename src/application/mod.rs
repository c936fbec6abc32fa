//! Application layer containing the core business logic orchestration.
//!
//! `TokenIssuer` mints and verifies capability tokens, `TransactionEngine` owns
//! the transaction state machine, and `polling` holds the client-side
//! observation loop both parties use instead of a push channel.

pub mod engine;
pub mod issuer;
pub mod polling;
