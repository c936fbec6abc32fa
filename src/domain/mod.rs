//! Domain layer: transaction records, derived charges, capability tokens and
//! the ports the application layer talks to.

pub mod charges;
pub mod clock;
pub mod ports;
pub mod token;
pub mod transaction;
