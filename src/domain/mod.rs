//! Domain types of the ticket extension and the ports the views talk through.

pub mod form;
pub mod ports;
pub mod pricing;
pub mod ticket;
pub mod wallet;
pub mod wire;
