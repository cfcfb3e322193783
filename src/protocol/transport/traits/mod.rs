//! Abstraction traits used by the transport layer (master bus, slave byte
//! stream, and timer).
pub mod lin_bus;
pub mod lin_timer;
pub mod slave_transport;
