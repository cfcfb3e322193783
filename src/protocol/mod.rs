//! High-level components of the LIN protocol: frame model, schedule tables,
//! master scheduling, slave reception, and the transport layer contracts.
pub mod frame;
pub mod master;
pub mod schedule;
pub mod slave;
pub mod transport;
