//! Services exposed over the multicast RPC endpoint
//!
//! Each module here implements `Service` and is registered by the server binary.

pub mod math;
