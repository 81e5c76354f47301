//! JSON-RPC 2.0 envelope handling, method registry and request dispatch

pub mod dispatcher;
pub mod envelope;
pub mod registry;
