//! RPC method handlers
//!
//! One module per exposed domain. Handlers parse typed params out of the
//! raw JSON-RPC params value, call into the service layer, and shape the
//! camelCase result.

pub mod references;
