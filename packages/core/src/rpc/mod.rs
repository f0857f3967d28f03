//! RPC Surface
//!
//! JSON-RPC 2.0 over stdin/stdout: the interface the app's route layer
//! uses to drive the reference engine. See `server` for the loop and
//! dispatch, `handlers` for the per-method logic, `types` for the protocol
//! shapes.

pub mod handlers;
pub mod server;
pub mod types;

pub use server::{
    handle_request, init_tracing, run_rpc_server, run_rpc_server_with_callback, ResponseCallback,
    RpcServices,
};
pub use types::{RpcError, RpcRequest, RpcResponse};
