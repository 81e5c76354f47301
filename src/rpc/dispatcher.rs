//! Per-datagram request pipeline
//!
//! Turns one request datagram into exactly one response envelope:
//! decode, version check, resolve, bind params, invoke. Every failure is
//! mapped to its JSON-RPC error code; nothing here can fail the caller.

use std::sync::Arc;

use tracing::debug;

use crate::errors::DispatchError;
use crate::rpc::{
    envelope::{decode_request, Response, JSONRPC_VERSION},
    registry::Registry,
};

/// What the pipeline produced for one datagram.
#[derive(Debug, Clone)]
pub struct Dispatched {
    /// `None` when the datagram could not be decoded.
    pub method: Option<String>,
    pub response: Response,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn dispatch(&self, datagram: &[u8]) -> Dispatched {
        let request = match decode_request(datagram) {
            Ok(request) => request,
            Err(err) => {
                return Dispatched {
                    method: None,
                    response: err.into_response(0),
                }
            }
        };

        let id = request.id;
        let response = match self.call(&request.jsonrpc, &request.method, request.params_json()) {
            Ok(result) => Response::success(id, result),
            Err(err) => err.into_response(id),
        };

        Dispatched {
            method: Some(request.method),
            response,
        }
    }

    fn call(
        &self,
        version: &str,
        method: &str,
        params: Option<&str>,
    ) -> Result<serde_json::Value, DispatchError> {
        if version != JSONRPC_VERSION {
            return Err(DispatchError::UnsupportedVersion(version.to_string()));
        }

        let descriptor = self.registry.resolve(method)?;
        let call = descriptor.bind(params)?;
        debug!(
            method = %method,
            argument_shape = descriptor.argument_shape(),
            reply_shape = descriptor.reply_shape(),
            "invoking method"
        );
        call.invoke()
    }
}
