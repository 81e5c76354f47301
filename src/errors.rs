use std::io;

use thiserror::Error;

use crate::rpc::envelope::{
    Response, INTERNAL_ERROR, INVALID_REQUEST, METHOD_EXECUTION_ERROR, METHOD_NOT_FOUND,
    PARSE_ERROR,
};

/// Per-datagram failures. None of these ever stop the receive loop; each one
/// is turned into an error envelope and sent back to the caller.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    Parse(#[source] serde_json::Error),
    #[error("unsupported jsonrpc version {0:?}, expected \"2.0\"")]
    UnsupportedVersion(String),
    #[error("{0}")]
    MethodNotFound(String),
    #[error("{0}")]
    ArgumentShape(#[source] serde_json::Error),
    #[error("{0}")]
    Invocation(String),
    #[error("failed to encode reply: {0}")]
    ReplyEncoding(#[source] serde_json::Error),
}

impl DispatchError {
    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self::MethodNotFound(message.into())
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Parse(_) => PARSE_ERROR,
            Self::UnsupportedVersion(_) | Self::ArgumentShape(_) => INVALID_REQUEST,
            Self::MethodNotFound(_) => METHOD_NOT_FOUND,
            Self::Invocation(_) => METHOD_EXECUTION_ERROR,
            Self::ReplyEncoding(_) => INTERNAL_ERROR,
        }
    }

    pub fn into_response(self, id: i64) -> Response {
        Response::failure(id, self.code(), self.to_string())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("rpc.Register: no suitable methods for service {service:?}")]
    NoSuitableMethods { service: String },
    #[error("rpc.Register: invalid service name {service:?}")]
    InvalidServiceName { service: String },
    #[error("rpc.Register: service already defined: {service}")]
    DuplicateService { service: String },
    #[error("rpc.Register: invalid method name {method:?} on service {service:?}")]
    InvalidMethodName { service: String, method: String },
    #[error("rpc.Register: method {method:?} defined twice on service {service:?}")]
    DuplicateMethod { service: String, method: String },
}

/// Startup failures. These are returned to the caller rather than logged.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind multicast socket: {0}")]
    Bind(#[source] io::Error),
    #[error("failed to join multicast group: {0}")]
    JoinGroup(#[source] io::Error),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport failure: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("no response within the timeout")]
    Timeout,
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_error() -> serde_json::Error {
        serde_json::from_str::<serde_json::Value>("{").expect_err("truncated json must fail")
    }

    #[test]
    fn codes_follow_json_rpc_taxonomy() {
        assert_eq!(DispatchError::Parse(json_error()).code(), -32700);
        assert_eq!(DispatchError::ArgumentShape(json_error()).code(), -32600);
        assert_eq!(
            DispatchError::UnsupportedVersion("1.0".to_string()).code(),
            -32600
        );
        assert_eq!(DispatchError::method_not_found("x").code(), -32601);
        assert_eq!(DispatchError::ReplyEncoding(json_error()).code(), -32603);
        assert_eq!(
            DispatchError::Invocation("boom".to_string()).code(),
            METHOD_EXECUTION_ERROR
        );
    }

    #[test]
    fn into_response_keeps_message_verbatim() {
        let response = DispatchError::Invocation("division by zero".to_string()).into_response(9);

        assert_eq!(response.id, 9);
        assert_eq!(response.error.code, METHOD_EXECUTION_ERROR);
        assert_eq!(response.error.message, "division by zero");
        assert!(response.result.is_null());
    }
}
