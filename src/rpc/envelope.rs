//! JSON-RPC envelope representations and wire encoding
//!
//! Requests keep their `params` as raw JSON until the target method's argument
//! type is known; responses always carry both `result` and `error`, with a
//! zero-valued error meaning success and a `null` result on failure.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{value::RawValue, Value};

use crate::errors::DispatchError;

pub const JSONRPC_VERSION: &str = "2.0";
pub const MAX_DATAGRAM_BYTES: usize = 8042;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INTERNAL_ERROR: i64 = -32603;
/// Application-defined: the registered method itself returned an error.
pub const METHOD_EXECUTION_ERROR: i64 = -32000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: i64,
    pub method: String,
    /// `None` only when the field is absent; a literal `null` is kept raw.
    #[serde(
        default,
        deserialize_with = "present_raw",
        skip_serializing_if = "Option::is_none"
    )]
    pub params: Option<Box<RawValue>>,
}

impl Request {
    pub fn new<P: Serialize>(
        id: i64,
        method: impl Into<String>,
        params: &P,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params: Some(serde_json::value::to_raw_value(params)?),
        })
    }

    pub fn params_json(&self) -> Option<&str> {
        self.params.as_deref().map(RawValue::get)
    }
}

fn present_raw<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Box<RawValue>>, D::Error> {
    Box::<RawValue>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: i64,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: ErrorObject,
}

impl Response {
    pub fn success(id: i64, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result,
            error: ErrorObject::default(),
        }
    }

    pub fn failure(id: i64, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Value::Null,
            error: ErrorObject {
                code,
                message: message.into(),
            },
        }
    }

    /// Field presence says nothing here; only a non-zero code marks failure.
    pub fn is_error(&self) -> bool {
        self.error.code != 0
    }
}

pub fn decode_request(datagram: &[u8]) -> Result<Request, DispatchError> {
    serde_json::from_slice(datagram).map_err(DispatchError::Parse)
}

pub fn encode_response(response: &Response) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(response)
}

pub fn encode_request(request: &Request) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(request)
}

pub fn decode_response(datagram: &[u8]) -> Result<Response, serde_json::Error> {
    serde_json::from_slice(datagram)
}
