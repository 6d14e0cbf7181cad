//! JSON-RPC 2.0 wire codec.
//!
//! Splits decoding failures into parse errors (malformed JSON, −32700)
//! and invalid requests (well-formed JSON that violates the JSON-RPC
//! structure, −32600) so transports can answer with the right code.

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::types::{JsonRpcRequest, JsonRpcResponse, Message, JSONRPC_VERSION};
use serde_json::Value;

/// Maximum accepted message size on any transport.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Decode a single JSON-RPC message from its wire text.
pub fn decode_message(raw: &str) -> ProtocolResult<Message> {
    if raw.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::InvalidRequest("Message too large".into()));
    }

    let value: Value = serde_json::from_str(raw).map_err(|_| ProtocolError::ParseError)?;

    let obj = value
        .as_object()
        .ok_or_else(|| ProtocolError::InvalidRequest("Message must be a JSON object".into()))?;

    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => {}
        _ => {
            return Err(ProtocolError::InvalidRequest(
                "Invalid JSON-RPC version".into(),
            ));
        }
    }

    let has_method = obj.contains_key("method");
    let has_result = obj.contains_key("result");
    let has_error = obj.contains_key("error");

    match (has_method, has_result, has_error) {
        (true, false, false) => {
            if !obj["method"].is_string() {
                return Err(ProtocolError::InvalidRequest("Method must be a string".into()));
            }
            let request: JsonRpcRequest =
                serde_json::from_value(value).map_err(|_| ProtocolError::ParseError)?;
            Ok(Message::Request(request))
        }
        (false, true, false) | (false, false, true) => {
            let response: JsonRpcResponse =
                serde_json::from_value(value).map_err(|_| ProtocolError::ParseError)?;
            Ok(Message::Response(response))
        }
        (false, false, false) => Err(ProtocolError::InvalidRequest("Missing method".into())),
        _ => Err(ProtocolError::InvalidRequest(
            "Message must carry exactly one of method, result, error".into(),
        )),
    }
}

/// Encode a message for the wire. The output never contains newlines, so
/// it is safe for both line-delimited stdio and SSE `data:` framing.
pub fn encode_message(message: &Message) -> ProtocolResult<String> {
    serde_json::to_string(message)
        .map_err(|e| ProtocolError::InternalError(e.to_string().into()))
}

/// Encode a response for the wire.
pub fn encode_response(response: &JsonRpcResponse) -> ProtocolResult<String> {
    serde_json::to_string(response)
        .map_err(|e| ProtocolError::InternalError(e.to_string().into()))
}
