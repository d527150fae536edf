//! JSON-RPC shapes carried on the provider channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Methods that require explicit user confirmation via a popup window.
pub const UNSAFE_METHODS: &[&str] = &[
    "eth_sendTransaction",
    "eth_signTypedData",
    "eth_signTypedData_v1",
    "eth_signTypedData_v3",
    "eth_signTypedData_v4",
    "personal_sign",
    // solana
    "sol_signTransaction",
    "sol_signAllTransactions",
];

/// Legacy methods that can be answered synchronously from cached session
/// state, without a round trip to the wallet frame.
pub const SYNC_CACHED_METHODS: &[&str] = &["eth_accounts", "eth_coinbase", "net_version"];

pub fn is_unsafe_method(method: &str) -> bool {
    UNSAFE_METHODS.contains(&method)
}

/// Outgoing request. `id` is unique per outstanding request on one
/// correlator instance; `preopen_instance_id` links the request to a popup
/// window when the method requires confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub id: u64,
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(rename = "preopenInstanceId", skip_serializing_if = "Option::is_none")]
    pub preopen_instance_id: Option<String>,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id,
            jsonrpc: "2.0",
            method: method.into(),
            params,
            preopen_instance_id: None,
        }
    }
}

/// Remote-reported failure payload, passed through verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcErrorPayload {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Inbound response, matched to exactly one pending request by `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorPayload>,
}

/// Server-initiated notification (no `id`, not a reply to anything).
#[derive(Debug, Clone, Deserialize)]
pub struct RpcNotification {
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// One inbound provider-channel object: either a correlated response or an
/// unsolicited notification. Anything else decodes to `Unknown` and is
/// dropped by the correlator.
#[derive(Debug, Clone)]
pub enum RpcIncoming {
    Response(RpcResponse),
    Notification(RpcNotification),
    Unknown(Value),
}

impl RpcIncoming {
    pub fn from_value(v: Value) -> Self {
        // A response carries an id; a notification carries a method but no
        // id worth correlating.
        if v.get("id").is_some() {
            if let Ok(resp) = serde_json::from_value::<RpcResponse>(v.clone()) {
                return RpcIncoming::Response(resp);
            }
        }
        if v.get("method").is_some() {
            if let Ok(notif) = serde_json::from_value::<RpcNotification>(v.clone()) {
                return RpcIncoming::Notification(notif);
            }
        }
        RpcIncoming::Unknown(v)
    }
}
