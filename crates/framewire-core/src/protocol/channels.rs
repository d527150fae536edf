//! Typed payloads of the wallet communication channels.
//!
//! Channel names are a stable wire contract shared with the wallet frame;
//! payload field names keep the frame's camelCase spelling. Writes and reads
//! on the same channel are not symmetric (e.g. the `window` channel nests
//! outbound notices under `data` but delivers inbound close notices flat);
//! the shapes below follow what the frame actually sends.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC request/response channel of the provider.
pub const PROVIDER: &str = "provider";
/// Wallet-pushed session state (selected address, chain, lock state).
pub const PUBLIC_CONFIG: &str = "publicConfig";
/// Embed initialization handshake.
pub const INIT_STREAM: &str = "init_stream";
/// Login/logout state of the wallet frame; single source of truth.
pub const STATUS: &str = "status";
/// Login popup / modal coordination.
pub const OAUTH: &str = "oauth";
/// Host-initiated logout notices.
pub const LOGOUT: &str = "logout";
/// Network/provider switch handshake.
pub const PROVIDER_CHANGE: &str = "provider_change";
/// Popup window lifecycle correlation.
pub const WINDOW: &str = "window";

/// Outbound init notice.
#[derive(Debug, Clone, Serialize)]
pub struct InitRequest {
    pub name: &'static str,
    pub data: InitRequestData,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitRequestData {
    #[serde(rename = "enableLogging")]
    pub enable_logging: bool,
}

impl InitRequest {
    pub fn new(enable_logging: bool) -> Self {
        Self {
            name: "init_stream",
            data: InitRequestData { enable_logging },
        }
    }
}

/// Inbound init-channel notice: `init_complete` on success, or an error.
#[derive(Debug, Clone, Deserialize)]
pub struct InitNotice {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub data: Option<InitNoticeData>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitNoticeData {
    #[serde(default)]
    pub success: bool,
}

impl InitNotice {
    pub fn is_complete(&self) -> bool {
        self.name.as_deref() == Some("init_complete")
            && self.data.as_ref().is_some_and(|d| d.success)
    }
}

/// Login state pushed by the wallet frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    #[serde(rename = "loggedIn", default)]
    pub logged_in: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rehydrate: Option<bool>,
}

/// Outbound oauth notice: either a frame-rendered login modal
/// (`oauth_modal`) or a verifier-specific popup flow (`oauth`).
#[derive(Debug, Clone, Serialize)]
pub struct OauthRequest {
    pub name: &'static str,
    pub data: OauthRequestData,
}

#[derive(Debug, Clone, Serialize)]
pub struct OauthRequestData {
    #[serde(rename = "calledFromEmbed")]
    pub called_from_embed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifier: Option<String>,
    #[serde(rename = "preopenInstanceId", skip_serializing_if = "Option::is_none")]
    pub preopen_instance_id: Option<String>,
    #[serde(rename = "chainName", skip_serializing_if = "Option::is_none")]
    pub chain_name: Option<String>,
}

impl OauthRequest {
    pub fn modal(called_from_embed: bool, chain_name: impl Into<String>) -> Self {
        Self {
            name: "oauth_modal",
            data: OauthRequestData {
                called_from_embed,
                verifier: None,
                preopen_instance_id: None,
                chain_name: Some(chain_name.into()),
            },
        }
    }

    pub fn popup(
        called_from_embed: bool,
        verifier: impl Into<String>,
        preopen_instance_id: impl Into<String>,
    ) -> Self {
        Self {
            name: "oauth",
            data: OauthRequestData {
                called_from_embed,
                verifier: Some(verifier.into()),
                preopen_instance_id: Some(preopen_instance_id.into()),
                chain_name: None,
            },
        }
    }
}

/// Terminal login outcome delivered on the oauth channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OauthResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(rename = "selectedAddress", default, skip_serializing_if = "Option::is_none")]
    pub selected_address: Option<String>,
}

/// Outbound logout notice.
#[derive(Debug, Clone, Serialize)]
pub struct LogoutNotice {
    pub name: &'static str,
}

impl LogoutNotice {
    pub fn new() -> Self {
        Self { name: "logOut" }
    }
}

impl Default for LogoutNotice {
    fn default() -> Self {
        Self::new()
    }
}

/// Outbound provider/network switch request.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderChangeRequest {
    pub name: &'static str,
    pub data: ProviderChangeData,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderChangeData {
    pub network: NetworkSpec,
    #[serde(rename = "override")]
    pub override_current: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSpec {
    #[serde(rename = "chainId")]
    pub chain_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl ProviderChangeRequest {
    pub fn new(network: NetworkSpec, override_current: bool) -> Self {
        Self {
            name: "show_provider_change",
            data: ProviderChangeData {
                network,
                override_current,
            },
        }
    }
}

/// Acknowledgment for a provider change.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderChangeAck {
    pub data: ProviderChangeAckData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderChangeAckData {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub err: Option<String>,
}

/// Outbound window-channel notice (`opened_window` announce or
/// `closed: true` report); payload nested under `data`.
#[derive(Debug, Clone, Serialize)]
pub struct WindowNotice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'static str>,
    pub data: WindowNoticeData,
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowNoticeData {
    #[serde(rename = "preopenInstanceId")]
    pub preopen_instance_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed: Option<bool>,
}

impl WindowNotice {
    pub fn opened(preopen_instance_id: impl Into<String>) -> Self {
        Self {
            name: Some("opened_window"),
            data: WindowNoticeData {
                preopen_instance_id: preopen_instance_id.into(),
                closed: None,
            },
        }
    }

    pub fn closed(preopen_instance_id: impl Into<String>) -> Self {
        Self {
            name: None,
            data: WindowNoticeData {
                preopen_instance_id: preopen_instance_id.into(),
                closed: Some(true),
            },
        }
    }
}

/// Inbound remote-initiated close; delivered flat, not nested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowCloseNotice {
    #[serde(rename = "preopenInstanceId")]
    pub preopen_instance_id: String,
    #[serde(default)]
    pub close: bool,
}

/// Session state pushed by the wallet frame on the publicConfig channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublicConfig {
    #[serde(rename = "selectedAddress", default)]
    pub selected_address: Option<String>,
    #[serde(rename = "chainId", default)]
    pub chain_id: Option<String>,
    #[serde(rename = "networkVersion", default)]
    pub network_version: Option<String>,
    #[serde(rename = "isUnlocked", default)]
    pub is_unlocked: Option<bool>,
    #[serde(default)]
    pub value: Option<Value>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn init_notice_complete() {
        let n: InitNotice =
            serde_json::from_value(json!({"name": "init_complete", "data": {"success": true}}))
                .unwrap();
        assert!(n.is_complete());

        let err: InitNotice = serde_json::from_value(json!({"error": "boom"})).unwrap();
        assert!(!err.is_complete());
        assert_eq!(err.error.as_deref(), Some("boom"));
    }

    #[test]
    fn oauth_popup_wire_shape() {
        let req = OauthRequest::popup(true, "google", "pre-1");
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["name"], "oauth");
        assert_eq!(v["data"]["calledFromEmbed"], true);
        assert_eq!(v["data"]["verifier"], "google");
        assert_eq!(v["data"]["preopenInstanceId"], "pre-1");
        assert!(v["data"].get("chainName").is_none());
    }

    #[test]
    fn window_notices() {
        let opened = serde_json::to_value(WindowNotice::opened("w1")).unwrap();
        assert_eq!(opened["name"], "opened_window");
        assert_eq!(opened["data"]["preopenInstanceId"], "w1");

        let closed = serde_json::to_value(WindowNotice::closed("w1")).unwrap();
        assert!(closed.get("name").is_none());
        assert_eq!(closed["data"]["closed"], true);

        // inbound close is flat
        let close: WindowCloseNotice =
            serde_json::from_value(json!({"preopenInstanceId": "w1", "close": true})).unwrap();
        assert!(close.close);
    }

    #[test]
    fn status_defaults() {
        let s: StatusUpdate = serde_json::from_value(json!({})).unwrap();
        assert!(!s.logged_in);
        assert!(s.verifier.is_none());
    }
}
