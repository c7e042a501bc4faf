//! Wire types for the Tendermint JSON-RPC and Cosmos REST gateway.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: serde_json::Value,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    #[serde(default = "Option::default")]
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcErrorBody {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcErrorBody {
    /// Message and data joined for display.
    pub fn describe(&self) -> String {
        match &self.data {
            Some(serde_json::Value::String(data)) => format!("{}: {}", self.message, data),
            Some(data) => format!("{}: {}", self.message, data),
            None => self.message.clone(),
        }
    }
}

/// `status` result.
#[derive(Debug, Deserialize)]
pub struct StatusResult {
    pub node_info: NodeInfo,
    pub sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
pub struct NodeInfo {
    /// Chain id the node runs.
    pub network: String,
}

#[derive(Debug, Deserialize)]
pub struct SyncInfo {
    #[serde(deserialize_with = "u64_from_str")]
    pub latest_block_height: u64,
    #[serde(default)]
    pub catching_up: bool,
}

/// `block` result.
#[derive(Debug, Deserialize)]
pub struct BlockResult {
    pub block: Block,
}

#[derive(Debug, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    #[serde(default)]
    pub data: BlockData,
}

#[derive(Debug, Deserialize)]
pub struct BlockHeader {
    #[serde(deserialize_with = "u64_from_str")]
    pub height: u64,
    /// RFC 3339 timestamp.
    pub time: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct BlockData {
    /// Base64-encoded transactions; `null` for an empty block.
    #[serde(default)]
    pub txs: Option<Vec<String>>,
}

/// `broadcast_tx_sync` result.
#[derive(Debug, Deserialize)]
pub struct BroadcastTxResult {
    pub code: u32,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub codespace: String,
    #[serde(default)]
    pub hash: String,
}

/// `/cosmos/auth/v1beta1/accounts/{address}` response.
///
/// The account is kept as raw JSON since its shape depends on the account type.
#[derive(Debug, Deserialize)]
pub struct AccountResponse {
    pub account: serde_json::Value,
}

impl AccountResponse {
    /// Account number and sequence, looking through vesting and module wrappers.
    pub fn number_and_sequence(&self) -> Option<(u64, u64)> {
        find_base_account(&self.account)
    }
}

fn find_base_account(value: &serde_json::Value) -> Option<(u64, u64)> {
    if let (Some(number), sequence) = (
        value.get("account_number").and_then(json_u64),
        value.get("sequence").and_then(json_u64),
    ) {
        return Some((number, sequence.unwrap_or(0)));
    }
    ["base_account", "base_vesting_account"]
        .iter()
        .filter_map(|key| value.get(key))
        .find_map(find_base_account)
}

/// Reads an integer encoded either as a JSON number or a decimal string.
pub fn json_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// `/ibc/core/channel/v1/channels` response.
#[derive(Debug, Deserialize)]
pub struct ChannelsResponse {
    #[serde(default)]
    pub channels: Vec<IdentifiedChannel>,
}

#[derive(Debug, Deserialize)]
pub struct IdentifiedChannel {
    pub state: String,
    pub port_id: String,
    pub channel_id: String,
}

impl IdentifiedChannel {
    pub fn is_open(&self) -> bool {
        self.state == "STATE_OPEN"
    }
}

/// `/ibc/core/channel/v1/channels/{channel}/ports/{port}/client_state` response.
#[derive(Debug, Deserialize)]
pub struct ChannelClientStateResponse {
    #[serde(default)]
    pub identified_client_state: Option<IdentifiedClientState>,
}

#[derive(Debug, Deserialize)]
pub struct IdentifiedClientState {
    #[serde(default)]
    pub client_id: String,
    pub client_state: serde_json::Value,
}

impl IdentifiedClientState {
    /// Chain id tracked by the client.
    pub fn chain_id(&self) -> Option<&str> {
        self.client_state.get("chain_id").and_then(|v| v.as_str())
    }

    /// `(revision_number, revision_height)` of the client's latest height.
    pub fn latest_height(&self) -> Option<(u64, u64)> {
        let height = self.client_state.get("latest_height")?;
        Some((
            height.get("revision_number").and_then(json_u64).unwrap_or(0),
            height.get("revision_height").and_then(json_u64)?,
        ))
    }
}

fn u64_from_str<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    json_u64(&value).ok_or_else(|| de::Error::custom(format!("expected integer, got {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_result() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "node_info": { "network": "gaia-1", "moniker": "node0" },
                "sync_info": { "latest_block_height": "1234", "catching_up": false }
            }
        });
        let response: JsonRpcResponse<StatusResult> = serde_json::from_value(body).unwrap();
        let status = response.result.unwrap();
        assert_eq!(status.node_info.network, "gaia-1");
        assert_eq!(status.sync_info.latest_block_height, 1234);
    }

    #[test]
    fn test_empty_block_has_null_txs() {
        let body = json!({
            "block": {
                "header": { "height": "7", "time": "2024-05-01T10:00:00.123456789Z" },
                "data": { "txs": null }
            }
        });
        let block: BlockResult = serde_json::from_value(body).unwrap();
        assert_eq!(block.block.header.height, 7);
        assert!(block.block.data.txs.is_none());
    }

    #[test]
    fn test_rpc_error_envelope() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32603, "message": "Internal error", "data": "height 99 must be less than or equal to the current blockchain height 10" }
        });
        let response: JsonRpcResponse<BlockResult> = serde_json::from_value(body).unwrap();
        assert!(response.result.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.code, -32603);
        assert!(error.describe().starts_with("Internal error: height 99"));
    }

    #[test]
    fn test_vesting_account_sequence() {
        let response: AccountResponse = serde_json::from_value(json!({
            "account": {
                "@type": "/cosmos.vesting.v1beta1.ContinuousVestingAccount",
                "base_vesting_account": {
                    "base_account": { "address": "cosmos1...", "account_number": "12", "sequence": "40" }
                }
            }
        }))
        .unwrap();
        assert_eq!(response.number_and_sequence(), Some((12, 40)));
    }

    #[test]
    fn test_fresh_account_without_sequence() {
        let response: AccountResponse = serde_json::from_value(json!({
            "account": { "@type": "/cosmos.auth.v1beta1.BaseAccount", "account_number": "3" }
        }))
        .unwrap();
        assert_eq!(response.number_and_sequence(), Some((3, 0)));
    }

    #[test]
    fn test_client_state_height() {
        let response: ChannelClientStateResponse = serde_json::from_value(json!({
            "identified_client_state": {
                "client_id": "07-tendermint-0",
                "client_state": {
                    "chain_id": "osmo-1",
                    "latest_height": { "revision_number": "1", "revision_height": "5000" }
                }
            }
        }))
        .unwrap();
        let state = response.identified_client_state.unwrap();
        assert_eq!(state.chain_id(), Some("osmo-1"));
        assert_eq!(state.latest_height(), Some((1, 5000)));
    }
}
